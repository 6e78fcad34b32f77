//! Validation stage: raw rows in, clean rows plus per-predicate rejection counts out.

use serde::Serialize;
use tracing::{debug, info};

use crate::config::CleaningRules;
use crate::error::{PipelineError, Result};
use crate::parser::parse_pickup_datetime;
use crate::pipeline::types::{CleanRecord, RawRecord};

/// The predicate a raw row failed first. Predicates run in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    FareRange,
    CoordinateRange,
    OperatingArea,
    PassengerCount,
    Timestamp,
}

/// How many raw rows each predicate dropped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RejectionCounts {
    pub fare_range: usize,
    pub coordinate_range: usize,
    pub operating_area: usize,
    pub passenger_count: usize,
    pub timestamp: usize,
}

impl RejectionCounts {
    pub fn record(&mut self, rejection: Rejection) {
        match rejection {
            Rejection::FareRange => self.fare_range += 1,
            Rejection::CoordinateRange => self.coordinate_range += 1,
            Rejection::OperatingArea => self.operating_area += 1,
            Rejection::PassengerCount => self.passenger_count += 1,
            Rejection::Timestamp => self.timestamp += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.fare_range
            + self.coordinate_range
            + self.operating_area
            + self.passenger_count
            + self.timestamp
    }
}

/// Output of [`clean`].
#[derive(Debug, Clone, PartialEq)]
pub struct CleanOutcome {
    pub records: Vec<CleanRecord>,
    pub rejections: RejectionCounts,
}

/// Keeps every raw row that passes all predicates, in input order.
///
/// # Errors
///
/// Returns [`PipelineError::EmptyInput`] when `raw` is empty. Individual bad
/// rows never error; they are counted in [`CleanOutcome::rejections`].
#[tracing::instrument(skip_all, fields(raw = raw.len()))]
pub fn clean(raw: &[RawRecord], rules: &CleaningRules) -> Result<CleanOutcome> {
    if raw.is_empty() {
        return Err(PipelineError::EmptyInput("raw record set".to_string()));
    }

    let mut records = Vec::with_capacity(raw.len());
    let mut rejections = RejectionCounts::default();

    for row in raw {
        match validate(row, rules) {
            Ok(record) => records.push(record),
            Err(rejection) => {
                debug!(key = ?row.key, ?rejection, "Row rejected");
                rejections.record(rejection);
            }
        }
    }

    info!(
        kept = records.len(),
        rejected = rejections.total(),
        fare_range = rejections.fare_range,
        coordinate_range = rejections.coordinate_range,
        operating_area = rejections.operating_area,
        passenger_count = rejections.passenger_count,
        timestamp = rejections.timestamp,
        "Cleaning complete"
    );

    Ok(CleanOutcome {
        records,
        rejections,
    })
}

/// Runs the predicates against one row and builds the clean record.
pub fn validate(row: &RawRecord, rules: &CleaningRules) -> std::result::Result<CleanRecord, Rejection> {
    let fare_amount = row
        .fare_amount
        .filter(|fare| *fare > 0.0 && *fare <= rules.max_fare)
        .ok_or(Rejection::FareRange)?;

    let (pickup_latitude, pickup_longitude, dropoff_latitude, dropoff_longitude) = match (
        row.pickup_latitude,
        row.pickup_longitude,
        row.dropoff_latitude,
        row.dropoff_longitude,
    ) {
        (Some(plat), Some(plon), Some(dlat), Some(dlon))
            if valid_latitude(plat)
                && valid_longitude(plon)
                && valid_latitude(dlat)
                && valid_longitude(dlon) =>
        {
            (plat, plon, dlat, dlon)
        }
        _ => return Err(Rejection::CoordinateRange),
    };

    let area = &rules.operating_area;
    if !area.contains(pickup_latitude, pickup_longitude)
        || !area.contains(dropoff_latitude, dropoff_longitude)
    {
        return Err(Rejection::OperatingArea);
    }

    let passenger_count = row
        .passenger_count
        .and_then(|count| u8::try_from(count).ok())
        .filter(|count| (rules.min_passengers..=rules.max_passengers).contains(count))
        .ok_or(Rejection::PassengerCount)?;

    let pickup_datetime = row
        .pickup_datetime
        .as_deref()
        .and_then(parse_pickup_datetime)
        .ok_or(Rejection::Timestamp)?;

    Ok(CleanRecord {
        key: row.key.clone(),
        fare_amount,
        pickup_datetime,
        pickup_longitude,
        pickup_latitude,
        dropoff_longitude,
        dropoff_latitude,
        passenger_count,
    })
}

fn valid_latitude(lat: f64) -> bool {
    (-90.0..=90.0).contains(&lat)
}

fn valid_longitude(lon: f64) -> bool {
    (-180.0..=180.0).contains(&lon)
}
