//! Feature derivation: time buckets and trip distance per clean record.

use chrono::{Datelike, Timelike};
use tracing::info;

use crate::pipeline::types::{CleanRecord, EnhancedRecord, Season, TimeCategory};

/// Hours (0–23) counted as commuting peaks: 07–09 and 17–19.
pub const PEAK_HOURS: [u32; 6] = [7, 8, 9, 17, 18, 19];

/// Mean earth radius used by [`haversine_km`].
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Derives features for every record. Never drops a record; output order
/// matches input order.
#[tracing::instrument(skip_all, fields(clean = records.len()))]
pub fn enhance(records: &[CleanRecord]) -> Vec<EnhancedRecord> {
    let enhanced: Vec<EnhancedRecord> = records.iter().map(enhance_record).collect();
    info!(enhanced = enhanced.len(), "Feature engineering complete");
    enhanced
}

/// Derives features for one record. Uses the calendar date and clock time in
/// the timestamp's own offset.
pub fn enhance_record(record: &CleanRecord) -> EnhancedRecord {
    let ts = record.pickup_datetime;
    let hour = ts.hour();
    let month = ts.month();

    EnhancedRecord {
        key: record.key.clone(),
        fare_amount: record.fare_amount,
        pickup_datetime: ts,
        pickup_longitude: record.pickup_longitude,
        pickup_latitude: record.pickup_latitude,
        dropoff_longitude: record.dropoff_longitude,
        dropoff_latitude: record.dropoff_latitude,
        passenger_count: record.passenger_count,
        hour,
        day: ts.day(),
        month,
        year: ts.year(),
        weekday: ts.weekday(),
        weekday_num: ts.weekday().num_days_from_monday(),
        season: Season::from_month(month),
        is_peak: is_peak_hour(hour),
        time_category: TimeCategory::from_hour(hour),
        distance: euclidean_degrees(
            record.pickup_latitude,
            record.pickup_longitude,
            record.dropoff_latitude,
            record.dropoff_longitude,
        ),
        distance_km: haversine_km(
            record.pickup_latitude,
            record.pickup_longitude,
            record.dropoff_latitude,
            record.dropoff_longitude,
        ),
    }
}

pub fn is_peak_hour(hour: u32) -> bool {
    PEAK_HOURS.contains(&hour)
}

/// `sqrt(Δlon² + Δlat²)` in raw degrees. Not a physical length.
pub fn euclidean_degrees(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    ((lon2 - lon1).powi(2) + (lat2 - lat1).powi(2)).sqrt()
}

/// Great-circle distance on a sphere of radius [`EARTH_RADIUS_KM`].
pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let d_phi = (lat2 - lat1).to_radians();
    let d_lambda = (lon2 - lon1).to_radians();

    let h = (d_phi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * h.sqrt().min(1.0).asin()
}
