//! Record types flowing through the clean → enhance → summarize stages.

use chrono::{DateTime, FixedOffset, Weekday};
use serde::{Deserialize, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;

/// A record type written as a CSV table.
///
/// `COLUMNS` must list the serialized field names in declaration order; the
/// header is written from it so that a table with no rows still has one.
pub trait TableRow: Serialize {
    const COLUMNS: &'static [&'static str];
}

/// A single ride row as ingested from CSV.
///
/// Every field is optional. A value that fails to parse as its type is
/// ingested as `None` so that validation can count it instead of aborting.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RawRecord {
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub key: Option<String>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub fare_amount: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub pickup_datetime: Option<String>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub pickup_longitude: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub pickup_latitude: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub dropoff_longitude: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub dropoff_latitude: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub passenger_count: Option<i64>,
}

/// A ride that passed every cleaning predicate. Written as the cleaned table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CleanRecord {
    pub key: Option<String>,
    pub fare_amount: f64,
    pub pickup_datetime: DateTime<FixedOffset>,
    pub pickup_longitude: f64,
    pub pickup_latitude: f64,
    pub dropoff_longitude: f64,
    pub dropoff_latitude: f64,
    pub passenger_count: u8,
}

impl TableRow for CleanRecord {
    const COLUMNS: &'static [&'static str] = &[
        "key",
        "fare_amount",
        "pickup_datetime",
        "pickup_longitude",
        "pickup_latitude",
        "dropoff_longitude",
        "dropoff_latitude",
        "passenger_count",
    ];
}

/// A clean ride plus the fields derived from its own timestamp and coordinates.
///
/// Kept flat (no nested [`CleanRecord`]) because the `csv` writer cannot
/// serialize flattened structs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnhancedRecord {
    pub key: Option<String>,
    pub fare_amount: f64,
    pub pickup_datetime: DateTime<FixedOffset>,
    pub pickup_longitude: f64,
    pub pickup_latitude: f64,
    pub dropoff_longitude: f64,
    pub dropoff_latitude: f64,
    pub passenger_count: u8,

    pub hour: u32,
    pub day: u32,
    pub month: u32,
    pub year: i32,
    #[serde(with = "weekday_name")]
    pub weekday: Weekday,
    /// Monday = 0 ... Sunday = 6.
    pub weekday_num: u32,
    pub season: Season,
    pub is_peak: bool,
    pub time_category: TimeCategory,
    /// Euclidean distance in raw degrees.
    pub distance: f64,
    /// Great-circle distance in kilometres.
    pub distance_km: f64,
}

impl TableRow for EnhancedRecord {
    const COLUMNS: &'static [&'static str] = &[
        "key",
        "fare_amount",
        "pickup_datetime",
        "pickup_longitude",
        "pickup_latitude",
        "dropoff_longitude",
        "dropoff_latitude",
        "passenger_count",
        "hour",
        "day",
        "month",
        "year",
        "weekday",
        "weekday_num",
        "season",
        "is_peak",
        "time_category",
        "distance",
        "distance_km",
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Season {
    Winter,
    Spring,
    Summer,
    Autumn,
}

impl Season {
    /// Meteorological season for a calendar month (1 = January).
    pub fn from_month(month: u32) -> Self {
        match month {
            3..=5 => Season::Spring,
            6..=8 => Season::Summer,
            9..=11 => Season::Autumn,
            _ => Season::Winter,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Season::Winter => "winter",
            Season::Spring => "spring",
            Season::Summer => "summer",
            Season::Autumn => "autumn",
        }
    }
}

impl fmt::Display for Season {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse part of the day a ride started in.
///
/// | Hours  | Category  |
/// |--------|-----------|
/// | 05–11  | morning   |
/// | 12–16  | afternoon |
/// | 17–20  | evening   |
/// | 21–04  | night     |
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeCategory {
    Morning,
    Afternoon,
    Evening,
    Night,
}

impl TimeCategory {
    pub fn from_hour(hour: u32) -> Self {
        match hour {
            5..=11 => TimeCategory::Morning,
            12..=16 => TimeCategory::Afternoon,
            17..=20 => TimeCategory::Evening,
            _ => TimeCategory::Night,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TimeCategory::Morning => "morning",
            TimeCategory::Afternoon => "afternoon",
            TimeCategory::Evening => "evening",
            TimeCategory::Night => "night",
        }
    }
}

impl fmt::Display for TimeCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Full English day name, e.g. "Monday".
pub fn day_name(weekday: Weekday) -> &'static str {
    match weekday {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

/// A [`Weekday`] that orders Monday first, for keying grouped statistics.
///
/// Serializes as the full day name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DayOfWeek(pub Weekday);

impl DayOfWeek {
    pub fn name(&self) -> &'static str {
        day_name(self.0)
    }
}

impl Ord for DayOfWeek {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0
            .num_days_from_monday()
            .cmp(&other.0.num_days_from_monday())
    }
}

impl PartialOrd for DayOfWeek {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Serialize for DayOfWeek {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

impl fmt::Display for DayOfWeek {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Serializes [`Weekday`] as its full day name; accepts full or short names.
mod weekday_name {
    use chrono::Weekday;
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub fn serialize<S: Serializer>(weekday: &Weekday, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(super::day_name(*weekday))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Weekday, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse::<Weekday>()
            .map_err(|_| D::Error::custom(format!("invalid weekday '{s}'")))
    }
}
