use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{PipelineError, Result};

/// Thresholds applied by [`crate::pipeline::clean::clean`].
///
/// Stored as a JSON object on disk; any omitted key keeps its default:
/// ```json
/// {
///   "max_fare": 150.0,
///   "max_passengers": 4,
///   "operating_area": { "min_lat": 40.5, "max_lat": 41.0, "min_lon": -74.3, "max_lon": -73.6 }
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CleaningRules {
    /// Inclusive upper bound on `fare_amount`. The lower bound is always exclusive zero.
    pub max_fare: f64,
    pub min_passengers: u8,
    pub max_passengers: u8,
    pub operating_area: BoundingBox,
}

impl Default for CleaningRules {
    fn default() -> Self {
        Self {
            max_fare: 200.0,
            min_passengers: 1,
            max_passengers: 6,
            operating_area: BoundingBox::default(),
        }
    }
}

/// Inclusive latitude/longitude rectangle in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

impl Default for BoundingBox {
    /// Greater New York City, with margin for the airports and New Jersey.
    fn default() -> Self {
        Self {
            min_lat: 40.0,
            max_lat: 42.0,
            min_lon: -75.0,
            max_lon: -72.0,
        }
    }
}

impl BoundingBox {
    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        (self.min_lat..=self.max_lat).contains(&lat) && (self.min_lon..=self.max_lon).contains(&lon)
    }
}

impl CleaningRules {
    /// Loads rules from a JSON file at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| PipelineError::Input {
            path: path.to_path_buf(),
            source,
        })?;
        let rules: CleaningRules =
            serde_json::from_str(&content).map_err(|e| PipelineError::Config {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;
        rules.validate(path)?;
        Ok(rules)
    }

    /// Loads from `path` when given, otherwise returns the defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::load(p),
            None => Ok(Self::default()),
        }
    }

    fn validate(&self, path: &Path) -> Result<()> {
        let invalid = |message: &str| PipelineError::Config {
            path: path.to_path_buf(),
            message: message.to_string(),
        };

        if self.max_fare.is_nan() || self.max_fare <= 0.0 {
            return Err(invalid("max_fare must be positive"));
        }
        if self.min_passengers == 0 || self.min_passengers > self.max_passengers {
            return Err(invalid(
                "passenger bounds must satisfy 1 <= min_passengers <= max_passengers",
            ));
        }
        let area = &self.operating_area;
        if area.min_lat > area.max_lat || area.min_lon > area.max_lon {
            return Err(invalid("operating_area minimums must not exceed maximums"));
        }
        if area.min_lat < -90.0 || area.max_lat > 90.0 || area.min_lon < -180.0 || area.max_lon > 180.0
        {
            return Err(invalid("operating_area must lie within valid coordinate ranges"));
        }
        Ok(())
    }
}
