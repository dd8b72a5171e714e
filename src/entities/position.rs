use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entities::Coordinates;
use crate::error::Error;

/// A raw reading as reported by the device location provider.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PositionSample {
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy: Option<f64>,
}

impl PositionSample {
    pub fn coordinates(&self) -> Result<Coordinates, Error> {
        Coordinates::new(self.latitude, self.longitude)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrackedPosition {
    pub coordinates: Coordinates,
    pub accuracy_meters: Option<f64>,
    pub captured_at: DateTime<Utc>,
}

impl TrackedPosition {
    pub fn new(coordinates: Coordinates, accuracy_meters: Option<f64>) -> Self {
        Self {
            coordinates,
            accuracy_meters,
            captured_at: Utc::now(),
        }
    }
}
