use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One reading from the device location provider.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionSample {
    pub latitude: f64,
    pub longitude: f64,
    /// Meters per second. Platforms report a negative value or nothing when unknown.
    pub speed: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

/// The last accepted position of a tracked trip.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub latitude: f64,
    pub longitude: f64,
    pub speed: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
#[error("invalid position sample ({latitude}, {longitude})")]
pub struct InvalidSample {
    pub latitude: f64,
    pub longitude: f64,
}

impl PositionSample {
    pub fn new(latitude: f64, longitude: f64, speed: Option<f64>, timestamp: DateTime<Utc>) -> Self {
        Self {
            latitude,
            longitude,
            speed,
            timestamp,
        }
    }

    pub fn now(latitude: f64, longitude: f64, speed: Option<f64>) -> Self {
        Self::new(latitude, longitude, speed, Utc::now())
    }

    /// Speed with the "unknown" encodings mapped to 0.
    pub fn speed_or_zero(&self) -> f64 {
        match self.speed {
            Some(speed) if speed.is_finite() && speed >= 0.0 => speed,
            _ => 0.0,
        }
    }

    pub fn validate(&self) -> Result<Position, InvalidSample> {
        let valid_latitude = self.latitude.is_finite() && (-90.0..=90.0).contains(&self.latitude);
        let valid_longitude = self.longitude.is_finite() && (-180.0..=180.0).contains(&self.longitude);

        if !valid_latitude || !valid_longitude {
            return Err(InvalidSample {
                latitude: self.latitude,
                longitude: self.longitude,
            });
        }

        Ok(Position {
            latitude: self.latitude,
            longitude: self.longitude,
            speed: self.speed_or_zero(),
        })
    }
}
