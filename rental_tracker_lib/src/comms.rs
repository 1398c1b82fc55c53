use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::{position::Position, report::IncidentReport, trip::Trip, user::{RenterSession, RENTER_ROLE}};

pub const ONGOING_STATUS: &str = "Ongoing";

/// Trip identifier assigned by the server when a trip starts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct ServerTripId(String);

impl ServerTripId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(id) if !id.trim().is_empty() => Some(Self(id.trim().to_string())),
            Value::Number(id) => Some(Self(id.to_string())),
            _ => None,
        }
    }

    /// Accepts a plain text body as an id only if it looks like one: ASCII letters,
    /// digits, `-` and `_`.
    pub fn from_token(text: &str) -> Option<Self> {
        let text = text.trim();
        let is_token = !text.is_empty() && text.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        is_token.then(|| Self(text.to_string()))
    }

    /// Extracts the id from a start trip response. The backend has answered with a bare
    /// id as well as with objects using several key spellings.
    pub fn from_response(value: &Value) -> Option<Self> {
        const KEYS: [&str; 5] = ["tripId", "trip_id", "carUpdateId", "carupdate_id", "id"];

        match value {
            Value::Object(map) => KEYS.iter().find_map(|key| map.get(*key).and_then(Self::from_value)),
            other => Self::from_value(other),
        }
    }
}

impl fmt::Display for ServerTripId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for ServerTripId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        ServerTripId::from_value(&value).ok_or_else(|| serde::de::Error::custom("expected a string or numeric trip id"))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
    pub role: &'a str,
}

impl<'a> LoginRequest<'a> {
    pub fn renter(email: &'a str, password: &'a str) -> Self {
        Self {
            email,
            password,
            role: RENTER_ROLE,
        }
    }
}

/// Error body of the login endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerMessage {
    #[serde(rename = "Message", alias = "message")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StartTripRequest {
    pub renter_id: i64,
    pub renter_fname: Option<String>,
    pub renter_lname: Option<String>,
    pub location_latitude: f64,
    pub location_longitude: f64,
    pub speed: f64,
    pub total_fuel_consumption: f64,
    pub total_distance_travelled: f64,
    pub last_update: DateTime<Utc>,
    pub vehicle_id: i64,
    pub carupdate_status: String,
    pub rented_vehicle_id: i64,
}

impl StartTripRequest {
    /// Coordinates start at zero, the first position goes out with the first update.
    pub fn new(renter: &RenterSession, trip: &Trip, timestamp: DateTime<Utc>) -> Self {
        Self {
            renter_id: renter.renter_id,
            renter_fname: renter.renter_fname.clone(),
            renter_lname: renter.renter_lname.clone(),
            location_latitude: 0.,
            location_longitude: 0.,
            speed: 0.,
            total_fuel_consumption: 0.,
            total_distance_travelled: 0.,
            last_update: timestamp,
            vehicle_id: trip.vehicle_id,
            carupdate_status: ONGOING_STATUS.to_string(),
            rented_vehicle_id: trip.rented_vehicle_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateTripRequest {
    pub location_latitude: f64,
    pub location_longitude: f64,
    pub speed: f64,
    pub last_update: DateTime<Utc>,
    pub carupdate_status: String,
}

impl UpdateTripRequest {
    pub fn new(position: &Position, timestamp: DateTime<Utc>) -> Self {
        Self {
            location_latitude: position.latitude,
            location_longitude: position.longitude,
            speed: position.speed,
            last_update: timestamp,
            carupdate_status: ONGOING_STATUS.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportPayload {
    pub renter_id: i64,
    pub nature_of_issue: String,
    pub date: String,
    pub time: String,
    pub note: String,
    /// The backend expects "true"/"false".
    pub emergency: String,
}

impl From<&IncidentReport> for ReportPayload {
    fn from(report: &IncidentReport) -> Self {
        Self {
            renter_id: report.renter_id,
            nature_of_issue: report.nature_of_issue.label().to_string(),
            date: report.date.format("%Y-%m-%d").to_string(),
            time: report.time.format("%H:%M:%S").to_string(),
            note: report.note.clone(),
            emergency: report.emergency.to_string(),
        }
    }
}
