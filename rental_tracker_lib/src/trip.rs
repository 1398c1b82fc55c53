use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

/// A rental as listed by the booking endpoints. This is what a tracked trip belongs to.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Trip {
    #[serde(rename = "rentedVehicleId")]
    pub rented_vehicle_id: i64,
    #[serde(rename = "vehicleId")]
    pub vehicle_id: i64,
    #[serde(rename = "car_model", default)]
    pub car_model: String,
    #[serde(rename = "pickupDate", default)]
    pub pickup_date: String,
    #[serde(rename = "pickupTime", default)]
    pub pickup_time: String,
}

impl Trip {
    pub fn new(rented_vehicle_id: i64, vehicle_id: i64, car_model: String, pickup_date: String, pickup_time: String) -> Self {
        Self {
            rented_vehicle_id,
            vehicle_id,
            car_model,
            pickup_date,
            pickup_time,
        }
    }

    /// Pickup date as MM/DD/YYYY. The backend sends either a plain date or an ISO timestamp.
    pub fn pickup_date_display(&self) -> Option<String> {
        parse_pickup_date(&self.pickup_date).map(|date| date.format("%m/%d/%Y").to_string())
    }

    /// Pickup time in 12 hour form, e.g. "14:05:00" -> "2:05 PM".
    pub fn pickup_time_display(&self) -> Option<String> {
        NaiveTime::parse_from_str(self.pickup_time.trim(), "%H:%M:%S")
            .ok()
            .map(|time| time.format("%-I:%M %p").to_string())
    }
}

fn parse_pickup_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(date);
    }
    if let Ok(timestamp) = DateTime::parse_from_rfc3339(raw) {
        return Some(timestamp.date_naive());
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|timestamp| timestamp.date())
}

/// Booking filter used by the rental status endpoint.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
pub enum BookingStatus {
    #[default]
    Upcoming,
    Completed,
    Canceled,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Upcoming => "Upcoming",
            BookingStatus::Completed => "Completed",
            BookingStatus::Canceled => "Canceled",
        }
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rental(date: &str, time: &str) -> Trip {
        Trip::new(7, 3, "Toyota Vios".into(), date.into(), time.into())
    }

    #[test]
    fn deserializes_backend_rental() {
        let json = r#"{"rentedVehicleId":12,"vehicleId":4,"car_model":"Honda City","pickupDate":"2024-10-02T00:00:00","pickupTime":"09:30:00"}"#;
        let trip: Trip = serde_json::from_str(json).unwrap();

        assert_eq!(trip.rented_vehicle_id, 12);
        assert_eq!(trip.vehicle_id, 4);
        assert_eq!(trip.car_model, "Honda City");
        assert_eq!(trip.pickup_date_display().as_deref(), Some("10/02/2024"));
        assert_eq!(trip.pickup_time_display().as_deref(), Some("9:30 AM"));
    }

    #[test]
    fn twelve_hour_time() {
        assert_eq!(rental("", "14:05:00").pickup_time_display().as_deref(), Some("2:05 PM"));
        assert_eq!(rental("", "00:15:00").pickup_time_display().as_deref(), Some("12:15 AM"));
        assert_eq!(rental("", "12:00:00").pickup_time_display().as_deref(), Some("12:00 PM"));
        assert_eq!(rental("", "14:05").pickup_time_display(), None);
        assert_eq!(rental("", "").pickup_time_display(), None);
    }

    #[test]
    fn pickup_dates() {
        assert_eq!(rental("2024-01-31", "").pickup_date_display().as_deref(), Some("01/31/2024"));
        assert_eq!(rental("2024-01-31T08:00:00Z", "").pickup_date_display().as_deref(), Some("01/31/2024"));
        assert_eq!(rental("yesterday", "").pickup_date_display(), None);
    }
}
