use const_format::concatcp;
use rental_tracker_lib::position::InvalidSample;

pub mod api;
pub mod config;
pub mod location;
pub mod session;
pub mod tracker;

pub use api::{http::HttpFleetApi, ApiError, FleetApi};
pub use config::ClientConfiguration;
pub use location::{LocationError, LocationProvider, PermissionStatus, PositionWatch, WatchOptions};
pub use session::SessionContext;
pub use tracker::{ExitDecision, TripTracker};

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:5028";

pub const API_ROOT: &str = "/api";
pub const LOGIN_PATH: &str = concatcp!(API_ROOT, "/Login/login");
pub const RENTAL_STATUS_PATH: &str = concatcp!(API_ROOT, "/Booking/rental-status/");
pub const RECENT_TRIPS_PATH: &str = concatcp!(API_ROOT, "/Home/recent-trips/");
pub const ADD_REPORT_PATH: &str = concatcp!(API_ROOT, "/Report/addReport");

pub const LOCATION_API: &str = concatcp!(API_ROOT, "/Location");
pub const START_TRIP_PATH: &str = concatcp!(LOCATION_API, "/start-trip");
pub const UPDATE_TRIP_PATH: &str = concatcp!(LOCATION_API, "/update-trip/");
pub const END_TRIP_PATH: &str = concatcp!(LOCATION_API, "/end-trip/");

/// Failures of the trip tracking state machine. None of them leave the tracker in a transient state.
#[derive(Debug, thiserror::Error)]
pub enum TrackerError {
    #[error("location permission denied")]
    PermissionDenied,
    #[error("failed to start trip: {0}")]
    StartFailed(ApiError),
    #[error("failed to end trip: {0}")]
    EndFailed(ApiError),
    #[error("failed to watch position: {0}")]
    WatchFailed(LocationError),
    /// Only ever logged.
    #[error("failed to update trip: {0}")]
    UpdateFailed(ApiError),
    /// Only ever logged, the sample is dropped.
    #[error(transparent)]
    InvalidSample(#[from] InvalidSample),
}

impl TrackerError {
    /// Title and body of the notification shown to the renter.
    pub fn user_message(&self) -> (&'static str, String) {
        match self {
            TrackerError::PermissionDenied => ("Permission Denied", "Location permission is required to start the trip.".to_string()),
            TrackerError::StartFailed(err) => ("Trip Not Started", format!("The trip could not be started. {}", err.user_message())),
            TrackerError::EndFailed(err) => ("Trip Ended Locally", format!("Tracking stopped, but the server was not notified. {}", err.user_message())),
            TrackerError::WatchFailed(_) => ("Location Unavailable", "The device location could not be read. The trip was not started.".to_string()),
            TrackerError::UpdateFailed(err) => ("Update Failed", err.user_message()),
            TrackerError::InvalidSample(_) => ("Invalid Location", "The device reported an invalid position.".to_string()),
        }
    }
}
