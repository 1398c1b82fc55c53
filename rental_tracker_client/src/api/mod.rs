use async_trait::async_trait;
use rental_tracker_lib::{
    comms::{ServerTripId, StartTripRequest, UpdateTripRequest},
    report::IncidentReport,
    trip::{BookingStatus, Trip},
    user::RenterSession,
};

pub mod http;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    #[error("network error: {0}")]
    Network(String),
    #[error("server returned {status}: {message}")]
    Status { status: u16, message: String },
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("account is not a renter account")]
    AccessDenied,
    #[error("unexpected response: {0}")]
    Decode(String),
}

impl ApiError {
    pub fn user_message(&self) -> String {
        match self {
            ApiError::Network(_) => "Error: No response from server. Check your network or server configuration.".to_string(),
            ApiError::Status { message, .. } => format!("Error: {message}"),
            ApiError::Unauthorized(message) => message.clone(),
            ApiError::AccessDenied => "You do not have access to this application.".to_string(),
            ApiError::Decode(_) => "Error: The server sent an unexpected response.".to_string(),
        }
    }
}

/// The fleet management backend, as seen by the app.
#[async_trait]
pub trait FleetApi: Send + Sync {
    async fn login(&self, email: &str, password: &str) -> Result<RenterSession, ApiError>;

    async fn rentals_by_status(&self, renter_id: i64, status: BookingStatus) -> Result<Vec<Trip>, ApiError>;

    async fn recent_trips(&self, renter_id: i64) -> Result<Vec<Trip>, ApiError>;

    async fn submit_report(&self, report: &IncidentReport) -> Result<(), ApiError>;

    async fn start_trip(&self, request: &StartTripRequest) -> Result<ServerTripId, ApiError>;

    async fn update_trip(&self, trip_id: &ServerTripId, request: &UpdateTripRequest) -> Result<(), ApiError>;

    async fn end_trip(&self, trip_id: &ServerTripId) -> Result<(), ApiError>;
}
