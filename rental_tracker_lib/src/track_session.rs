use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{comms::ServerTripId, position::Position};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum TrackingStatus {
    #[default]
    Idle,
    RequestingPermission,
    Tracking,
    Stopping,
}

impl TrackingStatus {
    /// Transient states only exist while the tracker awaits the platform or the server.
    pub fn is_transient(&self) -> bool {
        matches!(self, TrackingStatus::RequestingPermission | TrackingStatus::Stopping)
    }

    /// Label of the trip button for this state.
    pub fn action_label(&self) -> &'static str {
        match self {
            TrackingStatus::Tracking | TrackingStatus::Stopping => "End Trip",
            TrackingStatus::Idle | TrackingStatus::RequestingPermission => "Start Trip",
        }
    }
}

impl fmt::Display for TrackingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TrackingStatus::Idle => "idle",
            TrackingStatus::RequestingPermission => "requesting permission",
            TrackingStatus::Tracking => "tracking",
            TrackingStatus::Stopping => "stopping",
        };
        f.write_str(name)
    }
}

/// Read-only view of a tracking session, for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackingSnapshot {
    pub status: TrackingStatus,
    pub server_trip_id: Option<ServerTripId>,
    pub last_position: Option<Position>,
    pub watching: bool,
}

impl TrackingSnapshot {
    pub fn location_line(&self) -> String {
        match &self.last_position {
            Some(position) => format!("Current Location: Latitude: {}, Longitude: {}", position.latitude, position.longitude),
            None => "Fetching location...".to_string(),
        }
    }
}
