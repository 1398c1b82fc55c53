use rental_tracker_lib::{
    comms::ServerTripId,
    position::Position,
    track_session::{TrackingSnapshot, TrackingStatus},
};

use crate::location::PositionWatch;

/// State of one tracked trip. Only `TripTracker` mutates it.
#[derive(Debug, Default)]
pub(crate) struct TrackingSession {
    pub(crate) status: TrackingStatus,
    pub(crate) server_trip_id: Option<ServerTripId>,
    pub(crate) last_position: Option<Position>,
    pub(crate) watch: Option<PositionWatch>,
}

impl TrackingSession {
    /// A watch exists exactly while tracking, and an idle session carries nothing over.
    pub(crate) fn is_consistent(&self) -> bool {
        let watch_matches = self.watch.is_some() == (self.status == TrackingStatus::Tracking);
        let idle_is_clear = self.status != TrackingStatus::Idle || (self.server_trip_id.is_none() && self.last_position.is_none());
        watch_matches && idle_is_clear
    }

    /// Installs a new watch, cancelling any previous one first.
    pub(crate) fn replace_watch(&mut self, watch: PositionWatch) {
        if let Some(mut previous) = self.watch.take() {
            tracing::warn!("Replacing active {} with {}", previous.id(), watch.id());
            previous.cancel();
        }
        self.watch = Some(watch);
    }

    pub(crate) fn cancel_watch(&mut self) {
        if let Some(mut watch) = self.watch.take() {
            watch.cancel();
        }
    }

    pub(crate) fn reset(&mut self) {
        self.cancel_watch();
        self.server_trip_id = None;
        self.last_position = None;
        self.status = TrackingStatus::Idle;
    }

    pub(crate) fn snapshot(&self) -> TrackingSnapshot {
        TrackingSnapshot {
            status: self.status,
            server_trip_id: self.server_trip_id.clone(),
            last_position: self.last_position,
            watching: self.watch.is_some(),
        }
    }
}
