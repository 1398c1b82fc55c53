use std::sync::Arc;

use chrono::Utc;
use rental_tracker_lib::{
    comms::{ServerTripId, StartTripRequest, UpdateTripRequest},
    position::{Position, PositionSample},
    track_session::{TrackingSnapshot, TrackingStatus},
    trip::Trip,
    user::RenterSession,
};
use tokio::task::JoinSet;

use crate::{
    api::FleetApi,
    location::{LocationError, LocationProvider, PermissionStatus, WatchEvent, WatchOptions},
    TrackerError,
};

mod tracking_session;

use tracking_session::TrackingSession;

/// What the tracking screen should do when the renter navigates back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitDecision {
    Proceed,
    /// Leaving ends the trip, the renter has to confirm first.
    ConfirmationRequired,
}

/// Tracks one rental trip: location permission, the position watch, and the
/// start/update/end calls against the backend.
///
/// States go `Idle -> RequestingPermission -> Tracking -> Stopping -> Idle`. Every
/// operation takes `&mut self`, so there is a single mutator and at most one watch.
/// Position updates are fire and forget; a lost update is logged and dropped.
pub struct TripTracker {
    api: Arc<dyn FleetApi>,
    location: Arc<dyn LocationProvider>,
    renter: Arc<RenterSession>,
    trip: Trip,
    options: WatchOptions,
    session: TrackingSession,
    updates: JoinSet<()>,
}

impl TripTracker {
    pub fn new(api: Arc<dyn FleetApi>, location: Arc<dyn LocationProvider>, renter: Arc<RenterSession>, trip: Trip) -> Self {
        Self {
            api,
            location,
            renter,
            trip,
            options: WatchOptions::default(),
            session: TrackingSession::default(),
            updates: JoinSet::new(),
        }
    }

    pub fn with_watch_options(mut self, options: WatchOptions) -> Self {
        self.options = options;
        self
    }

    pub fn trip(&self) -> &Trip {
        &self.trip
    }

    pub fn renter(&self) -> &RenterSession {
        &self.renter
    }

    pub fn status(&self) -> TrackingStatus {
        self.session.status
    }

    pub fn server_trip_id(&self) -> Option<&ServerTripId> {
        self.session.server_trip_id.as_ref()
    }

    pub fn last_position(&self) -> Option<&Position> {
        self.session.last_position.as_ref()
    }

    pub fn is_watching(&self) -> bool {
        self.session.watch.is_some()
    }

    pub fn snapshot(&self) -> TrackingSnapshot {
        self.session.snapshot()
    }

    /// Update calls that have been issued but not yet collected.
    pub fn pending_updates(&self) -> usize {
        self.updates.len()
    }

    /// Starts the trip when idle, ends it when tracking.
    pub async fn toggle(&mut self) -> Result<TrackingStatus, TrackerError> {
        self.abandon_interrupted_start();

        match self.session.status {
            TrackingStatus::Tracking | TrackingStatus::Stopping => self.stop().await,
            TrackingStatus::Idle | TrackingStatus::RequestingPermission => self.start().await,
        }
    }

    pub fn request_exit(&self) -> ExitDecision {
        match self.session.status {
            TrackingStatus::Idle => ExitDecision::Proceed,
            _ => ExitDecision::ConfirmationRequired,
        }
    }

    /// The renter confirmed leaving. An ongoing trip is always ended, so the server is
    /// never left with an orphaned trip. Local state is idle afterwards even on error.
    pub async fn confirm_exit(&mut self) -> Result<(), TrackerError> {
        self.abandon_interrupted_start();

        if matches!(self.session.status, TrackingStatus::Tracking | TrackingStatus::Stopping) {
            self.stop().await?;
        }
        Ok(())
    }

    /// Handles one sample from the position watch. Ignored unless tracking.
    pub fn on_position_sample(&mut self, sample: PositionSample) {
        if self.session.status != TrackingStatus::Tracking {
            tracing::debug!("Ignoring position sample while {}", self.session.status);
            return;
        }

        let position = match sample.validate() {
            Ok(position) => position,
            Err(err) => {
                tracing::debug!("Dropped sample: {}", TrackerError::from(err));
                return;
            }
        };

        tracing::debug!("Position {}, {} at {} m/s", position.latitude, position.longitude, position.speed);
        self.session.last_position = Some(position);
        self.reap_updates();

        let Some(trip_id) = self.session.server_trip_id.clone() else {
            tracing::debug!("No server trip yet, keeping position local");
            return;
        };

        let api = self.api.clone();
        let request = UpdateTripRequest::new(&position, Utc::now());
        self.updates.spawn(async move {
            if let Err(err) = api.update_trip(&trip_id, &request).await {
                tracing::warn!("Trip {}: {}", trip_id, TrackerError::UpdateFailed(err));
            }
        });
    }

    /// Location errors do not stop the trip; it continues without fresh positions.
    pub fn on_location_error(&mut self, error: LocationError) {
        tracing::warn!("Location error while {}: {}", self.session.status, error);
    }

    /// Waits for the next watch event and dispatches it. Returns false when there is
    /// no watch or the provider stopped delivering.
    pub async fn poll_watch(&mut self) -> bool {
        let Some(watch) = self.session.watch.as_mut() else {
            return false;
        };

        match watch.next_event().await {
            Some(WatchEvent::Sample(sample)) => {
                self.on_position_sample(sample);
                true
            }
            Some(WatchEvent::Error(error)) => {
                self.on_location_error(error);
                true
            }
            None => {
                tracing::warn!("Position watch ended while {}", self.session.status);
                false
            }
        }
    }

    /// Waits for every issued update call to finish.
    pub async fn settle_updates(&mut self) {
        while let Some(result) = self.updates.join_next().await {
            if let Err(err) = result {
                tracing::error!("Update task failed: {err}");
            }
        }
    }

    async fn start(&mut self) -> Result<TrackingStatus, TrackerError> {
        self.session.status = TrackingStatus::RequestingPermission;
        tracing::info!("Starting trip for rental {}", self.trip.rented_vehicle_id);

        if self.location.request_permission().await == PermissionStatus::Denied {
            tracing::warn!("Location permission denied");
            self.session.reset();
            return Err(TrackerError::PermissionDenied);
        }

        let request = StartTripRequest::new(&self.renter, &self.trip, Utc::now());
        let trip_id = match self.api.start_trip(&request).await {
            Ok(trip_id) => trip_id,
            Err(err) => {
                tracing::error!("Failed to start trip for rental {}: {}", self.trip.rented_vehicle_id, err);
                self.session.reset();
                return Err(TrackerError::StartFailed(err));
            }
        };

        let watch = match self.location.watch_position(&self.options) {
            Ok(watch) => watch,
            Err(err) => {
                tracing::error!("Failed to watch position, ending trip {}: {}", trip_id, err);
                if let Err(end_err) = self.api.end_trip(&trip_id).await {
                    tracing::error!("Failed to end trip {} after watch failure: {}", trip_id, end_err);
                }
                self.session.reset();
                return Err(TrackerError::WatchFailed(err));
            }
        };

        tracing::info!("Trip {} started, tracking with {}", trip_id, watch.id());
        self.session.server_trip_id = Some(trip_id);
        self.session.replace_watch(watch);
        self.session.status = TrackingStatus::Tracking;
        self.check_invariants();

        Ok(TrackingStatus::Tracking)
    }

    async fn stop(&mut self) -> Result<TrackingStatus, TrackerError> {
        self.session.status = TrackingStatus::Stopping;
        // No sample may be handled once stopping has begun.
        self.session.cancel_watch();

        let result = match self.session.server_trip_id.clone() {
            Some(trip_id) => {
                let ended = self.api.end_trip(&trip_id).await;
                ended.map(|_| trip_id)
            }
            None => {
                tracing::warn!("Stopping a trip the server never acknowledged");
                self.session.reset();
                return Ok(TrackingStatus::Idle);
            }
        };

        self.session.reset();
        self.check_invariants();

        match result {
            Ok(trip_id) => {
                tracing::info!("Trip {} stopped", trip_id);
                Ok(TrackingStatus::Idle)
            }
            Err(err) => {
                tracing::error!("Failed to end trip, local state reset anyway: {}", err);
                Err(TrackerError::EndFailed(err))
            }
        }
    }

    /// A transient status can only remain if a previous `toggle` was dropped mid-await.
    /// A half-stopped trip is left as is, `stop` finishes it by ending the trip again.
    fn abandon_interrupted_start(&mut self) {
        if !self.session.status.is_transient() {
            return;
        }

        tracing::warn!("Previous transition of rental {} was interrupted while {}", self.trip.rented_vehicle_id, self.session.status);
        if self.session.status == TrackingStatus::RequestingPermission {
            self.session.reset();
        }
    }

    fn reap_updates(&mut self) {
        while let Some(result) = self.updates.try_join_next() {
            if let Err(err) = result {
                tracing::error!("Update task failed: {err}");
            }
        }
    }

    fn check_invariants(&self) {
        debug_assert!(self.session.is_consistent(), "inconsistent tracking session: {:?}", self.session);
    }
}

impl Drop for TripTracker {
    fn drop(&mut self) {
        if let Some(trip_id) = &self.session.server_trip_id {
            tracing::warn!("Tracker for trip {} dropped while {}", trip_id, self.session.status);
        }
    }
}
