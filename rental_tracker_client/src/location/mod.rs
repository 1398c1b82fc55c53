use std::{
    fmt,
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};

use async_trait::async_trait;
use rental_tracker_lib::position::PositionSample;
use tokio::sync::{mpsc, oneshot};

pub mod replay;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionStatus {
    Granted,
    Denied,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LocationError {
    #[error("location services are unavailable: {0}")]
    Unavailable(String),
    #[error("position request timed out")]
    Timeout,
    #[error("location provider error: {0}")]
    Provider(String),
}

/// Options passed to the platform when a watch is registered.
#[derive(Debug, Clone, PartialEq)]
pub struct WatchOptions {
    pub high_accuracy: bool,
    /// Minimum movement in meters before a new sample is delivered.
    pub distance_filter_m: f64,
    pub interval: Duration,
    pub fastest_interval: Duration,
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self {
            high_accuracy: true,
            distance_filter_m: 0.,
            interval: Duration::from_millis(1000),
            fastest_interval: Duration::from_millis(1000),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum WatchEvent {
    Sample(PositionSample),
    Error(LocationError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WatchId(u64);

impl WatchId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for WatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "watch#{}", self.0)
    }
}

/// The device location platform.
#[async_trait]
pub trait LocationProvider: Send + Sync {
    async fn request_permission(&self) -> PermissionStatus;

    /// Registers a position watch. Events arrive one at a time, in order, until the
    /// returned subscription is cancelled or dropped.
    fn watch_position(&self, options: &WatchOptions) -> Result<PositionWatch, LocationError>;
}

/// Subscription to a running position watch. Cancelling is immediate: once `cancel`
/// returns no further events are yielded, including ones already buffered.
#[derive(Debug)]
pub struct PositionWatch {
    id: WatchId,
    events: mpsc::UnboundedReceiver<WatchEvent>,
    cancel: Option<oneshot::Sender<()>>,
}

/// Producer half of a watch, held by the provider.
#[derive(Debug)]
pub struct WatchFeed {
    id: WatchId,
    events: mpsc::UnboundedSender<WatchEvent>,
    cancelled: Option<oneshot::Receiver<()>>,
}

impl PositionWatch {
    pub fn channel() -> (WatchFeed, PositionWatch) {
        let id = WatchId::next();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (cancel_tx, cancel_rx) = oneshot::channel();

        let feed = WatchFeed {
            id,
            events: event_tx,
            cancelled: Some(cancel_rx),
        };
        let watch = PositionWatch {
            id,
            events: event_rx,
            cancel: Some(cancel_tx),
        };
        (feed, watch)
    }

    pub fn id(&self) -> WatchId {
        self.id
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_none()
    }

    /// Next event, or `None` once cancelled or once the provider has stopped.
    pub async fn next_event(&mut self) -> Option<WatchEvent> {
        if self.is_cancelled() {
            return None;
        }
        self.events.recv().await
    }

    pub fn cancel(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            // The provider may already be gone.
            let _ = cancel.send(());
            self.events.close();
            tracing::debug!("Cancelled {}", self.id);
        }
    }
}

impl Drop for PositionWatch {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl WatchFeed {
    pub fn id(&self) -> WatchId {
        self.id
    }

    /// Returns false once the subscriber has cancelled.
    pub fn send(&self, event: WatchEvent) -> bool {
        self.events.send(event).is_ok()
    }

    pub fn send_sample(&self, sample: PositionSample) -> bool {
        self.send(WatchEvent::Sample(sample))
    }

    pub fn is_closed(&self) -> bool {
        self.events.is_closed()
    }

    /// Resolves when the subscriber cancels or drops the watch.
    pub async fn cancelled(&mut self) {
        if let Some(cancelled) = self.cancelled.as_mut() {
            // An Err means the sender was dropped, which is a cancellation too.
            let _ = cancelled.await;
            self.cancelled = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn events_arrive_in_order() {
        let (feed, mut watch) = PositionWatch::channel();
        assert_eq!(feed.id(), watch.id());

        for i in 0..3 {
            assert!(feed.send_sample(PositionSample::now(10.0 + i as f64, 20.0, None)));
        }

        for i in 0..3 {
            match watch.next_event().await {
                Some(WatchEvent::Sample(sample)) => assert_eq!(sample.latitude, 10.0 + i as f64),
                other => panic!("unexpected event {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn cancel_drops_buffered_events_and_closes_feed() {
        let (mut feed, mut watch) = PositionWatch::channel();
        assert!(feed.send_sample(PositionSample::now(1.0, 2.0, None)));

        watch.cancel();

        assert!(watch.is_cancelled());
        assert!(watch.next_event().await.is_none());
        assert!(feed.is_closed());
        assert!(!feed.send_sample(PositionSample::now(1.0, 2.0, None)));
        feed.cancelled().await;
    }

    #[tokio::test]
    async fn dropping_the_watch_cancels_it() {
        let (mut feed, watch) = PositionWatch::channel();
        drop(watch);

        feed.cancelled().await;
        assert!(feed.is_closed());
    }

    #[tokio::test]
    async fn watch_ends_when_provider_stops() {
        let (feed, mut watch) = PositionWatch::channel();
        drop(feed);

        assert!(watch.next_event().await.is_none());
        assert!(!watch.is_cancelled());
    }
}
