use std::{io::Read, path::Path, sync::Arc, time::Duration};

use async_trait::async_trait;
use chrono::Utc;
use rental_tracker_lib::position::PositionSample;

use super::{LocationError, LocationProvider, PermissionStatus, PositionWatch, WatchOptions};

/// Plays back recorded positions as if they came from the device, one per interval.
/// Used by the CLI in place of a phone's location service.
#[derive(Debug, Clone)]
pub struct ReplayLocationProvider {
    samples: Arc<Vec<PositionSample>>,
    permission: PermissionStatus,
    pace: Option<Duration>,
}

impl ReplayLocationProvider {
    pub fn new(samples: Vec<PositionSample>) -> Self {
        Self {
            samples: Arc::new(samples),
            permission: PermissionStatus::Granted,
            pace: None,
        }
    }

    pub fn from_gpx_file(path: impl AsRef<Path>) -> Result<Self, LocationError> {
        let path = path.as_ref();
        let file = std::fs::File::open(path)
            .map_err(|e| LocationError::Unavailable(format!("failed to open {}: {e}", path.display())))?;
        Self::from_gpx_reader(std::io::BufReader::new(file))
    }

    /// Track points of every track and segment, in file order.
    pub fn from_gpx_reader(reader: impl Read) -> Result<Self, LocationError> {
        let gpx = gpx::read(reader).map_err(|e| LocationError::Provider(format!("failed to parse gpx: {e}")))?;

        let mut samples = Vec::new();
        for track in gpx.tracks {
            for segment in track.segments {
                for point in segment.points {
                    let position = point.point();
                    samples.push(PositionSample::new(position.y(), position.x(), point.speed, Utc::now()));
                }
            }
        }

        tracing::info!("Loaded {} recorded positions", samples.len());
        Ok(Self::new(samples))
    }

    pub fn with_permission(mut self, permission: PermissionStatus) -> Self {
        self.permission = permission;
        self
    }

    /// Overrides the interval requested by the watch options.
    pub fn with_pace(mut self, pace: Duration) -> Self {
        self.pace = Some(pace);
        self
    }

    pub fn samples(&self) -> &[PositionSample] {
        &self.samples
    }
}

#[async_trait]
impl LocationProvider for ReplayLocationProvider {
    async fn request_permission(&self) -> PermissionStatus {
        self.permission
    }

    fn watch_position(&self, options: &WatchOptions) -> Result<PositionWatch, LocationError> {
        if self.samples.is_empty() {
            return Err(LocationError::Unavailable("no recorded positions to replay".into()));
        }

        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|_| LocationError::Unavailable("no async runtime to deliver positions on".into()))?;

        let (mut feed, watch) = PositionWatch::channel();
        let samples = self.samples.clone();
        let pace = self.pace.unwrap_or(options.interval);

        runtime.spawn(async move {
            for recorded in samples.iter() {
                tokio::select! {
                    _ = feed.cancelled() => return,
                    _ = tokio::time::sleep(pace) => {}
                }

                let sample = PositionSample {
                    timestamp: Utc::now(),
                    ..*recorded
                };
                if !feed.send_sample(sample) {
                    return;
                }
            }
            tracing::info!("Replay finished for {}", feed.id());
        });

        tracing::debug!("Started {} at {:?} per sample", watch.id(), pace);
        Ok(watch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::location::WatchEvent;

    const TRACK: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<gpx version="1.1" creator="tests" xmlns="http://www.topografix.com/GPX/1/1">
  <trk>
    <name>Makati loop</name>
    <trkseg>
      <trkpt lat="14.5547" lon="121.0244"><time>2024-10-02T08:00:00Z</time></trkpt>
      <trkpt lat="14.5551" lon="121.0250"><time>2024-10-02T08:00:05Z</time></trkpt>
    </trkseg>
    <trkseg>
      <trkpt lat="14.5560" lon="121.0262"><time>2024-10-02T08:00:10Z</time></trkpt>
    </trkseg>
  </trk>
</gpx>"#;

    #[test]
    fn reads_track_points_in_order() {
        let provider = ReplayLocationProvider::from_gpx_reader(TRACK.as_bytes()).unwrap();
        let latitudes: Vec<f64> = provider.samples().iter().map(|s| s.latitude).collect();

        assert_eq!(latitudes, vec![14.5547, 14.5551, 14.5560]);
        assert_eq!(provider.samples()[2].longitude, 121.0262);
    }

    #[test]
    fn rejects_garbage() {
        assert!(ReplayLocationProvider::from_gpx_reader("not xml".as_bytes()).is_err());
    }

    #[tokio::test]
    async fn replays_every_sample_then_ends() {
        let provider = ReplayLocationProvider::from_gpx_reader(TRACK.as_bytes()).unwrap().with_pace(Duration::from_millis(1));
        let mut watch = provider.watch_position(&WatchOptions::default()).unwrap();

        let mut delivered = Vec::new();
        while let Some(event) = watch.next_event().await {
            match event {
                WatchEvent::Sample(sample) => delivered.push(sample.longitude),
                WatchEvent::Error(err) => panic!("unexpected error {err}"),
            }
        }

        assert_eq!(delivered, vec![121.0244, 121.0250, 121.0262]);
    }

    #[tokio::test]
    async fn empty_recording_cannot_be_watched() {
        let provider = ReplayLocationProvider::new(Vec::new());
        assert!(matches!(provider.watch_position(&WatchOptions::default()), Err(LocationError::Unavailable(_))));
    }

    #[tokio::test]
    async fn permission_is_configurable() {
        let provider = ReplayLocationProvider::new(Vec::new()).with_permission(PermissionStatus::Denied);
        assert_eq!(provider.request_permission().await, PermissionStatus::Denied);
    }
}
