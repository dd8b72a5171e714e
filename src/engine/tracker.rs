use async_channel::Receiver;
use tokio::task::JoinHandle;

use crate::{
    api::{DynLocationProvider, PositionReading},
    config::WatchOptions,
    entities::{Coordinates, TrackedPosition},
    error::{position_timeout_error, Error},
};

#[derive(Clone, Debug, PartialEq)]
pub enum TrackerEvent {
    Position(TrackedPosition),
    /// A failed read. Tracking carries on.
    Notice(Error),
    /// The provider ended the watch. No further events follow.
    Closed,
}

/// Owns at most one live position watch.
pub struct LocationTracker {
    provider: DynLocationProvider,
    options: WatchOptions,
    watch: Option<JoinHandle<()>>,
}

impl LocationTracker {
    pub fn new(provider: DynLocationProvider, options: WatchOptions) -> Self {
        Self {
            provider,
            options,
            watch: None,
        }
    }

    pub fn options(&self) -> &WatchOptions {
        &self.options
    }

    /// False once stopped or once the provider has ended the watch.
    pub fn is_started(&self) -> bool {
        self.watch
            .as_ref()
            .map_or(false, |handle| !handle.is_finished())
    }

    /// Starts watching, replacing any previous watch. Must be called within a tokio runtime.
    #[tracing::instrument(skip_all)]
    pub fn start<F>(&mut self, on_update: F)
    where
        F: Fn(TrackerEvent) + Send + Sync + 'static,
    {
        self.stop();

        let readings = self.provider.watch(&self.options);
        let options = self.options.clone();

        tracing::info!("starting location watch");
        self.watch = Some(tokio::spawn(watch(readings, options, on_update)));
    }

    pub fn stop(&mut self) {
        if let Some(handle) = self.watch.take() {
            tracing::info!("stopping location watch");
            handle.abort();
        }
    }
}

impl Drop for LocationTracker {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn watch<F>(readings: Receiver<PositionReading>, options: WatchOptions, on_update: F)
where
    F: Fn(TrackerEvent),
{
    let mut last_emitted: Option<Coordinates> = None;

    loop {
        let reading = match tokio::time::timeout(options.read_timeout, readings.recv()).await {
            Ok(Ok(reading)) => reading,
            Ok(Err(_)) => {
                tracing::info!("location provider closed the watch");
                on_update(TrackerEvent::Closed);
                return;
            }
            Err(_) => Err(position_timeout_error()),
        };

        let position = reading.and_then(|sample| {
            let coordinates = sample.coordinates()?;
            Ok(TrackedPosition::new(coordinates, sample.accuracy))
        });

        match position {
            Ok(position) => {
                if let Some(last) = last_emitted {
                    let moved_m = last.distance_km(&position.coordinates) * 1000.0;
                    if moved_m < options.distance_filter_m {
                        tracing::trace!("ignoring movement of {:.1} m", moved_m);
                        continue;
                    }
                }

                tracing::debug!("position update {:?}", position.coordinates);
                last_emitted = Some(position.coordinates);
                on_update(TrackerEvent::Position(position));
            }
            Err(err) => {
                tracing::warn!("position read failed: {}", err);
                on_update(TrackerEvent::Notice(err));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use async_channel::Sender;

    use super::*;
    use crate::api::LocationProvider;
    use crate::entities::PositionSample;
    use crate::error::position_unavailable_error;
    use crate::simulation::ReplayProvider;

    #[derive(Default)]
    struct FakeProvider {
        watchers: Mutex<Vec<Sender<PositionReading>>>,
    }

    impl FakeProvider {
        async fn emit(&self, reading: PositionReading) {
            let watchers = self.watchers.lock().unwrap().clone();
            for watcher in watchers {
                let _ = watcher.send(reading.clone()).await;
            }
        }

        fn open_watches(&self) -> usize {
            self.watchers
                .lock()
                .unwrap()
                .iter()
                .filter(|watcher| !watcher.is_closed())
                .count()
        }
    }

    impl LocationProvider for FakeProvider {
        fn watch(&self, _options: &WatchOptions) -> Receiver<PositionReading> {
            let (tx, rx) = async_channel::unbounded();
            self.watchers.lock().unwrap().push(tx);
            rx
        }
    }

    fn sample(latitude: f64, longitude: f64) -> PositionReading {
        Ok(PositionSample {
            latitude,
            longitude,
            accuracy: Some(5.0),
        })
    }

    fn counting_tracker(provider: Arc<FakeProvider>) -> (LocationTracker, Arc<AtomicUsize>) {
        let tracker = LocationTracker::new(provider, WatchOptions::default());
        (tracker, Arc::new(AtomicUsize::new(0)))
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    #[tokio::test]
    async fn restart_keeps_single_subscription() {
        let provider = Arc::new(FakeProvider::default());
        let (mut tracker, calls) = counting_tracker(provider.clone());

        for _ in 0..2 {
            let calls = calls.clone();
            tracker.start(move |_| {
                calls.fetch_add(1, Ordering::SeqCst);
            });
        }
        settle().await;

        provider.emit(sample(21.0285, 105.8048)).await;
        settle().await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(provider.open_watches(), 1);
        assert!(tracker.is_started());
    }

    #[tokio::test]
    async fn stop_is_idempotent() {
        let provider = Arc::new(FakeProvider::default());
        let (mut tracker, calls) = counting_tracker(provider.clone());

        tracker.stop();
        assert!(!tracker.is_started());

        let counter = calls.clone();
        tracker.start(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        tracker.stop();
        tracker.stop();
        settle().await;

        provider.emit(sample(21.0285, 105.8048)).await;
        settle().await;

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(provider.open_watches(), 0);
    }

    #[tokio::test]
    async fn small_movements_are_filtered() {
        let provider = Arc::new(FakeProvider::default());
        let (mut tracker, _) = counting_tracker(provider.clone());
        let positions = Arc::new(Mutex::new(vec![]));

        let seen = positions.clone();
        tracker.start(move |event| {
            if let TrackerEvent::Position(position) = event {
                seen.lock().unwrap().push(position.coordinates);
            }
        });

        // roughly 1 m, then roughly 110 m north
        provider.emit(sample(21.0285, 105.8048)).await;
        provider.emit(sample(21.02851, 105.8048)).await;
        provider.emit(sample(21.0295, 105.8048)).await;
        settle().await;

        let positions = positions.lock().unwrap();
        assert_eq!(positions.len(), 2);
        assert_eq!(positions[1].latitude, 21.0295);
    }

    #[tokio::test]
    async fn read_errors_keep_tracking() {
        let provider = Arc::new(FakeProvider::default());
        let (mut tracker, _) = counting_tracker(provider.clone());
        let events = Arc::new(Mutex::new(vec![]));

        let seen = events.clone();
        tracker.start(move |event| seen.lock().unwrap().push(event));

        provider.emit(Err(position_unavailable_error())).await;
        provider.emit(sample(200.0, 0.0)).await;
        provider.emit(sample(21.0285, 105.8048)).await;
        settle().await;

        let events = events.lock().unwrap();
        assert_eq!(events.len(), 3);
        assert_eq!(events[0], TrackerEvent::Notice(position_unavailable_error()));
        assert!(matches!(events[1], TrackerEvent::Notice(_)));
        assert!(matches!(events[2], TrackerEvent::Position(_)));
        assert!(tracker.is_started());
    }

    #[tokio::test(start_paused = true)]
    async fn silent_provider_reports_timeouts() {
        let provider = Arc::new(FakeProvider::default());
        let (mut tracker, _) = counting_tracker(provider.clone());
        let events = Arc::new(Mutex::new(vec![]));

        let seen = events.clone();
        tracker.start(move |event| seen.lock().unwrap().push(event));

        tokio::time::sleep(Duration::from_secs(25)).await;

        let events = events.lock().unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0], TrackerEvent::Notice(position_timeout_error()));
    }

    #[tokio::test(start_paused = true)]
    async fn provider_end_is_reported() {
        let provider = ReplayProvider::new(vec![sample(21.0285, 105.8048)]);
        let mut tracker = LocationTracker::new(Arc::new(provider), WatchOptions::default());
        let events = Arc::new(Mutex::new(vec![]));

        let seen = events.clone();
        tracker.start(move |event| seen.lock().unwrap().push(event));

        tokio::time::sleep(Duration::from_secs(120)).await;

        let events = events.lock().unwrap();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], TrackerEvent::Position(_)));
        assert_eq!(events[1], TrackerEvent::Closed);
        assert!(!tracker.is_started());
    }

    #[tokio::test]
    async fn dropping_tracker_closes_watch() {
        let provider = Arc::new(FakeProvider::default());
        let (mut tracker, _) = counting_tracker(provider.clone());

        tracker.start(|_| {});
        settle().await;
        assert_eq!(provider.open_watches(), 1);

        drop(tracker);
        settle().await;
        assert_eq!(provider.open_watches(), 0);
    }
}
