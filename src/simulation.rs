use std::time::Duration;

use async_channel::Receiver;

use crate::{
    api::{LocationProvider, PositionReading},
    config::WatchOptions,
    entities::{DecodedRoute, PositionSample},
};

/// Location provider that plays back a fixed list of readings, one per interval.
///
/// Each watch gets its own playback. The watch closes after the last reading.
#[derive(Clone, Debug)]
pub struct ReplayProvider {
    readings: Vec<PositionReading>,
    interval: Option<Duration>,
}

impl ReplayProvider {
    pub fn new(readings: Vec<PositionReading>) -> Self {
        Self {
            readings,
            interval: None,
        }
    }

    /// Drives along every point of a route.
    pub fn along_route(route: &DecodedRoute, accuracy: Option<f64>) -> Self {
        let readings = route
            .coordinates
            .iter()
            .map(|c| {
                Ok(PositionSample {
                    latitude: c.latitude,
                    longitude: c.longitude,
                    accuracy,
                })
            })
            .collect();

        Self::new(readings)
    }

    /// Overrides the watch interval requested by the tracker.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = Some(interval);
        self
    }
}

impl LocationProvider for ReplayProvider {
    fn watch(&self, options: &WatchOptions) -> Receiver<PositionReading> {
        let (tx, rx) = async_channel::bounded(1);
        let readings = self.readings.clone();
        let interval = self.interval.unwrap_or(options.interval);

        tokio::spawn(async move {
            for reading in readings {
                if tx.send(reading).await.is_err() {
                    tracing::debug!("replay watch closed by subscriber");
                    return;
                }

                tokio::time::sleep(interval).await;
            }

            tracing::debug!("replay finished");
        });

        rx
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::Coordinates;
    use crate::error::position_unavailable_error;

    #[tokio::test(start_paused = true)]
    async fn replays_route_then_closes() {
        let route = DecodedRoute::new(
            vec![
                Coordinates::new(21.0285, 105.8048).unwrap(),
                Coordinates::new(21.0265, 105.8230).unwrap(),
                Coordinates::new(21.0245, 105.8412).unwrap(),
            ],
            3800.0,
            480.0,
        );
        let provider = ReplayProvider::along_route(&route, Some(8.0));

        let rx = provider.watch(&WatchOptions::default());
        let mut received = vec![];
        while let Ok(reading) = rx.recv().await {
            received.push(reading.unwrap());
        }

        assert_eq!(received.len(), 3);
        assert_eq!(received[2].longitude, 105.8412);
        assert_eq!(received[0].accuracy, Some(8.0));
    }

    #[tokio::test(start_paused = true)]
    async fn replays_errors_and_honours_interval() {
        let provider = ReplayProvider::new(vec![
            Err(position_unavailable_error()),
            Ok(PositionSample {
                latitude: 1.0,
                longitude: 2.0,
                accuracy: None,
            }),
        ])
        .with_interval(Duration::from_secs(1));

        let rx = provider.watch(&WatchOptions::default());
        let started = tokio::time::Instant::now();

        assert!(rx.recv().await.unwrap().is_err());
        assert!(rx.recv().await.unwrap().is_ok());
        assert!(started.elapsed() >= Duration::from_secs(1));
    }
}
