use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::{
    engine::{GeocodingAdapter, LocationTracker, RouteProvider, TrackerEvent},
    entities::{Address, Coordinates, DecodedRoute, TrackedPosition},
    error::{invalid_input_error, invalid_state_error, Error},
    format::format_distance,
};

/// Straight-line change in kilometers that triggers a new route fetch while tracking.
const REFETCH_THRESHOLD_KM: f64 = 0.1;
const EVENT_CAPACITY: usize = 32;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "name", rename_all = "snake_case")]
pub enum Phase {
    Idle,
    DestinationSet,
    RouteActive,
    Tracking,
}

impl Phase {
    pub fn name(&self) -> String {
        match self {
            Self::Idle => "idle".into(),
            Self::DestinationSet => "destination_set".into(),
            Self::RouteActive => "route_active".into(),
            Self::Tracking => "tracking".into(),
        }
    }
}

#[derive(Clone, Debug)]
pub enum SessionEvent {
    PositionUpdated(TrackedPosition),
    RouteUpdated(DecodedRoute),
    Notice(Error),
    /// The location provider ended the watch. Tracking stays enabled until stopped.
    TrackingEnded,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    pub origin: Option<TrackedPosition>,
    pub destination: Option<Coordinates>,
    pub active_route: Option<DecodedRoute>,
    pub tracking_enabled: bool,
}

impl SessionState {
    pub fn phase(&self) -> Phase {
        if self.tracking_enabled {
            Phase::Tracking
        } else if self.active_route.is_some() {
            Phase::RouteActive
        } else if self.destination.is_some() {
            Phase::DestinationSet
        } else {
            Phase::Idle
        }
    }
}

#[derive(Default)]
struct State {
    session: SessionState,
    closed: bool,
    /// Origin to destination distance when the current route was requested.
    baseline_km: Option<f64>,
}

impl State {
    fn discard_route(&mut self) {
        self.session.active_route = None;
        self.baseline_km = None;
    }

    /// Endpoints for a new fetch if the shipper moved far enough since the last one.
    fn refetch_endpoints(&mut self) -> Option<(Coordinates, Coordinates)> {
        let origin = self.session.origin.as_ref()?.coordinates;
        let destination = self.session.destination?;
        self.session.active_route.as_ref()?;

        let distance_km = origin.distance_km(&destination);
        if let Some(baseline) = self.baseline_km {
            if (distance_km - baseline).abs() <= REFETCH_THRESHOLD_KM {
                return None;
            }
        }

        self.baseline_km = Some(distance_km);
        Some((origin, destination))
    }
}

struct Inner {
    id: Uuid,
    geocoding: GeocodingAdapter,
    routes: Arc<RouteProvider>,
    tracker: Mutex<LocationTracker>,
    state: Mutex<State>,
    events: broadcast::Sender<SessionEvent>,
}

impl Inner {
    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn tracker(&self) -> MutexGuard<'_, LocationTracker> {
        self.tracker.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: SessionEvent) {
        // no subscribers is fine
        let _ = self.events.send(event);
    }

    fn on_tracker_event(self: &Arc<Self>, event: TrackerEvent) {
        let position = match event {
            TrackerEvent::Position(position) => position,
            TrackerEvent::Notice(err) => {
                tracing::warn!(session = %self.id, "location notice: {}", err);
                self.emit(SessionEvent::Notice(err));
                return;
            }
            TrackerEvent::Closed => {
                tracing::info!(session = %self.id, "location watch ended");
                self.emit(SessionEvent::TrackingEnded);
                return;
            }
        };

        let refetch = {
            let mut state = self.state();
            if state.closed {
                return;
            }

            state.session.origin = Some(position.clone());
            state.refetch_endpoints()
        };

        self.emit(SessionEvent::PositionUpdated(position));

        if let Some((origin, destination)) = refetch {
            self.spawn_refetch(origin, destination);
        }
    }

    fn spawn_refetch(self: &Arc<Self>, origin: Coordinates, destination: Coordinates) {
        tracing::info!(session = %self.id, "moved past threshold, refetching route");

        let routes = self.routes.clone();
        let session = Arc::downgrade(self);

        tokio::spawn(async move {
            let route = routes.fetch_route(origin, destination).await;

            match session.upgrade() {
                Some(inner) => {
                    inner.apply_route(route, destination, None);
                }
                None => tracing::debug!("session dropped, discarding route"),
            }
        });
    }

    /// Stores a finished fetch unless the session closed or the destination moved on.
    fn apply_route(
        &self,
        route: DecodedRoute,
        destination: Coordinates,
        baseline_km: Option<f64>,
    ) -> bool {
        {
            let mut state = self.state();

            if state.closed || state.session.destination != Some(destination) {
                tracing::debug!(session = %self.id, "discarding stale route");
                return false;
            }

            state.session.active_route = Some(route.clone());
            if baseline_km.is_some() {
                state.baseline_km = baseline_km;
            }
        }

        self.emit(SessionEvent::RouteUpdated(route));
        true
    }
}

/// Live route state for one shipper view, from destination lookup through tracking.
///
/// Dropping the session closes it. Fetches still in flight at that point are discarded.
pub struct RouteSession {
    inner: Arc<Inner>,
}

impl RouteSession {
    pub fn new(
        geocoding: GeocodingAdapter,
        routes: Arc<RouteProvider>,
        tracker: LocationTracker,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        Self {
            inner: Arc::new(Inner {
                id: Uuid::new_v4(),
                geocoding,
                routes,
                tracker: Mutex::new(tracker),
                state: Mutex::new(State::default()),
                events,
            }),
        }
    }

    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.events.subscribe()
    }

    pub fn snapshot(&self) -> SessionState {
        self.inner.state().session.clone()
    }

    pub fn phase(&self) -> Phase {
        self.inner.state().session.phase()
    }

    pub fn is_closed(&self) -> bool {
        self.inner.state().closed
    }

    pub fn origin(&self) -> Option<TrackedPosition> {
        self.inner.state().session.origin.clone()
    }

    pub fn destination(&self) -> Option<Coordinates> {
        self.inner.state().session.destination
    }

    pub fn active_route(&self) -> Option<DecodedRoute> {
        self.inner.state().session.active_route.clone()
    }

    pub fn tracking_enabled(&self) -> bool {
        self.inner.state().session.tracking_enabled
    }

    /// Straight-line distance from the latest position to the destination, in km to 2 decimals.
    pub fn current_distance_km(&self) -> Option<f64> {
        let state = self.inner.state();
        let origin = state.session.origin.as_ref()?.coordinates;
        let destination = state.session.destination?;

        Some((origin.distance_km(&destination) * 100.0).round() / 100.0)
    }

    pub fn current_distance_text(&self) -> Option<String> {
        self.current_distance_km()
            .map(|km| format_distance((km * 1000.0).round()))
    }

    pub fn eta_text(&self) -> Option<String> {
        self.inner
            .state()
            .session
            .active_route
            .as_ref()
            .map(|route| route.duration_text.clone())
    }

    /// Looks up the destination address. `Ok(None)` means the address was not found.
    #[tracing::instrument(skip(self), fields(session = %self.inner.id))]
    pub async fn set_destination_address(
        &self,
        address: &str,
    ) -> Result<Option<Coordinates>, Error> {
        if self.is_closed() {
            return Err(invalid_state_error());
        }

        let destination = match self.inner.geocoding.forward(address).await {
            Some(destination) => destination,
            None => {
                tracing::info!("destination address not found");
                return Ok(None);
            }
        };

        self.set_destination(destination)?;
        Ok(Some(destination))
    }

    /// Seeds the origin from a one-off position fix, before or outside tracking.
    pub fn set_origin(&self, origin: TrackedPosition) -> Result<(), Error> {
        if !origin.coordinates.is_valid() {
            return Err(invalid_input_error());
        }

        let mut state = self.inner.state();
        if state.closed {
            return Err(invalid_state_error());
        }

        state.session.origin = Some(origin);

        Ok(())
    }

    pub fn set_destination(&self, destination: Coordinates) -> Result<(), Error> {
        if !destination.is_valid() {
            return Err(invalid_input_error());
        }

        let mut state = self.inner.state();
        if state.closed {
            return Err(invalid_state_error());
        }

        state.session.destination = Some(destination);
        state.discard_route();

        Ok(())
    }

    pub fn clear_destination(&self) {
        self.inner.tracker().stop();

        let mut state = self.inner.state();
        state.session.destination = None;
        state.session.tracking_enabled = false;
        state.discard_route();
    }

    /// Fetches a route from the latest position to the destination and makes it active.
    #[tracing::instrument(skip(self), fields(session = %self.inner.id))]
    pub async fn refresh_route(&self) -> Result<DecodedRoute, Error> {
        let (origin, destination) = {
            let state = self.inner.state();
            if state.closed {
                return Err(invalid_state_error());
            }

            let destination = state.session.destination.ok_or_else(invalid_state_error)?;
            let origin = state.session.origin.as_ref().map(|p| p.coordinates);
            (origin, destination)
        };

        let route = self.inner.routes.fetch_route(origin, destination).await;
        let baseline_km = origin.map(|origin| origin.distance_km(&destination));

        if !self.inner.apply_route(route.clone(), destination, baseline_km) {
            return Err(invalid_state_error());
        }

        Ok(route)
    }

    pub fn start_tracking(&self) -> Result<(), Error> {
        {
            let state = self.inner.state();
            if state.closed || state.session.destination.is_none() {
                return Err(invalid_state_error());
            }
        }

        let session = Arc::downgrade(&self.inner);
        self.inner.tracker().start(move |event| {
            if let Some(inner) = session.upgrade() {
                inner.on_tracker_event(event);
            }
        });

        self.inner.state().session.tracking_enabled = true;
        tracing::info!(session = %self.inner.id, "tracking started");

        Ok(())
    }

    /// Stops tracking and drops the active route; the destination is kept.
    pub fn stop_tracking(&self) {
        self.inner.tracker().stop();

        let mut state = self.inner.state();
        if state.session.tracking_enabled {
            tracing::info!(session = %self.inner.id, "tracking stopped");
        }
        state.session.tracking_enabled = false;
        state.discard_route();
    }

    /// Reverse geocodes the latest tracked position.
    pub async fn current_address(&self) -> Option<Address> {
        let origin = self.origin()?;
        self.inner.geocoding.reverse(origin.coordinates).await
    }

    pub fn close(&self) {
        self.inner.tracker().stop();

        let mut state = self.inner.state();
        if !state.closed {
            tracing::info!(session = %self.inner.id, "session closed");
        }
        *state = State {
            closed: true,
            ..State::default()
        };
    }
}

impl Drop for RouteSession {
    fn drop(&mut self) {
        self.close();
    }
}

#[test]
fn phase_follows_state() {
    let mut state = SessionState::default();
    assert_eq!(state.phase(), Phase::Idle);

    state.destination = Some(Coordinates::default());
    assert_eq!(state.phase(), Phase::DestinationSet);

    state.active_route = Some(DecodedRoute::new(vec![], 0.0, 0.0));
    assert_eq!(state.phase(), Phase::RouteActive);

    state.tracking_enabled = true;
    assert_eq!(state.phase(), Phase::Tracking);
    assert_eq!(state.phase().name(), "tracking");
}

#[test]
fn refetch_only_past_threshold() {
    let destination = Coordinates::new(21.0245, 105.8412).unwrap();
    let mut state = State::default();
    state.session.destination = Some(destination);
    state.session.origin = Some(TrackedPosition::new(
        Coordinates::new(21.0285, 105.8048).unwrap(),
        None,
    ));

    // nothing to refresh without an active route
    assert_eq!(state.refetch_endpoints(), None);

    state.session.active_route = Some(DecodedRoute::new(vec![], 0.0, 0.0));
    assert!(state.refetch_endpoints().is_some());
    assert_eq!(state.refetch_endpoints(), None);

    // about 55 m closer, under the threshold
    state.session.origin = Some(TrackedPosition::new(
        Coordinates::new(21.0285, 105.8053).unwrap(),
        None,
    ));
    assert_eq!(state.refetch_endpoints(), None);

    // about 1 km closer
    state.session.origin = Some(TrackedPosition::new(
        Coordinates::new(21.0275, 105.8148).unwrap(),
        None,
    ));
    assert!(state.refetch_endpoints().is_some());
}
