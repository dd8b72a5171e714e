use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Uniform};

use crate::{
    api::DynDirectionsAPI,
    config::SimulationConfig,
    entities::{Coordinates, DecodedRoute},
    error::{network_error, no_route_found_error, Error},
    external::here_maps::{RoutesResponse, Section},
    polyline,
};

const INTERIOR_POINTS: usize = 8;
const SIMULATED_SPEED_KMH: f64 = 30.0;
const DIRECTIONS_TIMEOUT: Duration = Duration::from_secs(15);

/// How the geometry of a route was obtained.
#[derive(Clone, Debug, PartialEq)]
pub enum RouteOutcome {
    /// Every section polyline decoded.
    Decoded(DecodedRoute),
    /// Upstream route, but at least one section was drawn straight.
    Interpolated(DecodedRoute),
    /// No usable upstream route; straight-line estimate.
    Simulated(DecodedRoute),
}

impl RouteOutcome {
    pub fn route(&self) -> &DecodedRoute {
        match self {
            Self::Decoded(route) | Self::Interpolated(route) | Self::Simulated(route) => route,
        }
    }

    pub fn into_route(self) -> DecodedRoute {
        match self {
            Self::Decoded(route) | Self::Interpolated(route) | Self::Simulated(route) => route,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Decoded(_) => "decoded",
            Self::Interpolated(_) => "interpolated",
            Self::Simulated(_) => "simulated",
        }
    }
}

pub struct RouteProvider {
    directions: DynDirectionsAPI,
    simulation: SimulationConfig,
    timeout: Duration,
    rng: Mutex<StdRng>,
}

impl RouteProvider {
    pub fn new(directions: DynDirectionsAPI, simulation: SimulationConfig) -> Self {
        let rng = match simulation.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Self {
            directions,
            simulation,
            timeout: DIRECTIONS_TIMEOUT,
            rng: Mutex::new(rng),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Fetches a route between two points. Always yields at least two coordinates:
    /// absent endpoints become `{0,0}` and upstream failures degrade to a simulated route.
    pub async fn fetch_route(
        &self,
        origin: impl Into<Option<Coordinates>>,
        destination: impl Into<Option<Coordinates>>,
    ) -> DecodedRoute {
        self.resolve(origin.into(), destination.into())
            .await
            .into_route()
    }

    #[tracing::instrument(skip(self))]
    pub async fn resolve(
        &self,
        origin: Option<Coordinates>,
        destination: Option<Coordinates>,
    ) -> RouteOutcome {
        let origin = endpoint_or_default(origin, "origin");
        let destination = endpoint_or_default(destination, "destination");

        let response = tokio::time::timeout(
            self.timeout,
            self.directions.find_routes(origin, destination),
        )
        .await
        .unwrap_or_else(|_| Err(network_error()));

        let outcome = match response {
            Ok(response) => match assemble(origin, destination, response) {
                Ok(outcome) => outcome,
                Err(err) => {
                    tracing::warn!("no usable route from directions api: {}", err);
                    RouteOutcome::Simulated(self.simulate(origin, destination))
                }
            },
            Err(err) => {
                tracing::error!("directions request failed: {}", err);
                RouteOutcome::Simulated(self.simulate(origin, destination))
            }
        };

        tracing::info!(
            "route resolved as {} with {} points",
            outcome.name(),
            outcome.route().coordinates.len()
        );

        outcome
    }

    /// Straight-line route estimated at a constant average speed.
    pub fn simulate(&self, origin: Coordinates, destination: Coordinates) -> DecodedRoute {
        let distance_km = (origin.distance_km(&destination) * 100.0).round() / 100.0;
        let duration_minutes = (distance_km / SIMULATED_SPEED_KMH * 60.0).round();

        let mut coordinates = Vec::with_capacity(INTERIOR_POINTS + 2);
        coordinates.push(origin);
        coordinates.extend(self.jitter(interior_points(origin, destination)));
        coordinates.push(destination);

        DecodedRoute::new(
            coordinates,
            (distance_km * 1000.0).round(),
            duration_minutes * 60.0,
        )
    }

    fn jitter(&self, points: Vec<Coordinates>) -> Vec<Coordinates> {
        let jitter = self.simulation.jitter_degrees.abs();
        if jitter == 0.0 {
            return points;
        }

        let offset = Uniform::new_inclusive(-jitter, jitter);
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);

        points
            .into_iter()
            .map(|point| Coordinates {
                latitude: point.latitude + offset.sample(&mut *rng),
                longitude: point.longitude + offset.sample(&mut *rng),
            })
            .collect()
    }
}

fn endpoint_or_default(endpoint: Option<Coordinates>, name: &str) -> Coordinates {
    match endpoint {
        Some(coordinates) if coordinates.is_valid() => coordinates,
        Some(coordinates) => {
            tracing::warn!("invalid {} {:?}, using 0,0", name, coordinates);
            Coordinates::default()
        }
        None => {
            tracing::warn!("missing {}, using 0,0", name);
            Coordinates::default()
        }
    }
}

/// Points at fractions 1/9 .. 8/9 between `start` and `end`.
fn interior_points(start: Coordinates, end: Coordinates) -> Vec<Coordinates> {
    (1..=INTERIOR_POINTS)
        .map(|i| start.interpolate(&end, i as f64 / (INTERIOR_POINTS + 1) as f64))
        .collect()
}

/// Coordinates for one section, and whether they were decoded from its polyline.
fn section_coordinates(
    section: &Section,
    origin: Coordinates,
    destination: Coordinates,
) -> (Vec<Coordinates>, bool) {
    let start = section.departure_location().unwrap_or(origin);
    let end = section.arrival_location().unwrap_or(destination);

    let encoded = match section.polyline.as_deref() {
        Some(encoded) if !encoded.is_empty() => encoded,
        _ => {
            tracing::warn!("section has no polyline, using its endpoints");
            return (vec![start, end], false);
        }
    };

    match polyline::decode(encoded) {
        Ok(points) if !points.is_empty() => return (points, true),
        Ok(_) => tracing::warn!("section polyline is empty, interpolating"),
        Err(err) => tracing::warn!("section polyline failed to decode: {}", err),
    }

    let mut points = Vec::with_capacity(INTERIOR_POINTS + 2);
    points.push(start);
    points.extend(interior_points(start, end));
    points.push(end);

    (points, false)
}

fn assemble(
    origin: Coordinates,
    destination: Coordinates,
    response: RoutesResponse,
) -> Result<RouteOutcome, Error> {
    let route = response
        .routes
        .into_iter()
        .next()
        .ok_or_else(no_route_found_error)?;

    if route.sections.is_empty() {
        return Err(no_route_found_error());
    }

    let mut distance_meters = 0.0;
    let mut duration_seconds = 0.0;
    let mut coordinates = vec![];
    let mut all_decoded = true;

    for section in &route.sections {
        if let Some(summary) = section.summary {
            distance_meters += summary.length;
            duration_seconds += summary.duration;
        }

        let (points, decoded) = section_coordinates(section, origin, destination);
        all_decoded &= decoded;
        coordinates.extend(points);
    }

    if coordinates.is_empty() {
        return Err(no_route_found_error());
    }

    if coordinates.len() < 2 {
        coordinates.insert(0, origin);
        coordinates.push(destination);
    }

    let route = DecodedRoute::new(coordinates, distance_meters, duration_seconds);

    if all_decoded {
        return Ok(RouteOutcome::Decoded(route));
    }

    Ok(RouteOutcome::Interpolated(route))
}
