use std::sync::Arc;

use async_channel::Receiver;
use async_trait::async_trait;

use crate::config::WatchOptions;
use crate::entities::{Coordinates, PositionSample};
use crate::error::Error;
use crate::external::here_maps::{GeocodeResponse, RoutesResponse};

#[async_trait]
pub trait DirectionsAPI {
    async fn find_routes(
        &self,
        origin: Coordinates,
        destination: Coordinates,
    ) -> Result<RoutesResponse, Error>;
}

#[async_trait]
pub trait GeocodingAPI {
    async fn geocode(&self, address: &str) -> Result<GeocodeResponse, Error>;
    async fn reverse_geocode(&self, coordinates: Coordinates) -> Result<GeocodeResponse, Error>;
}

pub type PositionReading = Result<PositionSample, Error>;

/// Source of device positions.
///
/// Each call to `watch` opens a new subscription. Dropping the returned
/// receiver ends it; providers stop producing once their sends fail.
pub trait LocationProvider {
    fn watch(&self, options: &WatchOptions) -> Receiver<PositionReading>;
}

pub type DynDirectionsAPI = Arc<dyn DirectionsAPI + Send + Sync>;
pub type DynGeocodingAPI = Arc<dyn GeocodingAPI + Send + Sync>;
pub type DynLocationProvider = Arc<dyn LocationProvider + Send + Sync>;
