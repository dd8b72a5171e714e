use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};

use crate::{
    api::{DirectionsAPI, GeocodingAPI},
    config::HereConfig,
    entities::Coordinates,
    error::{invalid_input_error, upstream_error, Error},
};

#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl From<LatLng> for Coordinates {
    fn from(location: LatLng) -> Self {
        Coordinates {
            latitude: location.lat,
            longitude: location.lng,
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RoutesResponse {
    #[serde(default)]
    pub routes: Vec<Route>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Route {
    #[serde(default)]
    pub sections: Vec<Section>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Section {
    pub polyline: Option<String>,
    pub summary: Option<Summary>,
    pub departure: Option<Waypoint>,
    pub arrival: Option<Waypoint>,
}

impl Section {
    pub fn departure_location(&self) -> Option<Coordinates> {
        self.departure.as_ref().and_then(Waypoint::location)
    }

    pub fn arrival_location(&self) -> Option<Coordinates> {
        self.arrival.as_ref().and_then(Waypoint::location)
    }
}

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub struct Summary {
    #[serde(default)]
    pub length: f64,
    #[serde(default)]
    pub duration: f64,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Waypoint {
    pub place: Option<WaypointPlace>,
}

impl Waypoint {
    fn location(&self) -> Option<Coordinates> {
        self.place
            .as_ref()
            .and_then(|place| place.location)
            .map(Coordinates::from)
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct WaypointPlace {
    pub location: Option<LatLng>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct GeocodeResponse {
    #[serde(default)]
    pub items: Vec<GeocodeItem>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct GeocodeItem {
    pub position: Option<LatLng>,
    pub address: Option<ItemAddress>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemAddress {
    pub label: Option<String>,
    pub city: Option<String>,
    pub country_name: Option<String>,
    pub postal_code: Option<String>,
}

#[derive(Clone, Debug)]
pub struct HereMaps {
    client: Client,
    config: HereConfig,
}

impl HereMaps {
    pub fn new(config: HereConfig) -> Result<Self, Error> {
        let client = Client::builder().build()?;

        Ok(Self { client, config })
    }
}

fn check_status(res: &Response) -> Result<(), Error> {
    let status_code = res.status().as_u16();

    if (400..500).contains(&status_code) {
        return Err(invalid_input_error());
    } else if status_code != 200 {
        return Err(upstream_error());
    }

    Ok(())
}

#[async_trait]
impl DirectionsAPI for HereMaps {
    #[tracing::instrument(skip(self))]
    async fn find_routes(
        &self,
        origin: Coordinates,
        destination: Coordinates,
    ) -> Result<RoutesResponse, Error> {
        let origin: String = origin.into();
        let destination: String = destination.into();

        let res = self
            .client
            .get(&self.config.router_url)
            .query(&[("transportMode", "car")])
            .query(&[("origin", origin)])
            .query(&[("destination", destination)])
            .query(&[(
                "return",
                "polyline,turnByTurnActions,actions,instructions,summary",
            )])
            .query(&[("routingMode", "fast")])
            .query(&[("apikey", &self.config.api_key)])
            .timeout(self.config.directions_timeout)
            .send()
            .await?;

        check_status(&res)?;

        Ok(res.json().await?)
    }
}

#[async_trait]
impl GeocodingAPI for HereMaps {
    #[tracing::instrument(skip(self))]
    async fn geocode(&self, address: &str) -> Result<GeocodeResponse, Error> {
        let res = self
            .client
            .get(&self.config.geocode_url)
            .query(&[("q", address)])
            .query(&[("apiKey", &self.config.api_key)])
            .timeout(self.config.geocoding_timeout)
            .send()
            .await?;

        check_status(&res)?;

        Ok(res.json().await?)
    }

    #[tracing::instrument(skip(self))]
    async fn reverse_geocode(&self, coordinates: Coordinates) -> Result<GeocodeResponse, Error> {
        let at: String = coordinates.into();

        let res = self
            .client
            .get(&self.config.revgeocode_url)
            .query(&[("at", at)])
            .query(&[("lang", &self.config.lang)])
            .query(&[("apiKey", &self.config.api_key)])
            .timeout(self.config.geocoding_timeout)
            .send()
            .await?;

        check_status(&res)?;

        Ok(res.json().await?)
    }
}

#[test]
fn parse_routes_response() {
    let data = serde_json::json!({
        "routes": [{
            "id": "r1",
            "sections": [{
                "id": "s1",
                "type": "vehicle",
                "polyline": "BFoz5xJ67i1B1B7PzIhaxL7Y",
                "summary": { "duration": 120, "length": 950, "baseDuration": 100 },
                "departure": { "place": { "type": "place", "location": { "lat": 50.10228, "lng": 8.69821 } } },
                "arrival": { "place": { "type": "place", "location": { "lat": 50.09878, "lng": 8.68752 } } },
                "transport": { "mode": "car" }
            }]
        }]
    });

    let response: RoutesResponse = serde_json::from_value(data).unwrap();
    let section = &response.routes[0].sections[0];

    assert_eq!(section.summary.unwrap().length, 950.0);
    assert_eq!(section.departure_location().unwrap().latitude, 50.10228);
    assert_eq!(section.arrival_location().unwrap().longitude, 8.68752);
}

#[test]
fn parse_sparse_responses() {
    let response: RoutesResponse =
        serde_json::from_value(serde_json::json!({ "notices": [] })).unwrap();
    assert!(response.routes.is_empty());

    let response: GeocodeResponse = serde_json::from_value(serde_json::json!({
        "items": [{
            "title": "Hoàn Kiếm, Hà Nội",
            "address": { "label": "Hoàn Kiếm, Hà Nội, Việt Nam", "countryName": "Việt Nam" }
        }]
    }))
    .unwrap();
    let address = response.items[0].address.clone().unwrap();
    assert!(response.items[0].position.is_none());
    assert_eq!(address.country_name.as_deref(), Some("Việt Nam"));
    assert!(address.postal_code.is_none());
}
