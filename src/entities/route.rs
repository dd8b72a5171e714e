use geo_types::LineString;
use serde::{Deserialize, Serialize};

use crate::entities::Coordinates;
use crate::format::{format_distance, format_duration};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DecodedRoute {
    pub coordinates: Vec<Coordinates>,
    pub distance_meters: f64,
    pub duration_seconds: f64,
    pub distance_text: String,
    pub duration_text: String,
}

impl DecodedRoute {
    pub fn new(coordinates: Vec<Coordinates>, distance_meters: f64, duration_seconds: f64) -> Self {
        let distance_meters = distance_meters.max(0.0);
        let duration_seconds = duration_seconds.max(0.0);

        Self {
            coordinates,
            distance_meters,
            duration_seconds,
            distance_text: format_distance(distance_meters),
            duration_text: format_duration(duration_seconds),
        }
    }

    pub fn origin(&self) -> Option<&Coordinates> {
        self.coordinates.first()
    }

    pub fn destination(&self) -> Option<&Coordinates> {
        self.coordinates.last()
    }

    /// Route geometry for the map overlay, x = longitude and y = latitude.
    pub fn line_string(&self) -> LineString<f64> {
        self.coordinates
            .iter()
            .map(|c| (c.longitude, c.latitude))
            .collect::<Vec<_>>()
            .into()
    }
}

#[test]
fn route_texts_and_overlay() {
    let route = DecodedRoute::new(
        vec![
            Coordinates::new(21.0285, 105.8048).unwrap(),
            Coordinates::new(21.0245, 105.8412).unwrap(),
        ],
        1500.0,
        7500.0,
    );

    assert_eq!(route.distance_text, "1.5 km");
    assert_eq!(route.duration_text, "2 giờ 5 phút");
    assert_eq!(route.origin().unwrap().latitude, 21.0285);

    let line = route.line_string();
    assert_eq!(line.0.len(), 2);
    assert_eq!(line.0[1].x, 105.8412);
    assert_eq!(line.0[1].y, 21.0245);
}
