use std::str::FromStr;

use geo_types::Point;
use serde::{Deserialize, Serialize};

use crate::error::{invalid_input_error, Error};

/// Mean Earth radius used for great-circle distances.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, Error> {
        let coordinates = Self {
            latitude,
            longitude,
        };

        if !coordinates.is_valid() {
            return Err(invalid_input_error());
        }

        Ok(coordinates)
    }

    pub fn is_valid(&self) -> bool {
        (-90.0..=90.0).contains(&self.latitude) && (-180.0..=180.0).contains(&self.longitude)
    }

    /// Haversine distance in kilometers.
    pub fn distance_km(&self, other: &Coordinates) -> f64 {
        let d_lat = (other.latitude - self.latitude).to_radians();
        let d_lng = (other.longitude - self.longitude).to_radians();

        let a = (d_lat / 2.0).sin().powi(2)
            + self.latitude.to_radians().cos()
                * other.latitude.to_radians().cos()
                * (d_lng / 2.0).sin().powi(2);

        let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

        EARTH_RADIUS_KM * c
    }

    /// Linear interpolation in degrees, `fraction` 0 yields `self` and 1 yields `other`.
    pub fn interpolate(&self, other: &Coordinates, fraction: f64) -> Coordinates {
        Coordinates {
            latitude: self.latitude + (other.latitude - self.latitude) * fraction,
            longitude: self.longitude + (other.longitude - self.longitude) * fraction,
        }
    }
}

impl From<Coordinates> for String {
    fn from(coordinates: Coordinates) -> Self {
        format!("{},{}", coordinates.latitude, coordinates.longitude)
    }
}

impl From<Coordinates> for Point<f64> {
    fn from(coordinates: Coordinates) -> Self {
        Point::new(coordinates.longitude, coordinates.latitude)
    }
}

impl FromStr for Coordinates {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (latitude, longitude) = s.split_once(',').ok_or_else(invalid_input_error)?;

        let latitude: f64 = latitude
            .trim()
            .parse()
            .map_err(|_| invalid_input_error())?;
        let longitude: f64 = longitude
            .trim()
            .parse()
            .map_err(|_| invalid_input_error())?;

        Coordinates::new(latitude, longitude)
    }
}

#[test]
fn haversine_distance() {
    let origin = Coordinates::new(21.0285, 105.8048).unwrap();
    let destination = Coordinates::new(21.0245, 105.8412).unwrap();

    let distance = origin.distance_km(&destination);
    assert!((distance - 3.8041).abs() < 0.001);
    assert_eq!(origin.distance_km(&origin), 0.0);
}

#[test]
fn parse_coordinates() {
    let coordinates: Coordinates = "21.0285, 105.8048".parse().unwrap();
    assert_eq!(coordinates, Coordinates::new(21.0285, 105.8048).unwrap());

    let query: String = coordinates.into();
    assert_eq!(query, "21.0285,105.8048");

    assert!("91.0,0.0".parse::<Coordinates>().is_err());
    assert!("hanoi".parse::<Coordinates>().is_err());
}

#[test]
fn point_is_longitude_first() {
    let point: Point<f64> = Coordinates::new(10.0, 20.0).unwrap().into();
    assert_eq!(point.x(), 20.0);
    assert_eq!(point.y(), 10.0);
}
