use crate::{
    api::DynGeocodingAPI,
    entities::{Address, Coordinates},
};

/// Address lookups that never fail: any upstream error or empty result is `None`.
#[derive(Clone)]
pub struct GeocodingAdapter {
    api: DynGeocodingAPI,
}

impl GeocodingAdapter {
    pub fn new(api: DynGeocodingAPI) -> Self {
        Self { api }
    }

    #[tracing::instrument(skip(self))]
    pub async fn forward(&self, address: &str) -> Option<Coordinates> {
        let address = address.trim();
        if address.is_empty() {
            return None;
        }

        let response = match self.api.geocode(address).await {
            Ok(response) => response,
            Err(err) => {
                tracing::error!("forward geocoding failed: {}", err);
                return None;
            }
        };

        let position = response.items.into_iter().next()?.position?;
        let coordinates = Coordinates::from(position);

        if !coordinates.is_valid() {
            tracing::warn!("geocoder returned invalid position {:?}", coordinates);
            return None;
        }

        Some(coordinates)
    }

    #[tracing::instrument(skip(self))]
    pub async fn reverse(&self, coordinates: Coordinates) -> Option<Address> {
        let response = match self.api.reverse_geocode(coordinates).await {
            Ok(response) => response,
            Err(err) => {
                tracing::error!("reverse geocoding failed: {}", err);
                return None;
            }
        };

        let address = response.items.into_iter().next()?.address.unwrap_or_default();

        Some(Address {
            formatted_address: address.label.unwrap_or_default(),
            city: address.city.unwrap_or_default(),
            country: address.country_name.unwrap_or_default(),
            postal_code: address.postal_code.unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use serde_json::json;

    use super::*;
    use crate::api::GeocodingAPI;
    use crate::error::{network_error, Error};
    use crate::external::here_maps::GeocodeResponse;

    struct FakeGeocoder {
        reply: Result<serde_json::Value, Error>,
        queries: Mutex<Vec<String>>,
    }

    impl FakeGeocoder {
        fn new(reply: Result<serde_json::Value, Error>) -> Arc<Self> {
            Arc::new(Self {
                reply,
                queries: Mutex::new(vec![]),
            })
        }

        fn respond(&self, query: String) -> Result<GeocodeResponse, Error> {
            self.queries.lock().unwrap().push(query);
            let data = self.reply.clone()?;
            Ok(serde_json::from_value(data)?)
        }
    }

    #[async_trait]
    impl GeocodingAPI for FakeGeocoder {
        async fn geocode(&self, address: &str) -> Result<GeocodeResponse, Error> {
            self.respond(address.to_string())
        }

        async fn reverse_geocode(
            &self,
            coordinates: Coordinates,
        ) -> Result<GeocodeResponse, Error> {
            self.respond(coordinates.into())
        }
    }

    #[tokio::test]
    async fn forward_takes_first_item() {
        let api = FakeGeocoder::new(Ok(json!({
            "items": [
                { "position": { "lat": 10.7769, "lng": 106.7009 } },
                { "position": { "lat": 21.0285, "lng": 105.8048 } }
            ]
        })));
        let geocoding = GeocodingAdapter::new(api.clone());

        let coordinates = geocoding.forward(" 123 Nguyễn Huệ, Quận 1 ").await.unwrap();
        assert_eq!(coordinates, Coordinates::new(10.7769, 106.7009).unwrap());
        assert_eq!(api.queries.lock().unwrap()[0], "123 Nguyễn Huệ, Quận 1");
    }

    #[tokio::test]
    async fn forward_not_found() {
        let empty = GeocodingAdapter::new(FakeGeocoder::new(Ok(json!({ "items": [] }))));
        assert_eq!(empty.forward("nowhere").await, None);

        let failing = GeocodingAdapter::new(FakeGeocoder::new(Err(network_error())));
        assert_eq!(failing.forward("Hà Nội").await, None);

        let api = FakeGeocoder::new(Ok(json!({ "items": [] })));
        let blank = GeocodingAdapter::new(api.clone());
        assert_eq!(blank.forward("   ").await, None);
        assert!(api.queries.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn reverse_fills_missing_fields() {
        let api = FakeGeocoder::new(Ok(json!({
            "items": [{
                "address": {
                    "label": "Hoàn Kiếm, Hà Nội, Việt Nam",
                    "city": "Hà Nội",
                    "countryName": "Việt Nam"
                }
            }]
        })));
        let geocoding = GeocodingAdapter::new(api.clone());

        let address = geocoding
            .reverse(Coordinates::new(21.0285, 105.8048).unwrap())
            .await
            .unwrap();

        assert_eq!(address.formatted_address, "Hoàn Kiếm, Hà Nội, Việt Nam");
        assert_eq!(address.city, "Hà Nội");
        assert_eq!(address.country, "Việt Nam");
        assert_eq!(address.postal_code, "");
        assert_eq!(api.queries.lock().unwrap()[0], "21.0285,105.8048");
    }

    #[test]
    fn reverse_not_found() {
        use tokio_test::block_on;

        let geocoding = GeocodingAdapter::new(FakeGeocoder::new(Err(network_error())));
        assert_eq!(block_on(geocoding.reverse(Coordinates::default())), None);
    }
}
