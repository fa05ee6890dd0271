use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

const MAPBOX_GEOCODING_URL: &str = "https://api.mapbox.com/geocoding/v5/mapbox.places";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Error)]
pub enum GeocodeError {
    #[error("geocoding request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("geocoding service returned status {0}")]
    Status(reqwest::StatusCode),
}

/// Turns a free-text location into coordinates
#[async_trait]
pub trait Geocoder: Send + Sync {
    /// `Ok(None)` when the location could not be resolved
    async fn geocode(&self, location: &str) -> Result<Option<Coordinates>, GeocodeError>;
}

/// Used when no geocoding token is configured
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledGeocoder;

#[async_trait]
impl Geocoder for DisabledGeocoder {
    async fn geocode(&self, _location: &str) -> Result<Option<Coordinates>, GeocodeError> {
        Ok(None)
    }
}

pub struct MapboxGeocoder {
    http: reqwest::Client,
    token: String,
}

impl MapboxGeocoder {
    pub fn new(token: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            token,
        }
    }
}

#[derive(Deserialize)]
struct FeatureCollection {
    #[serde(default)]
    features: Vec<Feature>,
}

#[derive(Deserialize)]
struct Feature {
    /// `[longitude, latitude]`
    center: [f64; 2],
}

fn first_coordinates(collection: &FeatureCollection) -> Option<Coordinates> {
    collection.features.first().map(|feature| Coordinates {
        latitude: feature.center[1],
        longitude: feature.center[0],
    })
}

#[async_trait]
impl Geocoder for MapboxGeocoder {
    async fn geocode(&self, location: &str) -> Result<Option<Coordinates>, GeocodeError> {
        let encoded = url_escape::encode_component(location.trim());
        let url = format!("{MAPBOX_GEOCODING_URL}/{encoded}.json");

        let response = self
            .http
            .get(url)
            .query(&[("access_token", self.token.as_str()), ("limit", "1")])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(GeocodeError::Status(status));
        }

        let collection: FeatureCollection = response.json().await?;
        let coordinates = first_coordinates(&collection);
        debug!(location, found = coordinates.is_some(), "Geocoded location");
        Ok(coordinates)
    }
}
