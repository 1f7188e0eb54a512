use std::time::Duration;

use async_trait::async_trait;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GeocodeError {
    #[error("geocoding request failed: {0}")]
    HttpError(String),

    #[error("geocoder returned status {0}")]
    Status(u16),

    #[error("geocoder returned no address")]
    NoResult,

    #[error("invalid geocoder URL {0}")]
    InvalidUrl(String),
}

impl From<reqwest::Error> for GeocodeError {
    fn from(e: reqwest::Error) -> Self {
        GeocodeError::HttpError(e.to_string())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GeocodedAddress {
    pub address: String,
    /// Pre-reform administrative naming, when the service still knows it.
    #[serde(default)]
    pub legacy_address: Option<String>,
}

#[derive(Debug, Serialize)]
struct ReverseRequest {
    latitude: f64,
    longitude: f64,
}

/// External coordinate → address lookup.
#[async_trait]
pub trait Geocoder: Send + Sync {
    async fn reverse(&self, latitude: f64, longitude: f64) -> Result<GeocodedAddress, GeocodeError>;
}

pub struct HttpGeocoder {
    http: reqwest::Client,
    endpoint: Url,
}

impl HttpGeocoder {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, GeocodeError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GeocodeError::HttpError(e.to_string()))?;
        Self::with_client(base_url, http)
    }

    pub fn with_client(base_url: &str, http: reqwest::Client) -> Result<Self, GeocodeError> {
        let mut endpoint =
            Url::parse(base_url).map_err(|e| GeocodeError::InvalidUrl(format!("{base_url}: {e}")))?;
        endpoint
            .path_segments_mut()
            .map_err(|_| GeocodeError::InvalidUrl(base_url.to_string()))?
            .pop_if_empty()
            .extend(["geocode", "reverse"]);

        Ok(Self { http, endpoint })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl Geocoder for HttpGeocoder {
    async fn reverse(&self, latitude: f64, longitude: f64) -> Result<GeocodedAddress, GeocodeError> {
        let response = self
            .http
            .post(self.endpoint.clone())
            .json(&ReverseRequest { latitude, longitude })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(GeocodeError::Status(status.as_u16()));
        }

        let address: GeocodedAddress = response.json().await?;
        if address.address.trim().is_empty() {
            return Err(GeocodeError::NoResult);
        }
        Ok(address)
    }
}
