use std::net::IpAddr;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::types::GeolocationRecord;

/// Fields requested from the lookup API.
pub const IP_API_FIELDS: &str = "status,message,country,city,lat,lon";

#[derive(Debug, thiserror::Error)]
pub enum GeoError {
    #[error("geolocation request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("geolocation lookup rejected: {0}")]
    Rejected(String),
    #[error("malformed geolocation response: {0}")]
    Malformed(String),
    #[error("geolocation lookup timed out after {0:?}")]
    Timeout(Duration),
}

/// Source of geolocation data for a single address.
#[async_trait]
pub trait GeoProvider: Send + Sync {
    async fn lookup(&self, ip: IpAddr) -> Result<GeolocationRecord, GeoError>;
}

#[derive(Debug, Deserialize)]
struct IpApiResponse {
    status: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    country: Option<String>,
    #[serde(default)]
    city: Option<String>,
    #[serde(default)]
    lat: Option<f64>,
    #[serde(default)]
    lon: Option<f64>,
}

/// Client for ip-api.com compatible endpoints:
/// `GET {base_url}/{ip}?fields=status,message,country,city,lat,lon`.
pub struct IpApiProvider {
    client: reqwest::Client,
    base_url: String,
}

impl IpApiProvider {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, GeoError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client, base_url: base_url.trim_end_matches('/').to_string() })
    }

    fn url_for(&self, ip: IpAddr) -> String {
        format!("{}/{}?fields={}", self.base_url, ip, IP_API_FIELDS)
    }
}

#[async_trait]
impl GeoProvider for IpApiProvider {
    async fn lookup(&self, ip: IpAddr) -> Result<GeolocationRecord, GeoError> {
        let response = self.client.get(self.url_for(ip)).send().await?.error_for_status()?;
        let body = response.bytes().await?;
        let data: IpApiResponse =
            serde_json::from_slice(&body).map_err(|e| GeoError::Malformed(e.to_string()))?;

        if data.status != "success" {
            return Err(GeoError::Rejected(data.message.unwrap_or_else(|| format!("status {}", data.status))));
        }

        Ok(GeolocationRecord { country: data.country, city: data.city, latitude: data.lat, longitude: data.lon })
    }
}
