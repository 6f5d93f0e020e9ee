//! Open-Elevation API client
//!
//! API Documentation: https://github.com/Jorl17/open-elevation/blob/master/docs/api.md

use super::{build_http_client, status_error, ElevationService};
use crate::config::ServiceSettings;
use crate::error::ServiceError;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

const SERVICE: &str = "Open-Elevation";

#[derive(Debug, Deserialize)]
struct LookupResponse {
    #[serde(default)]
    results: Vec<LookupResult>,
}

#[derive(Debug, Deserialize)]
struct LookupResult {
    elevation: f64,
}

/// Elevation lookups against an Open-Elevation compatible endpoint
pub struct OpenElevationClient {
    client: Client,
    base_url: String,
}

impl OpenElevationClient {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    pub fn from_settings(settings: &ServiceSettings) -> Result<Self, ServiceError> {
        let client = build_http_client(settings.timeout(), &settings.user_agent())?;
        Ok(Self::new(client, settings.elevation_url.clone()))
    }
}

#[async_trait]
impl ElevationService for OpenElevationClient {
    async fn elevation(&self, lat: f64, lon: f64) -> Result<f64, ServiceError> {
        let locations = format!("{},{}", lat, lon);
        tracing::debug!(lat, lon, "Querying elevation");

        let response = self
            .client
            .get(&self.base_url)
            .query(&[("locations", locations.as_str())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(status_error(SERVICE, status));
        }

        let body: LookupResponse = response
            .json()
            .await
            .map_err(|e| ServiceError::Parse(format!("{} response: {}", SERVICE, e)))?;

        body.results
            .first()
            .map(|r| r.elevation)
            .ok_or_else(|| ServiceError::Parse(format!("{} returned no results", SERVICE)))
    }
}
