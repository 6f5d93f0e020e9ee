//! GBIF occurrence search client (prey availability)
//!
//! Only the record count is needed, so every request uses `limit=0`.
//!
//! API Documentation: https://techdocs.gbif.org/en/openapi/v1/occurrence

use super::{build_http_client, status_error, BoundingBox, OccurrenceService};
use crate::config::ServiceSettings;
use crate::error::ServiceError;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

const SERVICE: &str = "GBIF";

#[derive(Debug, Deserialize)]
struct SearchResponse {
    count: u64,
}

/// Occurrence counts per genus inside a polygon
pub struct GbifClient {
    client: Client,
    base_url: String,
}

impl GbifClient {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    pub fn from_settings(settings: &ServiceSettings) -> Result<Self, ServiceError> {
        let client = build_http_client(settings.timeout(), &settings.user_agent())?;
        Ok(Self::new(client, settings.gbif_url.clone()))
    }
}

#[async_trait]
impl OccurrenceService for GbifClient {
    async fn count(&self, genus: &str, area: &BoundingBox) -> Result<u64, ServiceError> {
        let geometry = area.to_wkt();
        tracing::debug!(genus, geometry = %geometry, "Querying occurrences");

        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("scientificName", genus),
                ("geometry", geometry.as_str()),
                ("hasCoordinate", "true"),
                ("limit", "0"),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(status_error(SERVICE, status));
        }

        let body: SearchResponse = response
            .json()
            .await
            .map_err(|e| ServiceError::Parse(format!("{} response: {}", SERVICE, e)))?;

        Ok(body.count)
    }
}
