//! Overpass API client (forest cover)
//!
//! Counts ways and relations tagged `landuse=forest` or `natural=wood` within a
//! radius of the point, using `out count;` so no geometry is transferred.
//!
//! API Documentation: https://wiki.openstreetmap.org/wiki/Overpass_API

use super::{build_http_client, status_error, FeatureQueryService};
use crate::config::ServiceSettings;
use crate::error::ServiceError;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;

const SERVICE: &str = "Overpass";

#[derive(Debug, Deserialize)]
struct OverpassResponse {
    #[serde(default)]
    elements: Vec<OverpassElement>,
}

#[derive(Debug, Deserialize)]
struct OverpassElement {
    #[serde(rename = "type")]
    element_type: String,
    #[serde(default)]
    tags: HashMap<String, String>,
}

/// Forest feature counts from an Overpass interpreter endpoint
pub struct OverpassClient {
    client: Client,
    base_url: String,
    /// Server-side query timeout (seconds)
    query_timeout_secs: u64,
}

impl OverpassClient {
    pub fn new(client: Client, base_url: impl Into<String>, query_timeout_secs: u64) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            query_timeout_secs,
        }
    }

    pub fn from_settings(settings: &ServiceSettings) -> Result<Self, ServiceError> {
        let client = build_http_client(settings.timeout(), &settings.user_agent())?;
        Ok(Self::new(client, settings.overpass_url.clone(), settings.timeout().as_secs()))
    }

    /// Overpass QL for forest/wood areas around a point
    pub fn forest_query(&self, lat: f64, lon: f64, radius_m: f64) -> String {
        let around = format!("(around:{},{},{})", radius_m, lat, lon);
        format!(
            "[out:json][timeout:{t}];\
             (way[\"landuse\"=\"forest\"]{a};\
             relation[\"landuse\"=\"forest\"]{a};\
             way[\"natural\"=\"wood\"]{a};\
             relation[\"natural\"=\"wood\"]{a};);\
             out count;",
            t = self.query_timeout_secs,
            a = around,
        )
    }
}

#[async_trait]
impl FeatureQueryService for OverpassClient {
    async fn count_forest(&self, lat: f64, lon: f64, radius_m: f64) -> Result<u64, ServiceError> {
        let query = self.forest_query(lat, lon, radius_m);
        tracing::debug!(lat, lon, radius_m, "Querying forest cover");

        let response = self
            .client
            .post(&self.base_url)
            .form(&[("data", query.as_str())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(status_error(SERVICE, status));
        }

        let body: OverpassResponse = response
            .json()
            .await
            .map_err(|e| ServiceError::Parse(format!("{} response: {}", SERVICE, e)))?;

        let count = body
            .elements
            .iter()
            .find(|e| e.element_type == "count")
            .ok_or_else(|| ServiceError::Parse(format!("{} response has no count element", SERVICE)))?;

        count
            .tags
            .get("total")
            .ok_or_else(|| ServiceError::Parse(format!("{} count has no total", SERVICE)))?
            .parse()
            .map_err(|e| ServiceError::Parse(format!("{} total: {}", SERVICE, e)))
    }
}
