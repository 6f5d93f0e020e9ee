//! Nominatim reverse-geocoding client
//!
//! Rate limiting follows the Nominatim usage policy (absolute maximum of one
//! request per second) and requires an identifying User-Agent.
//!
//! API Documentation: https://nominatim.org/release-docs/latest/api/Reverse/

use super::{build_http_client, status_error, PlaceClass, ReverseGeocoder};
use crate::config::ServiceSettings;
use crate::error::ServiceError;
use async_trait::async_trait;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use reqwest::Client;
use serde::Deserialize;
use std::num::NonZeroU32;

const SERVICE: &str = "Nominatim";

/// `format=jsonv2` reverse response; `error` is set for points with no
/// address (typically open sea)
#[derive(Debug, Deserialize)]
struct ReverseResponse {
    category: Option<String>,
    #[serde(rename = "type")]
    place_type: Option<String>,
    error: Option<String>,
}

/// Reverse geocoder with a client-side rate limiter
pub struct NominatimClient {
    client: Client,
    base_url: String,
    rate_limiter: DefaultDirectRateLimiter,
}

impl NominatimClient {
    pub fn new(client: Client, base_url: impl Into<String>, requests_per_second: NonZeroU32) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            rate_limiter: RateLimiter::direct(Quota::per_second(requests_per_second)),
        }
    }

    pub fn from_settings(settings: &ServiceSettings) -> Result<Self, ServiceError> {
        let client = build_http_client(settings.timeout(), &settings.user_agent())?;
        let rps = NonZeroU32::new(settings.nominatim_requests_per_second).unwrap_or(NonZeroU32::MIN);
        Ok(Self::new(client, settings.nominatim_url.clone(), rps))
    }
}

#[async_trait]
impl ReverseGeocoder for NominatimClient {
    async fn reverse(&self, lat: f64, lon: f64) -> Result<PlaceClass, ServiceError> {
        self.rate_limiter.until_ready().await;

        let lat_s = lat.to_string();
        let lon_s = lon.to_string();
        tracing::debug!(lat, lon, "Reverse geocoding");

        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("format", "jsonv2"),
                ("lat", lat_s.as_str()),
                ("lon", lon_s.as_str()),
                ("zoom", "18"),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(status_error(SERVICE, status));
        }

        let body: ReverseResponse = response
            .json()
            .await
            .map_err(|e| ServiceError::Parse(format!("{} response: {}", SERVICE, e)))?;

        if let Some(message) = body.error {
            return Err(ServiceError::Api {
                service: SERVICE,
                message,
            });
        }

        Ok(PlaceClass {
            category: body.category.unwrap_or_default(),
            place_type: body.place_type.unwrap_or_default(),
        })
    }
}
