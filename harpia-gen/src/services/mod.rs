//! External data services used by the viability validator
//!
//! Each concern sits behind a small async trait so the validator can be run
//! against stubs in tests and against the public HTTP APIs in production:
//!
//! | Trait | HTTP client | Backend |
//! |---|---|---|
//! | [`ElevationService`] | [`OpenElevationClient`] | Open-Elevation |
//! | [`ReverseGeocoder`] | [`NominatimClient`] | OSM Nominatim |
//! | [`FeatureQueryService`] | [`OverpassClient`] | OSM Overpass |
//! | [`OccurrenceService`] | [`GbifClient`] | GBIF occurrence search |

pub mod elevation;
pub mod gbif;
pub mod nominatim;
pub mod overpass;

pub use elevation::OpenElevationClient;
pub use gbif::GbifClient;
pub use nominatim::NominatimClient;
pub use overpass::OverpassClient;

use crate::config::ServiceSettings;
use crate::error::ServiceError;
use async_trait::async_trait;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;

/// Kilometers per degree of latitude
const KM_PER_DEGREE: f64 = 111.32;

/// Ground elevation lookup
#[async_trait]
pub trait ElevationService: Send + Sync {
    /// Elevation in meters above sea level
    async fn elevation(&self, lat: f64, lon: f64) -> Result<f64, ServiceError>;
}

/// OSM-style classification of a reverse-geocoded place
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaceClass {
    /// Broad class (`natural`, `place`, `landuse`, `waterway`, ...)
    pub category: String,
    /// Specific type (`water`, `village`, `forest`, ...)
    pub place_type: String,
}

/// Reverse geocoding
#[async_trait]
pub trait ReverseGeocoder: Send + Sync {
    async fn reverse(&self, lat: f64, lon: f64) -> Result<PlaceClass, ServiceError>;
}

/// Geospatial feature search
#[async_trait]
pub trait FeatureQueryService: Send + Sync {
    /// Number of forest/wood land-use features within `radius_m` meters
    async fn count_forest(&self, lat: f64, lon: f64, radius_m: f64) -> Result<u64, ServiceError>;
}

/// Biodiversity occurrence records
#[async_trait]
pub trait OccurrenceService: Send + Sync {
    /// Occurrence records of `genus` inside `area`
    async fn count(&self, genus: &str, area: &BoundingBox) -> Result<u64, ServiceError>;
}

/// Axis-aligned lat/lon rectangle
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub min_lon: f64,
    pub max_lat: f64,
    pub max_lon: f64,
}

impl BoundingBox {
    /// Square approximating a circle of `radius_km` around a point
    ///
    /// Longitude half-width is widened by `1 / cos(lat)` so the square keeps
    /// roughly the same ground size away from the equator. Edges are clamped
    /// to valid coordinates.
    pub fn around(lat: f64, lon: f64, radius_km: f64) -> Self {
        let d_lat = radius_km / KM_PER_DEGREE;
        let cos_lat = lat.to_radians().cos().abs().max(1e-6);
        let d_lon = (radius_km / (KM_PER_DEGREE * cos_lat)).min(180.0);

        Self {
            min_lat: (lat - d_lat).max(-90.0),
            min_lon: (lon - d_lon).max(-180.0),
            max_lat: (lat + d_lat).min(90.0),
            max_lon: (lon + d_lon).min(180.0),
        }
    }

    /// WKT polygon, counter-clockwise (GBIF rejects clockwise rings)
    pub fn to_wkt(&self) -> String {
        format!(
            "POLYGON(({minx} {miny},{maxx} {miny},{maxx} {maxy},{minx} {maxy},{minx} {miny}))",
            minx = self.min_lon,
            miny = self.min_lat,
            maxx = self.max_lon,
            maxy = self.max_lat,
        )
    }
}

/// Build a reqwest client with an explicit timeout and User-Agent
pub(crate) fn build_http_client(timeout: Duration, user_agent: &str) -> Result<Client, ServiceError> {
    Client::builder()
        .user_agent(user_agent)
        .timeout(timeout)
        .connect_timeout(timeout.min(Duration::from_secs(5)))
        .build()
        .map_err(|e| ServiceError::Network(format!("Failed to build HTTP client: {}", e)))
}

/// Map a non-success HTTP status to a service error
pub(crate) fn status_error(service: &'static str, status: reqwest::StatusCode) -> ServiceError {
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        ServiceError::RateLimited(service)
    } else {
        ServiceError::Status {
            service,
            code: status.as_u16(),
        }
    }
}

/// The four production HTTP backends, built from one settings block
#[derive(Clone)]
pub struct ServiceSet {
    pub elevation: Arc<dyn ElevationService>,
    pub geocoder: Arc<dyn ReverseGeocoder>,
    pub features: Arc<dyn FeatureQueryService>,
    pub occurrences: Arc<dyn OccurrenceService>,
}

impl ServiceSet {
    pub fn from_settings(settings: &ServiceSettings) -> Result<Self, ServiceError> {
        Ok(Self {
            elevation: Arc::new(OpenElevationClient::from_settings(settings)?),
            geocoder: Arc::new(NominatimClient::from_settings(settings)?),
            features: Arc::new(OverpassClient::from_settings(settings)?),
            occurrences: Arc::new(GbifClient::from_settings(settings)?),
        })
    }
}
