//! Configuration for the candidate generator
//!
//! One TOML file, every section optional:
//!
//! ```toml
//! root_folder = "/data/harpia"
//!
//! [logging]
//! level = "debug"
//!
//! [generator]
//! budget_multiplier = 30
//! pacing_ms = 200
//!
//! [services]
//! timeout_secs = 8
//!
//! [validation]
//! prey_taxa = ["Bradypus", "Alouatta"]
//!
//! [[weights.boosts]]
//! keyword = "nido"
//! value = 3.0
//! ```
//!
//! Missing sections fall back to the built-in defaults below.

use crate::weighting::WeightTable;
use harpia_common::config::{load_toml_config, resolve_config_path, LoggingConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Complete configuration file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HarpiaConfig {
    /// Data root folder (database lives here)
    pub root_folder: Option<PathBuf>,
    pub logging: LoggingConfig,
    pub generator: GeneratorSettings,
    pub services: ServiceSettings,
    pub validation: ValidationSettings,
    pub weights: WeightTable,
}

impl HarpiaConfig {
    /// Load from CLI path → `HARPIA_CONFIG` → user config dir, or defaults
    pub fn load(cli_path: Option<&Path>) -> harpia_common::Result<Self> {
        let path = resolve_config_path(cli_path);
        load_toml_config(path.as_deref())
    }
}

/// Generation loop tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorSettings {
    /// Attempt budget per requested candidate
    pub budget_multiplier: u32,
    /// Pause between attempts, throttling external API usage
    pub pacing_ms: u64,
    /// Diagonal jitter added to the covariance
    pub jitter: f64,
    /// Candidates requested when the CLI is given no count
    pub default_count: u32,
    /// How often the foreground loop polls the progress channel
    pub poll_interval_ms: u64,
}

impl Default for GeneratorSettings {
    fn default() -> Self {
        Self {
            budget_multiplier: 30,
            pacing_ms: 200,
            jitter: crate::spatial::DEFAULT_JITTER,
            default_count: 10,
            poll_interval_ms: 100,
        }
    }
}

impl GeneratorSettings {
    pub fn pacing(&self) -> Duration {
        Duration::from_millis(self.pacing_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Shortest per-request timeout accepted for external services (seconds)
pub const MIN_TIMEOUT_SECS: u64 = 5;

/// Longest per-request timeout accepted for external services (seconds)
pub const MAX_TIMEOUT_SECS: u64 = 10;

/// External service endpoints and HTTP behavior
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceSettings {
    pub elevation_url: String,
    pub nominatim_url: String,
    pub overpass_url: String,
    pub gbif_url: String,
    /// Per-request timeout (seconds), clamped to
    /// [`MIN_TIMEOUT_SECS`]..=[`MAX_TIMEOUT_SECS`]
    pub timeout_secs: u64,
    /// Nominatim usage policy allows one request per second
    pub nominatim_requests_per_second: u32,
    /// Overrides the default User-Agent
    pub user_agent: Option<String>,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            elevation_url: "https://api.open-elevation.com/api/v1/lookup".to_string(),
            nominatim_url: "https://nominatim.openstreetmap.org/reverse".to_string(),
            overpass_url: "https://overpass-api.de/api/interpreter".to_string(),
            gbif_url: "https://api.gbif.org/v1/occurrence/search".to_string(),
            timeout_secs: 8,
            nominatim_requests_per_second: 1,
            user_agent: None,
        }
    }
}

impl ServiceSettings {
    pub fn timeout(&self) -> Duration {
        let secs = self.timeout_secs.clamp(MIN_TIMEOUT_SECS, MAX_TIMEOUT_SECS);
        if secs != self.timeout_secs {
            tracing::warn!(
                configured = self.timeout_secs,
                used = secs,
                "Service timeout out of range, clamped"
            );
        }
        Duration::from_secs(secs)
    }

    pub fn user_agent(&self) -> String {
        self.user_agent
            .clone()
            .unwrap_or_else(harpia_common::config::get_user_agent)
    }
}

/// Ecological validation tables and thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationSettings {
    /// Reverse-geocode categories/types that rule a point out
    pub excluded_place_classes: Vec<String>,
    /// Prey genera queried in the occurrence service
    pub prey_taxa: Vec<String>,
    /// Search radius for forest features (meters)
    pub forest_radius_m: f64,
    /// Half-width of the prey search square (kilometers)
    pub prey_radius_km: f64,
    /// Score awarded for forest cover
    pub forest_score: u32,
    /// Maximum score awarded for prey
    pub prey_score_cap: u32,
}

impl Default for ValidationSettings {
    fn default() -> Self {
        Self {
            excluded_place_classes: [
                "water",
                "waterway",
                "city",
                "town",
                "village",
                "hamlet",
                "residential",
                "commercial",
                "industrial",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            // Sloths, howler/capuchin/spider monkeys, coatis
            prey_taxa: ["Bradypus", "Choloepus", "Alouatta", "Cebus", "Ateles", "Nasua"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            forest_radius_m: 50.0,
            prey_radius_km: 10.0,
            forest_score: 50,
            prey_score_cap: 50,
        }
    }
}
