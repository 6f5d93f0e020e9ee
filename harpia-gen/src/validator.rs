//! Viability validator
//!
//! Classifies one sampled coordinate as a plausible nest site. Four stages run
//! in order, cheapest first, and the chain stops at the first failure:
//!
//! 1. **Elevation** - inside bounds and above sea level
//! 2. **Settlement** - not water and not a populated/built-up place
//! 3. **Forest cover** - forest or wood within the search radius (+50)
//! 4. **Prey** - occurrence records of prey genera nearby (+0..=50)
//!
//! Stages 1-3 decide viability. Stage 4 only scores: a forested point with no
//! recorded prey is still viable. Service errors reject the point at stages
//! 1-3 and are skipped at stage 4; they never abort the generation run.

use crate::config::ValidationSettings;
use crate::services::{
    BoundingBox, ElevationService, FeatureQueryService, OccurrenceService, ReverseGeocoder, ServiceSet,
};
use async_trait::async_trait;
use harpia_common::observation::validate_coordinates;
use std::sync::Arc;
use tracing::{debug, warn};

/// Verdict for one coordinate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evaluation {
    pub viable: bool,
    /// Rejection reason, or the scoring tags of a viable point
    pub reason: String,
    /// Ecological score, 0..=100
    pub score: u32,
}

impl Evaluation {
    pub fn rejected(reason: impl Into<String>) -> Self {
        Self {
            viable: false,
            reason: reason.into(),
            score: 0,
        }
    }

    pub fn accepted(score: u32, reason: impl Into<String>) -> Self {
        Self {
            viable: true,
            reason: reason.into(),
            score,
        }
    }
}

/// Anything able to judge a sampled coordinate
///
/// The generator only depends on this trait, so tests can drive it with
/// scripted verdicts.
#[async_trait]
pub trait CandidateValidator: Send + Sync {
    async fn evaluate(&self, lat: f64, lon: f64) -> Evaluation;
}

/// Pipeline stages, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Elevation,
    Settlement,
    ForestCover,
    Prey,
}

/// Execution order of the pipeline
pub const PIPELINE: [Stage; 4] = [Stage::Elevation, Stage::Settlement, Stage::ForestCover, Stage::Prey];

/// Result of a single stage
#[derive(Debug, Clone, PartialEq)]
pub enum StageOutcome {
    /// Stage passed, contributing `score` and an optional reason tag
    Pass { score: u32, tag: Option<String> },
    /// Stage failed; the pipeline stops here
    Fail { reason: String },
}

impl StageOutcome {
    fn pass() -> Self {
        StageOutcome::Pass { score: 0, tag: None }
    }

    fn fail(reason: impl Into<String>) -> Self {
        StageOutcome::Fail { reason: reason.into() }
    }
}

/// Four-stage ecological/geographic validator backed by external services
pub struct ViabilityValidator {
    elevation: Arc<dyn ElevationService>,
    geocoder: Arc<dyn ReverseGeocoder>,
    features: Arc<dyn FeatureQueryService>,
    occurrences: Arc<dyn OccurrenceService>,
    settings: ValidationSettings,
}

impl ViabilityValidator {
    pub fn new(
        elevation: Arc<dyn ElevationService>,
        geocoder: Arc<dyn ReverseGeocoder>,
        features: Arc<dyn FeatureQueryService>,
        occurrences: Arc<dyn OccurrenceService>,
        settings: ValidationSettings,
    ) -> Self {
        Self {
            elevation,
            geocoder,
            features,
            occurrences,
            settings,
        }
    }

    pub fn from_services(services: ServiceSet, settings: ValidationSettings) -> Self {
        Self::new(
            services.elevation,
            services.geocoder,
            services.features,
            services.occurrences,
            settings,
        )
    }

    async fn run_stage(&self, stage: Stage, lat: f64, lon: f64) -> StageOutcome {
        match stage {
            Stage::Elevation => self.check_elevation(lat, lon).await,
            Stage::Settlement => self.check_settlement(lat, lon).await,
            Stage::ForestCover => self.check_forest(lat, lon).await,
            Stage::Prey => self.score_prey(lat, lon).await,
        }
    }

    async fn check_elevation(&self, lat: f64, lon: f64) -> StageOutcome {
        if validate_coordinates(lat, lon).is_err() {
            return StageOutcome::fail("Out of bounds");
        }

        match self.elevation.elevation(lat, lon).await {
            Ok(meters) if meters > 0.0 => StageOutcome::pass(),
            Ok(meters) => StageOutcome::fail(format!("Elevation {:.0} m (water or invalid)", meters)),
            Err(e) => {
                warn!(lat, lon, error = %e, "Elevation check failed");
                StageOutcome::fail(format!("Elevation unknown ({})", e))
            }
        }
    }

    async fn check_settlement(&self, lat: f64, lon: f64) -> StageOutcome {
        match self.geocoder.reverse(lat, lon).await {
            Ok(place) => {
                let excluded = |value: &str| {
                    self.settings
                        .excluded_place_classes
                        .iter()
                        .any(|c| c.eq_ignore_ascii_case(value))
                };
                if excluded(&place.category) || excluded(&place.place_type) {
                    StageOutcome::fail(format!("Excluded area: {}/{}", place.category, place.place_type))
                } else {
                    StageOutcome::pass()
                }
            }
            Err(e) => {
                warn!(lat, lon, error = %e, "Settlement check failed");
                StageOutcome::fail(format!("Land use unknown ({})", e))
            }
        }
    }

    async fn check_forest(&self, lat: f64, lon: f64) -> StageOutcome {
        let radius = self.settings.forest_radius_m;
        match self.features.count_forest(lat, lon, radius).await {
            Ok(count) if count > 0 => StageOutcome::Pass {
                score: self.settings.forest_score,
                tag: Some("Forested".to_string()),
            },
            Ok(_) => StageOutcome::fail(format!("No forest within {} m", radius)),
            Err(e) => {
                warn!(lat, lon, error = %e, "Forest check failed");
                StageOutcome::fail(format!("Forest cover unknown ({})", e))
            }
        }
    }

    /// Never fails: absent prey or per-taxon errors only lower the score
    async fn score_prey(&self, lat: f64, lon: f64) -> StageOutcome {
        let area = BoundingBox::around(lat, lon, self.settings.prey_radius_km);

        let mut total: u64 = 0;
        for genus in &self.settings.prey_taxa {
            match self.occurrences.count(genus, &area).await {
                Ok(count) => total += count,
                Err(e) => warn!(genus = %genus, error = %e, "Prey query failed, skipping taxon"),
            }
        }

        if total == 0 {
            return StageOutcome::Pass {
                score: 0,
                tag: Some("No prey".to_string()),
            };
        }

        let delta = prey_score(total, self.settings.prey_score_cap);
        StageOutcome::Pass {
            score: delta,
            tag: Some(format!("Prey: {} (+{})", total, delta)),
        }
    }
}

/// `min(cap, floor(10 * ln(1 + count)))`
pub fn prey_score(count: u64, cap: u32) -> u32 {
    let raw = (10.0 * (1.0 + count as f64).ln()).floor();
    (raw as u32).min(cap)
}

#[async_trait]
impl CandidateValidator for ViabilityValidator {
    async fn evaluate(&self, lat: f64, lon: f64) -> Evaluation {
        let mut score: u32 = 0;
        let mut tags: Vec<String> = Vec::new();

        for stage in PIPELINE {
            match self.run_stage(stage, lat, lon).await {
                StageOutcome::Pass { score: delta, tag } => {
                    score = score.saturating_add(delta);
                    tags.extend(tag);
                }
                StageOutcome::Fail { reason } => {
                    debug!(lat, lon, ?stage, reason = %reason, "Candidate rejected");
                    return Evaluation::rejected(reason);
                }
            }
        }

        Evaluation::accepted(score.min(100), tags.join(", "))
    }
}
