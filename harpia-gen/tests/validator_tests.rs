//! Viability pipeline tests against stubbed services
//!
//! Every stub counts its calls so the short-circuit order can be asserted.

use async_trait::async_trait;
use harpia_gen::config::ValidationSettings;
use harpia_gen::services::{
    BoundingBox, ElevationService, FeatureQueryService, OccurrenceService, PlaceClass, ReverseGeocoder,
};
use harpia_gen::{CandidateValidator, ServiceError, ViabilityValidator};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

struct StubElevation {
    result: Result<f64, ServiceError>,
    calls: AtomicUsize,
}

#[async_trait]
impl ElevationService for StubElevation {
    async fn elevation(&self, _lat: f64, _lon: f64) -> Result<f64, ServiceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.result.clone()
    }
}

struct StubGeocoder {
    result: Result<PlaceClass, ServiceError>,
    calls: AtomicUsize,
}

#[async_trait]
impl ReverseGeocoder for StubGeocoder {
    async fn reverse(&self, _lat: f64, _lon: f64) -> Result<PlaceClass, ServiceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.result.clone()
    }
}

struct StubFeatures {
    result: Result<u64, ServiceError>,
    calls: AtomicUsize,
}

#[async_trait]
impl FeatureQueryService for StubFeatures {
    async fn count_forest(&self, _lat: f64, _lon: f64, _radius_m: f64) -> Result<u64, ServiceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.result.clone()
    }
}

/// Per-genus results; genera not listed return zero
struct StubOccurrences {
    results: HashMap<&'static str, Result<u64, ServiceError>>,
    calls: AtomicUsize,
}

#[async_trait]
impl OccurrenceService for StubOccurrences {
    async fn count(&self, genus: &str, _area: &BoundingBox) -> Result<u64, ServiceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.results.get(genus).cloned().unwrap_or(Ok(0))
    }
}

struct Harness {
    elevation: Arc<StubElevation>,
    geocoder: Arc<StubGeocoder>,
    features: Arc<StubFeatures>,
    occurrences: Arc<StubOccurrences>,
}

impl Harness {
    /// Land at 120 m, rural, forested, no prey recorded
    fn forested() -> Self {
        Self {
            elevation: Arc::new(StubElevation {
                result: Ok(120.0),
                calls: AtomicUsize::new(0),
            }),
            geocoder: Arc::new(StubGeocoder {
                result: Ok(place("landuse", "forest")),
                calls: AtomicUsize::new(0),
            }),
            features: Arc::new(StubFeatures {
                result: Ok(3),
                calls: AtomicUsize::new(0),
            }),
            occurrences: Arc::new(StubOccurrences {
                results: HashMap::new(),
                calls: AtomicUsize::new(0),
            }),
        }
    }

    fn with_elevation(mut self, result: Result<f64, ServiceError>) -> Self {
        self.elevation = Arc::new(StubElevation {
            result,
            calls: AtomicUsize::new(0),
        });
        self
    }

    fn with_place(mut self, result: Result<PlaceClass, ServiceError>) -> Self {
        self.geocoder = Arc::new(StubGeocoder {
            result,
            calls: AtomicUsize::new(0),
        });
        self
    }

    fn with_forest(mut self, result: Result<u64, ServiceError>) -> Self {
        self.features = Arc::new(StubFeatures {
            result,
            calls: AtomicUsize::new(0),
        });
        self
    }

    fn with_prey(mut self, results: HashMap<&'static str, Result<u64, ServiceError>>) -> Self {
        self.occurrences = Arc::new(StubOccurrences {
            results,
            calls: AtomicUsize::new(0),
        });
        self
    }

    fn validator(&self) -> ViabilityValidator {
        self.validator_with(ValidationSettings::default())
    }

    fn validator_with(&self, settings: ValidationSettings) -> ViabilityValidator {
        ViabilityValidator::new(
            self.elevation.clone(),
            self.geocoder.clone(),
            self.features.clone(),
            self.occurrences.clone(),
            settings,
        )
    }

    fn calls(&self) -> [usize; 4] {
        [
            self.elevation.calls.load(Ordering::SeqCst),
            self.geocoder.calls.load(Ordering::SeqCst),
            self.features.calls.load(Ordering::SeqCst),
            self.occurrences.calls.load(Ordering::SeqCst),
        ]
    }
}

fn place(category: &str, place_type: &str) -> PlaceClass {
    PlaceClass {
        category: category.to_string(),
        place_type: place_type.to_string(),
    }
}

#[tokio::test]
async fn test_forest_without_prey_is_viable_with_score_50() {
    let harness = Harness::forested();

    let evaluation = harness.validator().evaluate(9.0, -80.0).await;

    assert!(evaluation.viable);
    assert_eq!(evaluation.score, 50);
    assert_eq!(evaluation.reason, "Forested, No prey");
    // All six default prey genera are queried
    assert_eq!(harness.calls(), [1, 1, 1, 6]);
}

#[tokio::test]
async fn test_prey_adds_log_score() {
    let harness = Harness::forested().with_prey(HashMap::from([("Alouatta", Ok(7)), ("Bradypus", Ok(3))]));

    let evaluation = harness.validator().evaluate(9.0, -80.0).await;

    // 10 * ln(11) = 23.98
    assert!(evaluation.viable);
    assert_eq!(evaluation.score, 73);
    assert_eq!(evaluation.reason, "Forested, Prey: 10 (+23)");
}

#[tokio::test]
async fn test_prey_score_caps_total_at_100() {
    let harness = Harness::forested().with_prey(HashMap::from([("Ateles", Ok(1_000_000))]));

    let evaluation = harness.validator().evaluate(9.0, -80.0).await;

    assert_eq!(evaluation.score, 100);
}

#[tokio::test]
async fn test_oversized_configured_scores_saturate() {
    let harness = Harness::forested().with_prey(HashMap::from([("Alouatta", Ok(1_000))]));
    let settings = ValidationSettings {
        forest_score: u32::MAX,
        prey_score_cap: u32::MAX,
        ..ValidationSettings::default()
    };

    let evaluation = harness.validator_with(settings).evaluate(9.0, -80.0).await;

    assert!(evaluation.viable);
    assert_eq!(evaluation.score, 100);
}

#[tokio::test]
async fn test_prey_service_error_is_skipped() {
    let harness = Harness::forested().with_prey(HashMap::from([
        ("Bradypus", Err(ServiceError::Timeout("slow".to_string()))),
        ("Nasua", Ok(1)),
    ]));

    let evaluation = harness.validator().evaluate(9.0, -80.0).await;

    assert!(evaluation.viable);
    assert_eq!(evaluation.score, 56);
    assert_eq!(evaluation.reason, "Forested, Prey: 1 (+6)");
}

#[tokio::test]
async fn test_elevation_failure_short_circuits() {
    let harness = Harness::forested().with_elevation(Err(ServiceError::Network("unreachable".to_string())));

    let evaluation = harness.validator().evaluate(9.0, -80.0).await;

    assert!(!evaluation.viable);
    assert_eq!(evaluation.score, 0);
    assert!(evaluation.reason.starts_with("Elevation unknown"));
    assert_eq!(harness.calls(), [1, 0, 0, 0]);
}

#[tokio::test]
async fn test_sea_level_is_rejected() {
    let harness = Harness::forested().with_elevation(Ok(0.0));

    let evaluation = harness.validator().evaluate(9.0, -80.0).await;

    assert!(!evaluation.viable);
    assert_eq!(evaluation.reason, "Elevation 0 m (water or invalid)");
    assert_eq!(harness.calls(), [1, 0, 0, 0]);
}

#[tokio::test]
async fn test_out_of_bounds_makes_no_calls() {
    let harness = Harness::forested();

    let evaluation = harness.validator().evaluate(95.0, -80.0).await;

    assert!(!evaluation.viable);
    assert_eq!(evaluation.reason, "Out of bounds");
    assert_eq!(harness.calls(), [0, 0, 0, 0]);
}

#[tokio::test]
async fn test_settlement_is_excluded() {
    let harness = Harness::forested().with_place(Ok(place("place", "village")));

    let evaluation = harness.validator().evaluate(9.0, -80.0).await;

    assert!(!evaluation.viable);
    assert_eq!(evaluation.reason, "Excluded area: place/village");
    assert_eq!(harness.calls(), [1, 1, 0, 0]);
}

#[tokio::test]
async fn test_water_category_is_excluded() {
    let harness = Harness::forested().with_place(Ok(place("waterway", "river")));

    let evaluation = harness.validator().evaluate(9.0, -80.0).await;

    assert!(!evaluation.viable);
    assert_eq!(harness.calls(), [1, 1, 0, 0]);
}

#[tokio::test]
async fn test_geocoder_error_rejects() {
    let harness = Harness::forested().with_place(Err(ServiceError::RateLimited("Nominatim")));

    let evaluation = harness.validator().evaluate(9.0, -80.0).await;

    assert!(!evaluation.viable);
    assert!(evaluation.reason.starts_with("Land use unknown"));
    assert_eq!(harness.calls(), [1, 1, 0, 0]);
}

#[tokio::test]
async fn test_no_forest_rejects_before_prey() {
    let harness = Harness::forested().with_forest(Ok(0));

    let evaluation = harness.validator().evaluate(9.0, -80.0).await;

    assert!(!evaluation.viable);
    assert_eq!(evaluation.reason, "No forest within 50 m");
    assert_eq!(harness.calls(), [1, 1, 1, 0]);
}

#[tokio::test]
async fn test_forest_service_error_rejects() {
    let harness = Harness::forested().with_forest(Err(ServiceError::Status {
        service: "Overpass",
        code: 504,
    }));

    let evaluation = harness.validator().evaluate(9.0, -80.0).await;

    assert!(!evaluation.viable);
    assert_eq!(evaluation.reason, "Forest cover unknown (Overpass returned HTTP 504)");
    assert_eq!(harness.calls(), [1, 1, 1, 0]);
}
