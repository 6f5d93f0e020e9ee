//! Comment weighting
//!
//! Field comments carry the observer's confidence ("adulto en nido",
//! "no estoy seguro"). A comment is turned into a positive multiplier used by
//! the spatial model: high-confidence phrases multiply the weight, hedging
//! phrases subtract from it. The keyword tables are plain data and can be
//! replaced from the `[weights]` section of the TOML config.

use harpia_common::{Observation, ObservationKind};
use serde::{Deserialize, Serialize};

/// Weight for an observation with no comment at all
pub const ABSENT_COMMENT_WEIGHT: f64 = 0.5;

/// Floor keeping every weight strictly positive
pub const MIN_WEIGHT: f64 = 0.1;

/// Phrases that multiply the weight (factor > 1)
const DEFAULT_BOOSTS: &[(&str, f64)] = &[
    ("nest", 3.0),
    ("nido", 3.0),
    ("adult at nest", 3.5),
    ("adulto en nido", 3.5),
    ("chick", 2.5),
    ("pichón", 2.5),
    ("polluelo", 2.5),
    ("feeding", 2.0),
    ("alimentando", 2.0),
];

/// Phrases that add a (negative) delta to the weight
const DEFAULT_PENALTIES: &[(&str, f64)] = &[
    ("not sure", -1.0),
    ("no estoy seguro", -1.0),
    ("i think", -0.4),
    ("creo que", -0.4),
    ("maybe", -0.3),
    ("quizás", -0.3),
    ("tal vez", -0.3),
    ("far away", -0.5),
    ("lejos", -0.5),
];

/// One keyword and its factor (boost table) or delta (penalty table)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeywordWeight {
    pub keyword: String,
    pub value: f64,
}

/// Keyword tables used to weight comments
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeightTable {
    /// Multiplicative phase, applied first
    pub boosts: Vec<KeywordWeight>,
    /// Additive phase, applied after all boosts
    pub penalties: Vec<KeywordWeight>,
}

impl Default for WeightTable {
    fn default() -> Self {
        let to_entries = |table: &[(&str, f64)]| {
            table
                .iter()
                .map(|(keyword, value)| KeywordWeight {
                    keyword: keyword.to_string(),
                    value: *value,
                })
                .collect()
        };

        Self {
            boosts: to_entries(DEFAULT_BOOSTS),
            penalties: to_entries(DEFAULT_PENALTIES),
        }
    }
}

impl WeightTable {
    /// Confidence multiplier for a comment
    ///
    /// `None` yields [`ABSENT_COMMENT_WEIGHT`]. Otherwise every boost keyword
    /// present multiplies the weight, then every penalty keyword present adds
    /// its delta. The result never drops below [`MIN_WEIGHT`].
    pub fn weight(&self, comment: Option<&str>) -> f64 {
        let Some(comment) = comment else {
            return ABSENT_COMMENT_WEIGHT;
        };
        let text = comment.to_lowercase();

        let mut w = 1.0;
        for entry in &self.boosts {
            if text.contains(&entry.keyword.to_lowercase()) {
                w *= entry.value;
            }
        }
        for entry in &self.penalties {
            if text.contains(&entry.keyword.to_lowercase()) {
                w += entry.value;
            }
        }

        w.max(MIN_WEIGHT)
    }

    /// Weight every probable-nest observation; other kinds are dropped
    pub fn weigh(&self, observations: &[Observation]) -> Vec<WeightedObservation> {
        observations
            .iter()
            .filter(|obs| obs.kind == ObservationKind::ProbableNest)
            .map(|obs| WeightedObservation {
                observation: obs.clone(),
                weight: self.weight(obs.comment_text()),
            })
            .collect()
    }
}

/// Comment weight using the built-in keyword tables
pub fn weight(comment: Option<&str>) -> f64 {
    WeightTable::default().weight(comment)
}

/// Probable nest paired with its comment weight
#[derive(Debug, Clone, PartialEq)]
pub struct WeightedObservation {
    pub observation: Observation,
    pub weight: f64,
}

impl WeightedObservation {
    pub fn lat(&self) -> f64 {
        self.observation.lat
    }

    pub fn lon(&self) -> f64 {
        self.observation.lon
    }
}
