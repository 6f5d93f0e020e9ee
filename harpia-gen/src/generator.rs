//! Candidate generation workflow
//!
//! Run state machine:
//!
//! ```text
//! Idle → Sampling → (Validating → Accepted | Rejected)* → Done | Failed
//! ```
//!
//! Probable nests are weighted by their comments, summarized as a Gaussian,
//! and sampled. Each sample is handed to the validator and narrated as one
//! `Status` event. The loop stops when enough candidates are accepted or the
//! attempt budget (`requested × budget_multiplier`) is spent; either way the
//! run ends with `Done`, possibly empty. Only setup failures (too little data,
//! degenerate weights) and cancellation end with `Error`.

use crate::config::GeneratorSettings;
use crate::error::{GenerationError, GenerationResult};
use crate::progress::{GenerationEvent, ProgressSender};
use crate::spatial::SpatialModel;
use crate::validator::CandidateValidator;
use crate::weighting::WeightTable;
use chrono::{DateTime, Utc};
use harpia_common::{Observation, ObservationKind};
use rand::Rng;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Comment stored on generated observations
pub const GENERATED_COMMENT: &str = "Generated candidate";

/// Accepted sample, before numbering
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub lat: f64,
    pub lon: f64,
    pub score: u32,
    pub reason: String,
}

impl Candidate {
    /// Promote to a `GeneratedCandidate` observation with the given id
    pub fn into_observation(self, id: i64) -> Observation {
        Observation {
            id,
            lat: self.lat,
            lon: self.lon,
            kind: ObservationKind::GeneratedCandidate,
            comment: GENERATED_COMMENT.to_string(),
            score: Some(f64::from(self.score)),
            validation_reason: Some(self.reason),
        }
    }
}

/// Generation run state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Sampling,
    Validating,
    Done,
    Failed,
}

/// What the caller asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenerationRequest {
    /// Number of candidates wanted (> 0)
    pub requested: u32,
    /// Provisional id of the best candidate; the rest follow sequentially.
    /// The store renumbers the batch when it is appended.
    pub first_id: i64,
}

/// Mutable state of one run, owned by the worker
#[derive(Debug, Clone)]
pub struct GenerationRun {
    pub run_id: Uuid,
    pub requested: u32,
    pub attempted: u32,
    pub budget: u32,
    /// Accepted candidates in sampling order
    pub accepted: Vec<Candidate>,
    pub state: RunState,
    pub started_at: DateTime<Utc>,
}

impl GenerationRun {
    pub fn new(requested: u32, budget_multiplier: u32) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            requested,
            attempted: 0,
            budget: requested.saturating_mul(budget_multiplier),
            accepted: Vec::new(),
            state: RunState::Idle,
            started_at: Utc::now(),
        }
    }

    pub fn transition_to(&mut self, state: RunState) {
        tracing::debug!(run_id = %self.run_id, from = ?self.state, to = ?state, "Run state change");
        self.state = state;
    }

    /// Enough candidates, or no attempts left
    pub fn is_finished(&self) -> bool {
        self.accepted.len() >= self.requested as usize || self.attempted >= self.budget
    }
}

/// Samples, validates and ranks candidate nest sites
pub struct CandidateGenerator {
    validator: Arc<dyn CandidateValidator>,
    weights: WeightTable,
    settings: GeneratorSettings,
}

impl CandidateGenerator {
    pub fn new(validator: Arc<dyn CandidateValidator>, weights: WeightTable, settings: GeneratorSettings) -> Self {
        Self {
            validator,
            weights,
            settings,
        }
    }

    /// Weight the probable nests and fit the sampling distribution
    pub fn prepare_model(&self, observations: &[Observation]) -> GenerationResult<SpatialModel> {
        let weighted = self.weights.weigh(observations);
        if weighted.len() < 2 {
            return Err(GenerationError::InsufficientData { found: weighted.len() });
        }

        for w in &weighted {
            tracing::debug!(id = w.observation.id, weight = w.weight, "Weighted probable nest");
        }

        SpatialModel::build_with_jitter(&weighted, self.settings.jitter)
    }

    /// Run one generation to completion
    ///
    /// Emits one `Status` per attempt and exactly one terminal event
    /// (`Done` or `Error`). Returns the final run state.
    pub async fn execute<R: Rng + Send>(
        &self,
        observations: &[Observation],
        request: GenerationRequest,
        rng: &mut R,
        progress: &ProgressSender,
        cancel: &CancellationToken,
    ) -> GenerationRun {
        let mut run = GenerationRun::new(request.requested, self.settings.budget_multiplier);

        tracing::info!(
            run_id = %run.run_id,
            requested = run.requested,
            budget = run.budget,
            "Starting candidate generation"
        );

        match self.run(&mut run, observations, request, rng, progress, cancel).await {
            Ok(ranked) => {
                run.transition_to(RunState::Done);
                tracing::info!(
                    run_id = %run.run_id,
                    accepted = ranked.len(),
                    attempted = run.attempted,
                    elapsed_ms = (Utc::now() - run.started_at).num_milliseconds(),
                    "Candidate generation finished"
                );
                progress.send(GenerationEvent::Done(ranked));
            }
            Err(e) => {
                run.transition_to(RunState::Failed);
                tracing::warn!(run_id = %run.run_id, error = %e, "Candidate generation failed");
                progress.send(GenerationEvent::Error(e.to_string()));
            }
        }

        run
    }

    async fn run<R: Rng + Send>(
        &self,
        run: &mut GenerationRun,
        observations: &[Observation],
        request: GenerationRequest,
        rng: &mut R,
        progress: &ProgressSender,
        cancel: &CancellationToken,
    ) -> GenerationResult<Vec<Observation>> {
        if request.requested == 0 {
            return Err(GenerationError::InvalidRequest(
                "requested candidate count must be greater than zero".to_string(),
            ));
        }
        if request.first_id < 1 {
            return Err(GenerationError::InvalidRequest(format!(
                "first candidate id must be >= 1, got {}",
                request.first_id
            )));
        }

        let model = self.prepare_model(observations)?;
        run.transition_to(RunState::Sampling);

        let pacing = self.settings.pacing();

        while !run.is_finished() {
            if cancel.is_cancelled() {
                return Err(GenerationError::Cancelled { attempted: run.attempted });
            }

            let (lat, lon) = model.sample(rng);
            run.attempted += 1;
            run.transition_to(RunState::Validating);

            let evaluation = self.validator.evaluate(lat, lon).await;

            let outcome = if evaluation.viable {
                format!("Viable, score {}: {}", evaluation.score, evaluation.reason)
            } else {
                evaluation.reason.clone()
            };
            progress.status(format!(
                "Attempt {}/{}: ({:.5}, {:.5}) → {}",
                run.attempted, run.budget, lat, lon, outcome
            ));

            if evaluation.viable {
                run.accepted.push(Candidate {
                    lat,
                    lon,
                    score: evaluation.score,
                    reason: evaluation.reason,
                });
            }
            run.transition_to(RunState::Sampling);

            if !run.is_finished() && !pacing.is_zero() {
                tokio::select! {
                    _ = cancel.cancelled() => {}
                    _ = tokio::time::sleep(pacing) => {}
                }
            }
        }

        Ok(rank(&run.accepted, request.first_id))
    }
}

/// Order by score, best first, and number from `first_id`
///
/// The sort is stable: equal scores keep sampling order.
pub fn rank(accepted: &[Candidate], first_id: i64) -> Vec<Observation> {
    let mut sorted = accepted.to_vec();
    sorted.sort_by(|a, b| b.score.cmp(&a.score));

    sorted
        .into_iter()
        .zip(first_id..)
        .map(|(candidate, id)| candidate.into_observation(id))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(score: u32, tag: &str) -> Candidate {
        Candidate {
            lat: 9.0,
            lon: -80.0,
            score,
            reason: tag.to_string(),
        }
    }

    #[test]
    fn test_rank_is_stable_and_numbered() {
        let accepted = vec![
            candidate(50, "a"),
            candidate(75, "b"),
            candidate(50, "c"),
            candidate(90, "d"),
        ];

        let ranked = rank(&accepted, 12);
        let order: Vec<(&str, i64)> = ranked
            .iter()
            .map(|o| (o.validation_reason.as_deref().unwrap_or_default(), o.id))
            .collect();
        assert_eq!(order, vec![("d", 12), ("b", 13), ("a", 14), ("c", 15)]);
    }

    #[test]
    fn test_budget_is_proportional() {
        let run = GenerationRun::new(3, 30);
        assert_eq!(run.budget, 90);
        assert_eq!(run.state, RunState::Idle);
        assert!(!run.is_finished());
    }

    #[test]
    fn test_candidate_into_observation() {
        let obs = candidate(62, "Forested, Prey: 3 (+13)").into_observation(4);
        assert_eq!(obs.id, 4);
        assert_eq!(obs.kind, ObservationKind::GeneratedCandidate);
        assert_eq!(obs.score, Some(62.0));
        assert_eq!(obs.validation_reason.as_deref(), Some("Forested, Prey: 3 (+13)"));
    }
}
