//! # Harpia candidate generator
//!
//! Proposes plausible harpy eagle nest sites from field observations:
//! - Comment-based confidence weighting of probable nests
//! - Weighted bivariate Gaussian fitted over their coordinates
//! - Four-stage viability validation against external geodata services
//! - Background run with an ordered progress channel
//!
//! Storage, the observation model and CSV interchange live in `harpia-common`.

pub mod config;
pub mod controller;
pub mod error;
pub mod generator;
pub mod progress;
pub mod services;
pub mod spatial;
pub mod validator;
pub mod weighting;

pub use config::HarpiaConfig;
pub use controller::GenerationController;
pub use error::{GenerationError, GenerationResult, ServiceError};
pub use generator::{CandidateGenerator, GenerationRequest, GenerationRun};
pub use progress::{progress_channel, GenerationEvent, ProgressReceiver, ProgressSender};
pub use validator::{CandidateValidator, Evaluation, ViabilityValidator};
