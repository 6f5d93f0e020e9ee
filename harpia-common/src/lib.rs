//! # Harpia Common Library
//!
//! Shared code for the Harpia nest tracker:
//! - Observation model (sightings, probable nests, generated candidates)
//! - SQLite-backed observation store
//! - Legacy CSV import/export
//! - Configuration loading and root folder resolution
//! - Common error type

pub mod config;
pub mod db;
pub mod error;
pub mod legacy_csv;
pub mod observation;

pub use error::{Error, Result};
pub use observation::{Observation, ObservationKind};
