//! Observation model
//!
//! An observation is one recorded point on the map: a field sighting, a probable
//! nest confirmed by a biologist, or a candidate produced by the generator.
//! Rows are immutable once stored; the only mutation is deletion.

use crate::{Error, Result};
use std::fmt;
use std::str::FromStr;

/// Kind of observation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObservationKind {
    /// Bird seen in the field
    Sighting,
    /// Nest reported with some confidence (modeling input)
    ProbableNest,
    /// Point produced and validated by the candidate generator
    GeneratedCandidate,
}

impl ObservationKind {
    /// Canonical label stored in the database
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sighting => "Sighting",
            Self::ProbableNest => "ProbableNest",
            Self::GeneratedCandidate => "GeneratedCandidate",
        }
    }

    /// Label used by the legacy Spanish-language CSV files
    pub fn legacy_label(self) -> &'static str {
        match self {
            Self::Sighting => "Avistamiento",
            Self::ProbableNest => "Nido probable",
            Self::GeneratedCandidate => "Generado Potencial",
        }
    }
}

impl fmt::Display for ObservationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ObservationKind {
    type Err = Error;

    /// Accepts canonical names, legacy Spanish labels and a few spellings
    /// people type by hand (`probable-nest`, `sighting`, ...).
    fn from_str(s: &str) -> Result<Self> {
        let normalized: String = s
            .trim()
            .to_lowercase()
            .chars()
            .filter(|c| c.is_alphanumeric())
            .collect();

        match normalized.as_str() {
            "sighting" | "avistamiento" => Ok(Self::Sighting),
            "probablenest" | "nest" | "nidoprobable" => Ok(Self::ProbableNest),
            "generatedcandidate" | "generated" | "candidate" | "generadopotencial" => {
                Ok(Self::GeneratedCandidate)
            }
            _ => Err(Error::InvalidInput(format!("Unknown observation kind: {}", s))),
        }
    }
}

/// One stored observation
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    /// Unique id (≥ 1)
    pub id: i64,
    /// Latitude in degrees, [-90, 90]
    pub lat: f64,
    /// Longitude in degrees, [-180, 180]
    pub lon: f64,
    /// What was observed
    pub kind: ObservationKind,
    /// Free-text field comment (may be empty)
    pub comment: String,
    /// Ecological score, set only on generated candidates
    pub score: Option<f64>,
    /// Validation narrative, set only on generated candidates
    pub validation_reason: Option<String>,
}

impl Observation {
    /// Build a manually entered observation after validating its coordinates
    pub fn new(id: i64, lat: f64, lon: f64, kind: ObservationKind, comment: impl Into<String>) -> Result<Self> {
        if id < 1 {
            return Err(Error::InvalidInput(format!("Observation id must be >= 1, got {}", id)));
        }
        validate_coordinates(lat, lon)?;

        Ok(Self {
            id,
            lat,
            lon,
            kind,
            comment: comment.into(),
            score: None,
            validation_reason: None,
        })
    }

    /// Comment as seen by the confidence weighter
    ///
    /// Blank comments count as missing, matching how the legacy CSV files
    /// represented an empty cell.
    pub fn comment_text(&self) -> Option<&str> {
        let trimmed = self.comment.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(self.comment.as_str())
        }
    }
}

/// Check that a coordinate pair is finite and within geographic bounds
pub fn validate_coordinates(lat: f64, lon: f64) -> Result<()> {
    if !lat.is_finite() || !lon.is_finite() {
        return Err(Error::InvalidInput("Coordinates must be finite numbers".to_string()));
    }
    if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
        return Err(Error::InvalidInput(format!(
            "Coordinates out of range: ({}, {})",
            lat, lon
        )));
    }
    Ok(())
}

/// Parse user-typed latitude/longitude strings
///
/// Empty and non-numeric inputs are rejected before range validation.
pub fn parse_coordinates(lat: &str, lon: &str) -> Result<(f64, f64)> {
    if lat.trim().is_empty() || lon.trim().is_empty() {
        return Err(Error::InvalidInput("Latitude and longitude cannot be empty".to_string()));
    }

    let lat_f: f64 = lat
        .trim()
        .parse()
        .map_err(|_| Error::InvalidInput(format!("Latitude is not a number: {}", lat)))?;
    let lon_f: f64 = lon
        .trim()
        .parse()
        .map_err(|_| Error::InvalidInput(format!("Longitude is not a number: {}", lon)))?;

    validate_coordinates(lat_f, lon_f)?;
    Ok((lat_f, lon_f))
}
