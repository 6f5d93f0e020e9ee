//! Weighted spatial model
//!
//! Probable nests are summarized as a 2-D Gaussian over (lat, lon): the
//! weight-normalized mean and the weighted covariance of the coordinates.
//! Candidates are drawn from that distribution.

use crate::error::{GenerationError, GenerationResult};
use crate::weighting::WeightedObservation;
use rand::Rng;
use rand_distr::{Distribution, StandardNormal};

/// Diagonal jitter keeping the covariance positive-definite
pub const DEFAULT_JITTER: f64 = 1e-5;

/// 2-D Gaussian sampling distribution over (lat, lon)
#[derive(Debug, Clone, PartialEq)]
pub struct SpatialModel {
    /// Weighted mean `[lat, lon]`
    pub mean: [f64; 2],
    /// Weighted covariance, diagonal jitter included
    pub covariance: [[f64; 2]; 2],
}

impl SpatialModel {
    /// Build the model with [`DEFAULT_JITTER`]
    pub fn build(points: &[WeightedObservation]) -> GenerationResult<Self> {
        Self::build_with_jitter(points, DEFAULT_JITTER)
    }

    /// Build the model from weighted probable nests
    ///
    /// Covariance uses reliability-weight normalization,
    /// `Σw(x-μ)(x-μ)ᵀ / (V1 - V2/V1)` with `V1 = Σw` and `V2 = Σw²`, which
    /// reduces to the unbiased sample covariance for equal weights.
    ///
    /// # Errors
    /// - `InsufficientData` if fewer than two points carry positive weight
    /// - `ZeroWeightSum` if any weight is negative or non-finite, or the
    ///   weights total zero
    pub fn build_with_jitter(points: &[WeightedObservation], jitter: f64) -> GenerationResult<Self> {
        if points.len() < 2 {
            return Err(GenerationError::InsufficientData { found: points.len() });
        }

        if points.iter().any(|p| !p.weight.is_finite() || p.weight < 0.0) {
            return Err(GenerationError::ZeroWeightSum);
        }

        let v1: f64 = points.iter().map(|p| p.weight).sum();
        if v1 <= 0.0 || !v1.is_finite() {
            return Err(GenerationError::ZeroWeightSum);
        }

        let effective = points.iter().filter(|p| p.weight > 0.0).count();
        if effective < 2 {
            return Err(GenerationError::InsufficientData { found: effective });
        }

        let mean_lat = points.iter().map(|p| p.weight * p.lat()).sum::<f64>() / v1;
        let mean_lon = points.iter().map(|p| p.weight * p.lon()).sum::<f64>() / v1;

        let v2: f64 = points.iter().map(|p| p.weight * p.weight).sum();
        let norm = v1 - v2 / v1;

        let (mut s_ll, mut s_lo, mut s_oo) = (0.0, 0.0, 0.0);
        for p in points {
            let d_lat = p.lat() - mean_lat;
            let d_lon = p.lon() - mean_lon;
            s_ll += p.weight * d_lat * d_lat;
            s_lo += p.weight * d_lat * d_lon;
            s_oo += p.weight * d_lon * d_lon;
        }

        let model = Self {
            mean: [mean_lat, mean_lon],
            covariance: [
                [s_ll / norm + jitter, s_lo / norm],
                [s_lo / norm, s_oo / norm + jitter],
            ],
        };

        tracing::debug!(
            points = points.len(),
            mean_lat = model.mean[0],
            mean_lon = model.mean[1],
            var_lat = model.covariance[0][0],
            var_lon = model.covariance[1][1],
            "Built spatial model"
        );

        Ok(model)
    }

    /// Lower-triangular Cholesky factor of the covariance
    ///
    /// Rounding can push the Schur complement slightly negative for nearly
    /// colinear inputs; it is clamped at zero.
    fn cholesky(&self) -> [[f64; 2]; 2] {
        let [[a, b], [_, c]] = self.covariance;
        let l11 = a.max(0.0).sqrt();
        let l21 = if l11 > 0.0 { b / l11 } else { 0.0 };
        let l22 = (c - l21 * l21).max(0.0).sqrt();
        [[l11, 0.0], [l21, l22]]
    }

    /// Draw one `(lat, lon)` sample
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> (f64, f64) {
        let l = self.cholesky();
        let z1: f64 = StandardNormal.sample(rng);
        let z2: f64 = StandardNormal.sample(rng);

        let lat = self.mean[0] + l[0][0] * z1;
        let lon = self.mean[1] + l[1][0] * z1 + l[1][1] * z2;
        (lat, lon)
    }
}
