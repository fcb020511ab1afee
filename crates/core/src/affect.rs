//! Affective State
//!
//! Snapshot of the agent's internal state at generation time, and the
//! 6-dimensional vector used for state-similarity search.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

/// Number of dimensions in a state vector.
pub const STATE_DIMENSIONS: usize = 6;

/// A state vector: (temperature, destiny, pain, tension, debt, alpha).
pub type StateVector = [f64; STATE_DIMENSIONS];

/// Affective state attached to every stored turn.
///
/// Any field missing from a JSON object falls back to its default:
/// scalars to `0.0`, `velocity` to `1`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AffectState {
    pub temperature: f64,
    pub destiny: f64,
    pub pain: f64,
    pub tension: f64,
    pub debt: f64,
    pub velocity: i64,
    pub alpha: f64,
}

impl Default for AffectState {
    fn default() -> Self {
        Self {
            temperature: 0.0,
            destiny: 0.0,
            pain: 0.0,
            tension: 0.0,
            debt: 0.0,
            velocity: 1,
            alpha: 0.0,
        }
    }
}

impl AffectState {
    /// Project onto the similarity vector. `velocity` is not part of it.
    pub fn to_vector(&self) -> StateVector {
        [
            self.temperature,
            self.destiny,
            self.pain,
            self.tension,
            self.debt,
            self.alpha,
        ]
    }

    /// Reject non-finite scalars, which the store cannot round-trip.
    pub fn validate(&self) -> CoreResult<()> {
        let named = [
            ("temperature", self.temperature),
            ("destiny", self.destiny),
            ("pain", self.pain),
            ("tension", self.tension),
            ("debt", self.debt),
            ("alpha", self.alpha),
        ];
        for (name, value) in named {
            if !value.is_finite() {
                return Err(CoreError::validation(format!(
                    "{} must be a finite number, got {}",
                    name, value
                )));
            }
        }
        Ok(())
    }
}

/// Cosine distance `1 - (a·b)/(‖a‖‖b‖)`. `0.0` means identical direction.
///
/// Returns `1.0` when the lengths differ or either vector has zero norm.
/// Each vector is scaled by its largest magnitude first, so very large or
/// very small finite components neither overflow nor underflow.
pub fn cosine_distance(a: &[f64], b: &[f64]) -> f64 {
    if a.len() != b.len() {
        return 1.0;
    }

    let scale_a = max_magnitude(a);
    let scale_b = max_magnitude(b);
    if scale_a == 0.0 || scale_b == 0.0 || !scale_a.is_finite() || !scale_b.is_finite() {
        return 1.0;
    }

    let mut dot = 0.0;
    let mut norm_a = 0.0;
    let mut norm_b = 0.0;
    for (x, y) in a.iter().zip(b.iter()) {
        let (x, y) = (x / scale_a, y / scale_b);
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    (1.0 - dot / (norm_a.sqrt() * norm_b.sqrt())).clamp(0.0, 2.0)
}

fn max_magnitude(v: &[f64]) -> f64 {
    v.iter().fold(0.0_f64, |max, x| max.max(x.abs()))
}
