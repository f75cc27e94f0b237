//! Decision policy: raw logit to classification result

use doodletank_core::{ClassificationResult, Error, Result};

/// Target probability at or above which a sketch counts as the subject
pub const DEFAULT_THRESHOLD: f64 = 0.60;

/// Standard logistic sigmoid
#[inline]
pub fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// Round to one decimal place for display.
///
/// Decides on the exact binary value of `x`, with ties away from zero, the
/// way `Number.prototype.toFixed(1)` does. `0.15` is stored just below
/// one and a half tenths, so it rounds to `0.1`; `0.25` is an exact tie
/// and rounds to `0.3`.
pub fn round_one_decimal(x: f64) -> f64 {
    if !x.is_finite() {
        return x;
    }
    let a = x.abs();

    // `a * 10` may itself round across an integer; fused ops compare
    // against the unrounded product.
    let mut tenths = (a * 10.0).floor();
    if a.mul_add(10.0, -tenths) < 0.0 {
        tenths -= 1.0;
    } else if a.mul_add(10.0, -(tenths + 1.0)) >= 0.0 {
        tenths += 1.0;
    }
    if a.mul_add(10.0, -(tenths + 0.5)) >= 0.0 {
        tenths += 1.0;
    }
    (tenths / 10.0).copysign(x)
}

/// Turns a raw model logit into a pass/flag decision.
///
/// The doodle models were trained with inverted labels: the subject is
/// class 0 and "not the subject" is class 1. The sigmoid of the logit is
/// therefore the probability of *not* being the subject, and the target
/// probability is its complement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassificationPolicy {
    threshold: f64,
}

impl ClassificationPolicy {
    /// Create a policy with a custom threshold in (0, 1).
    pub fn new(threshold: f64) -> Result<Self> {
        if !(threshold > 0.0 && threshold < 1.0) {
            return Err(Error::config(format!(
                "decision threshold must be in (0, 1), got {threshold}"
            )));
        }
        Ok(Self { threshold })
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Apply sigmoid, label inversion, and threshold to a raw logit.
    pub fn decide(&self, logit: f32) -> ClassificationResult {
        let prob = sigmoid(logit as f64);
        let target_probability = 1.0 - prob;

        ClassificationResult {
            is_target_class: target_probability >= self.threshold,
            probability_percent: round_one_decimal(target_probability * 100.0),
            target_probability,
            logit: Some(logit),
            latency_us: 0,
            fallback: false,
        }
    }
}

impl Default for ClassificationPolicy {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
        }
    }
}
