//! Core types for model input and classification output

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Side length of the square model input, in pixels
pub const INPUT_SIZE: usize = 224;

/// Number of color channels fed to the model (RGB)
pub const INPUT_CHANNELS: usize = 3;

/// Number of values in an input tensor: 3 * 224 * 224
pub const INPUT_LEN: usize = INPUT_CHANNELS * INPUT_SIZE * INPUT_SIZE;

/// Model input with logical shape `[1, 3, 224, 224]`, channel-major.
///
/// Holds all red values, then all green values, then all blue values, each
/// plane in row-major pixel order. The length is always [`INPUT_LEN`].
#[derive(Debug, Clone, PartialEq)]
pub struct InputTensor {
    data: Vec<f32>,
}

impl InputTensor {
    /// Logical shape as fed to the model runtime
    pub const SHAPE: [usize; 4] = [1, INPUT_CHANNELS, INPUT_SIZE, INPUT_SIZE];

    /// Wrap an existing buffer, checking the length invariant.
    pub fn from_vec(data: Vec<f32>) -> Result<Self> {
        if data.len() != INPUT_LEN {
            return Err(Error::internal(format!(
                "input tensor must hold {} values, got {}",
                INPUT_LEN,
                data.len()
            )));
        }
        Ok(Self { data })
    }

    /// A zero-filled tensor
    pub fn zeros() -> Self {
        Self {
            data: vec![0.0; INPUT_LEN],
        }
    }

    /// Flat values
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    /// Mutable flat values. The length cannot change through a slice.
    pub fn as_mut_slice(&mut self) -> &mut [f32] {
        &mut self.data
    }

    /// Number of values (always [`INPUT_LEN`])
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Always false; present for API symmetry with `len`
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// One channel plane (0 = red, 1 = green, 2 = blue)
    pub fn channel(&self, channel: usize) -> &[f32] {
        let plane = INPUT_SIZE * INPUT_SIZE;
        &self.data[channel * plane..(channel + 1) * plane]
    }

    /// Consume into the flat buffer
    pub fn into_vec(self) -> Vec<f32> {
        self.data
    }
}

/// Result of classifying one sketch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    /// Whether the sketch looks like the target subject
    pub is_target_class: bool,

    /// Target probability as a percentage, rounded to one decimal place
    pub probability_percent: f64,

    /// Unrounded target probability in [0, 1]
    pub target_probability: f64,

    /// Raw model output, absent for fail-open results
    pub logit: Option<f32>,

    /// Latency in microseconds
    pub latency_us: u64,

    /// True when no model decision was available and the result assumes a pass
    pub fallback: bool,
}

impl ClassificationResult {
    /// The permissive result used when the classifier is unavailable.
    pub fn fail_open() -> Self {
        Self {
            is_target_class: true,
            probability_percent: 100.0,
            target_probability: 1.0,
            logit: None,
            latency_us: 0,
            fallback: true,
        }
    }

    /// Submissions that do not look like the subject go to moderator review.
    pub fn needs_moderation(&self) -> bool {
        !self.is_target_class
    }

    /// Attach a measured latency
    pub fn with_latency_us(mut self, latency_us: u64) -> Self {
        self.latency_us = latency_us;
        self
    }

    /// Human-readable label, e.g. `Fish probability: 99.3%`.
    pub fn display_label(&self, subject: &str) -> String {
        let mut chars = subject.chars();
        let subject = match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
            None => String::new(),
        };

        if self.fallback {
            format!("{subject} probability: unavailable")
        } else {
            format!("{subject} probability: {:.1}%", self.probability_percent)
        }
    }
}
