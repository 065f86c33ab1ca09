//! Quine detection over a chat history.
//!
//! The [`ConvergenceChecker`] scans the history at increasing strides. For each stride `s` in
//! `1..=max_step_distance` it walks the history backward from the newest message taking every
//! `s`-th message, keeps the first `min_len` of that walk, and asks the configured
//! [`SimilarityMetric`] whether they all agree. The first stride that agrees wins, so the
//! smallest period explaining the repetition is the one reported.
//!
//! ```text
//! history:  Hi  A  B  A  B  A
//! stride 1:                B  A   -> [A, B, A]  (newest first)
//! stride 2:        A     A     A  -> [A, A, A]  converged at step 2
//! ```
//!
//! A stride that cannot produce `min_len` samples is skipped, so a history shorter than
//! `min_len` never converges.

use crate::quineroom::checks::SimilarityMetric;
use crate::quineroom::client_wrapper::ClientError;
use crate::quineroom::config::ConfigError;
use crate::quineroom::message::Message;

/// Decides whether a conversation has collapsed into a repeating pattern.
#[derive(Debug, Clone)]
pub struct ConvergenceChecker {
    min_len: usize,
    max_step_distance: usize,
    metric: SimilarityMetric,
}

impl ConvergenceChecker {
    /// Build a checker. `min_len` must be at least 2 and `max_step_distance` at least 1.
    pub fn new(
        min_len: usize,
        max_step_distance: usize,
        metric: SimilarityMetric,
    ) -> Result<Self, ConfigError> {
        if min_len < 2 {
            return Err(ConfigError::InvalidMinLength(min_len));
        }
        if max_step_distance < 1 {
            return Err(ConfigError::InvalidStepDistance(max_step_distance));
        }
        Ok(Self {
            min_len,
            max_step_distance,
            metric,
        })
    }

    pub fn min_len(&self) -> usize {
        self.min_len
    }

    pub fn max_step_distance(&self) -> usize {
        self.max_step_distance
    }

    pub fn metric(&self) -> &SimilarityMetric {
        &self.metric
    }

    /// Returns `true` if the history has converged at any stride.
    pub async fn check(&self, history: &[Message]) -> Result<bool, ClientError> {
        Ok(self.converged_step(history).await?.is_some())
    }

    /// The smallest stride at which the history has converged, if any.
    pub async fn converged_step(&self, history: &[Message]) -> Result<Option<usize>, ClientError> {
        for step_distance in 1..=self.max_step_distance {
            let Some(window) = stride_window(history, step_distance, self.min_len) else {
                continue;
            };
            if self.metric.check(&window).await? {
                log::debug!(
                    "Converged at step distance {} with {} on {} messages",
                    step_distance,
                    self.metric.name(),
                    history.len()
                );
                return Ok(Some(step_distance));
            }
        }
        Ok(None)
    }
}

/// The `min_len` most recent messages sampled every `step_distance` messages, newest first.
///
/// `None` when the history is too short to provide `min_len` samples at this stride.
pub fn stride_window(
    history: &[Message],
    step_distance: usize,
    min_len: usize,
) -> Option<Vec<&Message>> {
    let window: Vec<&Message> = history
        .iter()
        .rev()
        .step_by(step_distance.max(1))
        .take(min_len)
        .collect();
    (window.len() >= min_len).then_some(window)
}
