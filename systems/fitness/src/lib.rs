#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Scalar scoring of replay metrics and the evolution-strategy update step.

pub mod es;

use adaptive_arena_core::PerformanceLog;
use serde::{Deserialize, Serialize};

pub use es::EsUpdate;

/// Per-objective weights applied to a [`PerformanceLog`].
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FitnessWeights {
    /// Weight of damage dealt to the player.
    pub dps: f64,
    /// Weight of time spent in the control band.
    pub control: f64,
    /// Weight of the dash economy accumulator.
    pub economy: f64,
    /// Weight of heading jitter; negative to discourage twitching.
    pub jitter: f64,
    /// Weight of unfairness flags; negative to discourage degenerate builds.
    pub unfair: f64,
}

impl Default for FitnessWeights {
    fn default() -> Self {
        Self {
            dps: 1.0,
            control: 0.6,
            economy: 0.3,
            jitter: -0.5,
            unfair: -2.0,
        }
    }
}

/// Weighted multi-objective score.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FitnessFunction {
    weights: FitnessWeights,
}

impl FitnessFunction {
    /// Creates a scorer using the provided weights.
    #[must_use]
    pub const fn new(weights: FitnessWeights) -> Self {
        Self { weights }
    }

    /// Weights used by the scorer.
    #[must_use]
    pub const fn weights(&self) -> FitnessWeights {
        self.weights
    }

    /// Scores the log; pure and deterministic.
    #[must_use]
    pub fn score(&self, log: &PerformanceLog) -> f64 {
        let weights = &self.weights;
        weights.dps * log.dps
            + weights.control * log.control_time
            + weights.economy * log.economy
            + weights.jitter * log.jitter
            + weights.unfair * log.unfair_flags
    }

    /// Unfairness penalty reported alongside the score.
    #[must_use]
    pub fn fairness(log: &PerformanceLog) -> f64 {
        log.unfair_flags
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_weights_favour_damage_and_punish_unfairness() {
        let scorer = FitnessFunction::default();
        let log = PerformanceLog {
            dps: 10.0,
            control_time: 2.0,
            jitter: 1.0,
            economy: -0.3,
            unfair_flags: 0.5,
        };
        let expected = 10.0 + 0.6 * 2.0 + 0.3 * -0.3 - 0.5 * 1.0 - 2.0 * 0.5;
        assert!((scorer.score(&log) - expected).abs() < 1e-12);
        assert_eq!(FitnessFunction::fairness(&log), 0.5);
    }

    #[test]
    fn empty_log_scores_zero() {
        assert_eq!(FitnessFunction::default().score(&PerformanceLog::default()), 0.0);
    }

    #[test]
    fn custom_weights_are_honoured() {
        let scorer = FitnessFunction::new(FitnessWeights {
            dps: 0.0,
            control: 1.0,
            economy: 0.0,
            jitter: 0.0,
            unfair: 0.0,
        });
        let log = PerformanceLog {
            dps: 100.0,
            control_time: 1.5,
            ..PerformanceLog::default()
        };
        assert_eq!(scorer.score(&log), 1.5);
    }
}
