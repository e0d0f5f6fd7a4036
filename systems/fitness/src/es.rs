//! Evolution-strategy gradient step over a batch of perturbed candidates.

use adaptive_arena_core::{CandidateResult, ParameterSet, WeightBounds};

/// Variance floor protecting the z-score normalisation of degenerate batches.
pub const VARIANCE_FLOOR: f64 = 1e-8;

/// Fitness-weighted aggregation of candidate perturbations into one update.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EsUpdate {
    alpha: f64,
    sigma: f64,
    bounds: WeightBounds,
}

impl EsUpdate {
    /// Creates an update step with the provided learning rate and noise scale.
    ///
    /// `sigma` must match the scale the candidates were perturbed with.
    #[must_use]
    pub fn new(alpha: f64, sigma: f64, bounds: WeightBounds) -> Self {
        Self {
            alpha,
            sigma: if sigma > 0.0 { sigma } else { 1.0 },
            bounds,
        }
    }

    /// Learning rate.
    #[must_use]
    pub const fn alpha(&self) -> f64 {
        self.alpha
    }

    /// Perturbation scale.
    #[must_use]
    pub const fn sigma(&self) -> f64 {
        self.sigma
    }

    /// Estimated gradient per rule index.
    ///
    /// Candidates without a stored perturbation, or with a shorter one,
    /// contribute zero for the missing entries.
    #[must_use]
    pub fn gradient(&self, rule_count: usize, results: &[CandidateResult]) -> Vec<f64> {
        let mut gradient = vec![0.0; rule_count];
        if results.is_empty() {
            return gradient;
        }

        let count = results.len() as f64;
        let mean = results.iter().map(|result| result.fitness).sum::<f64>() / count;
        let variance = results
            .iter()
            .map(|result| (result.fitness - mean).powi(2))
            .sum::<f64>()
            / (count - 1.0).max(1.0);
        let deviation = variance.max(VARIANCE_FLOOR).sqrt();

        for result in results {
            let z = (result.fitness - mean) / deviation;
            let Some(perturbation) = result.perturbation.as_deref() else {
                continue;
            };
            for (slot, epsilon) in gradient.iter_mut().zip(perturbation) {
                *slot += z * epsilon;
            }
        }

        let scale = count * self.sigma;
        for slot in &mut gradient {
            *slot /= scale;
        }
        gradient
    }

    /// Applies `weight += alpha * gradient` to a copy of the base set, clamping every weight.
    #[must_use]
    pub fn apply(&self, base: &ParameterSet, results: &[CandidateResult]) -> ParameterSet {
        let gradient = self.gradient(base.len(), results);
        let mut updated = base.clone();
        for (rule, step) in updated.rules_mut().iter_mut().zip(gradient) {
            let weight = rule.weight() + self.alpha * step;
            rule.set_weight(weight, self.bounds);
        }
        updated
    }
}

impl Default for EsUpdate {
    fn default() -> Self {
        Self::new(0.6, 0.15, WeightBounds::default())
    }
}
