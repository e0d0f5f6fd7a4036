#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Candidate population generation around a base parameter set.
//!
//! Two interchangeable strategies are provided. [`BandedMutation`] scales a
//! random subset of weights by factors drawn from a symmetric band and always
//! changes at least one weight. [`EsPerturbation`] adds scaled Gaussian noise
//! to every weight and keeps the raw noise vector so an
//! evolution-strategy step can reconstruct a gradient afterwards.

use std::f64::consts::TAU;

use adaptive_arena_core::{ParameterSet, Rule, WeightBounds};
use rand::Rng;

/// Ratio between the mutation rate and the half-width of the weight band.
pub const BAND_SCALE: f64 = 0.6;

/// Narrowest half-width used when forcing a mutation.
pub const MIN_BAND_HALF_WIDTH: f64 = 0.01;

/// Shortest cooldown period a mutation may produce, in seconds.
pub const MIN_COOLDOWN_PERIOD: f64 = 0.12;

/// Longest cooldown period a mutation may produce, in seconds.
pub const MAX_COOLDOWN_PERIOD: f64 = 1.2;

/// Parameter set under evaluation, independently owned.
#[derive(Clone, Debug, PartialEq)]
pub struct Candidate {
    /// Mutated parameters.
    pub parameters: ParameterSet,
    /// Raw per-rule noise for evolution-strategy candidates.
    pub perturbation: Option<Vec<f64>>,
}

/// Multiplicative mutation of a random subset of rules.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BandedMutation {
    rate: f64,
    mutate_cooldowns: bool,
    bounds: WeightBounds,
}

impl BandedMutation {
    /// Creates a mutation strategy; the rate is clamped into `[0, 1]`.
    #[must_use]
    pub fn new(rate: f64, mutate_cooldowns: bool, bounds: WeightBounds) -> Self {
        let rate = if rate.is_nan() { 0.0 } else { rate.clamp(0.0, 1.0) };
        Self {
            rate,
            mutate_cooldowns,
            bounds,
        }
    }

    /// Per-rule mutation probability.
    #[must_use]
    pub const fn rate(&self) -> f64 {
        self.rate
    }

    fn half_width(&self) -> f64 {
        (BAND_SCALE * self.rate).max(MIN_BAND_HALF_WIDTH)
    }

    /// Produces one mutated copy of the base set that differs in at least one weight.
    pub fn mutate<R: Rng + ?Sized>(&self, base: &ParameterSet, rng: &mut R) -> ParameterSet {
        let mut parameters = base.clone();
        // Unpicked rules are copied as-is, so the band must hold before mutating.
        parameters.clamp_weights(self.bounds);
        let half_width = self.half_width();
        let mut changed = false;

        for rule in parameters.rules_mut() {
            if rng.gen::<f64>() >= self.rate {
                continue;
            }
            let before = rule.weight();
            let factor = band_factor(rng, half_width);
            rule.set_weight(before * factor, self.bounds);
            changed |= rule.weight() != before;
            if self.mutate_cooldowns {
                self.mutate_cooldown(rule, half_width / 2.0, rng);
            }
        }

        if !changed && !parameters.is_empty() {
            let index = rng.gen_range(0..parameters.len());
            let factor = band_factor(rng, half_width);
            if let Some(rule) = parameters.rules_mut().get_mut(index) {
                self.force_weight_change(rule, factor, half_width);
            }
        }
        parameters
    }

    fn mutate_cooldown<R: Rng + ?Sized>(&self, rule: &mut Rule, half_width: f64, rng: &mut R) {
        let factor = band_factor(rng, half_width);
        let period = rule.cooldown_period() * factor;
        rule.set_cooldown_period(period.clamp(MIN_COOLDOWN_PERIOD, MAX_COOLDOWN_PERIOD));
    }

    fn force_weight_change(&self, rule: &mut Rule, factor: f64, half_width: f64) {
        let before = rule.weight();
        rule.set_weight(before * factor, self.bounds);
        if rule.weight() != before {
            return;
        }
        let nudged = if before < self.bounds.ceiling() {
            before * (1.0 + half_width)
        } else {
            before * (1.0 - half_width)
        };
        rule.set_weight(nudged, self.bounds);
    }
}

/// Additive Gaussian perturbation of every rule weight.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EsPerturbation {
    sigma: f64,
    bounds: WeightBounds,
}

impl EsPerturbation {
    /// Creates a perturbation strategy with the provided noise scale.
    #[must_use]
    pub const fn new(sigma: f64, bounds: WeightBounds) -> Self {
        Self { sigma, bounds }
    }

    /// Noise scale.
    #[must_use]
    pub const fn sigma(&self) -> f64 {
        self.sigma
    }

    /// Produces one perturbed copy and the noise that was added to each weight.
    pub fn perturb<R: Rng + ?Sized>(&self, base: &ParameterSet, rng: &mut R) -> Candidate {
        let mut parameters = base.clone();
        let mut perturbation = Vec::with_capacity(parameters.len());
        for rule in parameters.rules_mut() {
            let epsilon = standard_normal(rng) * self.sigma;
            perturbation.push(epsilon);
            let weight = rule.weight() + epsilon;
            rule.set_weight(weight, self.bounds);
        }
        Candidate {
            parameters,
            perturbation: Some(perturbation),
        }
    }
}

/// Interchangeable candidate generation strategies.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Strategy {
    /// Banded multiplicative mutation.
    Banded(BandedMutation),
    /// Gaussian evolution-strategy perturbation.
    Evolution(EsPerturbation),
}

/// Builds candidate populations from a base parameter set.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PopulationGenerator {
    strategy: Strategy,
}

impl PopulationGenerator {
    /// Creates a generator driven by the provided strategy.
    #[must_use]
    pub const fn new(strategy: Strategy) -> Self {
        Self { strategy }
    }

    /// Strategy used to build candidates.
    #[must_use]
    pub const fn strategy(&self) -> Strategy {
        self.strategy
    }

    /// Returns exactly `count` independently owned candidates.
    pub fn generate<R: Rng + ?Sized>(
        &self,
        base: &ParameterSet,
        count: usize,
        rng: &mut R,
    ) -> Vec<Candidate> {
        (0..count)
            .map(|_| match &self.strategy {
                Strategy::Banded(mutation) => Candidate {
                    parameters: mutation.mutate(base, rng),
                    perturbation: None,
                },
                Strategy::Evolution(perturbation) => perturbation.perturb(base, rng),
            })
            .collect()
    }
}

fn band_factor<R: Rng + ?Sized>(rng: &mut R, half_width: f64) -> f64 {
    1.0 - half_width + 2.0 * half_width * rng.gen::<f64>()
}

fn open_unit<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    loop {
        let value = rng.gen::<f64>();
        if value > 0.0 {
            return value;
        }
    }
}

/// Box-Muller transform over two open-interval uniforms.
fn standard_normal<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    let u = open_unit(rng);
    let v = open_unit(rng);
    (-2.0 * u.ln()).sqrt() * (TAU * v).cos()
}
