#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! External configuration supplier for the adaptation loop.
//!
//! Every loader in this crate degrades instead of failing: an unreadable or
//! invalid configuration yields the built-in defaults, a malformed rule
//! override is ignored, and best-performer persistence errors are logged and
//! swallowed. The simulation core never observes any of these failures.

pub mod overrides;
pub mod store;

use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use adaptive_arena_core::{Archetype, TelegraphIntensity, WeightBounds, WEIGHT_FLOOR};
use adaptive_arena_system_fitness::FitnessWeights;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use overrides::{default_rules, RuleOverrides};
pub use store::{BestPerformer, BestPerformerStore};

/// Errors raised while loading configuration documents.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read {path}: {source}")]
    Read {
        /// File that failed to load.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },
    /// The TOML document could not be parsed.
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
    /// A value is outside its accepted range.
    #[error("invalid value for `{field}`: {reason}")]
    Invalid {
        /// Offending key.
        field: &'static str,
        /// Why the value was rejected.
        reason: String,
    },
}

/// Candidate generation strategy selected for each adaptation cycle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    /// Banded multiplicative mutation with fairness-gated top-1 selection.
    #[default]
    Banded,
    /// Gaussian perturbation followed by an evolution-strategy update.
    Evolution,
}

/// Tunables read by the live loop at evaluation time.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdaptationConfig {
    /// Population size after ordinary encounters.
    pub sim_count_normal: usize,
    /// Population size after high-stakes encounters.
    pub sim_count_boss: usize,
    /// Largest rule list accepted from an override document.
    pub max_rules_per_archetype: usize,
    /// Per-rule mutation probability.
    pub mutation_rate: f64,
    /// Whether banded mutation also perturbs cooldown periods.
    pub mutate_cooldowns: bool,
    /// Objective weights applied to replay metrics.
    pub fitness_weights: FitnessWeights,
    /// Largest fairness value a selected winner may carry.
    pub fairness_max: f64,
    /// Upper bound of the weight band.
    pub weight_ceiling: f64,
    /// Adaptation cycles run between two encounters.
    pub adapt_budget_per_room: u32,
    /// Multiplier applied to the mutation rate during the early game.
    pub early_game_learning_multiplier: f64,
    /// Encounters counted as early game.
    pub early_game_encounters: u32,
    /// Noise scale of evolution-strategy perturbations.
    pub es_sigma: f64,
    /// Learning rate of the evolution-strategy update.
    pub es_alpha: f64,
    /// Candidate generation strategy.
    pub strategy: StrategyKind,
    /// Telegraph intensity.
    pub telegraph: TelegraphIntensity,
    /// Optional per-batch deadline in milliseconds.
    pub batch_timeout_ms: Option<u64>,
    /// Optional device memory hint, in gigabytes.
    pub device_memory_gb: Option<f64>,
}

impl Default for AdaptationConfig {
    fn default() -> Self {
        Self {
            sim_count_normal: 32,
            sim_count_boss: 96,
            max_rules_per_archetype: 16,
            mutation_rate: 0.25,
            mutate_cooldowns: false,
            fitness_weights: FitnessWeights::default(),
            fairness_max: 0.02,
            weight_ceiling: 2.0,
            adapt_budget_per_room: 3,
            early_game_learning_multiplier: 0.5,
            early_game_encounters: 3,
            es_sigma: 0.15,
            es_alpha: 0.6,
            strategy: StrategyKind::Banded,
            telegraph: TelegraphIntensity::Medium,
            batch_timeout_ms: None,
            device_memory_gb: None,
        }
    }
}

impl AdaptationConfig {
    /// Parses and validates a TOML document; absent keys take their defaults.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates the file at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    /// Loads the file when provided, falling back to defaults on any failure.
    #[must_use]
    pub fn load_or_default(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::default();
        };
        match Self::load(path) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "loaded adaptation config");
                config
            }
            Err(err) => {
                tracing::warn!(%err, "configuration unavailable, using defaults");
                Self::default()
            }
        }
    }

    /// Rejects values the adaptation loop cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.mutation_rate > 0.0 && self.mutation_rate <= 1.0) {
            return Err(invalid("mutation_rate", "must lie in (0, 1]"));
        }
        if !(self.weight_ceiling.is_finite() && self.weight_ceiling > WEIGHT_FLOOR) {
            return Err(invalid(
                "weight_ceiling",
                format!("must be finite and above {WEIGHT_FLOOR}"),
            ));
        }
        if self.sim_count_normal == 0 {
            return Err(invalid("sim_count_normal", "must be at least 1"));
        }
        if self.sim_count_boss == 0 {
            return Err(invalid("sim_count_boss", "must be at least 1"));
        }
        if self.max_rules_per_archetype == 0 {
            return Err(invalid("max_rules_per_archetype", "must be at least 1"));
        }
        if !(self.es_sigma.is_finite() && self.es_sigma > 0.0) {
            return Err(invalid("es_sigma", "must be positive"));
        }
        if !self.es_alpha.is_finite() {
            return Err(invalid("es_alpha", "must be finite"));
        }
        if !(self.early_game_learning_multiplier.is_finite()
            && self.early_game_learning_multiplier > 0.0)
        {
            return Err(invalid("early_game_learning_multiplier", "must be positive"));
        }
        if self.fairness_max.is_nan() {
            return Err(invalid("fairness_max", "must be a number"));
        }
        Ok(())
    }

    /// Population size for an encounter against `archetype`.
    #[must_use]
    pub const fn population_for(&self, archetype: Archetype) -> usize {
        if archetype.is_high_stakes() {
            self.sim_count_boss
        } else {
            self.sim_count_normal
        }
    }

    /// Mutation rate for the encounter with the given 1-based number.
    #[must_use]
    pub fn mutation_rate_for(&self, encounter: u32) -> f64 {
        let rate = if encounter <= self.early_game_encounters {
            self.mutation_rate * self.early_game_learning_multiplier
        } else {
            self.mutation_rate
        };
        rate.clamp(0.0, 1.0)
    }

    /// Weight band derived from the configured ceiling.
    #[must_use]
    pub fn weight_bounds(&self) -> WeightBounds {
        WeightBounds::with_ceiling(self.weight_ceiling)
    }

    /// Per-batch deadline, if one is configured.
    #[must_use]
    pub fn batch_timeout(&self) -> Option<Duration> {
        self.batch_timeout_ms.map(Duration::from_millis)
    }
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_documents_keep_remaining_defaults() {
        let config = AdaptationConfig::from_toml_str(
            r#"
            mutation_rate = 0.4
            strategy = "evolution"
            telegraph = "high"

            [fitness_weights]
            dps = 2.0
            "#,
        )
        .expect("valid config");
        assert_eq!(config.mutation_rate, 0.4);
        assert_eq!(config.strategy, StrategyKind::Evolution);
        assert_eq!(config.telegraph, TelegraphIntensity::High);
        assert_eq!(config.fitness_weights.dps, 2.0);
        assert_eq!(config.fitness_weights.unfair, -2.0);
        assert_eq!(config.sim_count_boss, 96);
        assert_eq!(config.batch_timeout(), None);
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        let err = AdaptationConfig::from_toml_str("mutation_rate = 0.0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "mutation_rate", .. }));
        let err = AdaptationConfig::from_toml_str("weight_ceiling = 0.01").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "weight_ceiling", .. }));
        let err = AdaptationConfig::from_toml_str("weight_ceiling = 0.05").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "weight_ceiling", .. }));
        assert!(AdaptationConfig::from_toml_str("weight_ceiling = 0.06").is_ok());
        let err = AdaptationConfig::from_toml_str("sim_count_normal = 0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "sim_count_normal", .. }));
    }

    #[test]
    fn unparsable_documents_report_parse_errors() {
        let err = AdaptationConfig::from_toml_str("mutation_rate = [").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn early_game_dampens_mutation() {
        let config = AdaptationConfig::default();
        assert_eq!(config.mutation_rate_for(1), 0.125);
        assert_eq!(config.mutation_rate_for(3), 0.125);
        assert_eq!(config.mutation_rate_for(4), 0.25);
    }

    #[test]
    fn high_stakes_encounters_use_larger_populations() {
        let config = AdaptationConfig::default();
        assert_eq!(config.population_for(Archetype::Boss), 96);
        assert_eq!(config.population_for(Archetype::Ranged), 32);
        assert_eq!(config.weight_bounds().ceiling(), 2.0);
    }
}
