//! Plain-data envelopes exchanged between the coordinator and execution units.
//!
//! Both directions are serialised with `bincode`, so a unit never shares a
//! reference with the caller and a task carries nothing but data.

use std::fmt;

use adaptive_arena_core::{
    CandidateResult, ParameterSet, Snapshot, TelegraphIntensity, WeightBounds,
};
use adaptive_arena_system_fitness::{FitnessFunction, FitnessWeights};
use adaptive_arena_system_rule_evaluator::RuleEvaluator;
use adaptive_arena_system_simulation::SimulationEngine;
use adaptive_arena_system_snapshot::SnapshotService;
use serde::{Deserialize, Serialize};

/// Monotonically increasing identifier pairing a dispatched replay with its reply.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CorrelationId(u64);

impl CorrelationId {
    /// Wraps a raw identifier.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Raw identifier value.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }

    pub(crate) const fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Scoring and replay settings shipped with every task.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ReplaySettings {
    /// Objective weights used to score the replay.
    pub fitness_weights: FitnessWeights,
    /// Weight band enforced when a boss phase re-seeds weights.
    pub bounds: WeightBounds,
    /// Telegraph intensity the replayed evaluator runs with.
    pub intensity: TelegraphIntensity,
}

/// Outbound task body; the correlation id travels beside it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub(crate) struct ReplayTask {
    pub(crate) snapshot: Snapshot,
    pub(crate) parameters: ParameterSet,
    pub(crate) perturbation: Option<Vec<f64>>,
    pub(crate) settings: ReplaySettings,
}

impl ReplayTask {
    /// Restores the snapshot under the candidate, replays it and scores the log.
    ///
    /// Candidate weights are pulled into the configured band first.
    pub(crate) fn run(mut self) -> CandidateResult {
        self.parameters.clamp_weights(self.settings.bounds);
        let engine = SimulationEngine::new(
            RuleEvaluator::new(self.settings.intensity),
            self.settings.bounds,
        );
        let mut state = SnapshotService::restore(&self.snapshot, self.parameters.clone());
        let log = engine.replay(&mut state);
        let fitness = FitnessFunction::new(self.settings.fitness_weights).score(&log);
        CandidateResult {
            parameters: self.parameters,
            fitness,
            fairness: FitnessFunction::fairness(&log),
            log,
            perturbation: self.perturbation,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub(crate) enum ReplayOutcome {
    Completed(CandidateResult),
    Failed { reason: String },
}

/// Inbound reply from an execution unit.
///
/// The id travels in the clear so a reply can be matched, or discarded, before
/// its `bincode` encoded [`ReplayOutcome`] payload is decoded.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct UnitReply {
    pub(crate) correlation_id: CorrelationId,
    pub(crate) payload: Vec<u8>,
}

impl UnitReply {
    pub(crate) fn decode(&self) -> Result<ReplayOutcome, bincode::Error> {
        bincode::deserialize(&self.payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use adaptive_arena_core::{
        Archetype, ArenaLayout, DVec2, EnemyState, PlayerState, Rule, WorldBounds,
    };

    #[test]
    fn correlation_ids_advance_monotonically() {
        let first = CorrelationId::new(7);
        assert!(first.next() > first);
        assert_eq!(first.next().get(), 8);
        assert_eq!(first.to_string(), "#7");
    }

    #[test]
    fn failed_replies_survive_the_wire() {
        let outcome = ReplayOutcome::Failed {
            reason: "boom".into(),
        };
        let reply = UnitReply {
            correlation_id: CorrelationId::new(3),
            payload: bincode::serialize(&outcome).expect("serialize"),
        };
        assert_eq!(reply.decode().expect("decode"), outcome);
    }

    #[test]
    fn garbled_payloads_fail_to_decode() {
        let reply = UnitReply {
            correlation_id: CorrelationId::new(4),
            payload: vec![0xff; 3],
        };
        assert!(reply.decode().is_err());
    }

    #[test]
    fn replayed_candidates_are_pulled_into_the_band() {
        let layout = ArenaLayout {
            seed: 1,
            bounds: WorldBounds::new(100.0, 100.0),
            hazards: Vec::new(),
            obstacles: Vec::new(),
        };
        let enemy = EnemyState::new(DVec2::ONE, Archetype::Grunt, ParameterSet::default());
        let player = PlayerState::new(DVec2::ZERO);
        let bounds = WeightBounds::with_ceiling(0.5);
        let task = ReplayTask {
            snapshot: Snapshot::new(layout, player, enemy, Vec::new(), 1, 0.01),
            parameters: ParameterSet::new(vec![Rule::new("Approach", 0.9, 0.15)]),
            perturbation: None,
            settings: ReplaySettings {
                bounds,
                ..ReplaySettings::default()
            },
        };
        let result = task.run();
        assert!(result.parameters.within(bounds));
        assert_eq!(result.parameters.rules()[0].weight(), 0.5);
    }
}
