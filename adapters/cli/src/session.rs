//! Headless live loop: fight an encounter, adapt between encounters, repeat.

use std::collections::BTreeMap;

use adaptive_arena_config::{
    AdaptationConfig, BestPerformer, BestPerformerStore, RuleOverrides, StrategyKind,
};
use adaptive_arena_core::{
    AdaptationSummary, Archetype, DeterministicRng, EnemyState, InputRecorder, ParameterSet,
    PlayerState, Snapshot, DEFAULT_FIXED_DT, INPUT_HISTORY_CAPACITY, SUMMARY_CHANGE_LIMIT,
};
use adaptive_arena_system_evaluation::{
    DeviceProfile, EvaluationCoordinator, EvaluationError, EvaluationSettings, ExecutionPool,
    ReplaySettings,
};
use adaptive_arena_system_fitness::EsUpdate;
use adaptive_arena_system_population::{
    BandedMutation, EsPerturbation, PopulationGenerator, Strategy,
};
use adaptive_arena_system_rule_evaluator::RuleEvaluator;
use adaptive_arena_system_simulation::SimulationEngine;
use adaptive_arena_system_snapshot::{LiveFrame, SnapshotService};
use adaptive_arena_world::SimulationState;

use crate::{pilot::GhostPilot, rooms::Room};

/// How an encounter ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum EncounterEnd {
    TimedOut,
    PlayerDefeated,
    EnemyDefeated,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase {
    Fighting,
    BetweenEncounters,
}

/// Outcome of one encounter and of the adaptation that followed it.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct EncounterReport {
    pub(crate) room: u32,
    pub(crate) archetype: Archetype,
    pub(crate) end: EncounterEnd,
    pub(crate) ticks: u32,
    pub(crate) cycles: u32,
    pub(crate) best_fitness: Option<f64>,
    pub(crate) summary: AdaptationSummary,
}

struct Encounter {
    state: SimulationState,
    recorder: InputRecorder,
    end: EncounterEnd,
    ticks: u32,
}

struct Adaptation {
    cycles: u32,
    best_fitness: Option<f64>,
    summary: AdaptationSummary,
}

/// Owns the evaluation pool and the parameters installed per archetype.
pub(crate) struct Session {
    config: AdaptationConfig,
    overrides: RuleOverrides,
    store: Option<BestPerformerStore>,
    coordinator: EvaluationCoordinator,
    device: DeviceProfile,
    snapshots: SnapshotService,
    seed: u32,
    rng: DeterministicRng,
    pilot: GhostPilot,
    installed: BTreeMap<Archetype, ParameterSet>,
    phase: Phase,
    last_snapshot: Option<Snapshot>,
}

impl Session {
    /// Starts the evaluation pool sized for the current device.
    pub(crate) fn new(
        config: AdaptationConfig,
        overrides: RuleOverrides,
        store: Option<BestPerformerStore>,
        seed: u32,
    ) -> Result<Self, EvaluationError> {
        let device = DeviceProfile::detect(config.device_memory_gb);
        let pool = ExecutionPool::new(device.pool_size())?;
        let coordinator = EvaluationCoordinator::new(pool, evaluation_settings(&config));
        tracing::info!(
            seed,
            cores = device.logical_cores(),
            scale = device.scale(),
            strategy = ?config.strategy,
            "session started"
        );
        Ok(Self {
            config,
            overrides,
            store,
            coordinator,
            device,
            snapshots: SnapshotService::default(),
            seed,
            rng: DeterministicRng::new(seed),
            pilot: GhostPilot::new(u64::from(seed)),
            installed: BTreeMap::new(),
            phase: Phase::BetweenEncounters,
            last_snapshot: None,
        })
    }

    /// Snapshot captured at the end of the latest encounter.
    pub(crate) fn last_snapshot(&self) -> Option<&Snapshot> {
        self.last_snapshot.as_ref()
    }

    /// Parameters the next actor of `archetype` will fight with, inside the configured band.
    pub(crate) fn parameters_for(&self, archetype: Archetype) -> ParameterSet {
        let mut parameters = self
            .installed
            .get(&archetype)
            .cloned()
            .unwrap_or_else(|| self.overrides.rules_for(archetype));
        parameters.clamp_weights(self.config.weight_bounds());
        parameters
    }

    /// Plays rooms `1..=encounters` back to back.
    pub(crate) fn play(&mut self, encounters: u32) -> Vec<EncounterReport> {
        (1..=encounters).map(|room| self.play_room(room)).collect()
    }

    fn play_room(&mut self, id: u32) -> EncounterReport {
        let room = Room::generate(id, self.seed);
        let archetype = room.archetype();
        let base = self.parameters_for(archetype);

        let encounter = self.fight(&room, base.clone());
        tracing::info!(
            room = id,
            archetype = archetype.name(),
            end = ?encounter.end,
            ticks = encounter.ticks,
            "encounter finished"
        );

        let snapshot = self.snapshots.capture(LiveFrame {
            layout: &encounter.state.layout,
            player: &encounter.state.player,
            enemy: &encounter.state.enemy,
            recorder: &encounter.recorder,
        });
        let adaptation = self.adapt(id, archetype, &snapshot, &base);
        self.last_snapshot = Some(snapshot);

        EncounterReport {
            room: id,
            archetype,
            end: encounter.end,
            ticks: encounter.ticks,
            cycles: adaptation.cycles,
            best_fitness: adaptation.best_fitness,
            summary: adaptation.summary,
        }
    }

    fn fight(&mut self, room: &Room, parameters: ParameterSet) -> Encounter {
        let engine = SimulationEngine::new(
            RuleEvaluator::new(self.config.telegraph),
            self.config.weight_bounds(),
        );
        let player = PlayerState::new(Room::player_spawn());
        let enemy = EnemyState::new(Room::enemy_spawn(), room.archetype(), parameters);
        let mut state = SimulationState::new(
            room.layout.clone(),
            player,
            enemy,
            Vec::new(),
            0,
            DEFAULT_FIXED_DT,
        );
        let mut recorder = InputRecorder::with_capacity(INPUT_HISTORY_CAPACITY);
        let mut end = EncounterEnd::TimedOut;
        let mut ticks = 0;

        self.phase = Phase::Fighting;
        while self.phase == Phase::Fighting {
            let input = self.pilot.next_input(&state.player, &state.enemy);
            recorder.push(input);
            engine.step(&mut state, DEFAULT_FIXED_DT, input);
            ticks += 1;
            if let Some(reason) = encounter_end(&state, room.duration) {
                end = reason;
                self.phase = Phase::BetweenEncounters;
            }
        }

        Encounter {
            state,
            recorder,
            end,
            ticks,
        }
    }

    /// Runs up to the configured number of adaptation cycles and installs the result.
    fn adapt(
        &mut self,
        room: u32,
        archetype: Archetype,
        snapshot: &Snapshot,
        base: &ParameterSet,
    ) -> Adaptation {
        self.coordinator.set_settings(evaluation_settings(&self.config));
        let count = self.device.population(self.config.population_for(archetype));
        let generator = self.generator(room);
        let mut current = base.clone();
        let mut best_fitness = None;
        let mut cycles = 0;

        for cycle in 0..self.config.adapt_budget_per_room {
            let candidates = generator.generate(&current, count, &mut self.rng);
            match self.coordinator.evaluate(snapshot, &current, candidates) {
                Ok(outcome) => {
                    best_fitness = Some(outcome.winner().fitness);
                    current = match self.config.strategy {
                        StrategyKind::Banded => outcome.winner().parameters.clone(),
                        StrategyKind::Evolution => {
                            self.es_update().apply(&current, outcome.ranked())
                        }
                    };
                    cycles += 1;
                }
                Err(err) => {
                    tracing::warn!(
                        room,
                        cycle,
                        %err,
                        "adaptation failed, keeping current parameters"
                    );
                    break;
                }
            }
        }

        let summary = AdaptationSummary::between(base, &current, SUMMARY_CHANGE_LIMIT);
        for change in &summary.changes {
            tracing::info!(
                room,
                rule = %change.rule_name,
                before = change.before,
                after = change.after,
                delta = change.weight_delta,
                "codex"
            );
        }
        if let (Some(fitness), Some(store)) = (best_fitness, &self.store) {
            store.record(
                room,
                BestPerformer {
                    archetype,
                    fitness,
                    parameters: current.clone(),
                },
            );
        }
        let _ = self.installed.insert(archetype, current);

        Adaptation {
            cycles,
            best_fitness,
            summary,
        }
    }

    fn generator(&self, room: u32) -> PopulationGenerator {
        let bounds = self.config.weight_bounds();
        let strategy = match self.config.strategy {
            StrategyKind::Banded => Strategy::Banded(BandedMutation::new(
                self.config.mutation_rate_for(room),
                self.config.mutate_cooldowns,
                bounds,
            )),
            StrategyKind::Evolution => {
                Strategy::Evolution(EsPerturbation::new(self.config.es_sigma, bounds))
            }
        };
        PopulationGenerator::new(strategy)
    }

    fn es_update(&self) -> EsUpdate {
        EsUpdate::new(
            self.config.es_alpha,
            self.config.es_sigma,
            self.config.weight_bounds(),
        )
    }
}

fn evaluation_settings(config: &AdaptationConfig) -> EvaluationSettings {
    EvaluationSettings {
        replay: ReplaySettings {
            fitness_weights: config.fitness_weights,
            bounds: config.weight_bounds(),
            intensity: config.telegraph,
        },
        fairness_max: config.fairness_max,
        timeout: config.batch_timeout(),
    }
}

fn encounter_end(state: &SimulationState, duration: f64) -> Option<EncounterEnd> {
    if state.player.hp <= 0.0 {
        Some(EncounterEnd::PlayerDefeated)
    } else if state.enemy.hp <= 0.0 {
        Some(EncounterEnd::EnemyDefeated)
    } else if state.elapsed >= duration {
        Some(EncounterEnd::TimedOut)
    } else {
        None
    }
}
