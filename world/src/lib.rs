#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Mutable encounter state advanced by headless replays.
//!
//! The world crate owns everything a single replay mutates: actor kinematics,
//! hazard phases, the pooled projectile arena, and the accumulating
//! [`PerformanceLog`]. Geometry helpers live in [`physics`] and hazard rules in
//! [`hazards`]; both are pure functions so the simulation systems can compose
//! them without hidden state.

pub mod hazards;
pub mod physics;
mod projectiles;

use adaptive_arena_core::{
    ArenaLayout, DVec2, EnemyState, InputBits, PerformanceLog, PlayerState,
};

pub use projectiles::{
    Owner, Projectile, ProjectileArena, ProjectileHandle, DEFAULT_PROJECTILE_CAPACITY,
};

/// Displacement below which a tick is not considered a heading sample.
const HEADING_EPSILON: f64 = 1e-9;

/// Tracks the enemy's previous displacement to measure heading changes.
#[derive(Clone, Debug, PartialEq)]
pub struct HeadingTracker {
    previous_position: DVec2,
    previous_displacement: Option<DVec2>,
}

impl HeadingTracker {
    /// Starts tracking from the provided position with no heading history.
    #[must_use]
    pub const fn new(position: DVec2) -> Self {
        Self {
            previous_position: position,
            previous_displacement: None,
        }
    }

    /// Records the new position and returns the absolute heading change in radians.
    ///
    /// Ticks without meaningful displacement report zero and leave the
    /// previous heading in place.
    pub fn observe(&mut self, position: DVec2) -> f64 {
        let displacement = position - self.previous_position;
        self.previous_position = position;
        if displacement.length_squared() <= HEADING_EPSILON {
            return 0.0;
        }
        let Some(previous) = self.previous_displacement.replace(displacement) else {
            return 0.0;
        };
        let turn = (displacement.y.atan2(displacement.x) - previous.y.atan2(previous.x)).abs();
        if turn > std::f64::consts::PI {
            std::f64::consts::TAU - turn
        } else {
            turn
        }
    }
}

/// Rehydrated encounter advanced tick by tick during one replay.
///
/// A state is created from a snapshot, owned by exactly one replay, and
/// discarded once its metrics are scored.
#[derive(Clone, Debug)]
pub struct SimulationState {
    /// Room description; hazard phases advance in place.
    pub layout: ArenaLayout,
    /// Player actor.
    pub player: PlayerState,
    /// Enemy actor, including the candidate parameter set under evaluation.
    pub enemy: EnemyState,
    /// Recorded input trace replayed one entry per tick.
    pub inputs: Vec<InputBits>,
    /// Number of ticks the replay advances.
    pub steps: u32,
    /// Fixed timestep, in seconds.
    pub dt: f64,
    /// Pooled in-flight projectiles.
    pub projectiles: ProjectileArena,
    /// Accumulated replay metrics.
    pub log: PerformanceLog,
    /// Room clock, in seconds.
    pub elapsed: f64,
    /// Enemy heading history used for jitter accounting.
    pub heading: HeadingTracker,
}

impl SimulationState {
    /// Builds a fresh state with an empty projectile arena and zeroed metrics.
    #[must_use]
    pub fn new(
        layout: ArenaLayout,
        player: PlayerState,
        enemy: EnemyState,
        inputs: Vec<InputBits>,
        steps: u32,
        dt: f64,
    ) -> Self {
        let heading = HeadingTracker::new(enemy.position);
        Self {
            layout,
            player,
            enemy,
            inputs,
            steps,
            dt,
            projectiles: ProjectileArena::default(),
            log: PerformanceLog::default(),
            elapsed: 0.0,
            heading,
        }
    }

    /// Seed of the encounter being replayed.
    #[must_use]
    pub const fn seed(&self) -> u32 {
        self.layout.seed
    }

    /// Input recorded for the provided tick; ticks beyond the trace hold no input.
    #[must_use]
    pub fn input_at(&self, step: usize) -> InputBits {
        self.inputs.get(step).copied().unwrap_or(InputBits::NONE)
    }

    /// Distance between the actors' centres.
    #[must_use]
    pub fn separation(&self) -> f64 {
        self.player.position.distance(self.enemy.position)
    }
}
