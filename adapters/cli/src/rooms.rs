//! Procedural demo rooms.

use std::f64::consts::TAU;

use adaptive_arena_core::{
    Archetype, ArenaLayout, DVec2, DeterministicRng, Hazard, Obstacle, WorldBounds,
};
use adaptive_arena_world::hazards::DEFAULT_BEAM_WIDTH;

pub(crate) const ARENA_WIDTH: f64 = 960.0;
pub(crate) const ARENA_HEIGHT: f64 = 540.0;

const EDGE_MARGIN: f64 = 40.0;
const BEAM_ANGULAR_VELOCITY: f64 = 0.7;

/// One encounter's room and how long it lasts.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Room {
    pub(crate) id: u32,
    pub(crate) layout: ArenaLayout,
    pub(crate) duration: f64,
}

impl Room {
    /// Builds room `id` for the run identified by `run_seed`.
    pub(crate) fn generate(id: u32, run_seed: u32) -> Self {
        let seed = id
            .wrapping_mul(1_234_567)
            .wrapping_add(8_901)
            .wrapping_add(run_seed);
        let mut rng = DeterministicRng::new(seed);
        let bounds = WorldBounds::new(ARENA_WIDTH, ARENA_HEIGHT);

        let spike_count = 3 + id % 3;
        let mut hazards: Vec<Hazard> = (0..spike_count)
            .map(|_| {
                let radius = 14.0 + (rng.next_unit() * 10.0).floor();
                let x = EDGE_MARGIN + (rng.next_unit() * (ARENA_WIDTH - 2.0 * EDGE_MARGIN)).floor();
                let y =
                    EDGE_MARGIN + (rng.next_unit() * (ARENA_HEIGHT - 2.0 * EDGE_MARGIN)).floor();
                let period = 1.6 + rng.next_unit() * 1.2;
                let phase = rng.next_unit() * TAU;
                Hazard::Spike {
                    center: DVec2::new(x, y),
                    radius,
                    period,
                    phase,
                    active: false,
                }
            })
            .collect();
        if id % 3 == 0 {
            hazards.push(Hazard::Beam {
                pivot: DVec2::new(ARENA_WIDTH * 0.5, ARENA_HEIGHT * 0.5),
                length: ARENA_WIDTH.min(ARENA_HEIGHT) * 0.35,
                angle: 0.0,
                angular_velocity: BEAM_ANGULAR_VELOCITY,
                width: DEFAULT_BEAM_WIDTH,
            });
        }

        let obstacle_count = 4 + id % 4;
        let obstacles = (0..obstacle_count)
            .map(|_| {
                let width = 120.0 + (rng.next_unit() * 180.0).floor();
                let height = 24.0 + (rng.next_unit() * 60.0).floor();
                let x = EDGE_MARGIN
                    + (rng.next_unit() * (ARENA_WIDTH - 2.0 * EDGE_MARGIN - width)).floor();
                let y = 60.0 + (rng.next_unit() * (ARENA_HEIGHT - 120.0 - height)).floor();
                Obstacle::new(x, y, width, height)
            })
            .collect();

        Self {
            id,
            layout: ArenaLayout {
                seed,
                bounds,
                hazards,
                obstacles,
            },
            duration: duration(id),
        }
    }

    /// Archetype fought in this room.
    pub(crate) const fn archetype(&self) -> Archetype {
        if self.id % 4 == 0 {
            Archetype::Boss
        } else if self.id % 3 == 0 {
            Archetype::Ranged
        } else {
            Archetype::Grunt
        }
    }

    pub(crate) fn player_spawn() -> DVec2 {
        DVec2::new(ARENA_WIDTH * 0.25, ARENA_HEIGHT * 0.5)
    }

    pub(crate) fn enemy_spawn() -> DVec2 {
        DVec2::new(ARENA_WIDTH * 0.75, ARENA_HEIGHT * 0.5)
    }
}

/// Encounter length in seconds; every fourth room runs longer.
fn duration(id: u32) -> f64 {
    let base = 10.0 + f64::from(id.saturating_sub(1).min(5));
    let boss = if id % 4 == 0 { 4.0 } else { 0.0 };
    base + boss
}
