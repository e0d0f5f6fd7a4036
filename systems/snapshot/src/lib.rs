#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Freezes live encounters into immutable snapshots and rehydrates them per candidate.

pub mod transfer;

use adaptive_arena_core::{
    ArenaLayout, DVec2, EnemyMemory, EnemyState, InputRecorder, ParameterSet, PlayerState,
    Snapshot, DEFAULT_FIXED_DT, INPUT_HISTORY_CAPACITY,
};
use adaptive_arena_world::SimulationState;

pub use transfer::{SnapshotDigest, SnapshotTransferError, PACKAGE_HEADER};

/// Borrowed view of the live game state at the end of an encounter.
#[derive(Clone, Copy, Debug)]
pub struct LiveFrame<'a> {
    /// Room the encounter was fought in.
    pub layout: &'a ArenaLayout,
    /// Player at the end of the encounter.
    pub player: &'a PlayerState,
    /// Enemy at the end of the encounter, carrying the live parameter set.
    pub enemy: &'a EnemyState,
    /// Recorded player inputs.
    pub recorder: &'a InputRecorder,
}

/// Captures and restores replay packages.
#[derive(Clone, Copy, Debug)]
pub struct SnapshotService {
    horizon: usize,
    dt: f64,
}

impl SnapshotService {
    /// Creates a service capturing `horizon` trailing ticks replayed at `dt`.
    #[must_use]
    pub fn new(horizon: usize, dt: f64) -> Self {
        Self {
            horizon: horizon.max(1),
            dt,
        }
    }

    /// Number of ticks captured and replayed.
    #[must_use]
    pub const fn horizon(&self) -> usize {
        self.horizon
    }

    /// Fixed replay timestep, in seconds.
    #[must_use]
    pub const fn dt(&self) -> f64 {
        self.dt
    }

    /// Deep-copies the minimal replay state out of the live frame.
    ///
    /// Transient timers are cleared so every replay starts from a neutral
    /// actor state; only the trailing `horizon` inputs are kept.
    #[must_use]
    pub fn capture(&self, frame: LiveFrame<'_>) -> Snapshot {
        let player = PlayerState {
            velocity: DVec2::ZERO,
            dash_cooldown: 0.0,
            dash_time: 0.0,
            invulnerability: 0.0,
            shoot_cooldown: 0.0,
            ..frame.player.clone()
        };
        let enemy = EnemyState {
            velocity: DVec2::ZERO,
            invulnerability: 0.0,
            memory: EnemyMemory::default(),
            ..frame.enemy.clone()
        };
        let inputs = frame.recorder.trailing(self.horizon);
        let steps = u32::try_from(self.horizon).unwrap_or(u32::MAX);

        tracing::debug!(
            seed = frame.layout.seed,
            recorded = inputs.len(),
            steps,
            "captured encounter snapshot"
        );

        Snapshot::new(frame.layout.clone(), player, enemy, inputs, steps, self.dt)
    }

    /// Rehydrates a mutable replay state driven by the candidate parameters.
    ///
    /// The snapshot is only read; every field is deep-copied.
    #[must_use]
    pub fn restore(snapshot: &Snapshot, parameters: ParameterSet) -> SimulationState {
        let enemy = EnemyState {
            parameters,
            ..snapshot.enemy().clone()
        };
        SimulationState::new(
            snapshot.layout().clone(),
            snapshot.player().clone(),
            enemy,
            snapshot.inputs().to_vec(),
            snapshot.steps(),
            snapshot.dt(),
        )
    }
}

impl Default for SnapshotService {
    fn default() -> Self {
        Self::new(INPUT_HISTORY_CAPACITY, DEFAULT_FIXED_DT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use adaptive_arena_core::{
        Archetype, Hazard, InputBits, Obstacle, Rule, TelegraphState, WorldBounds,
    };

    fn layout() -> ArenaLayout {
        ArenaLayout {
            seed: 42,
            bounds: WorldBounds::new(960.0, 540.0),
            hazards: vec![Hazard::Spike {
                center: DVec2::new(300.0, 200.0),
                radius: 16.0,
                period: 2.0,
                phase: 0.4,
                active: true,
            }],
            obstacles: vec![Obstacle::new(400.0, 100.0, 80.0, 30.0)],
        }
    }

    fn live_enemy() -> EnemyState {
        let mut enemy = EnemyState::new(
            DVec2::new(700.0, 260.0),
            Archetype::Ranged,
            ParameterSet::new(vec![
                Rule::new("Approach", 0.8, 0.15),
                Rule::new("Strafe", 0.2, 0.3),
            ]),
        );
        enemy.memory.phase = 3;
        enemy.memory.telegraph = Some(TelegraphState::open("Strafe", 0.45));
        enemy.velocity = DVec2::new(50.0, 0.0);
        enemy
    }

    fn recorder(ticks: u8) -> InputRecorder {
        let mut recorder = InputRecorder::with_capacity(400);
        for tick in 0..ticks {
            recorder.push(InputBits::from_bits(tick % 32));
        }
        recorder
    }

    #[test]
    fn capture_keeps_trailing_window_and_resets_transients() {
        let service = SnapshotService::new(120, DEFAULT_FIXED_DT);
        let layout = layout();
        let mut player = PlayerState::new(DVec2::new(200.0, 260.0));
        player.dash_time = 0.1;
        player.invulnerability = 0.2;
        let enemy = live_enemy();
        let recorder = recorder(200);

        let snapshot = service.capture(LiveFrame {
            layout: &layout,
            player: &player,
            enemy: &enemy,
            recorder: &recorder,
        });

        assert_eq!(snapshot.seed(), 42);
        assert_eq!(snapshot.steps(), 120);
        assert_eq!(snapshot.inputs().len(), 120);
        assert_eq!(snapshot.inputs()[0], InputBits::from_bits(80 % 32));
        assert_eq!(snapshot.player().dash_time, 0.0);
        assert_eq!(snapshot.player().invulnerability, 0.0);
        assert_eq!(snapshot.enemy().memory, EnemyMemory::default());
        assert_eq!(snapshot.enemy().velocity, DVec2::ZERO);
        assert_eq!(snapshot.enemy().parameters, enemy.parameters);
        assert_eq!(snapshot.layout(), &layout);
    }

    #[test]
    fn short_recordings_replay_idle_ticks() {
        let service = SnapshotService::default();
        let layout = layout();
        let player = PlayerState::new(DVec2::new(200.0, 260.0));
        let enemy = live_enemy();
        let recorder = recorder(10);
        let snapshot = service.capture(LiveFrame {
            layout: &layout,
            player: &player,
            enemy: &enemy,
            recorder: &recorder,
        });
        assert_eq!(snapshot.inputs().len(), 10);
        assert_eq!(snapshot.steps(), 180);
        assert_eq!(snapshot.input_at(150), InputBits::NONE);
    }

    #[test]
    fn restore_installs_candidate_without_touching_snapshot() {
        let service = SnapshotService::default();
        let layout = layout();
        let player = PlayerState::new(DVec2::new(200.0, 260.0));
        let enemy = live_enemy();
        let recorder = recorder(30);
        let snapshot = service.capture(LiveFrame {
            layout: &layout,
            player: &player,
            enemy: &enemy,
            recorder: &recorder,
        });
        let frozen = snapshot.clone();
        let candidate = ParameterSet::new(vec![Rule::new("Charge", 1.4, 0.3)]);

        let mut state = SnapshotService::restore(&snapshot, candidate.clone());
        state.enemy.position = DVec2::ZERO;
        state.layout.obstacles.clear();

        assert_eq!(state.enemy.parameters, candidate);
        assert_eq!(snapshot, frozen);
        assert_eq!(state.elapsed, 0.0);
        assert!(state.projectiles.is_empty());
    }

    #[test]
    fn packages_round_trip_and_digest_is_stable() {
        let service = SnapshotService::default();
        let layout = layout();
        let player = PlayerState::new(DVec2::new(200.0, 260.0));
        let enemy = live_enemy();
        let recorder = recorder(30);
        let snapshot = service.capture(LiveFrame {
            layout: &layout,
            player: &player,
            enemy: &enemy,
            recorder: &recorder,
        });

        let package = transfer::encode(&snapshot).expect("encode");
        assert!(package.starts_with("arena:v1:"));
        let decoded = transfer::decode(&package).expect("decode");
        assert_eq!(decoded, snapshot);

        let first = transfer::digest(&snapshot).expect("digest");
        let second = transfer::digest(&decoded).expect("digest");
        assert_eq!(first, second);
        assert_eq!(first.to_string().len(), 16);
    }

    #[test]
    fn malformed_packages_are_rejected() {
        assert!(matches!(
            transfer::decode("   "),
            Err(SnapshotTransferError::EmptyPayload)
        ));
        assert!(matches!(
            transfer::decode("maze:v1:abc"),
            Err(SnapshotTransferError::InvalidPrefix(prefix)) if prefix == "maze"
        ));
        assert!(matches!(
            transfer::decode("arena:v9:abc"),
            Err(SnapshotTransferError::UnsupportedVersion(_))
        ));
        assert!(matches!(
            transfer::decode("arena:v1"),
            Err(SnapshotTransferError::MissingPayload)
        ));
        assert!(matches!(
            transfer::decode("arena:v1:!!!"),
            Err(SnapshotTransferError::InvalidEncoding(_))
        ));
        assert!(matches!(
            transfer::decode("arena:v1:e30"),
            Err(SnapshotTransferError::InvalidPayload(_))
        ));
    }
}
