//! Scripted stand-in for a human player.

use adaptive_arena_core::{DVec2, EnemyState, InputBits, PlayerState};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

const RETREAT_DISTANCE: f64 = 90.0;
const DASH_CHANCE: f64 = 0.02;
const HOLD_TICKS: std::ops::Range<u32> = 12..48;

/// Wanders in held directions, backs off when crowded and dashes now and then.
#[derive(Clone, Debug)]
pub(crate) struct GhostPilot {
    rng: ChaCha8Rng,
    heading: InputBits,
    hold: u32,
}

impl GhostPilot {
    pub(crate) fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            heading: InputBits::NONE,
            hold: 0,
        }
    }

    /// Input for the next tick.
    pub(crate) fn next_input(&mut self, player: &PlayerState, enemy: &EnemyState) -> InputBits {
        if self.hold == 0 {
            self.heading = self.wander();
            self.hold = self.rng.gen_range(HOLD_TICKS);
        }
        self.hold -= 1;

        let offset = player.position - enemy.position;
        let mut bits = if offset.length() < RETREAT_DISTANCE {
            away_from(offset)
        } else {
            self.heading
        };
        if self.rng.gen_bool(DASH_CHANCE) {
            bits = bits.with(InputBits::DASH);
        }
        bits
    }

    fn wander(&mut self) -> InputBits {
        let vertical = [InputBits::NONE, InputBits::UP, InputBits::DOWN];
        let horizontal = [InputBits::NONE, InputBits::LEFT, InputBits::RIGHT];
        let v = vertical[self.rng.gen_range(0..vertical.len())];
        let h = horizontal[self.rng.gen_range(0..horizontal.len())];
        v.with(h)
    }
}

fn away_from(offset: DVec2) -> InputBits {
    let mut bits = InputBits::NONE;
    if offset.x > 0.0 {
        bits = bits.with(InputBits::RIGHT);
    } else if offset.x < 0.0 {
        bits = bits.with(InputBits::LEFT);
    }
    if offset.y > 0.0 {
        bits = bits.with(InputBits::DOWN);
    } else if offset.y < 0.0 {
        bits = bits.with(InputBits::UP);
    }
    bits
}

#[cfg(test)]
mod tests {
    use super::*;
    use adaptive_arena_core::{Archetype, ParameterSet};

    fn enemy_at(position: DVec2) -> EnemyState {
        EnemyState::new(position, Archetype::Grunt, ParameterSet::default())
    }

    #[test]
    fn pilot_is_reproducible() {
        let player = PlayerState::new(DVec2::new(200.0, 200.0));
        let enemy = enemy_at(DVec2::new(600.0, 200.0));
        let mut first = GhostPilot::new(7);
        let mut second = GhostPilot::new(7);
        for _ in 0..500 {
            assert_eq!(
                first.next_input(&player, &enemy),
                second.next_input(&player, &enemy)
            );
        }
    }

    #[test]
    fn pilot_backs_away_when_crowded() {
        let player = PlayerState::new(DVec2::new(200.0, 200.0));
        let enemy = enemy_at(DVec2::new(240.0, 230.0));
        let mut pilot = GhostPilot::new(3);
        let bits = pilot.next_input(&player, &enemy);
        assert!(bits.contains(InputBits::LEFT));
        assert!(bits.contains(InputBits::UP));
    }
}
