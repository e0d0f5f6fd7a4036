#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Tick-based rule selection for rule-driven enemies.
//!
//! Each tick the evaluator decays cooldowns and transient timers, filters the
//! actor's rules by cooldown and distance-band exclusions, scores the
//! survivors against contextual features, and selects the strict maximum. The
//! lowest-index rule wins exact ties. Selection arms the winner's cooldown and,
//! when the choice changes, opens a telegraph window for presentation
//! collaborators. A separate threat check arms a short lateral dodge when a
//! player projectile is about to connect.

mod behaviors;

use adaptive_arena_core::{
    ArenaLayout, BlacklistTag, DVec2, EnemyState, EvadeImpulse, PlayerState, Rule, RuleKind,
    TelegraphIntensity, TelegraphState,
};
use adaptive_arena_world::{
    hazards::nearest_active_hazard,
    physics::{line_of_sight, safe_normalize},
    Owner, ProjectileArena,
};

pub use behaviors::{
    contextual_multiplier, execute, ActionContext, DecisionContext, HAZARD_NEAR_DISTANCE,
};

/// Distance below which rules tagged forbidden-when-close are excluded.
pub const CLOSE_BAND_LIMIT: f64 = 100.0;

/// Distance above which rules tagged forbidden-when-far are excluded.
pub const FAR_BAND_LIMIT: f64 = 300.0;

/// Telegraph duration at medium intensity, in seconds.
pub const BASE_TELEGRAPH_DURATION: f64 = 0.45;

/// Flash duration accompanying every rule switch, in seconds.
pub const FLASH_DURATION: f64 = 0.12;

const THREAT_HORIZON: f64 = 0.35;
const THREAT_MARGIN: f64 = 6.0;
const EVADE_DURATION: f64 = 0.18;

/// Speed multiplier applied while a forced dodge is active.
pub const EVADE_SPEED_SCALE: f64 = 1.4;

/// Outcome of a single evaluation tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Decision {
    /// Index of the rule in effect after the tick.
    pub chosen: Option<usize>,
    /// Whether the tick changed the selected rule.
    pub switched: bool,
    /// Whether the tick armed a new forced dodge.
    pub evading: bool,
}

/// Per-tick decision state machine shared by the live loop and replays.
#[derive(Clone, Copy, Debug, Default)]
pub struct RuleEvaluator {
    intensity: TelegraphIntensity,
}

impl RuleEvaluator {
    /// Creates an evaluator whose telegraphs scale with the provided intensity.
    #[must_use]
    pub const fn new(intensity: TelegraphIntensity) -> Self {
        Self { intensity }
    }

    /// Telegraph intensity applied on rule switches.
    #[must_use]
    pub const fn intensity(&self) -> TelegraphIntensity {
        self.intensity
    }

    /// Extracts the contextual features for the enemy facing the player.
    #[must_use]
    pub fn observe(
        enemy: &EnemyState,
        player: &PlayerState,
        layout: &ArenaLayout,
    ) -> DecisionContext {
        DecisionContext {
            distance: enemy.position.distance(player.position),
            hazard_clearance: nearest_active_hazard(&layout.hazards, enemy.position),
            line_of_sight: line_of_sight(enemy.position, player.position, &layout.obstacles),
            archetype: enemy.archetype,
            phase: enemy.memory.phase,
        }
    }

    /// Runs one selection tick for the enemy.
    pub fn decide(
        &self,
        enemy: &mut EnemyState,
        context: &DecisionContext,
        projectiles: &ProjectileArena,
        dt: f64,
    ) -> Decision {
        decay_timers(enemy, dt);

        let mut best: Option<(usize, f64)> = None;
        for (index, rule) in enemy.parameters.rules().iter().enumerate() {
            if !rule.is_ready() || excluded_by_band(rule, context.distance) {
                continue;
            }
            let score = rule.weight() * contextual_multiplier(rule.kind(), context);
            match best {
                Some((_, best_score)) if score <= best_score => {}
                _ => best = Some((index, score)),
            }
        }

        let evading = arm_evasion(enemy, projectiles);

        let Some((chosen, _)) = best else {
            return Decision {
                chosen: enemy.memory.last_choice,
                switched: false,
                evading,
            };
        };

        let switched = enemy.memory.last_choice != Some(chosen);
        enemy.memory.last_choice = Some(chosen);
        let Some(rule) = enemy.parameters.rules_mut().get_mut(chosen) else {
            return Decision {
                chosen: Some(chosen),
                switched,
                evading,
            };
        };
        rule.arm_cooldown();

        if switched {
            let label = rule.name().to_owned();
            let duration = BASE_TELEGRAPH_DURATION * self.intensity.multiplier();
            enemy.memory.flash = Some(TelegraphState::open(label.clone(), FLASH_DURATION));
            enemy.memory.telegraph = Some(TelegraphState::open(label, duration));
        }

        Decision {
            chosen: Some(chosen),
            switched,
            evading,
        }
    }

    /// Kind whose behaviour drives the enemy this tick.
    ///
    /// A charge in progress keeps driving movement until it completes.
    #[must_use]
    pub fn active_kind(enemy: &EnemyState, decision: &Decision) -> Option<RuleKind> {
        if enemy.memory.charge.is_some() {
            return Some(RuleKind::Charge);
        }
        decision
            .chosen
            .and_then(|index| enemy.parameters.get(index))
            .map(|rule| rule.kind())
    }
}

fn arm_evasion(enemy: &mut EnemyState, projectiles: &ProjectileArena) -> bool {
    if enemy.memory.evade.is_some() {
        return false;
    }
    let threat = projectiles.iter().find_map(|(_, projectile)| {
        if projectile.owner != Owner::Player {
            return None;
        }
        let offset = enemy.position - projectile.position;
        let speed_squared = projectile.velocity.length_squared();
        if speed_squared <= 0.0 {
            return None;
        }
        let closing = offset.dot(projectile.velocity);
        if closing <= 0.0 {
            return None;
        }
        let time = (closing / speed_squared).min(THREAT_HORIZON);
        let miss = offset - projectile.velocity * time;
        let reach = enemy.radius + projectile.radius + THREAT_MARGIN;
        (miss.length_squared() <= reach * reach).then_some((projectile.velocity, miss))
    });
    let Some((velocity, miss)) = threat else {
        return false;
    };
    let lateral = safe_normalize(velocity).perp();
    let direction = if miss.dot(lateral) >= 0.0 {
        lateral
    } else {
        -lateral
    };
    enemy.memory.evade = Some(EvadeImpulse {
        direction,
        remaining: EVADE_DURATION,
    });
    true
}

fn excluded_by_band(rule: &Rule, distance: f64) -> bool {
    (rule.is_blacklisted(BlacklistTag::ForbiddenWhenClose) && distance < CLOSE_BAND_LIMIT)
        || (rule.is_blacklisted(BlacklistTag::ForbiddenWhenFar) && distance > FAR_BAND_LIMIT)
}

fn decay_timers(enemy: &mut EnemyState, dt: f64) {
    for rule in enemy.parameters.rules_mut() {
        rule.decay_cooldown(dt);
    }
    let memory = &mut enemy.memory;
    memory.burst_cooldown = (memory.burst_cooldown - dt).max(0.0);
    decay_signal(&mut memory.telegraph, dt);
    decay_signal(&mut memory.flash, dt);
    if let Some(evade) = memory.evade.as_mut() {
        evade.remaining -= dt;
        if evade.remaining <= 0.0 {
            memory.evade = None;
        }
    }
}

fn decay_signal(signal: &mut Option<TelegraphState>, dt: f64) {
    if let Some(state) = signal.as_mut() {
        state.remaining -= dt;
        if state.remaining <= 0.0 {
            *signal = None;
        }
    }
}

/// Velocity of an active forced dodge, if any.
#[must_use]
pub fn evade_velocity(enemy: &EnemyState) -> Option<DVec2> {
    enemy
        .memory
        .evade
        .map(|evade| evade.direction * enemy.speed * EVADE_SPEED_SCALE)
}
