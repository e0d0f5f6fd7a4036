//! Dispatch table mapping each rule kind to its scoring and movement behaviour.

use std::f64::consts::TAU;

use adaptive_arena_core::{Archetype, ChargeState, DVec2, EnemyState, RuleKind};
use adaptive_arena_world::{physics::safe_normalize, Owner, Projectile, ProjectileArena};

/// Clearance below which a hazard counts as near.
pub const HAZARD_NEAR_DISTANCE: f64 = 28.0;

const STRAFE_SPEED_SCALE: f64 = 0.6;
const PREFERRED_RANGE: f64 = 220.0;
const ORBIT_RETURN_SCALE: f64 = 0.6;
const CHARGE_WINDUP: f64 = 0.22;
const CHARGE_DURATION: f64 = 0.42;
const CHARGE_SPEED_SCALE: f64 = 3.0;
const AREA_DENY_INTERVAL: f64 = 1.2;
const AREA_DENY_BASE_SHOTS: u32 = 10;
const AREA_DENY_BASE_SPEED: f64 = 340.0;
const FEINT_SPEED_SCALE: f64 = 0.3;
const ENEMY_SHOT_RADIUS: f64 = 3.0;
const ENEMY_SHOT_DAMAGE: f64 = 10.0;
const ENEMY_SHOT_LIFE: f64 = 2.0;

/// Contextual features the evaluator scores rules against.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DecisionContext {
    /// Distance between the actor and its opponent.
    pub distance: f64,
    /// Clearance to the nearest damaging hazard, if any.
    pub hazard_clearance: Option<f64>,
    /// Whether the opponent is visible through the obstacles.
    pub line_of_sight: bool,
    /// Archetype of the deciding actor.
    pub archetype: Archetype,
    /// Current multi-phase stage, starting at 1.
    pub phase: u8,
}

impl DecisionContext {
    /// Reports whether a damaging hazard is within [`HAZARD_NEAR_DISTANCE`].
    #[must_use]
    pub fn hazard_near(&self) -> bool {
        self.hazard_clearance
            .is_some_and(|clearance| clearance < HAZARD_NEAR_DISTANCE)
    }
}

/// Mutable view handed to a rule's executor for one tick.
#[derive(Debug)]
pub struct ActionContext<'a> {
    /// Acting enemy; executors only touch its movement memory.
    pub enemy: &'a mut EnemyState,
    /// Opponent position.
    pub target: DVec2,
    /// Projectile pool receiving any shots the rule fires.
    pub projectiles: &'a mut ProjectileArena,
    /// Fixed timestep, in seconds.
    pub dt: f64,
}

impl ActionContext<'_> {
    fn toward_target(&self) -> DVec2 {
        safe_normalize(self.target - self.enemy.position)
    }

    fn distance(&self) -> f64 {
        self.target.distance(self.enemy.position)
    }
}

type Multiplier = fn(&DecisionContext) -> f64;
type Executor = fn(&mut ActionContext<'_>) -> DVec2;

struct RuleBehavior {
    multiplier: Multiplier,
    execute: Executor,
}

static BEHAVIORS: [RuleBehavior; RuleKind::COUNT] = [
    RuleBehavior {
        multiplier: approach_multiplier,
        execute: approach,
    },
    RuleBehavior {
        multiplier: strafe_multiplier,
        execute: strafe,
    },
    RuleBehavior {
        multiplier: keep_distance_multiplier,
        execute: keep_distance,
    },
    RuleBehavior {
        multiplier: charge_multiplier,
        execute: charge,
    },
    RuleBehavior {
        multiplier: area_deny_multiplier,
        execute: area_deny,
    },
    RuleBehavior {
        multiplier: feint_multiplier,
        execute: feint,
    },
    RuleBehavior {
        multiplier: unrecognized_multiplier,
        execute: approach,
    },
];

/// Context-dependent factor applied to a rule's weight.
#[must_use]
pub fn contextual_multiplier(kind: RuleKind, context: &DecisionContext) -> f64 {
    (BEHAVIORS[kind.index()].multiplier)(context)
}

/// Runs the rule's movement and attack behaviour, returning the desired velocity.
pub fn execute(kind: RuleKind, action: &mut ActionContext<'_>) -> DVec2 {
    (BEHAVIORS[kind.index()].execute)(action)
}

fn approach_multiplier(context: &DecisionContext) -> f64 {
    let mut factor = if context.distance > 120.0 { 1.0 } else { 0.5 };
    if context.hazard_near() {
        factor *= 0.7;
    }
    if !context.line_of_sight {
        factor *= 1.2;
    }
    if context.archetype == Archetype::Ranged {
        factor *= 0.8;
    }
    factor
}

fn strafe_multiplier(context: &DecisionContext) -> f64 {
    let mut factor = if context.distance <= 160.0 { 1.0 } else { 0.3 };
    if context.hazard_near() {
        factor *= 1.1;
    }
    if !context.line_of_sight {
        factor *= 0.8;
    }
    factor
}

fn keep_distance_multiplier(context: &DecisionContext) -> f64 {
    let mut factor = if context.distance < PREFERRED_RANGE {
        1.2
    } else {
        0.7
    };
    if context.hazard_near() {
        factor *= 1.15;
    }
    if context.archetype == Archetype::Ranged {
        factor *= 1.3;
    }
    factor
}

fn charge_multiplier(context: &DecisionContext) -> f64 {
    let mut factor = if context.distance > 90.0 && context.distance < PREFERRED_RANGE {
        1.1
    } else {
        0.4
    };
    if context.hazard_near() {
        factor *= 0.8;
    }
    if !context.line_of_sight {
        factor *= 0.5;
    }
    if context.archetype == Archetype::Boss && context.phase >= 2 {
        factor *= 1.15;
    }
    factor
}

fn area_deny_multiplier(context: &DecisionContext) -> f64 {
    let mut factor = if context.distance > 80.0 && context.distance < 260.0 {
        1.0
    } else {
        0.5
    };
    if context.archetype == Archetype::Boss {
        factor *= 1.0 + 0.1 * f64::from(context.phase.saturating_sub(1));
    }
    factor
}

fn feint_multiplier(context: &DecisionContext) -> f64 {
    if context.distance < 160.0 {
        0.8
    } else {
        0.3
    }
}

fn unrecognized_multiplier(_context: &DecisionContext) -> f64 {
    1.0
}

fn approach(action: &mut ActionContext<'_>) -> DVec2 {
    action.toward_target() * action.enemy.speed
}

fn strafe(action: &mut ActionContext<'_>) -> DVec2 {
    action.toward_target().perp() * action.enemy.speed * STRAFE_SPEED_SCALE
}

fn keep_distance(action: &mut ActionContext<'_>) -> DVec2 {
    let away = -action.toward_target();
    let scale = if action.distance() < PREFERRED_RANGE {
        1.0
    } else {
        -ORBIT_RETURN_SCALE
    };
    away * action.enemy.speed * scale
}

fn charge(action: &mut ActionContext<'_>) -> DVec2 {
    let heading = action.toward_target();
    let dt = action.dt;
    let speed = action.enemy.speed;
    let state = action.enemy.memory.charge.get_or_insert(ChargeState {
        windup: CHARGE_WINDUP,
        duration: CHARGE_DURATION,
        heading,
    });
    if state.windup > 0.0 {
        state.heading = heading;
        state.windup -= dt;
        DVec2::ZERO
    } else if state.duration > 0.0 {
        state.duration -= dt;
        state.heading * speed * CHARGE_SPEED_SCALE
    } else {
        action.enemy.memory.charge = None;
        DVec2::ZERO
    }
}

fn area_deny(action: &mut ActionContext<'_>) -> DVec2 {
    if action.enemy.memory.burst_cooldown > 0.0 {
        return DVec2::ZERO;
    }
    let phase = u32::from(action.enemy.memory.phase.max(1));
    let shots = AREA_DENY_BASE_SHOTS + phase * 2;
    let speed = AREA_DENY_BASE_SPEED + f64::from(phase) * 30.0;
    for shot in 0..shots {
        let angle = f64::from(shot) / f64::from(shots) * TAU;
        let _ = action.projectiles.spawn(Projectile {
            position: action.enemy.position,
            velocity: DVec2::new(angle.cos(), angle.sin()) * speed,
            radius: ENEMY_SHOT_RADIUS,
            damage: ENEMY_SHOT_DAMAGE,
            life: ENEMY_SHOT_LIFE,
            owner: Owner::Enemy,
        });
    }
    action.enemy.memory.burst_cooldown = AREA_DENY_INTERVAL;
    DVec2::ZERO
}

fn feint(action: &mut ActionContext<'_>) -> DVec2 {
    -action.toward_target().perp() * action.enemy.speed * FEINT_SPEED_SCALE
}
