#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Deterministic fixed-timestep re-simulation of a single encounter.
//!
//! [`SimulationEngine::step`] advances a [`SimulationState`] purely as a
//! function of `(state, dt, input)`: it never reads a clock and keeps no state
//! of its own. [`SimulationEngine::replay`] drives a full replay from the
//! recorded input trace with a small seeded jitter so candidates are not tuned
//! to a single frame-perfect trace.

use adaptive_arena_core::{
    Archetype, DVec2, DeterministicRng, InputBits, ParameterSet, PerformanceLog, RuleKind,
    WeightBounds,
};
use adaptive_arena_system_rule_evaluator::{
    evade_velocity, execute, ActionContext, RuleEvaluator,
};
use adaptive_arena_world::{
    hazards::{advance_hazards, hazard_damage},
    physics::{
        circles_overlap, clamp_to_bounds, collide_with_obstacles, safe_normalize,
        touches_obstacle,
    },
    Owner, Projectile, SimulationState,
};

const DASH_DURATION: f64 = 0.12;
const DASH_COOLDOWN: f64 = 0.9;
const DASH_INVULNERABILITY: f64 = 0.16;
const DASH_SPEED_SCALE: f64 = 3.2;

const PLAYER_FIRE_INTERVAL: f64 = 0.18;
const PLAYER_SHOT_SPEED: f64 = 520.0;
const PLAYER_SHOT_DAMAGE: f64 = 12.0;
const PLAYER_SHOT_LIFE: f64 = 1.2;

const VOLLEY_SHOTS: i32 = 3;
const VOLLEY_SPREAD: f64 = 0.09;
const VOLLEY_SPEED: f64 = 500.0;
const VOLLEY_RANGE: f64 = 340.0;
const VOLLEY_INTERVAL: f64 = 0.9;

const SHOT_RADIUS: f64 = 3.0;
const ENEMY_SHOT_DAMAGE: f64 = 10.0;
const ENEMY_SHOT_LIFE: f64 = 2.0;
const OUT_OF_BOUNDS_MARGIN: f64 = 8.0;

const CONTACT_DAMAGE_RATE: f64 = 30.0;

const SECOND_PHASE_AT: f64 = 6.0;
const THIRD_PHASE_AT: f64 = 12.0;
const PHASE_ESCALATION: f64 = 1.1;

const CONTROL_BAND: (f64, f64) = (90.0, 260.0);
const HEADING_DEAD_ZONE: f64 = 0.06;
const DASH_ECONOMY_PENALTY: f64 = 0.003;
const UNFAIR_FLAG_STEP: f64 = 0.001;

/// Seed offset separating the replay jitter stream from other seeded streams.
pub const JITTER_SEED_OFFSET: u32 = 1337;

/// Per-tick probability of toggling one directional input during replay.
pub const JITTER_PROBABILITY: f64 = 0.05;

/// Seeded perturbation of the recorded input trace, used only by replays.
#[derive(Clone, Debug)]
pub struct InputJitter {
    rng: DeterministicRng,
}

impl InputJitter {
    /// Creates the jitter stream for the encounter seed.
    #[must_use]
    pub fn for_seed(seed: u32) -> Self {
        Self {
            rng: DeterministicRng::new(seed.wrapping_add(JITTER_SEED_OFFSET)),
        }
    }

    /// Occasionally toggles exactly one directional flag of the recorded input.
    pub fn apply(&mut self, bits: InputBits) -> InputBits {
        if self.rng.next_unit() >= JITTER_PROBABILITY {
            return bits;
        }
        let index = (self.rng.next_unit() * 4.0) as usize & 3;
        bits.toggled(InputBits::DIRECTIONS[index])
    }
}

/// Stateless stepper shared by every replay.
#[derive(Clone, Copy, Debug, Default)]
pub struct SimulationEngine {
    evaluator: RuleEvaluator,
    bounds: WeightBounds,
}

impl SimulationEngine {
    /// Creates an engine using the provided evaluator and weight band.
    #[must_use]
    pub const fn new(evaluator: RuleEvaluator, bounds: WeightBounds) -> Self {
        Self { evaluator, bounds }
    }

    /// Weight band enforced when boss phases re-seed rule weights.
    #[must_use]
    pub const fn bounds(&self) -> WeightBounds {
        self.bounds
    }

    /// Replays every recorded tick with seeded jitter and returns the final metrics.
    pub fn replay(&self, state: &mut SimulationState) -> PerformanceLog {
        let mut jitter = InputJitter::for_seed(state.seed());
        let dt = state.dt;
        for step in 0..state.steps {
            let recorded = state.input_at(step as usize);
            let input = jitter.apply(recorded);
            self.step(state, dt, input);
        }
        state.log
    }

    /// Advances the state by exactly one fixed tick.
    pub fn step(&self, state: &mut SimulationState, dt: f64, input: InputBits) {
        step_player(state, input, dt);
        let distance = self.step_enemy(state, dt);
        self.advance_phase(state, dt);
        fire_volley(state, dt);
        fire_player_shot(state, dt);
        advance_projectiles(state, dt);
        apply_environment(state, dt);
        record_metrics(state, distance, input, dt);
    }

    fn step_enemy(&self, state: &mut SimulationState, dt: f64) -> f64 {
        let context = RuleEvaluator::observe(&state.enemy, &state.player, &state.layout);
        let decision = self
            .evaluator
            .decide(&mut state.enemy, &context, &state.projectiles, dt);

        let velocity = match evade_velocity(&state.enemy) {
            Some(velocity) => velocity,
            None => match RuleEvaluator::active_kind(&state.enemy, &decision) {
                Some(kind) => {
                    let mut action = ActionContext {
                        enemy: &mut state.enemy,
                        target: state.player.position,
                        projectiles: &mut state.projectiles,
                        dt,
                    };
                    execute(kind, &mut action)
                }
                None => DVec2::ZERO,
            },
        };

        let enemy = &mut state.enemy;
        enemy.velocity = velocity;
        let moved = clamp_to_bounds(
            enemy.position + velocity * dt,
            enemy.radius,
            state.layout.bounds,
        );
        enemy.position = collide_with_obstacles(moved, enemy.radius, &state.layout.obstacles);
        enemy.invulnerability = (enemy.invulnerability - dt).max(0.0);
        context.distance
    }

    fn advance_phase(&self, state: &mut SimulationState, dt: f64) {
        let enemy = &mut state.enemy;
        enemy.memory.phase_timer += dt;
        if enemy.archetype != Archetype::Boss {
            return;
        }
        let next = match enemy.memory.phase {
            1 if enemy.memory.phase_timer > SECOND_PHASE_AT => 2,
            2 if enemy.memory.phase_timer > THIRD_PHASE_AT => 3,
            _ => return,
        };
        enemy.memory.phase = next;
        for rule in enemy.parameters.rules_mut() {
            if matches!(rule.kind(), RuleKind::Charge | RuleKind::AreaDeny) {
                let escalated = rule.weight() * PHASE_ESCALATION;
                rule.set_weight(escalated, self.bounds);
            }
        }
    }
}

fn step_player(state: &mut SimulationState, input: InputBits, dt: f64) {
    let player = &mut state.player;
    player.velocity = safe_normalize(input.movement_axis()) * player.speed;
    if input.contains(InputBits::DASH) && player.dash_cooldown <= 0.0 {
        player.dash_time = DASH_DURATION;
        player.dash_cooldown = DASH_COOLDOWN;
        player.invulnerability = player.invulnerability.max(DASH_INVULNERABILITY);
    }
    if player.dash_time > 0.0 {
        player.velocity *= DASH_SPEED_SCALE;
        player.dash_time -= dt;
    }
    if player.dash_cooldown > 0.0 {
        player.dash_cooldown -= dt;
    }
    let moved = clamp_to_bounds(
        player.position + player.velocity * dt,
        player.radius,
        state.layout.bounds,
    );
    player.position = collide_with_obstacles(moved, player.radius, &state.layout.obstacles);
    player.invulnerability = (player.invulnerability - dt).max(0.0);
}

fn fire_volley(state: &mut SimulationState, dt: f64) {
    if state.enemy.archetype != Archetype::Ranged {
        return;
    }
    let memory = &mut state.enemy.memory;
    memory.shoot_cooldown -= dt;
    if memory.shoot_cooldown > 0.0 {
        return;
    }
    let aim = state.player.position - state.enemy.position;
    if aim.length() > VOLLEY_RANGE {
        return;
    }
    let base = aim.y.atan2(aim.x);
    for shot in 0..VOLLEY_SHOTS {
        let angle = base + f64::from(shot - 1) * VOLLEY_SPREAD;
        let _ = state.projectiles.spawn(Projectile {
            position: state.enemy.position,
            velocity: DVec2::new(angle.cos(), angle.sin()) * VOLLEY_SPEED,
            radius: SHOT_RADIUS,
            damage: ENEMY_SHOT_DAMAGE,
            life: ENEMY_SHOT_LIFE,
            owner: Owner::Enemy,
        });
    }
    state.enemy.memory.shoot_cooldown = VOLLEY_INTERVAL;
}

fn fire_player_shot(state: &mut SimulationState, dt: f64) {
    let player = &mut state.player;
    player.shoot_cooldown -= dt;
    if player.shoot_cooldown > 0.0 {
        return;
    }
    let heading = safe_normalize(state.enemy.position - player.position);
    let _ = state.projectiles.spawn(Projectile {
        position: player.position,
        velocity: heading * PLAYER_SHOT_SPEED,
        radius: SHOT_RADIUS,
        damage: PLAYER_SHOT_DAMAGE,
        life: PLAYER_SHOT_LIFE,
        owner: Owner::Player,
    });
    player.shoot_cooldown = PLAYER_FIRE_INTERVAL;
}

fn advance_projectiles(state: &mut SimulationState, dt: f64) {
    let SimulationState {
        layout,
        player,
        enemy,
        projectiles,
        log,
        ..
    } = state;
    let bounds = layout.bounds;
    projectiles.sweep(|projectile| {
        projectile.position += projectile.velocity * dt;
        projectile.life -= dt;
        let position = projectile.position;
        if projectile.life <= 0.0
            || position.x < -OUT_OF_BOUNDS_MARGIN
            || position.y < -OUT_OF_BOUNDS_MARGIN
            || position.x > bounds.width + OUT_OF_BOUNDS_MARGIN
            || position.y > bounds.height + OUT_OF_BOUNDS_MARGIN
        {
            return false;
        }
        if touches_obstacle(position, projectile.radius, &layout.obstacles) {
            return false;
        }
        match projectile.owner {
            Owner::Enemy => {
                if !circles_overlap(player.position, player.radius, position, projectile.radius) {
                    return true;
                }
                if player.invulnerability <= 0.0 {
                    let before = player.hp;
                    player.hp = (player.hp - projectile.damage).max(0.0);
                    log.dps += before - player.hp;
                }
                false
            }
            Owner::Player => {
                if !circles_overlap(enemy.position, enemy.radius, position, projectile.radius) {
                    return true;
                }
                if enemy.invulnerability <= 0.0 {
                    enemy.hp = (enemy.hp - projectile.damage).max(0.0);
                }
                false
            }
        }
    });
}

fn apply_environment(state: &mut SimulationState, dt: f64) {
    state.elapsed += dt;
    advance_hazards(&mut state.layout.hazards, state.elapsed, dt);

    let hazards = &state.layout.hazards;
    let player = &mut state.player;
    if player.invulnerability <= 0.0 {
        let damage = hazard_damage(hazards, player.position, player.radius, dt);
        player.hp = (player.hp - damage).max(0.0);
    }
    let enemy = &mut state.enemy;
    if enemy.invulnerability <= 0.0 {
        let damage = hazard_damage(hazards, enemy.position, enemy.radius, dt);
        enemy.hp = (enemy.hp - damage).max(0.0);
    }

    if enemy.hp > 0.0
        && player.invulnerability <= 0.0
        && circles_overlap(player.position, player.radius, enemy.position, enemy.radius)
    {
        let before = player.hp;
        player.hp = (player.hp - CONTACT_DAMAGE_RATE * dt).max(0.0);
        state.log.dps += before - player.hp;
    }
}

fn record_metrics(state: &mut SimulationState, distance: f64, input: InputBits, dt: f64) {
    let log = &mut state.log;
    if distance > CONTROL_BAND.0 && distance < CONTROL_BAND.1 {
        log.control_time += dt;
    }
    let turn = state.heading.observe(state.enemy.position);
    log.jitter += (turn - HEADING_DEAD_ZONE).max(0.0);
    if input.contains(InputBits::DASH) {
        log.economy -= DASH_ECONOMY_PENALTY;
    }
    log.unfair_flags += unfairness(&state.enemy.parameters);
}

/// Per-tick unfairness contribution of extreme weight combinations.
#[must_use]
pub fn unfairness(parameters: &ParameterSet) -> f64 {
    let charge = parameters.weight_of(RuleKind::Charge).unwrap_or(0.0);
    let keep_distance = parameters.weight_of(RuleKind::KeepDistance).unwrap_or(0.0);
    let area_deny = parameters.weight_of(RuleKind::AreaDeny).unwrap_or(0.0);
    let mut flags = 0.0;
    if charge > 1.6 && keep_distance < 0.2 {
        flags += UNFAIR_FLAG_STEP;
    }
    if area_deny > 1.5 {
        flags += UNFAIR_FLAG_STEP;
    }
    flags
}

#[cfg(test)]
mod tests {
    use super::*;
    use adaptive_arena_core::{ArenaLayout, EnemyState, PlayerState, Rule, WorldBounds};

    fn state(archetype: Archetype, rules: Vec<Rule>, inputs: Vec<InputBits>) -> SimulationState {
        let steps = u32::try_from(inputs.len()).unwrap_or(0);
        SimulationState::new(
            ArenaLayout {
                seed: 11,
                bounds: WorldBounds::new(960.0, 540.0),
                hazards: Vec::new(),
                obstacles: Vec::new(),
            },
            PlayerState::new(DVec2::new(240.0, 270.0)),
            EnemyState::new(DVec2::new(720.0, 270.0), archetype, ParameterSet::new(rules)),
            inputs,
            steps,
            1.0 / 120.0,
        )
    }

    #[test]
    fn jitter_toggles_at_most_one_direction() {
        let mut jitter = InputJitter::for_seed(999);
        let mut toggles = 0;
        for _ in 0..2_000 {
            let jittered = jitter.apply(InputBits::DASH);
            let changed = jittered.toggled(InputBits::DASH).bits();
            assert!(changed == 0 || changed.count_ones() == 1);
            assert!(changed & InputBits::DASH.bits() == 0);
            if changed != 0 {
                toggles += 1;
            }
        }
        assert!(toggles > 40 && toggles < 180, "toggles = {toggles}");
    }

    #[test]
    fn dash_grants_burst_and_invulnerability() {
        let engine = SimulationEngine::default();
        let mut sim = state(Archetype::Grunt, Vec::new(), Vec::new());
        let start = sim.player.position;
        engine.step(&mut sim, 1.0 / 120.0, InputBits::RIGHT.with(InputBits::DASH));
        assert!(sim.player.invulnerability > 0.0);
        let travelled = sim.player.position.x - start.x;
        assert!((travelled - 200.0 * DASH_SPEED_SCALE / 120.0).abs() < 1e-9);
        assert!((sim.log.economy + DASH_ECONOMY_PENALTY).abs() < 1e-12);
    }

    #[test]
    fn contact_damage_feeds_dps_and_respects_invulnerability() {
        let engine = SimulationEngine::default();
        let mut sim = state(Archetype::Grunt, Vec::new(), Vec::new());
        sim.enemy.position = sim.player.position;
        sim.player.shoot_cooldown = 10.0;
        engine.step(&mut sim, 0.1, InputBits::NONE);
        assert!((sim.log.dps - CONTACT_DAMAGE_RATE * 0.1).abs() < 1e-9);

        let dps_before = sim.log.dps;
        sim.player.invulnerability = 1.0;
        engine.step(&mut sim, 0.1, InputBits::NONE);
        assert_eq!(sim.log.dps, dps_before);
    }

    #[test]
    fn boss_phase_escalation_respects_weight_ceiling() {
        let engine = SimulationEngine::default();
        let mut sim = state(
            Archetype::Boss,
            vec![
                Rule::new("Charge", 1.95, 0.25),
                Rule::new("AreaDeny", 1.0, 0.25),
            ],
            Vec::new(),
        );
        sim.enemy.memory.phase_timer = 6.0;
        engine.step(&mut sim, 0.01, InputBits::NONE);
        assert_eq!(sim.enemy.memory.phase, 2);
        let weights = sim.enemy.parameters.weights();
        assert_eq!(weights[0], 2.0);
        assert!((weights[1] - 1.1).abs() < 1e-12);
    }

    #[test]
    fn unfair_combinations_raise_flags() {
        let fair = ParameterSet::new(vec![
            Rule::new("Charge", 1.0, 0.25),
            Rule::new("KeepDistance", 0.5, 0.25),
        ]);
        let unfair = ParameterSet::new(vec![
            Rule::new("Charge", 1.8, 0.25),
            Rule::new("KeepDistance", 0.1, 0.25),
            Rule::new("AreaDeny", 1.9, 0.25),
        ]);
        assert_eq!(unfairness(&fair), 0.0);
        assert!((unfairness(&unfair) - 2.0 * UNFAIR_FLAG_STEP).abs() < 1e-15);
    }

    #[test]
    fn ranged_enemy_fires_spread_volley_in_range() {
        let engine = SimulationEngine::default();
        let mut sim = state(Archetype::Ranged, Vec::new(), Vec::new());
        sim.enemy.position = DVec2::new(500.0, 270.0);
        sim.player.shoot_cooldown = 10.0;
        engine.step(&mut sim, 1.0 / 120.0, InputBits::NONE);
        let enemy_shots = sim
            .projectiles
            .iter()
            .filter(|(_, projectile)| projectile.owner == Owner::Enemy)
            .count();
        assert_eq!(enemy_shots, 3);
    }
}
