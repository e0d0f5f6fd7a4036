#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Core contracts shared across the adaptive arena engine.
//!
//! This crate defines the plain-data surface that connects the live game loop,
//! the deterministic re-simulation, and the adaptation pipeline. The live loop
//! owns an enemy [`ParameterSet`], freezes encounter state into an immutable
//! [`Snapshot`] when an encounter ends, and later installs a winning parameter
//! set that was selected from a population of candidates. Every type in this
//! crate is structurally copyable: cloning never aliases, and serialisation
//! carries no shared references.

pub mod rng;

use std::collections::{BTreeSet, VecDeque};

pub use glam::DVec2;
use serde::{Deserialize, Serialize};

pub use rng::DeterministicRng;

/// Lowest weight any rule may carry.
pub const WEIGHT_FLOOR: f64 = 0.05;

/// Default upper weight bound applied when no configuration overrides it.
pub const DEFAULT_WEIGHT_CEILING: f64 = 2.0;

/// Cooldown armed by a rule that does not configure its own period, in seconds.
pub const DEFAULT_COOLDOWN_PERIOD: f64 = 0.25;

/// Fixed simulation timestep used by replays, in seconds.
pub const DEFAULT_FIXED_DT: f64 = 1.0 / 120.0;

/// Number of trailing input ticks retained by the recorder and captured by snapshots.
pub const INPUT_HISTORY_CAPACITY: usize = 180;

/// Number of rule changes reported in a single adaptation summary.
pub const SUMMARY_CHANGE_LIMIT: usize = 2;

/// Inclusive band every rule weight must remain within.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct WeightBounds {
    floor: f64,
    ceiling: f64,
}

impl WeightBounds {
    /// Creates bounds spanning [`WEIGHT_FLOOR`] to the provided ceiling.
    ///
    /// Ceilings below the floor collapse onto the floor so the band is never empty.
    #[must_use]
    pub fn with_ceiling(ceiling: f64) -> Self {
        let ceiling = if ceiling.is_finite() {
            ceiling.max(WEIGHT_FLOOR)
        } else {
            DEFAULT_WEIGHT_CEILING
        };
        Self {
            floor: WEIGHT_FLOOR,
            ceiling,
        }
    }

    /// Lowest permitted weight.
    #[must_use]
    pub const fn floor(&self) -> f64 {
        self.floor
    }

    /// Highest permitted weight.
    #[must_use]
    pub const fn ceiling(&self) -> f64 {
        self.ceiling
    }

    /// Clamps the value into the band. NaN collapses onto the floor.
    #[must_use]
    pub fn clamp(&self, weight: f64) -> f64 {
        if weight.is_nan() {
            return self.floor;
        }
        weight.clamp(self.floor, self.ceiling)
    }

    /// Reports whether the value already lies within the band.
    #[must_use]
    pub fn contains(&self, weight: f64) -> bool {
        weight >= self.floor && weight <= self.ceiling
    }
}

impl Default for WeightBounds {
    fn default() -> Self {
        Self::with_ceiling(DEFAULT_WEIGHT_CEILING)
    }
}

/// Closed set of behaviours an action rule can drive.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RuleKind {
    /// Close the distance to the opponent.
    Approach,
    /// Circle the opponent tangentially.
    Strafe,
    /// Back away inside the preferred range, orbit outside it.
    KeepDistance,
    /// Lock a heading during a windup, then burst along it.
    Charge,
    /// Emit radial projectile bursts that deny space.
    AreaDeny,
    /// Slow sidestep used to bait reactions.
    Feint,
    /// Rule name the engine does not know; behaves like [`RuleKind::Approach`].
    Unrecognized,
}

impl RuleKind {
    /// Number of rule kinds, including [`RuleKind::Unrecognized`].
    pub const COUNT: usize = 7;

    /// Every kind in dispatch-table order.
    pub const ALL: [RuleKind; Self::COUNT] = [
        RuleKind::Approach,
        RuleKind::Strafe,
        RuleKind::KeepDistance,
        RuleKind::Charge,
        RuleKind::AreaDeny,
        RuleKind::Feint,
        RuleKind::Unrecognized,
    ];

    /// Resolves a rule name into its kind.
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        match name.trim() {
            "Approach" => Self::Approach,
            "Strafe" => Self::Strafe,
            "KeepDistance" => Self::KeepDistance,
            "Charge" => Self::Charge,
            "AreaDeny" => Self::AreaDeny,
            "Feint" => Self::Feint,
            _ => Self::Unrecognized,
        }
    }

    /// Position of the kind inside [`RuleKind::ALL`].
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::Approach => 0,
            Self::Strafe => 1,
            Self::KeepDistance => 2,
            Self::Charge => 3,
            Self::AreaDeny => 4,
            Self::Feint => 5,
            Self::Unrecognized => 6,
        }
    }
}

/// Distance-band exclusions a rule may carry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BlacklistTag {
    /// Excluded while the opponent is closer than the near threshold.
    ForbiddenWhenClose,
    /// Excluded while the opponent is farther than the far threshold.
    ForbiddenWhenFar,
}

/// Single weighted action rule owned by an actor's [`ParameterSet`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "RuleRecord", into = "RuleRecord")]
pub struct Rule {
    name: String,
    kind: RuleKind,
    weight: f64,
    cooldown_remaining: f64,
    cooldown_period: f64,
    blacklist: BTreeSet<BlacklistTag>,
}

impl Rule {
    /// Creates a ready rule. The weight is floored at [`WEIGHT_FLOOR`].
    #[must_use]
    pub fn new(name: impl Into<String>, weight: f64, cooldown_period: f64) -> Self {
        let name = name.into();
        Self {
            kind: RuleKind::from_name(&name),
            name,
            weight: floor_weight(weight),
            cooldown_remaining: 0.0,
            cooldown_period: sanitize_period(cooldown_period),
            blacklist: BTreeSet::new(),
        }
    }

    /// Adds a distance-band exclusion to the rule.
    #[must_use]
    pub fn with_blacklist(mut self, tag: BlacklistTag) -> Self {
        let _ = self.blacklist.insert(tag);
        self
    }

    /// Name the rule was configured with.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Behaviour kind resolved from the name.
    #[must_use]
    pub const fn kind(&self) -> RuleKind {
        self.kind
    }

    /// Selection weight.
    #[must_use]
    pub const fn weight(&self) -> f64 {
        self.weight
    }

    /// Seconds until the rule becomes eligible again.
    #[must_use]
    pub const fn cooldown_remaining(&self) -> f64 {
        self.cooldown_remaining
    }

    /// Cooldown armed each time the rule is selected, in seconds.
    #[must_use]
    pub const fn cooldown_period(&self) -> f64 {
        self.cooldown_period
    }

    /// Distance-band exclusions carried by the rule.
    #[must_use]
    pub fn blacklist(&self) -> &BTreeSet<BlacklistTag> {
        &self.blacklist
    }

    /// Reports whether the rule carries the provided exclusion.
    #[must_use]
    pub fn is_blacklisted(&self, tag: BlacklistTag) -> bool {
        self.blacklist.contains(&tag)
    }

    /// Reports whether the cooldown has fully elapsed.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.cooldown_remaining <= 0.0
    }

    /// Replaces the weight, clamping into the provided band.
    pub fn set_weight(&mut self, weight: f64, bounds: WeightBounds) {
        self.weight = bounds.clamp(weight);
    }

    /// Replaces the configured cooldown period.
    pub fn set_cooldown_period(&mut self, period: f64) {
        self.cooldown_period = sanitize_period(period);
    }

    /// Counts the cooldown down by `dt`, flooring at zero.
    pub fn decay_cooldown(&mut self, dt: f64) {
        self.cooldown_remaining = (self.cooldown_remaining - dt).max(0.0);
    }

    /// Arms the cooldown to the configured period.
    pub fn arm_cooldown(&mut self) {
        self.cooldown_remaining = self.cooldown_period;
    }
}

fn floor_weight(weight: f64) -> f64 {
    if weight.is_nan() {
        WEIGHT_FLOOR
    } else {
        weight.max(WEIGHT_FLOOR)
    }
}

fn sanitize_period(period: f64) -> f64 {
    if period.is_finite() && period > 0.0 {
        period
    } else {
        DEFAULT_COOLDOWN_PERIOD
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct RuleRecord {
    name: String,
    weight: f64,
    #[serde(default)]
    cooldown_remaining: f64,
    #[serde(default = "default_cooldown_period")]
    cooldown_period: f64,
    #[serde(default)]
    blacklist: BTreeSet<BlacklistTag>,
}

fn default_cooldown_period() -> f64 {
    DEFAULT_COOLDOWN_PERIOD
}

impl From<RuleRecord> for Rule {
    fn from(record: RuleRecord) -> Self {
        let mut rule = Rule::new(record.name, record.weight, record.cooldown_period);
        rule.cooldown_remaining = record.cooldown_remaining.max(0.0);
        rule.blacklist = record.blacklist;
        rule
    }
}

impl From<Rule> for RuleRecord {
    fn from(rule: Rule) -> Self {
        Self {
            name: rule.name,
            weight: rule.weight,
            cooldown_remaining: rule.cooldown_remaining,
            cooldown_period: rule.cooldown_period,
            blacklist: rule.blacklist,
        }
    }
}

/// Ordered collection of rules governing one actor's behaviour.
///
/// Each actor and each candidate owns its set independently; cloning performs
/// a deep copy.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ParameterSet {
    rules: Vec<Rule>,
}

impl ParameterSet {
    /// Creates a parameter set from the provided rules, preserving their order.
    #[must_use]
    pub fn new(rules: Vec<Rule>) -> Self {
        Self { rules }
    }

    /// Rules in selection order.
    #[must_use]
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Mutable access for the set's single designated writer.
    pub fn rules_mut(&mut self) -> &mut [Rule] {
        &mut self.rules
    }

    /// Rule stored at the provided index.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Rule> {
        self.rules.get(index)
    }

    /// Number of rules in the set.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Reports whether the set contains no rules.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Weight of the first rule with the provided kind, if any.
    #[must_use]
    pub fn weight_of(&self, kind: RuleKind) -> Option<f64> {
        self.rules
            .iter()
            .find(|rule| rule.kind() == kind)
            .map(Rule::weight)
    }

    /// Weights in rule order.
    #[must_use]
    pub fn weights(&self) -> Vec<f64> {
        self.rules.iter().map(Rule::weight).collect()
    }

    /// Clamps every weight into the provided band.
    pub fn clamp_weights(&mut self, bounds: WeightBounds) {
        for rule in &mut self.rules {
            let weight = rule.weight();
            rule.set_weight(weight, bounds);
        }
    }

    /// Reports whether every weight lies within the provided band.
    #[must_use]
    pub fn within(&self, bounds: WeightBounds) -> bool {
        self.rules.iter().all(|rule| bounds.contains(rule.weight()))
    }
}

/// Presentation intensity that scales telegraph windows.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TelegraphIntensity {
    /// Shorter telegraphs for experienced players.
    Low,
    /// Baseline telegraph duration.
    #[default]
    Medium,
    /// Longer telegraphs for readability.
    High,
}

impl TelegraphIntensity {
    /// Multiplier applied to the base telegraph window.
    #[must_use]
    pub const fn multiplier(self) -> f64 {
        match self {
            Self::Low => 0.6,
            Self::Medium => 1.0,
            Self::High => 1.4,
        }
    }
}

/// Transient readability signal opened when an actor switches rules.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TelegraphState {
    /// Label presented alongside the signal, usually the rule name.
    pub label: String,
    /// Seconds until the signal disappears.
    pub remaining: f64,
    /// Initial duration of the signal, in seconds.
    pub total: f64,
}

impl TelegraphState {
    /// Opens a signal lasting the provided number of seconds.
    #[must_use]
    pub fn open(label: impl Into<String>, duration: f64) -> Self {
        Self {
            label: label.into(),
            remaining: duration,
            total: duration,
        }
    }

    /// Fraction of the window still remaining, in `[0, 1]`.
    #[must_use]
    pub fn progress(&self) -> f64 {
        if self.total <= 0.0 {
            return 0.0;
        }
        (self.remaining / self.total).clamp(0.0, 1.0)
    }
}

/// Behavioural archetype of an enemy actor.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Archetype {
    /// Melee brawler.
    #[default]
    Grunt,
    /// Keeps range and fires volleys.
    Ranged,
    /// Multi-phase encounter that escalates over time.
    Boss,
}

impl Archetype {
    /// Canonical name of the archetype, used as a configuration key.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Grunt => "Grunt",
            Self::Ranged => "Ranged",
            Self::Boss => "Boss",
        }
    }

    /// Reports whether encounters against this archetype are high-stakes.
    #[must_use]
    pub const fn is_high_stakes(self) -> bool {
        matches!(self, Self::Boss)
    }
}

/// Compact per-tick set of logical input flags.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InputBits(u8);

impl InputBits {
    /// No input held.
    pub const NONE: Self = Self(0);
    /// Move toward decreasing y.
    pub const UP: Self = Self(1 << 0);
    /// Move toward increasing y.
    pub const DOWN: Self = Self(1 << 1);
    /// Move toward decreasing x.
    pub const LEFT: Self = Self(1 << 2);
    /// Move toward increasing x.
    pub const RIGHT: Self = Self(1 << 3);
    /// Trigger a dash.
    pub const DASH: Self = Self(1 << 4);
    /// Directional flags in bit order.
    pub const DIRECTIONS: [Self; 4] = [Self::UP, Self::DOWN, Self::LEFT, Self::RIGHT];

    const MASK: u8 = 0b1_1111;

    /// Wraps raw bits, discarding anything outside the five logical flags.
    #[must_use]
    pub const fn from_bits(bits: u8) -> Self {
        Self(bits & Self::MASK)
    }

    /// Raw bit representation.
    #[must_use]
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Reports whether every flag in `other` is held.
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0 && other.0 != 0
    }

    /// Union of both flag sets.
    #[must_use]
    pub const fn with(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// Flips every flag held in `other`.
    #[must_use]
    pub const fn toggled(self, other: Self) -> Self {
        Self(self.0 ^ other.0)
    }

    /// Unnormalised movement axis implied by the directional flags.
    #[must_use]
    pub fn movement_axis(self) -> DVec2 {
        let x = f64::from(u8::from(self.contains(Self::RIGHT)))
            - f64::from(u8::from(self.contains(Self::LEFT)));
        let y = f64::from(u8::from(self.contains(Self::DOWN)))
            - f64::from(u8::from(self.contains(Self::UP)));
        DVec2::new(x, y)
    }
}

/// Bounded trailing window of recorded inputs.
#[derive(Clone, Debug)]
pub struct InputRecorder {
    history: VecDeque<InputBits>,
    capacity: usize,
}

impl InputRecorder {
    /// Creates a recorder retaining at most `capacity` ticks.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            history: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Records the input held during the latest tick, evicting the oldest entry when full.
    pub fn push(&mut self, bits: InputBits) {
        if self.history.len() == self.capacity {
            let _ = self.history.pop_front();
        }
        self.history.push_back(bits);
    }

    /// Copies the most recent `count` inputs in chronological order.
    #[must_use]
    pub fn trailing(&self, count: usize) -> Vec<InputBits> {
        let skip = self.history.len().saturating_sub(count);
        self.history.iter().skip(skip).copied().collect()
    }

    /// Number of recorded ticks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.history.len()
    }

    /// Reports whether nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    /// Discards all recorded inputs.
    pub fn clear(&mut self) {
        self.history.clear();
    }
}

impl Default for InputRecorder {
    fn default() -> Self {
        Self::with_capacity(INPUT_HISTORY_CAPACITY)
    }
}

/// Playable area measured in world units.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct WorldBounds {
    /// Horizontal extent.
    pub width: f64,
    /// Vertical extent.
    pub height: f64,
}

impl WorldBounds {
    /// Creates bounds with the provided extents.
    #[must_use]
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

/// Axis-aligned solid rectangle that blocks actors, projectiles, and sight.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Obstacle {
    /// Left edge.
    pub x: f64,
    /// Top edge.
    pub y: f64,
    /// Horizontal extent.
    pub width: f64,
    /// Vertical extent.
    pub height: f64,
}

impl Obstacle {
    /// Creates an obstacle anchored at its top-left corner.
    #[must_use]
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Closest point of the rectangle to `point`.
    #[must_use]
    pub fn closest_point(&self, point: DVec2) -> DVec2 {
        DVec2::new(
            point.x.clamp(self.x, self.x + self.width),
            point.y.clamp(self.y, self.y + self.height),
        )
    }
}

/// Environmental damage source.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Hazard {
    /// Circular trap that cycles on and off with a fixed duty cycle.
    Spike {
        /// Centre of the trap.
        center: DVec2,
        /// Damage radius.
        radius: f64,
        /// Length of one on/off cycle, in seconds.
        period: f64,
        /// Phase offset added to the room clock, in seconds.
        phase: f64,
        /// Whether the trap currently deals damage.
        active: bool,
    },
    /// Line segment sweeping continuously around a pivot.
    Beam {
        /// Fixed end of the beam.
        pivot: DVec2,
        /// Length of the beam.
        length: f64,
        /// Current heading, in radians.
        angle: f64,
        /// Sweep rate, in radians per second.
        angular_velocity: f64,
        /// Thickness of the beam.
        width: f64,
    },
}

/// Static description of the room an encounter is fought in.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ArenaLayout {
    /// Seed driving every deterministic stream derived from the encounter.
    pub seed: u32,
    /// Playable area.
    pub bounds: WorldBounds,
    /// Hazards in their captured phase.
    pub hazards: Vec<Hazard>,
    /// Solid obstacles.
    pub obstacles: Vec<Obstacle>,
}

/// Player-controlled actor.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlayerState {
    /// Centre position.
    pub position: DVec2,
    /// Velocity applied during the latest tick.
    pub velocity: DVec2,
    /// Collision radius.
    pub radius: f64,
    /// Base movement speed, in units per second.
    pub speed: f64,
    /// Current health.
    pub hp: f64,
    /// Maximum health.
    pub max_hp: f64,
    /// Seconds until another dash may start.
    pub dash_cooldown: f64,
    /// Seconds of dash burst remaining.
    pub dash_time: f64,
    /// Seconds of damage immunity remaining.
    pub invulnerability: f64,
    /// Seconds until the next automatic shot.
    pub shoot_cooldown: f64,
}

impl PlayerState {
    /// Creates a fresh player standing at the provided position.
    #[must_use]
    pub fn new(position: DVec2) -> Self {
        Self {
            position,
            velocity: DVec2::ZERO,
            radius: 12.0,
            speed: 200.0,
            hp: 100.0,
            max_hp: 100.0,
            dash_cooldown: 0.0,
            dash_time: 0.0,
            invulnerability: 0.0,
            shoot_cooldown: 0.0,
        }
    }
}

/// Windup-then-burst movement in progress.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChargeState {
    /// Seconds of windup remaining; the heading tracks the target meanwhile.
    pub windup: f64,
    /// Seconds of burst remaining once the windup completes.
    pub duration: f64,
    /// Locked unit heading.
    pub heading: DVec2,
}

/// Forced lateral dodge armed by an incoming projectile.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct EvadeImpulse {
    /// Unit direction of the dodge.
    pub direction: DVec2,
    /// Seconds of dodge remaining.
    pub remaining: f64,
}

/// Per-actor decision memory written only by the actor's own tick.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EnemyMemory {
    /// Index of the rule selected on the previous tick.
    pub last_choice: Option<usize>,
    /// Current multi-phase stage, starting at 1.
    pub phase: u8,
    /// Seconds elapsed since the encounter started.
    pub phase_timer: f64,
    /// Charge in progress, if any.
    pub charge: Option<ChargeState>,
    /// Seconds until the next area-denial burst.
    pub burst_cooldown: f64,
    /// Seconds until the next ranged volley.
    pub shoot_cooldown: f64,
    /// Forced dodge in progress, if any.
    pub evade: Option<EvadeImpulse>,
    /// Rule-switch telegraph, if open.
    pub telegraph: Option<TelegraphState>,
    /// Short flash accompanying the telegraph, if open.
    pub flash: Option<TelegraphState>,
}

impl Default for EnemyMemory {
    fn default() -> Self {
        Self {
            last_choice: None,
            phase: 1,
            phase_timer: 0.0,
            charge: None,
            burst_cooldown: 0.0,
            shoot_cooldown: 0.0,
            evade: None,
            telegraph: None,
            flash: None,
        }
    }
}

/// Rule-driven opposing actor.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EnemyState {
    /// Centre position.
    pub position: DVec2,
    /// Velocity applied during the latest tick.
    pub velocity: DVec2,
    /// Collision radius.
    pub radius: f64,
    /// Base movement speed, in units per second.
    pub speed: f64,
    /// Current health.
    pub hp: f64,
    /// Maximum health.
    pub max_hp: f64,
    /// Seconds of damage immunity remaining.
    pub invulnerability: f64,
    /// Behavioural archetype.
    pub archetype: Archetype,
    /// Rules driving the actor.
    pub parameters: ParameterSet,
    /// Decision memory.
    pub memory: EnemyMemory,
}

impl EnemyState {
    /// Creates a fresh enemy at the provided position.
    #[must_use]
    pub fn new(position: DVec2, archetype: Archetype, parameters: ParameterSet) -> Self {
        Self {
            position,
            velocity: DVec2::ZERO,
            radius: 12.0,
            speed: 140.0,
            hp: 60.0,
            max_hp: 60.0,
            invulnerability: 0.0,
            archetype,
            parameters,
            memory: EnemyMemory::default(),
        }
    }
}

/// Monotonically accumulating replay metrics.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceLog {
    /// Damage dealt to the player.
    pub dps: f64,
    /// Seconds spent in the mid-distance control band.
    pub control_time: f64,
    /// Heading change in excess of the dead zone, in radians.
    pub jitter: f64,
    /// Dash usage penalty; only ever decreases.
    pub economy: f64,
    /// Accumulated unfairness flags.
    pub unfair_flags: f64,
}

/// Scored outcome of one candidate's replay.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CandidateResult {
    /// Parameters that were replayed.
    pub parameters: ParameterSet,
    /// Weighted multi-objective score.
    pub fitness: f64,
    /// Unfairness penalty scalar.
    pub fairness: f64,
    /// Raw metrics the score was derived from.
    pub log: PerformanceLog,
    /// Per-rule perturbation retained by evolution-strategy candidates.
    pub perturbation: Option<Vec<f64>>,
}

/// Immutable freeze of an encounter sufficient to replay it headlessly.
///
/// A snapshot has no mutating API; replays rehydrate their own state from it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    layout: ArenaLayout,
    player: PlayerState,
    enemy: EnemyState,
    inputs: Vec<InputBits>,
    steps: u32,
    dt: f64,
}

impl Snapshot {
    /// Assembles a snapshot from captured parts.
    #[must_use]
    pub fn new(
        layout: ArenaLayout,
        player: PlayerState,
        enemy: EnemyState,
        inputs: Vec<InputBits>,
        steps: u32,
        dt: f64,
    ) -> Self {
        Self {
            layout,
            player,
            enemy,
            inputs,
            steps,
            dt,
        }
    }

    /// Seed of the captured encounter.
    #[must_use]
    pub const fn seed(&self) -> u32 {
        self.layout.seed
    }

    /// Captured room description.
    #[must_use]
    pub const fn layout(&self) -> &ArenaLayout {
        &self.layout
    }

    /// Captured player state.
    #[must_use]
    pub const fn player(&self) -> &PlayerState {
        &self.player
    }

    /// Captured enemy state, including the live parameter set.
    #[must_use]
    pub const fn enemy(&self) -> &EnemyState {
        &self.enemy
    }

    /// Trailing input trace in chronological order.
    #[must_use]
    pub fn inputs(&self) -> &[InputBits] {
        &self.inputs
    }

    /// Input recorded for the provided replay step; missing steps hold no input.
    #[must_use]
    pub fn input_at(&self, step: usize) -> InputBits {
        self.inputs.get(step).copied().unwrap_or(InputBits::NONE)
    }

    /// Number of ticks a replay advances.
    #[must_use]
    pub const fn steps(&self) -> u32 {
        self.steps
    }

    /// Fixed timestep of the replay, in seconds.
    #[must_use]
    pub const fn dt(&self) -> f64 {
        self.dt
    }
}

/// Weight change of a single rule between two parameter sets.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WeightChange {
    /// Rule name.
    pub rule_name: String,
    /// Weight before adaptation.
    pub before: f64,
    /// Weight after adaptation.
    pub after: f64,
    /// Signed difference `after - before`.
    pub weight_delta: f64,
}

/// Largest weight changes produced by one adaptation, for presentation collaborators.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AdaptationSummary {
    /// Changes ordered by descending magnitude.
    pub changes: Vec<WeightChange>,
}

impl AdaptationSummary {
    /// Compares two sets by rule name and keeps the `limit` largest absolute changes.
    ///
    /// Rules absent from `previous` report a zero delta.
    #[must_use]
    pub fn between(previous: &ParameterSet, next: &ParameterSet, limit: usize) -> Self {
        let mut changes: Vec<WeightChange> = next
            .rules()
            .iter()
            .map(|rule| {
                let after = rule.weight();
                let before = previous
                    .rules()
                    .iter()
                    .find(|candidate| candidate.name() == rule.name())
                    .map_or(after, Rule::weight);
                WeightChange {
                    rule_name: rule.name().to_owned(),
                    before,
                    after,
                    weight_delta: after - before,
                }
            })
            .collect();
        changes.sort_by(|a, b| b.weight_delta.abs().total_cmp(&a.weight_delta.abs()));
        changes.truncate(limit);
        Self { changes }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{de::DeserializeOwned, Serialize};

    fn assert_round_trip<T>(value: &T)
    where
        T: Serialize + DeserializeOwned + PartialEq + std::fmt::Debug,
    {
        let bytes = bincode::serialize(value).expect("serialize");
        let restored: T = bincode::deserialize(&bytes).expect("deserialize");
        assert_eq!(&restored, value);
    }

    fn two_rule_set() -> ParameterSet {
        ParameterSet::new(vec![
            Rule::new("Approach", 0.8, 0.15),
            Rule::new("Strafe", 0.2, 0.30),
        ])
    }

    #[test]
    fn rule_kind_resolves_known_names_and_falls_back() {
        assert_eq!(RuleKind::from_name("Charge"), RuleKind::Charge);
        assert_eq!(RuleKind::from_name(" Strafe "), RuleKind::Strafe);
        assert_eq!(RuleKind::from_name("Teleport"), RuleKind::Unrecognized);
        for (index, kind) in RuleKind::ALL.iter().enumerate() {
            assert_eq!(kind.index(), index);
        }
    }

    #[test]
    fn cooldown_decays_to_zero_and_rearms() {
        let mut rule = Rule::new("Approach", 0.8, 0.15);
        rule.arm_cooldown();
        assert!(!rule.is_ready());
        rule.decay_cooldown(0.1);
        assert!((rule.cooldown_remaining() - 0.05).abs() < 1e-12);
        rule.decay_cooldown(1.0);
        assert_eq!(rule.cooldown_remaining(), 0.0);
        assert!(rule.is_ready());
    }

    #[test]
    fn non_positive_cooldown_period_uses_default() {
        let rule = Rule::new("Feint", 0.5, 0.0);
        assert_eq!(rule.cooldown_period(), DEFAULT_COOLDOWN_PERIOD);
    }

    #[test]
    fn weights_are_clamped_into_band() {
        let bounds = WeightBounds::default();
        let mut rule = Rule::new("Charge", 0.01, 0.2);
        assert_eq!(rule.weight(), WEIGHT_FLOOR);
        rule.set_weight(9.0, bounds);
        assert_eq!(rule.weight(), DEFAULT_WEIGHT_CEILING);
        rule.set_weight(f64::NAN, bounds);
        assert_eq!(rule.weight(), WEIGHT_FLOOR);
    }

    #[test]
    fn degenerate_ceiling_collapses_onto_floor() {
        let bounds = WeightBounds::with_ceiling(0.0);
        assert_eq!(bounds.ceiling(), WEIGHT_FLOOR);
        assert_eq!(bounds.clamp(1.0), WEIGHT_FLOOR);
    }

    #[test]
    fn parameter_set_clones_never_alias() {
        let original = two_rule_set();
        let mut copy = original.clone();
        copy.rules_mut()[0].set_weight(1.5, WeightBounds::default());
        assert_eq!(original.rules()[0].weight(), 0.8);
        assert_eq!(copy.rules()[0].weight(), 1.5);
    }

    #[test]
    fn rule_json_accepts_minimal_shape() {
        let rule: Rule = serde_json_like();
        assert_eq!(rule.kind(), RuleKind::Approach);
        assert_eq!(rule.cooldown_period(), DEFAULT_COOLDOWN_PERIOD);
        assert!(rule.is_blacklisted(BlacklistTag::ForbiddenWhenClose));
    }

    fn serde_json_like() -> Rule {
        let record = RuleRecord {
            name: "Approach".to_owned(),
            weight: 0.8,
            cooldown_remaining: 0.0,
            cooldown_period: default_cooldown_period(),
            blacklist: [BlacklistTag::ForbiddenWhenClose].into_iter().collect(),
        };
        Rule::from(record)
    }

    #[test]
    fn parameter_set_round_trips_through_bincode() {
        let set = ParameterSet::new(vec![
            Rule::new("Approach", 0.8, 0.15).with_blacklist(BlacklistTag::ForbiddenWhenClose),
            Rule::new("Mystery", 0.4, 0.3),
        ]);
        assert_round_trip(&set);
    }

    #[test]
    fn snapshot_round_trips_through_bincode() {
        let layout = ArenaLayout {
            seed: 7,
            bounds: WorldBounds::new(960.0, 540.0),
            hazards: vec![
                Hazard::Spike {
                    center: DVec2::new(100.0, 120.0),
                    radius: 16.0,
                    period: 2.0,
                    phase: 0.5,
                    active: false,
                },
                Hazard::Beam {
                    pivot: DVec2::new(480.0, 270.0),
                    length: 190.0,
                    angle: 0.0,
                    angular_velocity: 0.7,
                    width: 8.0,
                },
            ],
            obstacles: vec![Obstacle::new(300.0, 200.0, 120.0, 40.0)],
        };
        let snapshot = Snapshot::new(
            layout,
            PlayerState::new(DVec2::new(240.0, 270.0)),
            EnemyState::new(DVec2::new(720.0, 270.0), Archetype::Boss, two_rule_set()),
            vec![InputBits::UP, InputBits::DASH.with(InputBits::LEFT)],
            180,
            DEFAULT_FIXED_DT,
        );
        assert_round_trip(&snapshot);
        assert_eq!(snapshot.input_at(1), InputBits::DASH.with(InputBits::LEFT));
        assert_eq!(snapshot.input_at(500), InputBits::NONE);
    }

    #[test]
    fn input_bits_ignore_unknown_flags_and_report_axis() {
        let bits = InputBits::from_bits(0b1110_1001);
        assert_eq!(bits.bits(), 0b0_1001);
        assert!(bits.contains(InputBits::UP));
        assert!(bits.contains(InputBits::RIGHT));
        assert!(!bits.contains(InputBits::DASH));
        assert_eq!(bits.movement_axis(), DVec2::new(1.0, -1.0));
        assert_eq!(bits.toggled(InputBits::UP), InputBits::RIGHT);
    }

    #[test]
    fn recorder_keeps_bounded_trailing_window() {
        let mut recorder = InputRecorder::with_capacity(3);
        for bits in 0..5u8 {
            recorder.push(InputBits::from_bits(bits));
        }
        assert_eq!(recorder.len(), 3);
        assert_eq!(
            recorder.trailing(2),
            vec![InputBits::from_bits(3), InputBits::from_bits(4)]
        );
        assert_eq!(recorder.trailing(10).len(), 3);
    }

    #[test]
    fn summary_reports_largest_changes_first() {
        let previous = ParameterSet::new(vec![
            Rule::new("Approach", 0.8, 0.15),
            Rule::new("Strafe", 0.2, 0.3),
            Rule::new("Charge", 1.0, 0.3),
        ]);
        let next = ParameterSet::new(vec![
            Rule::new("Approach", 0.9, 0.15),
            Rule::new("Strafe", 0.6, 0.3),
            Rule::new("Charge", 0.7, 0.3),
        ]);
        let summary = AdaptationSummary::between(&previous, &next, SUMMARY_CHANGE_LIMIT);
        let names: Vec<&str> = summary
            .changes
            .iter()
            .map(|change| change.rule_name.as_str())
            .collect();
        assert_eq!(names, vec!["Strafe", "Charge"]);
        assert!((summary.changes[1].weight_delta + 0.3).abs() < 1e-12);
    }

    #[test]
    fn telegraph_progress_decays_with_remaining_time() {
        let mut telegraph = TelegraphState::open("Charge", 0.5);
        assert_eq!(telegraph.progress(), 1.0);
        telegraph.remaining = 0.25;
        assert!((telegraph.progress() - 0.5).abs() < 1e-12);
    }
}
