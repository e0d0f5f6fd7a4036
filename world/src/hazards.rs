//! Hazard phase advancement and damage queries.

use std::f64::consts::TAU;

use adaptive_arena_core::{DVec2, Hazard};

use crate::physics::distance_to_segment;

/// Damage per second dealt by an active spike trap.
pub const SPIKE_DAMAGE_RATE: f64 = 25.0;

/// Damage per second dealt by a sweeping beam.
pub const BEAM_DAMAGE_RATE: f64 = 18.0;

/// Cycle length used by spikes configured with a non-positive period.
pub const DEFAULT_SPIKE_PERIOD: f64 = 2.0;

/// Thickness used by beams configured with a non-positive width.
pub const DEFAULT_BEAM_WIDTH: f64 = 8.0;

/// Advances every hazard to the provided room clock.
///
/// `elapsed` is the room time after this tick; `dt` drives the beam sweep.
pub fn advance_hazards(hazards: &mut [Hazard], elapsed: f64, dt: f64) {
    for hazard in hazards {
        match hazard {
            Hazard::Spike {
                period,
                phase,
                active,
                ..
            } => {
                let cycle = spike_period(*period);
                *active = ((elapsed + *phase) * TAU / cycle).sin() > 0.0;
            }
            Hazard::Beam {
                angle,
                angular_velocity,
                ..
            } => {
                *angle = (*angle + *angular_velocity * dt) % TAU;
            }
        }
    }
}

/// End point of a beam sweeping around its pivot.
#[must_use]
pub fn beam_tip(pivot: DVec2, length: f64, angle: f64) -> DVec2 {
    pivot + DVec2::new(angle.cos(), angle.sin()) * length
}

/// Damage the hazards deal during `dt` to a circle at the provided position.
#[must_use]
pub fn hazard_damage(hazards: &[Hazard], position: DVec2, radius: f64, dt: f64) -> f64 {
    hazards
        .iter()
        .map(|hazard| match hazard {
            Hazard::Spike {
                center,
                radius: spike_radius,
                active,
                ..
            } => {
                let reach = radius + spike_radius;
                if *active && center.distance_squared(position) <= reach * reach {
                    SPIKE_DAMAGE_RATE * dt
                } else {
                    0.0
                }
            }
            Hazard::Beam {
                pivot,
                length,
                angle,
                width,
                ..
            } => {
                let tip = beam_tip(*pivot, *length, *angle);
                if distance_to_segment(position, *pivot, tip) <= beam_width(*width) / 2.0 + radius {
                    BEAM_DAMAGE_RATE * dt
                } else {
                    0.0
                }
            }
        })
        .sum()
}

/// Clearance between the position and the closest damaging hazard surface.
///
/// Inactive spikes are ignored. Returns `None` when no hazard is dangerous.
#[must_use]
pub fn nearest_active_hazard(hazards: &[Hazard], position: DVec2) -> Option<f64> {
    hazards
        .iter()
        .filter_map(|hazard| match hazard {
            Hazard::Spike {
                center,
                radius,
                active,
                ..
            } => active.then(|| center.distance(position) - radius),
            Hazard::Beam {
                pivot,
                length,
                angle,
                width,
                ..
            } => {
                let tip = beam_tip(*pivot, *length, *angle);
                Some(distance_to_segment(position, *pivot, tip) - beam_width(*width) / 2.0)
            }
        })
        .min_by(f64::total_cmp)
}

fn spike_period(period: f64) -> f64 {
    if period > 0.0 {
        period
    } else {
        DEFAULT_SPIKE_PERIOD
    }
}

fn beam_width(width: f64) -> f64 {
    if width > 0.0 {
        width
    } else {
        DEFAULT_BEAM_WIDTH
    }
}
