//! Circle and rectangle geometry used by movement, projectiles, and sight checks.

use adaptive_arena_core::{DVec2, Obstacle, WorldBounds};

/// Distance below which a circle centre is treated as sitting on the rectangle.
const CONTACT_EPSILON: f64 = 1e-9;

/// Normalises the vector to unit length.
///
/// A zero vector is returned unchanged instead of producing NaN components.
#[must_use]
pub fn safe_normalize(vector: DVec2) -> DVec2 {
    let length = vector.length();
    if length > 0.0 {
        vector / length
    } else {
        vector
    }
}

/// Keeps a circle of the provided radius fully inside the playable area.
#[must_use]
pub fn clamp_to_bounds(position: DVec2, radius: f64, bounds: WorldBounds) -> DVec2 {
    let max_x = (bounds.width - radius).max(radius);
    let max_y = (bounds.height - radius).max(radius);
    DVec2::new(position.x.clamp(radius, max_x), position.y.clamp(radius, max_y))
}

/// Reports whether two circles touch or overlap.
#[must_use]
pub fn circles_overlap(a: DVec2, radius_a: f64, b: DVec2, radius_b: f64) -> bool {
    let reach = radius_a + radius_b;
    a.distance_squared(b) <= reach * reach
}

/// Pushes a circle out of an obstacle along the shortest separating axis.
///
/// Returns the corrected centre when the circle overlapped the rectangle.
#[must_use]
pub fn resolve_circle_aabb(position: DVec2, radius: f64, obstacle: &Obstacle) -> Option<DVec2> {
    let closest = obstacle.closest_point(position);
    let offset = position - closest;
    let distance_squared = offset.length_squared();
    if distance_squared > radius * radius {
        return None;
    }

    let distance = distance_squared.sqrt();
    if distance > CONTACT_EPSILON {
        let normal = offset / distance;
        return Some(position + normal * (radius - distance));
    }

    // Centre inside the rectangle: exit through the nearest face.
    let left = position.x - obstacle.x;
    let right = obstacle.x + obstacle.width - position.x;
    let top = position.y - obstacle.y;
    let bottom = obstacle.y + obstacle.height - position.y;
    let nearest = left.min(right).min(top).min(bottom);
    let resolved = if nearest == left {
        DVec2::new(obstacle.x - radius, position.y)
    } else if nearest == right {
        DVec2::new(obstacle.x + obstacle.width + radius, position.y)
    } else if nearest == top {
        DVec2::new(position.x, obstacle.y - radius)
    } else {
        DVec2::new(position.x, obstacle.y + obstacle.height + radius)
    };
    Some(resolved)
}

/// Resolves a circle against every obstacle in declaration order.
#[must_use]
pub fn collide_with_obstacles(position: DVec2, radius: f64, obstacles: &[Obstacle]) -> DVec2 {
    obstacles.iter().fold(position, |current, obstacle| {
        resolve_circle_aabb(current, radius, obstacle).unwrap_or(current)
    })
}

/// Reports whether a small circle touches any obstacle.
#[must_use]
pub fn touches_obstacle(position: DVec2, radius: f64, obstacles: &[Obstacle]) -> bool {
    obstacles.iter().any(|obstacle| {
        obstacle.closest_point(position).distance_squared(position) <= radius * radius
    })
}

/// Shortest distance from a point to the segment `start..end`.
#[must_use]
pub fn distance_to_segment(point: DVec2, start: DVec2, end: DVec2) -> f64 {
    let along = end - start;
    let relative = point - start;
    let projection = along.dot(relative);
    if projection <= 0.0 {
        return point.distance(start);
    }
    let span = along.length_squared();
    if span <= projection {
        return point.distance(end);
    }
    point.distance(start + along * (projection / span))
}

/// Reports whether the segment `start..end` crosses the rectangle.
#[must_use]
pub fn segment_intersects_aabb(start: DVec2, end: DVec2, obstacle: &Obstacle) -> bool {
    let delta = end - start;
    let mut entry = 0.0_f64;
    let mut exit = 1.0_f64;
    let slabs = [
        (start.x, delta.x, obstacle.x, obstacle.x + obstacle.width),
        (start.y, delta.y, obstacle.y, obstacle.y + obstacle.height),
    ];
    for (origin, direction, low, high) in slabs {
        if direction.abs() <= CONTACT_EPSILON {
            if origin < low || origin > high {
                return false;
            }
            continue;
        }
        let first = (low - origin) / direction;
        let second = (high - origin) / direction;
        entry = entry.max(first.min(second));
        exit = exit.min(first.max(second));
        if entry > exit {
            return false;
        }
    }
    true
}

/// Reports whether no obstacle occludes the straight line between two points.
#[must_use]
pub fn line_of_sight(from: DVec2, to: DVec2, obstacles: &[Obstacle]) -> bool {
    !obstacles
        .iter()
        .any(|obstacle| segment_intersects_aabb(from, to, obstacle))
}
