use adaptive_arena_core::DVec2;

/// Default number of projectile slots preallocated per simulation.
pub const DEFAULT_PROJECTILE_CAPACITY: usize = 256;

/// Side that fired a projectile.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Owner {
    /// Fired by the player; hits the enemy.
    Player,
    /// Fired by the enemy; hits the player.
    Enemy,
}

/// Single in-flight projectile.
#[derive(Clone, Debug, PartialEq)]
pub struct Projectile {
    /// Centre position.
    pub position: DVec2,
    /// Velocity in units per second.
    pub velocity: DVec2,
    /// Collision radius.
    pub radius: f64,
    /// Damage applied on hit.
    pub damage: f64,
    /// Seconds until the projectile expires.
    pub life: f64,
    /// Side that fired the projectile.
    pub owner: Owner,
}

/// Integer handle addressing a projectile slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProjectileHandle(u32);

impl ProjectileHandle {
    /// Slot index addressed by the handle.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Fixed-capacity arena of projectile slots recycled through a free list.
///
/// Spawning never allocates once the arena is built. Released slots are
/// reused last-in first-out, and iteration always visits live slots in
/// ascending slot order so replays stay deterministic.
#[derive(Clone, Debug)]
pub struct ProjectileArena {
    slots: Vec<Option<Projectile>>,
    free: Vec<u32>,
}

impl ProjectileArena {
    /// Creates an arena with the provided number of slots.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = u32::try_from(capacity).unwrap_or(u32::MAX);
        Self {
            slots: (0..capacity).map(|_| None).collect(),
            free: (0..capacity).rev().collect(),
        }
    }

    /// Total number of slots.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of live projectiles.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    /// Reports whether no projectile is in flight.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stores the projectile in a free slot; returns `None` when the arena is full.
    pub fn spawn(&mut self, projectile: Projectile) -> Option<ProjectileHandle> {
        let index = self.free.pop()?;
        self.slots[index as usize] = Some(projectile);
        Some(ProjectileHandle(index))
    }

    /// Frees the slot and returns the projectile it held.
    pub fn release(&mut self, handle: ProjectileHandle) -> Option<Projectile> {
        let released = self.slots.get_mut(handle.index())?.take()?;
        self.free.push(handle.0);
        Some(released)
    }

    /// Projectile stored behind the handle.
    #[must_use]
    pub fn get(&self, handle: ProjectileHandle) -> Option<&Projectile> {
        self.slots.get(handle.index())?.as_ref()
    }

    /// Iterates live projectiles in ascending slot order.
    pub fn iter(&self) -> impl Iterator<Item = (ProjectileHandle, &Projectile)> + '_ {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            let handle = ProjectileHandle(u32::try_from(index).ok()?);
            slot.as_ref().map(|projectile| (handle, projectile))
        })
    }

    /// Visits live projectiles in ascending slot order, releasing those the visitor rejects.
    pub fn sweep<F>(&mut self, mut keep: F)
    where
        F: FnMut(&mut Projectile) -> bool,
    {
        for (index, slot) in self.slots.iter_mut().enumerate() {
            let Some(projectile) = slot.as_mut() else {
                continue;
            };
            if !keep(projectile) {
                *slot = None;
                if let Ok(index) = u32::try_from(index) {
                    self.free.push(index);
                }
            }
        }
    }

    /// Releases every live projectile.
    pub fn clear(&mut self) {
        let capacity = u32::try_from(self.slots.len()).unwrap_or(u32::MAX);
        self.slots.iter_mut().for_each(|slot| *slot = None);
        self.free = (0..capacity).rev().collect();
    }
}

impl Default for ProjectileArena {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_PROJECTILE_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bullet(x: f64) -> Projectile {
        Projectile {
            position: DVec2::new(x, 0.0),
            velocity: DVec2::ZERO,
            radius: 3.0,
            damage: 10.0,
            life: 1.0,
            owner: Owner::Enemy,
        }
    }

    #[test]
    fn spawn_fills_lowest_slots_first() {
        let mut arena = ProjectileArena::with_capacity(4);
        let first = arena.spawn(bullet(0.0)).expect("slot");
        let second = arena.spawn(bullet(1.0)).expect("slot");
        assert_eq!(first.index(), 0);
        assert_eq!(second.index(), 1);
        assert_eq!(arena.len(), 2);
    }

    #[test]
    fn released_slot_is_reused_next() {
        let mut arena = ProjectileArena::with_capacity(4);
        let first = arena.spawn(bullet(0.0)).expect("slot");
        let _ = arena.spawn(bullet(1.0)).expect("slot");
        let released = arena.release(first).expect("live projectile");
        assert_eq!(released.position.x, 0.0);
        assert!(arena.release(first).is_none());
        let reused = arena.spawn(bullet(2.0)).expect("slot");
        assert_eq!(reused, first);
    }

    #[test]
    fn full_arena_rejects_spawns() {
        let mut arena = ProjectileArena::with_capacity(1);
        assert!(arena.spawn(bullet(0.0)).is_some());
        assert!(arena.spawn(bullet(1.0)).is_none());
    }

    #[test]
    fn sweep_releases_rejected_projectiles_in_slot_order() {
        let mut arena = ProjectileArena::with_capacity(4);
        for x in 0..3 {
            let _ = arena.spawn(bullet(f64::from(x)));
        }
        let mut visited = Vec::new();
        arena.sweep(|projectile| {
            visited.push(projectile.position.x);
            projectile.position.x != 1.0
        });
        assert_eq!(visited, vec![0.0, 1.0, 2.0]);
        assert_eq!(arena.len(), 2);
        let positions: Vec<f64> = arena.iter().map(|(_, p)| p.position.x).collect();
        assert_eq!(positions, vec![0.0, 2.0]);
    }

    #[test]
    fn clear_restores_full_capacity() {
        let mut arena = ProjectileArena::with_capacity(2);
        let _ = arena.spawn(bullet(0.0));
        arena.clear();
        assert!(arena.is_empty());
        assert_eq!(arena.spawn(bullet(1.0)).map(ProjectileHandle::index), Some(0));
    }
}
