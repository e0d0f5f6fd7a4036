//! Device-capability heuristic that scales pool and population sizes.

use std::{num::NonZeroUsize, thread};

const FALLBACK_CORES: usize = 4;
const FALLBACK_MEMORY_GB: f64 = 8.0;
const MIN_SCALE: f64 = 0.25;

/// Coarse description of the host running the evaluation pool.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DeviceProfile {
    logical_cores: usize,
    memory_gb: f64,
}

impl DeviceProfile {
    /// Describes a device with the provided core count and memory size.
    #[must_use]
    pub fn new(logical_cores: usize, memory_gb: Option<f64>) -> Self {
        Self {
            logical_cores: logical_cores.max(1),
            memory_gb: memory_gb
                .filter(|memory| memory.is_finite() && *memory > 0.0)
                .unwrap_or(FALLBACK_MEMORY_GB),
        }
    }

    /// Reads the core count from the running host; memory must be supplied as a hint.
    #[must_use]
    pub fn detect(memory_gb: Option<f64>) -> Self {
        let cores = thread::available_parallelism().map_or(FALLBACK_CORES, NonZeroUsize::get);
        Self::new(cores, memory_gb)
    }

    /// Logical cores available to the process.
    #[must_use]
    pub const fn logical_cores(&self) -> usize {
        self.logical_cores
    }

    /// Multiplier in `[0.25, 1.0]` applied to pool and population sizes.
    #[must_use]
    pub fn scale(&self) -> f64 {
        let mut scale: f64 = match self.logical_cores {
            0..=2 => 0.4,
            3..=4 => 0.65,
            5..=6 => 0.85,
            _ => 1.0,
        };
        if self.memory_gb <= 2.0 {
            scale *= 0.8;
        } else if self.memory_gb <= 4.0 {
            scale *= 0.9;
        }
        scale.clamp(MIN_SCALE, 1.0)
    }

    /// Execution units to spawn: all cores but one, scaled, never fewer than one.
    #[must_use]
    pub fn pool_size(&self) -> usize {
        scaled(self.logical_cores.saturating_sub(1).max(1), self.scale())
    }

    /// Scales a configured population size, never below one.
    #[must_use]
    pub fn population(&self, requested: usize) -> usize {
        scaled(requested.max(1), self.scale())
    }
}

fn scaled(count: usize, scale: f64) -> usize {
    ((count as f64 * scale).round() as usize).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_devices_are_scaled_down() {
        let phone = DeviceProfile::new(2, Some(2.0));
        assert!((phone.scale() - 0.32).abs() < 1e-12);
        assert_eq!(phone.pool_size(), 1);
        assert_eq!(phone.population(96), 31);
    }

    #[test]
    fn large_devices_run_at_full_scale() {
        let workstation = DeviceProfile::new(16, None);
        assert_eq!(workstation.scale(), 1.0);
        assert_eq!(workstation.pool_size(), 15);
        assert_eq!(workstation.population(32), 32);
    }

    #[test]
    fn mid_range_tiers() {
        assert!((DeviceProfile::new(4, Some(4.0)).scale() - 0.585).abs() < 1e-12);
        assert!((DeviceProfile::new(6, Some(16.0)).scale() - 0.85).abs() < 1e-12);
        assert_eq!(DeviceProfile::new(0, Some(-1.0)).logical_cores(), 1);
    }

    #[test]
    fn detected_profile_is_usable() {
        let profile = DeviceProfile::detect(None);
        assert!(profile.pool_size() >= 1);
        assert!((0.25..=1.0).contains(&profile.scale()));
    }
}
