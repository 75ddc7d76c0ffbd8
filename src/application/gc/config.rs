use std::time::Duration;

/// Configuration for orphan sweeping
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweeperConfig {
    /// How often the periodic loop runs a sweep
    pub interval: Duration,
    /// Retired records handled per sweep
    pub batch_size: i64,
    /// Retired records younger than this are left for reactivation
    pub grace_period: Duration,
    /// Whether storage is reconciled against the record table
    pub stray_sweep_enabled: bool,
    /// Stored objects younger than this are never treated as stray
    pub stray_object_min_age: Duration,
    /// How often the stray object pass runs (relative to main interval)
    pub stray_sweep_multiplier: u32,
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(300), // 5 minutes
            batch_size: 100,
            grace_period: Duration::from_secs(3600),
            stray_sweep_enabled: false,
            stray_object_min_age: Duration::from_secs(24 * 3600),
            stray_sweep_multiplier: 12,
        }
    }
}

impl SweeperConfig {
    pub fn new(interval: Duration, batch_size: i64, grace_period: Duration) -> Self {
        Self {
            interval,
            batch_size,
            grace_period,
            ..Self::default()
        }
    }

    pub fn with_stray_sweep(mut self, min_age: Duration) -> Self {
        self.stray_sweep_enabled = true;
        self.stray_object_min_age = min_age;
        self
    }

    /// Interval between stray object passes
    pub fn stray_sweep_interval(&self) -> Duration {
        self.interval * self.stray_sweep_multiplier
    }
}
