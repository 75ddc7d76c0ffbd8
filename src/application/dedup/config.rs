use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::application::gc::SweeperConfig;

/// What happens when a record's last reference goes away
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum LifecyclePolicy {
    /// Record and object are deleted inline by `decrement`
    Immediate,
    /// Record is retired and kept for `grace_period`, during which an upload
    /// of the same bytes reactivates it. The sweeper deletes it afterwards.
    Deferred {
        #[serde(with = "duration_secs")]
        grace_period: Duration,
    },
}

impl Default for LifecyclePolicy {
    fn default() -> Self {
        LifecyclePolicy::Deferred {
            grace_period: Duration::from_secs(3600),
        }
    }
}

impl LifecyclePolicy {
    /// How long a retired record is protected from sweeping
    pub fn grace_period(&self) -> Duration {
        match self {
            LifecyclePolicy::Immediate => Duration::ZERO,
            LifecyclePolicy::Deferred { grace_period } => *grace_period,
        }
    }
}

/// Configuration for the deduplication service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DedupConfig {
    pub lifecycle: LifecyclePolicy,
    /// Insert attempts lost to concurrent writers before giving up
    pub max_insert_retries: u32,
    /// Hamming distance used when callers do not pass one
    pub default_similarity_threshold: u32,
    /// Sweep schedule; its grace period is taken from `lifecycle`
    pub sweeper: SweeperConfig,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            lifecycle: LifecyclePolicy::default(),
            max_insert_retries: 3,
            default_similarity_threshold: 5,
            sweeper: SweeperConfig::default(),
        }
    }
}

impl DedupConfig {
    pub fn with_lifecycle(mut self, lifecycle: LifecyclePolicy) -> Self {
        self.lifecycle = lifecycle;
        self
    }

    /// Sweeper configuration with the grace window of the lifecycle policy
    pub fn sweeper_config(&self) -> SweeperConfig {
        SweeperConfig {
            grace_period: self.lifecycle.grace_period(),
            ..self.sweeper.clone()
        }
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grace_period() {
        assert_eq!(LifecyclePolicy::Immediate.grace_period(), Duration::ZERO);
        assert_eq!(
            LifecyclePolicy::default().grace_period(),
            Duration::from_secs(3600)
        );
    }

    #[test]
    fn test_sweeper_config_follows_lifecycle() {
        let config = DedupConfig::default().with_lifecycle(LifecyclePolicy::Deferred {
            grace_period: Duration::from_secs(42),
        });
        assert_eq!(config.sweeper_config().grace_period, Duration::from_secs(42));

        let config = config.with_lifecycle(LifecyclePolicy::Immediate);
        assert_eq!(config.sweeper_config().grace_period, Duration::ZERO);
        assert_eq!(config.sweeper_config().batch_size, 100);
    }

    #[test]
    fn test_policy_from_toml() {
        #[derive(Deserialize)]
        struct Wrapper {
            lifecycle: LifecyclePolicy,
        }

        let parsed: Wrapper =
            toml::from_str("[lifecycle]\npolicy = \"deferred\"\ngrace_period = 60\n").unwrap();
        assert_eq!(
            parsed.lifecycle,
            LifecyclePolicy::Deferred {
                grace_period: Duration::from_secs(60)
            }
        );

        let parsed: Wrapper = toml::from_str("[lifecycle]\npolicy = \"immediate\"\n").unwrap();
        assert_eq!(parsed.lifecycle, LifecyclePolicy::Immediate);
    }
}
