#![forbid(unsafe_code)]

//! Predictor configuration.
//!
//! # Environment Variables
//!
//! | Variable | Field | Default |
//! |---|---|---|
//! | `PRESAGE_MIN_CONFIDENCE` | `min_confidence` | `0.7` |
//! | `PRESAGE_BUILTIN_CONFIDENCE` | `builtin_confidence` | `0.85` |
//! | `PRESAGE_MAX_HISTORY` | `max_history_per_key` | `100` |
//! | `PRESAGE_MAX_KEYS` | `max_keys` | `1000` |
//! | `PRESAGE_MAX_MEMORY_BYTES` | `max_memory_bytes` | `104857600` |
//! | `PRESAGE_EVICTION_POLICY` | `eviction_policy` | `lfu` |
//!
//! Values that fail to parse are logged and ignored.

use std::env;
use std::fmt;
use std::str::FromStr;

use presage_core::ValidationConfig;
use serde::{Deserialize, Serialize};

/// Which pattern entry is dropped first under memory pressure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvictionPolicy {
    /// Least recently touched by learn, predict, or verify.
    LeastRecentlyUsed,
    /// Fewest accesses, ties broken by least recent access.
    #[default]
    LeastFrequentlyUsed,
    /// Earliest created.
    OldestFirst,
}

impl EvictionPolicy {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::LeastRecentlyUsed => "lru",
            Self::LeastFrequentlyUsed => "lfu",
            Self::OldestFirst => "oldest",
        }
    }
}

impl fmt::Display for EvictionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an [`EvictionPolicy`] name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownPolicy(pub String);

impl fmt::Display for UnknownPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unknown eviction policy {:?} (expected lru, lfu, or oldest)",
            self.0
        )
    }
}

impl std::error::Error for UnknownPolicy {}

impl FromStr for EvictionPolicy {
    type Err = UnknownPolicy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lru" | "least_recently_used" => Ok(Self::LeastRecentlyUsed),
            "lfu" | "least_frequently_used" => Ok(Self::LeastFrequentlyUsed),
            "oldest" | "fifo" | "oldest_first" => Ok(Self::OldestFirst),
            _ => Err(UnknownPolicy(s.to_string())),
        }
    }
}

/// Tunables of a [`Predictor`](crate::Predictor).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PredictorConfig {
    /// Minimum confidence for a prediction to be returned.
    pub min_confidence: f64,
    /// Confidence reported by the built-in numeric heuristics.
    pub builtin_confidence: f64,
    /// Concrete observations kept per key; older ones are dropped.
    pub max_history_per_key: usize,
    /// Maximum number of (component, state key) entries.
    pub max_keys: usize,
    /// Byte budget for all pattern data.
    pub max_memory_bytes: usize,
    /// Fraction of the budget to evict down to once it is exceeded.
    pub eviction_target_ratio: f64,
    pub eviction_policy: EvictionPolicy,
    /// Limits for trees passed to `learn`.
    pub validation: ValidationConfig,
}

impl Default for PredictorConfig {
    fn default() -> Self {
        Self {
            min_confidence: 0.7,
            builtin_confidence: 0.85,
            max_history_per_key: 100,
            max_keys: 1000,
            max_memory_bytes: 100 * 1024 * 1024,
            eviction_target_ratio: 0.9,
            eviction_policy: EvictionPolicy::LeastFrequentlyUsed,
            validation: ValidationConfig::default(),
        }
    }
}

impl PredictorConfig {
    /// Defaults overridden by `PRESAGE_*` environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Defaults overridden through an arbitrary lookup function.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        override_from(&lookup, "PRESAGE_MIN_CONFIDENCE", &mut config.min_confidence);
        override_from(
            &lookup,
            "PRESAGE_BUILTIN_CONFIDENCE",
            &mut config.builtin_confidence,
        );
        override_from(&lookup, "PRESAGE_MAX_HISTORY", &mut config.max_history_per_key);
        override_from(&lookup, "PRESAGE_MAX_KEYS", &mut config.max_keys);
        override_from(&lookup, "PRESAGE_MAX_MEMORY_BYTES", &mut config.max_memory_bytes);
        override_from(&lookup, "PRESAGE_EVICTION_POLICY", &mut config.eviction_policy);
        config
    }

    #[must_use]
    pub fn with_min_confidence(mut self, value: f64) -> Self {
        self.min_confidence = value;
        self
    }

    #[must_use]
    pub fn with_builtin_confidence(mut self, value: f64) -> Self {
        self.builtin_confidence = value;
        self
    }

    #[must_use]
    pub fn with_max_history_per_key(mut self, value: usize) -> Self {
        self.max_history_per_key = value;
        self
    }

    #[must_use]
    pub fn with_max_keys(mut self, value: usize) -> Self {
        self.max_keys = value;
        self
    }

    #[must_use]
    pub fn with_max_memory_bytes(mut self, value: usize) -> Self {
        self.max_memory_bytes = value;
        self
    }

    #[must_use]
    pub fn with_eviction_target_ratio(mut self, value: f64) -> Self {
        self.eviction_target_ratio = value;
        self
    }

    #[must_use]
    pub fn with_eviction_policy(mut self, policy: EvictionPolicy) -> Self {
        self.eviction_policy = policy;
        self
    }

    #[must_use]
    pub fn with_validation(mut self, validation: ValidationConfig) -> Self {
        self.validation = validation;
        self
    }

    /// Byte level that eviction brings the store down to.
    #[must_use]
    pub fn eviction_low_water(&self) -> usize {
        let ratio = self.eviction_target_ratio.clamp(0.0, 1.0);
        (self.max_memory_bytes as f64 * ratio) as usize
    }
}

fn override_from<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, slot: &mut T)
where
    T: FromStr,
    T::Err: fmt::Display,
{
    let Some(raw) = lookup(key) else {
        return;
    };
    match raw.trim().parse() {
        Ok(value) => *slot = value,
        Err(e) => tracing::warn!(key, value = %raw, error = %e, "ignoring invalid setting"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults() {
        let config = PredictorConfig::default();
        assert_eq!(config.min_confidence, 0.7);
        assert_eq!(config.builtin_confidence, 0.85);
        assert_eq!(config.max_history_per_key, 100);
        assert_eq!(config.max_keys, 1000);
        assert_eq!(config.max_memory_bytes, 104_857_600);
        assert_eq!(config.eviction_policy, EvictionPolicy::LeastFrequentlyUsed);
        assert_eq!(config.eviction_low_water(), 94_371_840);
    }

    #[test]
    fn lookup_overrides() {
        let config = PredictorConfig::from_lookup(lookup(&[
            ("PRESAGE_MIN_CONFIDENCE", "0.5"),
            ("PRESAGE_MAX_KEYS", "12"),
            ("PRESAGE_EVICTION_POLICY", "LRU"),
        ]));
        assert_eq!(config.min_confidence, 0.5);
        assert_eq!(config.max_keys, 12);
        assert_eq!(config.eviction_policy, EvictionPolicy::LeastRecentlyUsed);
    }

    #[test]
    fn invalid_values_keep_defaults() {
        let config = PredictorConfig::from_lookup(lookup(&[
            ("PRESAGE_MAX_HISTORY", "lots"),
            ("PRESAGE_EVICTION_POLICY", "random"),
        ]));
        assert_eq!(config.max_history_per_key, 100);
        assert_eq!(config.eviction_policy, EvictionPolicy::LeastFrequentlyUsed);
    }

    #[test]
    fn policy_names_round_trip() {
        for policy in [
            EvictionPolicy::LeastRecentlyUsed,
            EvictionPolicy::LeastFrequentlyUsed,
            EvictionPolicy::OldestFirst,
        ] {
            assert_eq!(policy.to_string().parse::<EvictionPolicy>(), Ok(policy));
        }
    }

    #[test]
    fn builders_chain() {
        let config = PredictorConfig::default()
            .with_max_memory_bytes(1000)
            .with_eviction_target_ratio(0.5)
            .with_eviction_policy(EvictionPolicy::OldestFirst);
        assert_eq!(config.eviction_low_water(), 500);
        assert_eq!(config.eviction_policy, EvictionPolicy::OldestFirst);
    }
}
