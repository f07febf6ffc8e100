#![forbid(unsafe_code)]

//! Bounded storage of learned patterns.
//!
//! One entry per (component type, state key) holds the concrete observation
//! history and, once learned, the template for that key. Entries live in an
//! [`LruCache`] so recency order is maintained on every touch; frequency and
//! age are tracked on the entry for the other policies.
//!
//! # Bounds
//!
//! - At most `max_history_per_key` observations per entry (oldest dropped).
//! - At most `max_keys` entries.
//! - Estimated bytes at most `max_memory_bytes`. Once exceeded, entries are
//!   evicted per policy down to the low-water mark. The entry being written
//!   is evicted last.
//!
//! Eviction only runs from [`PatternStore::enforce_limits`], which the
//! predictor calls at the end of `learn`, never in the middle of a lookup.

use std::collections::VecDeque;
use std::fmt;

use lru::LruCache;
use presage_core::{Patch, StateChange, StateValue};
use rustc_hash::FxBuildHasher;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::{EvictionPolicy, PredictorConfig};
use crate::transition::TransitionKind;

/// Identity of a pattern entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PatternKey {
    pub component_type: String,
    pub state_key: String,
}

impl PatternKey {
    #[must_use]
    pub fn new(component_type: impl Into<String>, state_key: impl Into<String>) -> Self {
        Self {
            component_type: component_type.into(),
            state_key: state_key.into(),
        }
    }

    fn estimated_bytes(&self) -> usize {
        std::mem::size_of::<Self>() + self.component_type.len() + self.state_key.len()
    }
}

impl fmt::Display for PatternKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.component_type, self.state_key)
    }
}

/// Where a prediction came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PredictionSource {
    Template,
    Concrete,
    Builtin,
}

/// Hit and miss counts for one prediction source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HitCounter {
    pub hits: u64,
    pub misses: u64,
}

impl HitCounter {
    pub fn record(&mut self, matched: bool) {
        if matched {
            self.hits += 1;
        } else {
            self.misses += 1;
        }
    }

    #[must_use]
    pub fn total(&self) -> u64 {
        self.hits + self.misses
    }

    /// `hits / (hits + misses)`, or `None` before any verification.
    #[must_use]
    pub fn hit_rate(&self) -> Option<f64> {
        match self.total() {
            0 => None,
            total => Some(self.hits as f64 / total as f64),
        }
    }
}

/// One concrete `(old, new, patches)` observation.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub old_value: StateValue,
    pub new_value: StateValue,
    pub kind: TransitionKind,
    pub patches: Vec<Patch>,
}

impl Observation {
    #[must_use]
    pub fn new(old_value: StateValue, new_value: StateValue, patches: Vec<Patch>) -> Self {
        let kind = TransitionKind::classify(&old_value, &new_value);
        Self {
            old_value,
            new_value,
            kind,
            patches,
        }
    }

    fn estimated_bytes(&self) -> usize {
        std::mem::size_of::<Self>()
            + self.old_value.estimated_bytes()
            + self.new_value.estimated_bytes()
            + presage_core::patch::estimated_bytes(&self.patches)
    }
}

/// The learned template of a key.
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateRecord {
    pub patches: Vec<Patch>,
    pub counter: HitCounter,
    /// Observations that re-derived this same template.
    pub observations: u64,
}

impl TemplateRecord {
    /// Hit rate, or `1.0` while untested: the template reproduced the change
    /// it was learned from.
    #[must_use]
    pub fn confidence(&self) -> f64 {
        self.counter.hit_rate().unwrap_or(1.0)
    }
}

/// Unverified predictions kept per key.
pub const MAX_PENDING_PREDICTIONS: usize = 16;

/// A served prediction awaiting verification.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingPrediction {
    pub old_value: StateValue,
    pub new_value: StateValue,
    pub source: PredictionSource,
}

impl PendingPrediction {
    fn is_for(&self, change: &StateChange) -> bool {
        self.old_value == change.old_value && self.new_value == change.new_value
    }
}

/// Everything stored for one key.
#[derive(Debug, Clone)]
pub struct PatternEntry {
    pub history: VecDeque<Observation>,
    /// Verifications of concrete predictions for this key.
    pub concrete: HitCounter,
    pub template: Option<TemplateRecord>,
    /// Served predictions awaiting verification, oldest first.
    pub pending: VecDeque<PendingPrediction>,
    pub access_count: u64,
    pub created_at: u64,
    pub last_access: u64,
    bytes: usize,
}

impl PatternEntry {
    fn new(now: u64) -> Self {
        Self {
            history: VecDeque::new(),
            concrete: HitCounter::default(),
            template: None,
            pending: VecDeque::new(),
            access_count: 0,
            created_at: now,
            last_access: now,
            bytes: 0,
        }
    }

    /// Queue a served prediction until it is verified or discarded. Past
    /// [`MAX_PENDING_PREDICTIONS`] the oldest is dropped unverified.
    pub fn push_pending(&mut self, change: &StateChange, source: PredictionSource) {
        if self.pending.len() >= MAX_PENDING_PREDICTIONS {
            self.pending.pop_front();
        }
        self.pending.push_back(PendingPrediction {
            old_value: change.old_value.clone(),
            new_value: change.new_value.clone(),
            source,
        });
    }

    /// Take the oldest pending prediction for the same transition as
    /// `change`.
    pub fn take_pending(&mut self, change: &StateChange) -> Option<PredictionSource> {
        let at = self.pending.iter().position(|p| p.is_for(change))?;
        self.pending.remove(at).map(|p| p.source)
    }

    /// Estimated bytes, as of the last store update.
    #[inline]
    #[must_use]
    pub fn bytes(&self) -> usize {
        self.bytes
    }

    fn estimate(&self, key: &PatternKey) -> usize {
        std::mem::size_of::<Self>()
            + key.estimated_bytes()
            + self
                .history
                .iter()
                .map(Observation::estimated_bytes)
                .sum::<usize>()
            + self
                .template
                .as_ref()
                .map_or(0, |t| presage_core::patch::estimated_bytes(&t.patches))
    }
}

/// Result of recording a template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateUpdate {
    Created,
    /// A different template was stored before; counters were reset.
    Replaced,
    /// The same template was derived again.
    Confirmed,
}

/// Bounded map from [`PatternKey`] to [`PatternEntry`].
pub struct PatternStore {
    entries: LruCache<PatternKey, PatternEntry, FxBuildHasher>,
    policy: EvictionPolicy,
    max_history: usize,
    max_keys: usize,
    max_bytes: usize,
    low_water: usize,
    total_bytes: usize,
    clock: u64,
    evictions: u64,
}

impl fmt::Debug for PatternStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PatternStore")
            .field("entries", &self.entries.len())
            .field("policy", &self.policy)
            .field("total_bytes", &self.total_bytes)
            .field("max_bytes", &self.max_bytes)
            .field("evictions", &self.evictions)
            .finish()
    }
}

impl PatternStore {
    #[must_use]
    pub fn new(config: &PredictorConfig) -> Self {
        Self {
            entries: LruCache::unbounded_with_hasher(FxBuildHasher),
            policy: config.eviction_policy,
            max_history: config.max_history_per_key.max(1),
            max_keys: config.max_keys,
            max_bytes: config.max_memory_bytes,
            low_water: config.eviction_low_water(),
            total_bytes: 0,
            clock: 0,
            evictions: 0,
        }
    }

    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[inline]
    #[must_use]
    pub fn total_bytes(&self) -> usize {
        self.total_bytes
    }

    #[inline]
    #[must_use]
    pub fn evictions(&self) -> u64 {
        self.evictions
    }

    /// Look at an entry without counting an access.
    #[must_use]
    pub fn peek(&self, key: &PatternKey) -> Option<&PatternEntry> {
        self.entries.peek(key)
    }

    /// Entry for `key`, counted as an access.
    pub fn touch(&mut self, key: &PatternKey) -> Option<&mut PatternEntry> {
        let now = self.tick();
        let entry = self.entries.get_mut(key)?;
        entry.access_count += 1;
        entry.last_access = now;
        Some(entry)
    }

    /// Iterate entries from most to least recently used.
    pub fn iter(&self) -> impl Iterator<Item = (&PatternKey, &PatternEntry)> {
        self.entries.iter()
    }

    /// Create or update the entry for `key` and re-account its size.
    fn modify<R>(&mut self, key: &PatternKey, f: impl FnOnce(&mut PatternEntry) -> R) -> R {
        let now = self.tick();
        let entry = self
            .entries
            .get_or_insert_mut(key.clone(), || PatternEntry::new(now));
        entry.access_count += 1;
        entry.last_access = now;
        let before = entry.bytes;
        let result = f(entry);
        entry.bytes = entry.estimate(key);
        self.total_bytes = self.total_bytes - before + entry.bytes;
        result
    }

    /// Store `patches` as the template of `key`, freeing its concrete history.
    pub fn record_template(&mut self, key: &PatternKey, patches: Vec<Patch>) -> TemplateUpdate {
        self.modify(key, |entry| {
            entry.history.clear();
            match &mut entry.template {
                Some(existing) if existing.patches == patches => {
                    existing.observations += 1;
                    TemplateUpdate::Confirmed
                }
                slot => {
                    let update = if slot.is_some() {
                        TemplateUpdate::Replaced
                    } else {
                        TemplateUpdate::Created
                    };
                    *slot = Some(TemplateRecord {
                        patches,
                        counter: HitCounter::default(),
                        observations: 1,
                    });
                    update
                }
            }
        })
    }

    /// Append a concrete observation to the history of `key`.
    pub fn record_observation(&mut self, key: &PatternKey, observation: Observation) {
        let max_history = self.max_history;
        self.modify(key, |entry| {
            entry.history.push_back(observation);
            while entry.history.len() > max_history {
                entry.history.pop_front();
            }
        });
    }

    /// Replace the template of `key` without touching its history.
    pub fn import_template(&mut self, key: &PatternKey, patches: Vec<Patch>) {
        self.modify(key, |entry| {
            entry.template = Some(TemplateRecord {
                patches,
                counter: HitCounter::default(),
                observations: 0,
            });
        });
    }

    /// Remove `key`, returning its entry.
    pub fn remove(&mut self, key: &PatternKey) -> Option<PatternEntry> {
        let entry = self.entries.pop(key)?;
        self.total_bytes -= entry.bytes;
        Some(entry)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.total_bytes = 0;
    }

    /// Evict entries until the key-count and byte bounds hold.
    ///
    /// `pinned` is only evicted once nothing else is left to evict. Returns
    /// the number of entries evicted.
    pub fn enforce_limits(&mut self, pinned: &PatternKey) -> usize {
        let mut evicted = 0;

        while self.entries.len() > self.max_keys {
            let victim = self
                .victim(Some(pinned))
                .unwrap_or_else(|| pinned.clone());
            if !self.evict(&victim, "key limit") {
                break;
            }
            evicted += 1;
        }

        if self.total_bytes > self.max_bytes {
            while self.total_bytes > self.low_water {
                let Some(victim) = self.victim(Some(pinned)) else {
                    break;
                };
                self.evict(&victim, "memory budget");
                evicted += 1;
            }
            if self.total_bytes > self.max_bytes && self.evict(pinned, "memory budget") {
                warn!(
                    key = %pinned,
                    max_bytes = self.max_bytes,
                    "pattern larger than the whole budget was evicted"
                );
                evicted += 1;
            }
        }
        evicted
    }

    fn evict(&mut self, key: &PatternKey, reason: &'static str) -> bool {
        match self.remove(key) {
            Some(entry) => {
                self.evictions += 1;
                debug!(
                    key = %key,
                    bytes = entry.bytes,
                    policy = %self.policy,
                    reason,
                    "evicted pattern"
                );
                true
            }
            None => false,
        }
    }

    /// Next entry to evict under the configured policy.
    fn victim(&self, pinned: Option<&PatternKey>) -> Option<PatternKey> {
        let candidates = self
            .entries
            .iter()
            .filter(|(key, _)| Some(*key) != pinned);
        let chosen = match self.policy {
            // `iter` runs most recent first, so the last candidate is least recent.
            EvictionPolicy::LeastRecentlyUsed => candidates.last(),
            EvictionPolicy::LeastFrequentlyUsed => {
                candidates.min_by_key(|(_, e)| (e.access_count, e.last_access))
            }
            EvictionPolicy::OldestFirst => candidates.min_by_key(|(_, e)| e.created_at),
        };
        chosen.map(|(key, _)| key.clone())
    }
}
