//! Fixed-window rate counters, sharded for concurrent dispatch.

use ahash::AHasher;
use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};

use crate::domain::GuardKind;

/// Number of shards for the counter table.
/// Must be a power of 2 for fast modulo via bitwise AND.
const NUM_SHARDS: usize = 64;

/// Build the counter key for one (guard, subtype, actor) combination.
///
/// The actor segment is the resolved user id or the synthetic unknown
/// bucket; distinct actors never share a window.
pub fn counter_key(guard: GuardKind, subtype: &str, actor: &str) -> String {
    format!("{}:{}:{}", guard.as_str(), subtype, actor)
}

/// One fixed window: a count and the instant the window lapses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct WindowSlot {
    count: u64,
    reset_at: DateTime<Utc>,
}

/// Sharded fixed-window counter table.
///
/// Windows are anchored at the first increment and expire strictly after
/// `reset_at`; an increment landing exactly on the boundary still belongs
/// to the old window. Expired slots are reset lazily on access and
/// reclaimed by `sweep`.
pub struct RateWindowCounter {
    shards: Vec<RwLock<HashMap<String, WindowSlot>>>,
}

impl RateWindowCounter {
    pub fn new() -> Self {
        let shards = (0..NUM_SHARDS)
            .map(|_| RwLock::new(HashMap::new()))
            .collect();

        RateWindowCounter { shards }
    }

    /// Record one action and return the count within the current window,
    /// including this one.
    pub fn increment(&self, key: &str, window_ms: u64) -> u64 {
        self.increment_at(key, window_ms, Utc::now())
    }

    /// Clock-injected variant of `increment` for deterministic tests.
    pub fn increment_at(&self, key: &str, window_ms: u64, now: DateTime<Utc>) -> u64 {
        let shard = &self.shards[self.shard_index(key)];
        let mut guard = shard.write();

        let slot = guard.entry(key.to_string()).or_insert(WindowSlot {
            count: 0,
            reset_at: now + Duration::milliseconds(window_ms as i64),
        });

        if now > slot.reset_at {
            slot.count = 0;
            slot.reset_at = now + Duration::milliseconds(window_ms as i64);
        }

        slot.count += 1;
        slot.count
    }

    /// Current in-window count without recording anything.
    pub fn peek(&self, key: &str) -> u64 {
        self.peek_at(key, Utc::now())
    }

    pub fn peek_at(&self, key: &str, now: DateTime<Utc>) -> u64 {
        let shard = &self.shards[self.shard_index(key)];
        let guard = shard.read();

        match guard.get(key) {
            Some(slot) if now <= slot.reset_at => slot.count,
            _ => 0,
        }
    }

    /// Drop slots whose window has lapsed. Returns the number reclaimed.
    pub fn sweep(&self) -> usize {
        self.sweep_at(Utc::now())
    }

    pub fn sweep_at(&self, now: DateTime<Utc>) -> usize {
        let mut reclaimed = 0;

        for shard in &self.shards {
            let mut guard = shard.write();
            let before = guard.len();
            guard.retain(|_, slot| now <= slot.reset_at);
            reclaimed += before - guard.len();
        }

        reclaimed
    }

    /// Number of live slots across all shards.
    pub fn entry_count(&self) -> usize {
        self.shards.iter().map(|s| s.read().len()).sum()
    }

    #[inline]
    fn shard_index(&self, key: &str) -> usize {
        let mut hasher = AHasher::default();
        key.hash(&mut hasher);
        (hasher.finish() as usize) & (NUM_SHARDS - 1)
    }
}

impl Default for RateWindowCounter {
    fn default() -> Self {
        RateWindowCounter::new()
    }
}
