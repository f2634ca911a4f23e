use dashmap::DashMap;
use std::time::{Duration, Instant};

/// Longest cooldown that is tracked. Longer configured values are capped.
pub const MAX_COOLDOWN: Duration = Duration::from_secs(86400 * 365 * 30);

/// Per-invoker cooldown expiries for one command.
///
/// Safe to read and update from the dispatch thread and from warmup
/// callbacks at the same time. Entries are never persisted.
#[derive(Debug, Default)]
pub struct CooldownStore {
    expiries: DashMap<u128, Instant>,
}

impl CooldownStore {
    pub fn new() -> Self {
        Default::default()
    }

    /// Time left on `invoker`'s cooldown. Expired entries are dropped.
    pub fn remaining(&self, invoker: u128, now: Instant) -> Option<Duration> {
        let expiry = *self.expiries.get(&invoker)?;
        if expiry > now {
            Some(expiry - now)
        } else {
            self.expiries.remove_if(&invoker, |_, expiry| *expiry <= now);
            None
        }
    }

    pub fn arm(&self, invoker: u128, until: Instant) {
        self.expiries.insert(invoker, until);
    }

    /// Arms a cooldown of `cooldown` starting at `now`, capped to
    /// [`MAX_COOLDOWN`]. Returns the expiry, or `None` if the clock cannot
    /// represent it.
    pub fn arm_for(&self, invoker: u128, now: Instant, cooldown: Duration) -> Option<Instant> {
        let until = now.checked_add(cooldown.min(MAX_COOLDOWN))?;
        self.arm(invoker, until);
        Some(until)
    }

    pub fn clear(&self, invoker: u128) -> bool {
        self.expiries.remove(&invoker).is_some()
    }

    pub fn contains(&self, invoker: u128) -> bool {
        self.expiries.contains_key(&invoker)
    }

    pub fn len(&self) -> usize {
        self.expiries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.expiries.is_empty()
    }
}
