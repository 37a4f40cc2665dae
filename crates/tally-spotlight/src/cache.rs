//! In-process [`SpotlightCache`] with a fixed per-entry TTL.

use std::{
  collections::HashMap,
  sync::{PoisonError, RwLock},
  time::{Duration, Instant},
};

use tally_core::{
  content::ContentItem,
  spotlight::{SpotlightCache, SpotlightKey},
};

use crate::DEFAULT_TTL;

struct CacheEntry {
  items:      Vec<ContentItem>,
  expires_at: Instant,
}

impl CacheEntry {
  fn is_expired(&self, now: Instant) -> bool { now >= self.expires_at }
}

/// A `HashMap` behind an `RwLock`. Reads take the shared lock; the only
/// writers are cache population, explicit eviction, and the sweeper.
pub struct MemorySpotlightCache {
  entries: RwLock<HashMap<SpotlightKey, CacheEntry>>,
  ttl:     Duration,
}

impl MemorySpotlightCache {
  pub fn new() -> Self { Self::with_ttl(DEFAULT_TTL) }

  pub fn with_ttl(ttl: Duration) -> Self {
    Self { entries: RwLock::new(HashMap::new()), ttl }
  }

  pub fn ttl(&self) -> Duration { self.ttl }

  /// Number of stored entries, expired ones included.
  pub fn len(&self) -> usize {
    self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
  }

  pub fn is_empty(&self) -> bool { self.len() == 0 }
}

impl Default for MemorySpotlightCache {
  fn default() -> Self { Self::new() }
}

impl SpotlightCache for MemorySpotlightCache {
  fn get(&self, key: &SpotlightKey) -> Option<Vec<ContentItem>> {
    let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
    entries
      .get(key)
      .filter(|e| !e.is_expired(Instant::now()))
      .map(|e| e.items.clone())
  }

  fn set(&self, key: SpotlightKey, items: Vec<ContentItem>) {
    let entry = CacheEntry { items, expires_at: Instant::now() + self.ttl };
    self
      .entries
      .write()
      .unwrap_or_else(PoisonError::into_inner)
      .insert(key, entry);
  }

  fn evict(&self, key: &SpotlightKey) {
    self
      .entries
      .write()
      .unwrap_or_else(PoisonError::into_inner)
      .remove(key);
  }

  fn sweep(&self) -> usize {
    let now = Instant::now();
    let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
    let before = entries.len();
    entries.retain(|_, e| !e.is_expired(now));
    before - entries.len()
  }
}
