//! [`Spotlight`], the read-through front for random content selection.

use std::{
  collections::HashMap,
  sync::{Arc, Mutex, PoisonError},
};

use serde::Serialize;
use tally_core::{
  content::{ContentItem, ContentStatus},
  spotlight::{SpotlightCache, SpotlightKey},
  store::EngagementStore,
};
use tokio::sync::Mutex as AsyncMutex;
use uuid::Uuid;

/// A spotlight selection and whether it came from the cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SpotlightPick {
  pub items:  Vec<ContentItem>,
  pub cached: bool,
}

/// Per-key fill locks. Entries are dropped once no caller holds them.
type Fills = Arc<Mutex<HashMap<SpotlightKey, Arc<AsyncMutex<()>>>>>;

/// Serves spotlight selections from `cache`, querying `store` only on a miss
/// or after expiry.
///
/// Misses on the same key are single-flighted: one caller runs the random
/// query while the others wait and then read its result from the cache.
///
/// There is no write path and no invalidation: a selection may be stale by up
/// to the cache TTL. A store failure on a miss propagates; nothing stale is
/// kept around to fall back on.
pub struct Spotlight<S, C> {
  store: Arc<S>,
  cache: Arc<C>,
  fills: Fills,
}

impl<S, C> Clone for Spotlight<S, C> {
  fn clone(&self) -> Self {
    Self {
      store: Arc::clone(&self.store),
      cache: Arc::clone(&self.cache),
      fills: Arc::clone(&self.fills),
    }
  }
}

impl<S, C> Spotlight<S, C>
where
  S: EngagementStore,
  C: SpotlightCache,
{
  pub fn new(store: Arc<S>, cache: Arc<C>) -> Self {
    Self { store, cache, fills: Fills::default() }
  }

  pub fn cache(&self) -> &Arc<C> { &self.cache }

  /// One random item per category (`category = None`) or one random item
  /// from `category`, restricted to `status`.
  pub async fn get(
    &self,
    category: Option<Uuid>,
    status: ContentStatus,
  ) -> Result<SpotlightPick, S::Error> {
    let key = SpotlightKey::new(category, status);

    if let Some(items) = self.cache.get(&key) {
      tracing::debug!(%key, "spotlight cache hit");
      return Ok(SpotlightPick { items, cached: true });
    }

    let gate = self.fill_gate(key);
    let result = self.fill(key, &gate).await;
    self.release_gate(&key, gate);
    result
  }

  async fn fill(
    &self,
    key: SpotlightKey,
    gate: &AsyncMutex<()>,
  ) -> Result<SpotlightPick, S::Error> {
    let _filling = gate.lock().await;

    // Whoever held the gate before us may have filled the entry already.
    if let Some(items) = self.cache.get(&key) {
      tracing::debug!(%key, "spotlight filled by a concurrent miss");
      return Ok(SpotlightPick { items, cached: true });
    }

    tracing::debug!(%key, "spotlight cache miss");
    let items = self.store.random_content(key.category, key.status).await?;
    self.cache.set(key, items.clone());
    Ok(SpotlightPick { items, cached: false })
  }

  fn fill_gate(&self, key: SpotlightKey) -> Arc<AsyncMutex<()>> {
    let mut fills = self.fills.lock().unwrap_or_else(PoisonError::into_inner);
    Arc::clone(fills.entry(key).or_default())
  }

  fn release_gate(&self, key: &SpotlightKey, gate: Arc<AsyncMutex<()>>) {
    let mut fills = self.fills.lock().unwrap_or_else(PoisonError::into_inner);
    // Clones are only handed out under this lock, so the count is exact:
    // the map's copy plus ours means nobody else is waiting.
    if Arc::strong_count(&gate) == 2 {
      fills.remove(key);
    }
  }

  /// Number of keys with a fill in progress or queued.
  #[cfg(test)]
  fn pending_fills(&self) -> usize {
    self.fills.lock().unwrap_or_else(PoisonError::into_inner).len()
  }
}

#[cfg(test)]
mod tests {
  use std::time::Duration;

  use tally_core::content::NewContent;
  use tally_store_sqlite::SqliteStore;

  use super::*;
  use crate::MemorySpotlightCache;

  async fn seeded(categories: usize, per_category: usize) -> Arc<SqliteStore> {
    let store = SqliteStore::open_in_memory().await.unwrap();
    for _ in 0..categories {
      let category = Uuid::new_v4();
      for n in 0..per_category {
        store
          .add_content(NewContent::published(category, format!("post {n}")))
          .await
          .unwrap();
      }
    }
    Arc::new(store)
  }

  #[tokio::test]
  async fn second_read_within_ttl_is_a_hit() {
    let store = seeded(3, 4).await;
    let spotlight = Spotlight::new(
      store,
      Arc::new(MemorySpotlightCache::with_ttl(Duration::from_secs(60))),
    );

    let first = spotlight.get(None, ContentStatus::Published).await.unwrap();
    let second = spotlight.get(None, ContentStatus::Published).await.unwrap();

    assert!(!first.cached);
    assert!(second.cached);
    assert_eq!(first.items.len(), 3);
    assert_eq!(first.items, second.items);
  }

  #[tokio::test]
  async fn read_after_expiry_is_a_miss() {
    let store = seeded(1, 5).await;
    let category = store
      .random_content(None, ContentStatus::Published)
      .await
      .unwrap()[0]
      .category_id;
    let spotlight = Spotlight::new(
      store,
      Arc::new(MemorySpotlightCache::with_ttl(Duration::from_millis(20))),
    );

    let first = spotlight.get(Some(category), ContentStatus::Published).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    let second = spotlight.get(Some(category), ContentStatus::Published).await.unwrap();

    assert!(!first.cached);
    assert!(!second.cached);
    assert_eq!(second.items.len(), 1);
    assert_eq!(second.items[0].category_id, category);
  }

  #[tokio::test]
  async fn empty_selection_is_cached_too() {
    let store = seeded(0, 0).await;
    let spotlight = Spotlight::new(store, Arc::new(MemorySpotlightCache::new()));

    let first = spotlight.get(None, ContentStatus::Published).await.unwrap();
    let second = spotlight.get(None, ContentStatus::Published).await.unwrap();
    assert!(first.items.is_empty());
    assert!(second.cached);
  }

  #[tokio::test]
  async fn cached_selection_ignores_new_content() {
    let store = seeded(1, 1).await;
    let spotlight = Spotlight::new(
      store.clone(),
      Arc::new(MemorySpotlightCache::with_ttl(Duration::from_secs(60))),
    );

    let first = spotlight.get(None, ContentStatus::Published).await.unwrap();
    store
      .add_content(NewContent::published(Uuid::new_v4(), "late arrival"))
      .await
      .unwrap();
    let second = spotlight.get(None, ContentStatus::Published).await.unwrap();

    assert!(second.cached);
    assert_eq!(second.items, first.items);
  }

  /// Counts how many times a selection is written, i.e. how many misses
  /// reached the store.
  #[derive(Default)]
  struct CountingCache {
    inner: MemorySpotlightCache,
    sets:  std::sync::atomic::AtomicUsize,
  }

  impl SpotlightCache for CountingCache {
    fn get(&self, key: &SpotlightKey) -> Option<Vec<ContentItem>> { self.inner.get(key) }

    fn set(&self, key: SpotlightKey, items: Vec<ContentItem>) {
      self.sets.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
      self.inner.set(key, items);
    }

    fn evict(&self, key: &SpotlightKey) { self.inner.evict(key) }

    fn sweep(&self) -> usize { self.inner.sweep() }
  }

  #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
  async fn concurrent_misses_query_the_store_once() {
    let store = seeded(4, 3).await;
    let cache = Arc::new(CountingCache::default());
    let spotlight = Spotlight::new(store, cache.clone());

    let handles: Vec<_> = (0..16)
      .map(|_| {
        let spotlight = spotlight.clone();
        tokio::spawn(async move {
          spotlight.get(None, ContentStatus::Published).await.unwrap()
        })
      })
      .collect();

    let mut picks = Vec::new();
    for h in handles {
      picks.push(h.await.unwrap());
    }

    assert_eq!(cache.sets.load(std::sync::atomic::Ordering::SeqCst), 1);
    assert_eq!(picks.iter().filter(|p| !p.cached).count(), 1);
    assert!(picks.iter().all(|p| p.items == picks[0].items));
    assert_eq!(spotlight.pending_fills(), 0);
  }

  #[tokio::test]
  async fn distinct_keys_fill_independently() {
    let store = seeded(2, 1).await;
    let cache = Arc::new(CountingCache::default());
    let spotlight = Spotlight::new(store, cache.clone());

    spotlight.get(None, ContentStatus::Published).await.unwrap();
    spotlight.get(None, ContentStatus::Draft).await.unwrap();

    assert_eq!(cache.sets.load(std::sync::atomic::Ordering::SeqCst), 2);
    assert_eq!(spotlight.pending_fills(), 0);
  }
}
