//! Background eviction of expired spotlight entries.

use std::{sync::Arc, time::Duration};

use tally_core::spotlight::SpotlightCache;
use tokio::{
  task::JoinHandle,
  time::{self, MissedTickBehavior},
};

/// Spawn a task that calls [`SpotlightCache::sweep`] every `every`.
///
/// The first sweep happens one full period after spawning. Abort the
/// returned handle to stop the task.
pub fn spawn_sweeper<C>(cache: Arc<C>, every: Duration) -> JoinHandle<()>
where
  C: SpotlightCache + 'static,
{
  tokio::spawn(async move {
    tracing::info!(?every, "spotlight sweeper started");
    let mut interval = time::interval_at(time::Instant::now() + every, every);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
      interval.tick().await;
      let evicted = cache.sweep();
      if evicted > 0 {
        tracing::info!(evicted, "evicted expired spotlight entries");
      }
    }
  })
}

#[cfg(test)]
mod tests {
  use tally_core::{content::ContentStatus, spotlight::SpotlightKey};

  use super::*;
  use crate::MemorySpotlightCache;

  #[tokio::test]
  async fn sweeper_evicts_without_reads() {
    let cache = Arc::new(MemorySpotlightCache::with_ttl(Duration::from_millis(10)));
    cache.set(SpotlightKey::new(None, ContentStatus::Published), vec![]);
    assert_eq!(cache.len(), 1);

    let handle = spawn_sweeper(cache.clone(), Duration::from_millis(20));
    time::sleep(Duration::from_millis(150)).await;
    handle.abort();

    assert!(cache.is_empty());
  }

  /// Collects formatted log output in memory.
  #[derive(Clone, Default)]
  struct Captured(Arc<std::sync::Mutex<Vec<u8>>>);

  impl std::io::Write for Captured {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
      self.0.lock().unwrap().extend_from_slice(buf);
      Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> { Ok(()) }
  }

  #[tokio::test]
  async fn evictions_are_logged_at_info() {
    let captured = Captured::default();
    let writer = captured.clone();
    let subscriber = tracing_subscriber::fmt()
      .with_max_level(tracing::Level::INFO)
      .with_ansi(false)
      .with_writer(move || writer.clone())
      .finish();
    // The current-thread test runtime polls the spawned sweeper on this
    // thread, so the thread-local default subscriber sees its events.
    let _guard = tracing::subscriber::set_default(subscriber);

    let cache = Arc::new(MemorySpotlightCache::with_ttl(Duration::from_millis(10)));
    cache.set(SpotlightKey::new(None, ContentStatus::Published), vec![]);
    let handle = spawn_sweeper(cache.clone(), Duration::from_millis(20));
    time::sleep(Duration::from_millis(150)).await;
    handle.abort();

    let output = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
    let line = output
      .lines()
      .find(|l| l.contains("evicted expired spotlight entries"))
      .expect("eviction summary logged");
    assert!(line.contains("INFO"));
    assert!(line.contains("evicted=1"));
  }
}
