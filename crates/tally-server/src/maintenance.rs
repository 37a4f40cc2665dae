//! Periodic store upkeep: purge old view facts, then reconcile counters.

use std::{sync::Arc, time::Duration};

use chrono::Utc;
use tally_core::store::EngagementStore;
use tokio::{
  task::JoinHandle,
  time::{self, MissedTickBehavior},
};

/// What one maintenance pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MaintenanceReport {
  pub purged_views: u64,
  pub reconciled:   u64,
}

/// Run one pass. `retention = None` skips the purge.
pub async fn run_once<S>(
  store: &S,
  retention: Option<chrono::Duration>,
) -> Result<MaintenanceReport, S::Error>
where
  S: EngagementStore,
{
  let purged_views = match retention {
    Some(keep) => store.purge_views_before(Utc::now() - keep).await?,
    None => 0,
  };
  let reconciled = store.reconcile_counters().await?;
  Ok(MaintenanceReport { purged_views, reconciled })
}

/// Spawn a task that runs [`run_once`] every `every`. Failures are logged
/// and the next tick tries again.
pub fn spawn<S>(
  store: Arc<S>,
  every: Duration,
  retention: Option<chrono::Duration>,
) -> JoinHandle<()>
where
  S: EngagementStore + 'static,
{
  tokio::spawn(async move {
    tracing::info!(?every, ?retention, "maintenance started");
    let mut interval = time::interval_at(time::Instant::now() + every, every);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
      interval.tick().await;
      match run_once(&*store, retention).await {
        Ok(report) if report == MaintenanceReport::default() => {}
        Ok(report) => tracing::info!(
          purged_views = report.purged_views,
          reconciled = report.reconciled,
          "maintenance pass complete"
        ),
        Err(e) => tracing::error!(error = %e, "maintenance pass failed"),
      }
    }
  })
}

#[cfg(test)]
mod tests {
  use tally_core::{
    content::NewContent,
    engagement::ViewMeta,
    identity::ViewerIdentity,
  };
  use tally_store_sqlite::SqliteStore;
  use uuid::Uuid;

  use super::*;

  #[tokio::test]
  async fn pass_without_retention_keeps_views() {
    let store = SqliteStore::open_in_memory().await.unwrap();
    let item = store
      .add_content(NewContent::published(Uuid::new_v4(), "a post"))
      .await
      .unwrap();
    store
      .record_view(item.id, Some(ViewerIdentity::User(Uuid::new_v4())), ViewMeta::default())
      .await
      .unwrap();

    let report = run_once(&store, None).await.unwrap();
    assert_eq!(report, MaintenanceReport::default());
    let after = store.get_content(item.id).await.unwrap().unwrap();
    assert_eq!(after.view_count, 1);
  }

  #[tokio::test]
  async fn purge_leaves_counters_alone() {
    let store = SqliteStore::open_in_memory().await.unwrap();
    let item = store
      .add_content(NewContent::published(Uuid::new_v4(), "a post"))
      .await
      .unwrap();
    store
      .record_view(item.id, Some(ViewerIdentity::User(Uuid::new_v4())), ViewMeta::default())
      .await
      .unwrap();

    // A negative retention puts the cutoff in the future.
    let report = run_once(&store, Some(chrono::Duration::seconds(-60))).await.unwrap();
    assert_eq!(report.purged_views, 1);
    assert_eq!(report.reconciled, 0);
    let after = store.get_content(item.id).await.unwrap().unwrap();
    assert_eq!(after.view_count, 1);
  }

  #[tokio::test]
  async fn spawned_task_can_be_aborted() {
    let store = Arc::new(SqliteStore::open_in_memory().await.unwrap());
    let handle = spawn(store, Duration::from_millis(10), None);
    tokio::time::sleep(Duration::from_millis(30)).await;
    handle.abort();
    assert!(handle.await.unwrap_err().is_cancelled());
  }
}
