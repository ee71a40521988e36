//! Disk Sweep Task
//!
//! Background task that periodically removes expired entries from the disk tier.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::cache::CacheManager;

/// Spawns a background task that sweeps the disk tier every `interval`.
///
/// A failed sweep is logged and retried after `backoff` instead of the
/// regular interval. The loop never ends on its own; abort the returned
/// handle on shutdown.
///
/// # Example
/// ```ignore
/// let manager = Arc::new(CacheManager::from_config(&config));
/// let sweep_handle = spawn_sweep_task(manager.clone(), Duration::from_secs(900), Duration::from_secs(60));
/// // Later, during shutdown:
/// sweep_handle.abort();
/// ```
pub fn spawn_sweep_task(
    manager: Arc<CacheManager>,
    interval: Duration,
    backoff: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(
            "Starting disk sweep task with interval of {} seconds",
            interval.as_secs()
        );

        let mut delay = interval;
        loop {
            tokio::time::sleep(delay).await;

            match manager.sweep().await {
                Ok(removed) => {
                    delay = interval;
                    if removed > 0 {
                        info!("Disk sweep: removed {} expired entries", removed);
                    } else {
                        debug!("Disk sweep: no expired entries found");
                    }
                }
                Err(e) => {
                    delay = backoff;
                    error!(
                        "Disk sweep failed, retrying in {} seconds: {}",
                        backoff.as_secs(),
                        e
                    );
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{
        CacheManager, Category, DiskStore, ManualClock, MemoryStore, SetOptions, StorageLevel,
    };
    use serde_json::json;
    use tempfile::TempDir;

    fn setup(dir: &std::path::Path) -> (Arc<ManualClock>, Arc<CacheManager>) {
        let clock = Arc::new(ManualClock::default());
        let manager = CacheManager::new(
            Arc::new(MemoryStore::new(100, clock.clone())),
            DiskStore::new(dir, clock.clone()),
            clock.clone(),
        );
        (clock, Arc::new(manager))
    }

    #[tokio::test]
    async fn test_sweep_task_removes_expired_entries() {
        let dir = TempDir::new().unwrap();
        let (clock, manager) = setup(dir.path());

        let opts = SetOptions::new().ttl(10).level(StorageLevel::Disk);
        manager.set(Category::Generic, "expire_soon", json!(1), opts).await;
        let opts = SetOptions::new().ttl(3600).level(StorageLevel::Disk);
        manager.set(Category::Generic, "long_lived", json!(2), opts).await;
        clock.advance(chrono::Duration::seconds(20));

        let handle = spawn_sweep_task(
            manager.clone(),
            Duration::from_millis(50),
            Duration::from_millis(50),
        );

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(manager.disk().len().await, 1, "Expired entry should have been swept");
        assert!(manager
            .peek(Category::Generic, "long_lived", None)
            .await
            .is_some());

        handle.abort();
    }

    #[tokio::test]
    async fn test_sweep_task_survives_failures() {
        let dir = TempDir::new().unwrap();
        // A regular file where the cache directory should be: listing fails
        let blocked = dir.path().join("not-a-dir");
        std::fs::write(&blocked, b"x").unwrap();
        let (_clock, manager) = setup(&blocked);

        let handle = spawn_sweep_task(
            manager,
            Duration::from_millis(10),
            Duration::from_millis(10),
        );

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!handle.is_finished(), "Sweep loop must keep running after errors");

        handle.abort();
    }

    #[tokio::test]
    async fn test_sweep_task_can_be_aborted() {
        let dir = TempDir::new().unwrap();
        let (_clock, manager) = setup(dir.path());

        let handle = spawn_sweep_task(manager, Duration::from_secs(1), Duration::from_secs(1));

        // Abort immediately
        handle.abort();

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(handle.is_finished(), "Task should be finished after abort");
    }
}
