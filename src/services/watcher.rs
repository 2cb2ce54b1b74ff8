use crate::error::AppError;
use crate::models::fs_types::CategoryStats;
use crate::services::storage::CategoryStore;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::time::Duration;
use tracing::warn;

const DEBOUNCE: Duration = Duration::from_millis(300);

/// Re-scans category counts after every burst of changes under the base
/// directory. Watching stops when this value is dropped.
pub struct StatsWatcher {
    _watcher: RecommendedWatcher,
}

impl StatsWatcher {
    /// Must be called from within a tokio runtime.
    pub fn watch<F>(store: CategoryStore, on_change: F) -> Result<Self, AppError>
    where
        F: Fn(CategoryStats) + Send + 'static,
    {
        store.ensure_layout()?;
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel::<()>();

        let watch_path = store.base_dir().to_path_buf();
        tokio::spawn(async move {
            let mut rx = rx;
            loop {
                if rx.recv().await.is_none() {
                    // Watcher dropped
                    break;
                }
                tokio::time::sleep(DEBOUNCE).await;
                while rx.try_recv().is_ok() {}
                match store.stats() {
                    Ok(stats) => on_change(stats),
                    Err(e) => warn!("Failed to refresh stats: {}", e),
                }
            }
        });

        let mut watcher = notify::recommended_watcher(move |res: Result<Event, notify::Error>| {
            if let Ok(event) = res {
                match event.kind {
                    EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_) => {
                        let _ = tx.send(());
                    }
                    _ => {}
                }
            }
        })
        .map_err(|e| AppError {
            message: format!("Failed to create watcher: {}", e),
        })?;

        watcher
            .watch(&watch_path, RecursiveMode::Recursive)
            .map_err(|e| AppError {
                message: format!("Failed to watch folder {}: {}", watch_path.display(), e),
            })?;

        Ok(Self { _watcher: watcher })
    }
}
