//! Background worker for best-effort API key `lastUsed` updates.
//!
//! The config pipeline fires an [`ApiKeyTouch`] and moves on; this worker
//! applies touches one at a time and swallows failures after logging them.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use crate::storage::Store;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiKeyTouch {
    pub project_id: String,
    pub key_id: String,
    pub at: DateTime<Utc>,
}

/// Sending half of the touch channel. Cloning is cheap.
#[derive(Clone)]
pub struct TouchQueue {
    tx: mpsc::UnboundedSender<ApiKeyTouch>,
}

impl TouchQueue {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ApiKeyTouch>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Never blocks and never fails the caller.
    pub fn fire(&self, touch: ApiKeyTouch) {
        if let Err(e) = self.tx.send(touch) {
            warn!("Dropped API key touch for {}: worker is gone", e.0.key_id);
        }
    }
}

/// Spawn the worker draining `rx` into `store`. Ends when every
/// [`TouchQueue`] clone is dropped.
pub fn spawn_touch_worker(
    store: Arc<dyn Store>,
    mut rx: mpsc::UnboundedReceiver<ApiKeyTouch>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        debug!("API key touch worker started");

        while let Some(touch) = rx.recv().await {
            match store
                .touch_api_key(&touch.project_id, &touch.key_id, touch.at)
                .await
            {
                Ok(true) => {}
                Ok(false) => debug!(
                    "API key {} vanished before its touch was applied",
                    touch.key_id
                ),
                Err(e) => error!(
                    "Failed to update lastUsed for API key {}: {:#}",
                    touch.key_id, e
                ),
            }
        }

        debug!("API key touch worker stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use beacon_common::{ApiKey, Project};

    #[tokio::test]
    async fn test_touches_are_applied_in_background() {
        let store = Arc::new(MemoryStore::new());
        let project = Project::new(
            "p1".to_string(),
            "pub_1".to_string(),
            "App".to_string(),
            "sk".to_string(),
        );
        store.save_project(&project).await.unwrap();
        store
            .put_api_key(
                "p1",
                &ApiKey::new(
                    "k1".to_string(),
                    "ci".to_string(),
                    "ak".to_string(),
                    vec![],
                    Utc::now(),
                ),
            )
            .await
            .unwrap();

        let (queue, rx) = TouchQueue::channel();
        let handle = spawn_touch_worker(store.clone(), rx);

        let at = Utc::now();
        queue.fire(ApiKeyTouch {
            project_id: "p1".to_string(),
            key_id: "k1".to_string(),
            at,
        });
        queue.fire(ApiKeyTouch {
            project_id: "p1".to_string(),
            key_id: "gone".to_string(),
            at,
        });

        drop(queue);
        handle.await.unwrap();

        let loaded = store.find_project("pub_1").await.unwrap().unwrap();
        assert_eq!(loaded.api_keys[0].last_used, Some(at));
    }

    #[tokio::test]
    async fn test_fire_after_worker_exit_does_not_panic() {
        let (queue, rx) = TouchQueue::channel();
        drop(rx);

        queue.fire(ApiKeyTouch {
            project_id: "p1".to_string(),
            key_id: "k1".to_string(),
            at: Utc::now(),
        });
    }
}
