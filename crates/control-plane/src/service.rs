//! The control plane: storage, clock and touch queue bundled behind the
//! operations client and admin handlers call.

use beacon_common::{Error, Project, Result, SharedClock};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::storage::Store;
use crate::worker::{spawn_touch_worker, TouchQueue};

pub const DEFAULT_MAINTENANCE_MESSAGE: &str =
    "The service is undergoing maintenance. Please try again later.";

#[derive(Clone)]
pub struct ControlPlane {
    pub(crate) store: Arc<dyn Store>,
    pub(crate) clock: SharedClock,
    pub(crate) touches: TouchQueue,
    pub(crate) maintenance_message: String,
}

impl ControlPlane {
    pub fn new(
        store: Arc<dyn Store>,
        clock: SharedClock,
        touches: TouchQueue,
        maintenance_message: impl Into<String>,
    ) -> Self {
        Self {
            store,
            clock,
            touches,
            maintenance_message: maintenance_message.into(),
        }
    }

    /// Build a control plane and spawn its API key touch worker.
    pub fn start(
        store: Arc<dyn Store>,
        clock: SharedClock,
        maintenance_message: impl Into<String>,
    ) -> (Self, JoinHandle<()>) {
        let (touches, rx) = TouchQueue::channel();
        let worker = spawn_touch_worker(store.clone(), rx);
        (Self::new(store, clock, touches, maintenance_message), worker)
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    pub(crate) async fn project(&self, public_id: &str) -> Result<Project> {
        match self.store.find_project(public_id).await? {
            Some(project) => Ok(project),
            None => {
                debug!("Unknown project: {}", public_id);
                Err(Error::ProjectNotFound)
            }
        }
    }
}
