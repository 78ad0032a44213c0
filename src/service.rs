//! Collaborators the engine talks to.
//!
//! A `Repository` is a connection to a remote server owned by the caller. Its
//! `ProcessService` does the actual network calls; transport, authentication
//! and retries belong there, not in the engine.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{
    error::ServiceError,
    model::{ProcessId, ProcessRecord},
};

/// Remote process operations of one repository.
#[async_trait]
pub trait ProcessService: Send + Sync {
    /// Ids of the processes visible under the `since` cursor.
    async fn running_process_ids(
        &self,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<ProcessId>, ServiceError>;

    /// Full detail of one process.
    async fn process_detail(
        &self,
        id: ProcessId,
    ) -> Result<ProcessRecord, ServiceError>;

    async fn stop_process(
        &self,
        id: ProcessId,
    ) -> Result<(), ServiceError>;
}

/// A remote server connection hosting processes.
#[async_trait]
pub trait Repository: Send + Sync {
    /// Identity of the repository, unique among the engine's repositories.
    fn name(&self) -> &str;

    /// Whether the user declined to enter credentials for this repository.
    fn is_auth_declined(&self) -> bool {
        false
    }

    /// Opens a process service handle.
    async fn process_service(&self) -> Result<Arc<dyn ProcessService>, ServiceError>;
}

/// Notification from the repository manager.
#[derive(Clone)]
pub enum RepositoryEvent {
    Added(Arc<dyn Repository>),
    Removed(String),
}
