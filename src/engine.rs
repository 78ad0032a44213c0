//! Process list engine - the main entry point for procwatch.
//!
//! The engine owns the shared registry of repositories and their process
//! lists, and runs the background tasks that keep them current:
//! - The poll timer reconciling observed repositories
//! - The repository manager queue consumer
//! - The tree event listener

mod poller;
#[cfg(test)]
pub(crate) mod test_helpers;

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use chrono::{DateTime, Utc};
use tokio::{runtime::Handle, time::MissedTickBehavior};
use tracing::{debug, info};

use crate::{
    Config, ProcwatchError, Result,
    cache::ProcessListState,
    common::{Queue, Shutdown},
    model::ProcessId,
    runtime::{Channel, Context},
    service::{Repository, RepositoryEvent},
    tree::ProcessTree,
};

pub(crate) use poller::{Poller, emit_structure_changed};

/// Keeps a polled, incrementally updated view of the processes running on a
/// set of remote repositories.
///
/// # Example
///
/// ```rust,ignore
/// let engine = EngineBuilder::new().build()?;
/// engine.launch();
///
/// engine.add_repository(repository);
/// engine.observe("production");
///
/// ChannelEvent::channel(engine.channel(), ChannelOptions::default())?.on_event(|e| {
///     println!("{:?}", e.event);
/// });
///
/// let tree = engine.tree();
/// let count = tree.child_count(&tree.root());
/// ```
pub struct Engine {
    ctx: Arc<Context>,
    poller: Poller,
    /// Queue the repository manager publishes add/remove notifications to.
    repository_queue: Arc<Queue<RepositoryEvent>>,

    /// Flag indicating if the engine is running.
    running: Arc<AtomicBool>,
    /// Tokio runtime the background tasks are spawned on.
    handle: Handle,
    /// Shutdown coordinator for graceful termination.
    shutdown: Arc<Shutdown>,
}

impl Engine {
    pub(crate) fn new(
        config: Config,
        handle: Handle,
    ) -> Self {
        let channel = Arc::new(Channel::new(config.event_queue_size, handle.clone()));
        let repository_queue = Queue::new(config.repository_queue_size);
        let ctx = Arc::new(Context::new(config, channel));

        Self {
            poller: Poller::new(ctx.clone()),
            ctx,
            repository_queue,
            running: Arc::new(AtomicBool::new(false)),
            handle,
            shutdown: Arc::new(Shutdown::new()),
        }
    }

    /// Starts the event listener, the repository queue consumer and the poll timer.
    pub fn launch(&self) {
        if self.running.swap(true, Ordering::Relaxed) {
            return;
        }

        self.ctx.channel().listen();

        let ctx = self.ctx.clone();
        let repository_queue = self.repository_queue.clone();
        let shutdown = self.shutdown.clone();
        self.handle.spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown.wait() => break,
                    Some(event) = repository_queue.next_async() => match event {
                        RepositoryEvent::Added(repository) => {
                            ctx.add_repository(repository);
                        }
                        RepositoryEvent::Removed(name) => {
                            ctx.remove_repository(&name);
                        }
                    }
                }
            }
        });

        let poller = self.poller.clone();
        let shutdown = self.shutdown.clone();
        let period = self.ctx.config().poll_interval();
        self.handle.spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = shutdown.wait() => break,
                    _ = interval.tick() => poller.tick().await,
                }
            }
            debug!("poll timer stopped");
        });

        info!(period_ms = period.as_millis() as u64, "process list engine launched");
    }

    /// Stops the background tasks. A fetch already in flight finishes first.
    pub fn shutdown(&self) {
        if !self.running.swap(false, Ordering::Relaxed) {
            return;
        }

        self.shutdown.shutdown();
        self.ctx.channel().shutdown();
        info!("process list engine stopped");
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// Polls every observed repository once, right now.
    pub async fn tick(&self) {
        self.poller.tick().await;
    }

    /// Adds a repository; returns `false` if one with the same name exists.
    pub fn add_repository(
        &self,
        repository: Arc<dyn Repository>,
    ) -> bool {
        self.ctx.add_repository(repository)
    }

    /// Forgets a repository and its cached processes.
    pub fn remove_repository(
        &self,
        name: &str,
    ) -> bool {
        self.ctx.remove_repository(name)
    }

    /// Queue for repository manager notifications, consumed once launched.
    pub fn repository_queue(&self) -> Arc<Queue<RepositoryEvent>> {
        self.repository_queue.clone()
    }

    /// Makes a repository eligible for polling.
    pub fn observe(
        &self,
        name: &str,
    ) {
        if self.ctx.registry().observe(name) {
            debug!(repository = %name, "observing");
        }
    }

    /// Stops polling a repository. A fetch already in flight is still applied.
    pub fn ignore(
        &self,
        name: &str,
    ) {
        if self.ctx.registry().ignore(name) {
            debug!(repository = %name, "ignoring");
        }
    }

    pub fn is_observed(
        &self,
        name: &str,
    ) -> bool {
        self.ctx.registry().is_observed(name)
    }

    pub fn since(&self) -> Option<DateTime<Utc>> {
        self.ctx.registry().since().since
    }

    /// Changes the polling cursor and moves every list back to PENDING.
    ///
    /// Records stay until the next successful poll trims them. Results fetched
    /// under the previous cursor are discarded.
    pub fn set_since(
        &self,
        since: Option<DateTime<Utc>>,
    ) {
        let registry = self.ctx.registry();
        let mut cursor = registry.since_write();
        if cursor.since == since {
            return;
        }
        cursor.since = since;
        cursor.generation += 1;

        let channel = self.ctx.channel();
        for (name, cache) in registry.caches() {
            let mut cache = cache.write();
            if cache.set_state(ProcessListState::Pending) {
                emit_structure_changed(&channel, &name, &cache);
            }
        }
        debug!(since = ?since, generation = cursor.generation, "since cursor changed");
    }

    /// Brings one list back to PENDING; the only way out of CANCELED.
    pub fn reset(
        &self,
        name: &str,
    ) -> Result<()> {
        let registry = self.ctx.registry();
        let _cursor = registry.since_read();
        let cache = registry.cache(name).ok_or_else(|| ProcwatchError::Repository(format!("repository {} not found", name)))?;
        let mut cache = cache.write();
        if cache.set_state(ProcessListState::Pending) {
            emit_structure_changed(&self.ctx.channel(), name, &cache);
        }
        Ok(())
    }

    pub fn list_state(
        &self,
        name: &str,
    ) -> Option<ProcessListState> {
        self.tree().list_state(name)
    }

    /// Asks the repository to stop a process. The next poll picks up its new state.
    pub async fn stop_process(
        &self,
        name: &str,
        id: ProcessId,
    ) -> Result<()> {
        let repository = self.ctx.registry().repository(name).ok_or_else(|| ProcwatchError::Repository(format!("repository {} not found", name)))?;
        let service = self.ctx.service_for(repository.as_ref()).await?;

        if let Err(e) = self.ctx.bounded(service.stop_process(id)).await {
            self.ctx.forget_service(name);
            return Err(e.into());
        }
        info!(repository = %name, id, "stop requested");
        Ok(())
    }

    /// Indexed tree view over the current state.
    pub fn tree(&self) -> ProcessTree {
        ProcessTree::new(self.ctx.registry())
    }

    /// Returns the tree event channel.
    pub fn channel(&self) -> Arc<Channel> {
        self.ctx.channel()
    }

    pub fn config(&self) -> &Config {
        self.ctx.config()
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.shutdown();
    }
}
