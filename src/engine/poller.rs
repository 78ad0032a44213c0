//! One reconciliation pass per repository per tick.
//!
//! A pass fetches the live id set and the details it needs first, and only
//! then mutates the cache, so a failed fetch leaves the cache untouched.
//! Mutation and event emission happen under the repository's write lock.

use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use chrono::{DateTime, Utc};
use futures::future::join_all;
use tokio::sync::Mutex;
use tracing::{debug, trace, warn};

use crate::{
    ShareLock,
    cache::{ProcessListCache, ProcessListState},
    error::ServiceError,
    events::{TreeEvent, TreePath},
    model::{ProcessId, ProcessRecord},
    runtime::{Channel, Context},
    service::Repository,
    tree::{Placeholder, TreeNode, repository_children},
};

/// Result of the network half of a pass.
struct Fetched {
    /// Live ids in service order, deduplicated.
    ids: Vec<ProcessId>,
    /// Details of every id that was new or not yet terminated.
    details: HashMap<ProcessId, ProcessRecord>,
}

#[derive(Clone)]
pub struct Poller {
    ctx: Arc<Context>,
    /// Ticks never overlap: a manual tick waits for the timer's and vice versa.
    tick_lock: Arc<Mutex<()>>,
}

impl Poller {
    pub fn new(ctx: Arc<Context>) -> Self {
        Self {
            ctx,
            tick_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Polls every repository once.
    pub async fn tick(&self) {
        let _running = self.tick_lock.lock().await;
        let repositories = self.ctx.registry().repositories();
        trace!(repositories = repositories.len(), "poll tick");

        if self.ctx.config().parallel_repositories {
            join_all(repositories.iter().map(|repository| self.poll_repository(repository.as_ref()))).await;
        } else {
            for repository in &repositories {
                self.poll_repository(repository.as_ref()).await;
            }
        }
    }

    pub async fn poll_repository(
        &self,
        repository: &dyn Repository,
    ) {
        let name = repository.name();
        let registry = self.ctx.registry();

        if !registry.is_observed(name) {
            return;
        }
        let Some(cache) = registry.cache(name) else {
            return;
        };
        if cache.read().state() == ProcessListState::Canceled {
            trace!(repository = %name, "list canceled, skipping");
            return;
        }
        if repository.is_auth_declined() {
            let _cursor = registry.since_read();
            if registry.is_current(name, &cache) {
                self.transition(name, &cache, ProcessListState::Canceled);
            }
            return;
        }

        let cursor = registry.since();
        let fetched = self.fetch(repository, &cache, cursor.since).await;

        // Held while applying, so neither `set_since` nor a repository change can interleave.
        let current = registry.since_read();
        if !registry.is_current(name, &cache) {
            debug!(repository = %name, "repository removed during fetch, discarding result");
            return;
        }
        if current.generation != cursor.generation {
            debug!(repository = %name, "since changed during fetch, discarding result");
            return;
        }

        match fetched {
            Ok(fetched) => self.apply(name, &cache, fetched),
            Err(ServiceError::AuthDeclined) => {
                self.transition(name, &cache, ProcessListState::Canceled);
            }
            Err(e) => {
                self.ctx.forget_service(name);
                if cache.read().state() != ProcessListState::Error {
                    warn!(repository = %name, error = %e, "failed to fetch remote processes");
                } else {
                    debug!(repository = %name, error = %e, "fetch still failing");
                }
                self.transition(name, &cache, ProcessListState::Error);
            }
        }
    }

    async fn fetch(
        &self,
        repository: &dyn Repository,
        cache: &ShareLock<ProcessListCache>,
        since: Option<DateTime<Utc>>,
    ) -> Result<Fetched, ServiceError> {
        let service = self.ctx.service_for(repository).await?;
        let listed = self.ctx.bounded(service.running_process_ids(since)).await?;

        let mut seen = HashSet::new();
        let ids: Vec<ProcessId> = listed.into_iter().filter(|id| seen.insert(*id)).collect();

        // Terminated records never change again, so they are not fetched twice.
        let wanted: Vec<ProcessId> = {
            let cache = cache.read();
            ids.iter().copied().filter(|id| !matches!(cache.by_id(*id), Some(record) if record.is_terminated())).collect()
        };

        let mut details = HashMap::with_capacity(wanted.len());
        for id in wanted {
            let record = self.ctx.bounded(service.process_detail(id)).await?;
            details.insert(id, record);
        }

        Ok(Fetched {
            ids,
            details,
        })
    }

    /// Call with the `since` read lock held.
    fn apply(
        &self,
        name: &str,
        cache: &ShareLock<ProcessListCache>,
        mut fetched: Fetched,
    ) {
        let channel = self.ctx.channel();
        let parent = TreePath::Repository(name.to_string());
        let mut cache = cache.write();
        let live: HashSet<ProcessId> = fetched.ids.iter().copied().collect();

        if live.is_empty() {
            let removed = cache.trim(&live);
            let changed = cache.set_state(ProcessListState::Ready);
            trace!(repository = %name, removed = removed.len(), "no processes");
            if changed || !removed.is_empty() {
                emit_structure_changed(&channel, name, &cache);
            }
            return;
        }

        if cache.set_state(ProcessListState::Ready) {
            emit_structure_changed(&channel, name, &cache);
        }

        let removed = cache.trim(&live);
        if !removed.is_empty() {
            if cache.is_empty() {
                emit_structure_changed(&channel, name, &cache);
            } else {
                let (indices, items): (Vec<usize>, Vec<TreeNode>) = removed.into_iter().map(|(index, record)| (index, TreeNode::Process(record))).unzip();
                channel.emit(
                    name,
                    TreeEvent::Removed {
                        parent: parent.clone(),
                        indices,
                        items,
                    },
                );
            }
        }

        for id in fetched.ids {
            let known = cache.by_id(id).map(ProcessRecord::is_terminated);
            let Some(record) = fetched.details.remove(&id) else {
                continue;
            };

            match known {
                None => {
                    if cache.is_empty() {
                        channel.emit(
                            name,
                            TreeEvent::Removed {
                                parent: parent.clone(),
                                indices: vec![0],
                                items: vec![TreeNode::Placeholder(Placeholder::for_cache(&cache))],
                            },
                        );
                    }
                    if let Some(index) = cache.upsert(record.clone()) {
                        channel.emit(
                            name,
                            TreeEvent::Inserted {
                                parent: parent.clone(),
                                indices: vec![index],
                                items: vec![TreeNode::Process(record)],
                            },
                        );
                    }
                }
                Some(false) => {
                    cache.upsert(record.clone());
                    if let Some(index) = cache.index_of(id) {
                        channel.emit(
                            name,
                            TreeEvent::Changed {
                                parent: parent.clone(),
                                indices: vec![index],
                                items: vec![TreeNode::Process(record)],
                            },
                        );
                    }
                }
                Some(true) => {}
            }
        }
    }

    /// Call with the `since` read lock held.
    fn transition(
        &self,
        name: &str,
        cache: &ShareLock<ProcessListCache>,
        state: ProcessListState,
    ) {
        let mut cache = cache.write();
        if cache.set_state(state) {
            debug!(repository = %name, state = state.as_ref(), "process list state changed");
            emit_structure_changed(&self.ctx.channel(), name, &cache);
        }
    }
}

/// Announces the complete child list of a repository. Call with the write lock held.
pub(crate) fn emit_structure_changed(
    channel: &Channel,
    name: &str,
    cache: &ProcessListCache,
) {
    channel.emit(
        name,
        TreeEvent::StructureChanged {
            path: TreePath::Repository(name.to_string()),
            children: repository_children(cache),
        },
    );
}
