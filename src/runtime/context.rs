use std::{future::Future, sync::Arc};

use tracing::debug;

use crate::{
    Config,
    common::MemCache,
    error::ServiceError,
    events::{TreeEvent, TreePath},
    runtime::{Channel, Registry},
    service::{ProcessService, Repository},
    tree::TreeNode,
};

/// Everything the engine's components share, passed around explicitly.
#[derive(Clone)]
pub struct Context {
    config: Arc<Config>,
    registry: Arc<Registry>,
    channel: Arc<Channel>,
    services: Arc<MemCache<String, Arc<dyn ProcessService>>>,
}

impl Context {
    pub fn new(
        config: Config,
        channel: Arc<Channel>,
    ) -> Self {
        let services = MemCache::new(config.service_cache_size);
        Self {
            config: Arc::new(config),
            registry: Arc::new(Registry::new()),
            channel,
            services: Arc::new(services),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn registry(&self) -> Arc<Registry> {
        self.registry.clone()
    }

    pub fn channel(&self) -> Arc<Channel> {
        self.channel.clone()
    }

    /// Cached process service of `repository`, opened on first use.
    pub async fn service_for(
        &self,
        repository: &dyn Repository,
    ) -> Result<Arc<dyn ProcessService>, ServiceError> {
        let name = repository.name().to_string();
        if let Some(service) = self.services.get(&name) {
            return Ok(service);
        }

        let service = self.bounded(repository.process_service()).await?;
        // A handle opened for a repository removed meanwhile must not be
        // picked up by a later repository of the same name.
        let current = self.registry.repository(&name).is_some_and(|live| std::ptr::addr_eq(Arc::as_ptr(&live), repository));
        if current {
            debug!(repository = %name, "opened process service");
            self.services.set(name, service.clone());
        }
        Ok(service)
    }

    /// Drops the cached service so the next call reconnects.
    pub fn forget_service(
        &self,
        repository: &str,
    ) {
        self.services.remove(&repository.to_string());
    }

    /// Applies the configured fetch timeout to one service call.
    pub async fn bounded<T>(
        &self,
        call: impl Future<Output = Result<T, ServiceError>>,
    ) -> Result<T, ServiceError> {
        match self.config.fetch_timeout() {
            Some(timeout) => tokio::time::timeout(timeout, call).await.map_err(|_| ServiceError::Timeout(timeout.as_millis() as u64))?,
            None => call.await,
        }
    }

    /// Adds a repository and announces it under the root. Waits for a poll
    /// that is applying its result.
    pub fn add_repository(
        &self,
        repository: Arc<dyn Repository>,
    ) -> bool {
        let name = repository.name().to_string();
        let _fence = self.registry.since_write();
        match self.registry.add_repository(repository) {
            Some(index) => {
                debug!(repository = %name, index, "repository added");
                self.channel.emit(
                    "",
                    TreeEvent::Inserted {
                        parent: TreePath::Root,
                        indices: vec![index],
                        items: vec![TreeNode::Repository(name)],
                    },
                );
                true
            }
            None => false,
        }
    }

    /// Removes a repository and announces it under the root.
    pub fn remove_repository(
        &self,
        name: &str,
    ) -> bool {
        let _fence = self.registry.since_write();
        match self.registry.remove_repository(name) {
            Some((index, _)) => {
                self.forget_service(name);
                debug!(repository = %name, index, "repository removed");
                self.channel.emit(
                    "",
                    TreeEvent::Removed {
                        parent: TreePath::Root,
                        indices: vec![index],
                        items: vec![TreeNode::Repository(name.to_string())],
                    },
                );
                true
            }
            None => false,
        }
    }
}
