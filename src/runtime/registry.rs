use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use chrono::{DateTime, Utc};
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::{ShareLock, cache::ProcessListCache, service::Repository};

/// Polling cursor shared by all repositories.
#[derive(Debug, Clone, Copy, Default)]
pub struct SinceCursor {
    pub since: Option<DateTime<Utc>>,
    /// Bumped on every change, so results fetched under an older cursor can be told apart.
    pub generation: u64,
}

/// Shared state read by the tree projection and written by the engine.
///
/// Lock order is `since`, then the repository list, then the caches map, then
/// a repository cache. None of them is held across an await. The `since`
/// lock also fences repository changes: adding or removing a repository holds
/// it for writing, while a poll holds it for reading as it applies a result.
#[derive(Default)]
pub struct Registry {
    repositories: RwLock<Vec<Arc<dyn Repository>>>,
    caches: RwLock<HashMap<String, ShareLock<ProcessListCache>>>,
    observed: RwLock<HashSet<String>>,
    since: RwLock<SinceCursor>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `repository` with an empty PENDING cache and returns its index,
    /// or `None` if a repository with that name is already known.
    pub fn add_repository(
        &self,
        repository: Arc<dyn Repository>,
    ) -> Option<usize> {
        let name = repository.name().to_string();
        let mut repositories = self.repositories.write();
        if repositories.iter().any(|r| r.name() == name) {
            return None;
        }
        repositories.push(repository);
        self.caches.write().insert(name, Arc::new(RwLock::new(ProcessListCache::new())));
        Some(repositories.len() - 1)
    }

    /// Forgets a repository together with its cache and observation.
    pub fn remove_repository(
        &self,
        name: &str,
    ) -> Option<(usize, Arc<dyn Repository>)> {
        let mut repositories = self.repositories.write();
        let index = repositories.iter().position(|r| r.name() == name)?;
        let repository = repositories.remove(index);
        self.caches.write().remove(name);
        self.observed.write().remove(name);
        Some((index, repository))
    }

    /// Copy of the repository list in observation order.
    pub fn repositories(&self) -> Vec<Arc<dyn Repository>> {
        self.repositories.read().clone()
    }

    pub fn repository(
        &self,
        name: &str,
    ) -> Option<Arc<dyn Repository>> {
        self.repositories.read().iter().find(|r| r.name() == name).cloned()
    }

    pub fn repository_count(&self) -> usize {
        self.repositories.read().len()
    }

    pub fn repository_name(
        &self,
        index: usize,
    ) -> Option<String> {
        self.repositories.read().get(index).map(|r| r.name().to_string())
    }

    pub fn repository_index(
        &self,
        name: &str,
    ) -> Option<usize> {
        self.repositories.read().iter().position(|r| r.name() == name)
    }

    pub fn cache(
        &self,
        name: &str,
    ) -> Option<ShareLock<ProcessListCache>> {
        self.caches.read().get(name).cloned()
    }

    /// Runs `f` against a repository's cache under its read lock.
    pub fn with_cache<R>(
        &self,
        name: &str,
        f: impl FnOnce(&ProcessListCache) -> R,
    ) -> Option<R> {
        let cache = self.cache(name)?;
        let guard = cache.read();
        Some(f(&guard))
    }

    /// Whether `cache` is still the live cache of `name`. A cache detached by a
    /// removal, or by a removal and a re-add under the same name, is not.
    pub fn is_current(
        &self,
        name: &str,
        cache: &ShareLock<ProcessListCache>,
    ) -> bool {
        self.caches.read().get(name).is_some_and(|live| Arc::ptr_eq(live, cache))
    }

    pub fn caches(&self) -> Vec<(String, ShareLock<ProcessListCache>)> {
        self.caches.read().iter().map(|(name, cache)| (name.clone(), cache.clone())).collect()
    }

    /// Returns `true` if the repository was not observed before.
    pub fn observe(
        &self,
        name: &str,
    ) -> bool {
        self.observed.write().insert(name.to_string())
    }

    /// Returns `true` if the repository was observed before.
    pub fn ignore(
        &self,
        name: &str,
    ) -> bool {
        self.observed.write().remove(name)
    }

    pub fn is_observed(
        &self,
        name: &str,
    ) -> bool {
        self.observed.read().contains(name)
    }

    pub fn since(&self) -> SinceCursor {
        *self.since.read()
    }

    pub fn since_read(&self) -> RwLockReadGuard<'_, SinceCursor> {
        self.since.read()
    }

    pub fn since_write(&self) -> RwLockWriteGuard<'_, SinceCursor> {
        self.since.write()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::test_helpers::MockRepository;

    #[test]
    fn test_add_and_remove_repository() {
        let registry = Registry::new();
        assert_eq!(registry.add_repository(MockRepository::arc("alpha")), Some(0));
        assert_eq!(registry.add_repository(MockRepository::arc("beta")), Some(1));
        assert_eq!(registry.add_repository(MockRepository::arc("alpha")), None);

        assert_eq!(registry.repository_count(), 2);
        assert_eq!(registry.repository_index("beta"), Some(1));
        assert!(registry.cache("beta").is_some());

        registry.observe("alpha");
        let (index, removed) = registry.remove_repository("alpha").unwrap();
        assert_eq!(index, 0);
        assert_eq!(removed.name(), "alpha");
        assert!(registry.cache("alpha").is_none());
        assert!(!registry.is_observed("alpha"));
        assert_eq!(registry.repository_name(0).as_deref(), Some("beta"));
        assert!(registry.remove_repository("alpha").is_none());
    }

    #[test]
    fn test_observe_is_idempotent() {
        let registry = Registry::new();
        assert!(registry.observe("alpha"));
        assert!(!registry.observe("alpha"));
        assert!(registry.is_observed("alpha"));
        assert!(registry.ignore("alpha"));
        assert!(!registry.ignore("alpha"));
        assert!(!registry.is_observed("alpha"));
    }

    #[test]
    fn test_readded_repository_gets_a_new_cache() {
        let registry = Registry::new();
        registry.add_repository(MockRepository::arc("alpha"));
        let old = registry.cache("alpha").unwrap();
        assert!(registry.is_current("alpha", &old));

        registry.remove_repository("alpha");
        assert!(!registry.is_current("alpha", &old));

        registry.add_repository(MockRepository::arc("alpha"));
        assert!(!registry.is_current("alpha", &old));
        assert!(registry.is_current("alpha", &registry.cache("alpha").unwrap()));
    }
}
