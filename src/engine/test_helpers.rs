//! In-memory repository and process service for tests.

use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::{
    error::ServiceError,
    model::{ProcessId, ProcessRecord, ProcessState},
    service::{ProcessService, Repository},
};

/// Holds one call until released.
#[derive(Default)]
pub struct Gate {
    armed: Mutex<Option<Arc<Notify>>>,
    /// Notified when a call reaches the armed gate.
    pub entered: Notify,
}

impl Gate {
    /// Makes the next call wait for the returned notify.
    pub fn arm(&self) -> Arc<Notify> {
        let release = Arc::new(Notify::new());
        *self.armed.lock() = Some(release.clone());
        release
    }

    async fn pass(&self) {
        let release = self.armed.lock().take();
        if let Some(release) = release {
            self.entered.notify_one();
            release.notified().await;
        }
    }
}

#[derive(Default)]
pub struct MockService {
    ids: Mutex<Vec<ProcessId>>,
    records: Mutex<HashMap<ProcessId, ProcessRecord>>,
    failure: Mutex<Option<ServiceError>>,
    pub since_seen: Mutex<Vec<Option<DateTime<Utc>>>>,
    pub id_calls: AtomicUsize,
    pub detail_calls: AtomicUsize,
    pub stopped: Mutex<Vec<ProcessId>>,
    pub detail_gate: Gate,
}

impl MockService {
    /// Makes `ids` the live set, each with a record in `state`.
    pub fn set_processes(
        &self,
        ids: &[ProcessId],
        state: ProcessState,
    ) {
        *self.ids.lock() = ids.to_vec();
        let mut records = self.records.lock();
        for id in ids {
            records.insert(*id, ProcessRecord::new(*id, state, format!("//Remote/p{}", id)));
        }
    }

    /// Replaces the live set without touching records.
    pub fn set_live(
        &self,
        ids: &[ProcessId],
    ) {
        *self.ids.lock() = ids.to_vec();
    }

    pub fn set_record(
        &self,
        record: ProcessRecord,
    ) {
        self.records.lock().insert(record.id, record);
    }

    pub fn fail_with(
        &self,
        error: Option<ServiceError>,
    ) {
        *self.failure.lock() = error;
    }

    pub fn calls(&self) -> usize {
        self.id_calls.load(Ordering::SeqCst) + self.detail_calls.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<(), ServiceError> {
        match self.failure.lock().clone() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ProcessService for MockService {
    async fn running_process_ids(
        &self,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<ProcessId>, ServiceError> {
        self.id_calls.fetch_add(1, Ordering::SeqCst);
        self.since_seen.lock().push(since);
        self.check()?;
        Ok(self.ids.lock().clone())
    }

    async fn process_detail(
        &self,
        id: ProcessId,
    ) -> Result<ProcessRecord, ServiceError> {
        self.detail_calls.fetch_add(1, Ordering::SeqCst);
        self.detail_gate.pass().await;
        self.check()?;
        self.records.lock().get(&id).cloned().ok_or_else(|| ServiceError::Transient(format!("process {} not found", id)))
    }

    async fn stop_process(
        &self,
        id: ProcessId,
    ) -> Result<(), ServiceError> {
        self.check()?;
        self.stopped.lock().push(id);
        if let Some(record) = self.records.lock().get_mut(&id) {
            record.state = ProcessState::Stopped;
        }
        Ok(())
    }
}

pub struct MockRepository {
    name: String,
    pub service: Arc<MockService>,
    pub declined: AtomicBool,
    pub unavailable: AtomicBool,
    pub opened: AtomicUsize,
    pub open_gate: Gate,
}

impl MockRepository {
    pub fn new(name: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            service: Arc::new(MockService::default()),
            declined: AtomicBool::new(false),
            unavailable: AtomicBool::new(false),
            opened: AtomicUsize::new(0),
            open_gate: Gate::default(),
        })
    }

    pub fn arc(name: &str) -> Arc<dyn Repository> {
        Self::new(name)
    }
}

#[async_trait]
impl Repository for MockRepository {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_auth_declined(&self) -> bool {
        self.declined.load(Ordering::SeqCst)
    }

    async fn process_service(&self) -> Result<Arc<dyn ProcessService>, ServiceError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(ServiceError::Unavailable(format!("{} is offline", self.name)));
        }
        self.open_gate.pass().await;
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(self.service.clone())
    }
}
