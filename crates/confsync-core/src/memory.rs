//! In-memory record store.
//!
//! Behaves like the document store (upsert by key, non-destructive init) and
//! keeps counters so callers can check the connection lifecycle.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tracing::debug;

use crate::credentials::Credentials;
use crate::error::SyncError;
use crate::record::Record;
use crate::store::{BackendKind, Connector, RecordStore};

#[derive(Debug, Default)]
struct Shared {
    /// collection -> records in insertion order
    collections: DashMap<String, Vec<Record>>,
    connects: AtomicUsize,
    closes: AtomicUsize,
    refuse_connections: AtomicBool,
    rejected_keys: Mutex<HashSet<String>>,
}

/// Shared handle to an in-memory store; clones see the same data.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    shared: Arc<Shared>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of a collection's records.
    pub fn records(&self, collection: &str) -> Vec<Record> {
        self.shared
            .collections
            .get(collection)
            .map(|records| records.value().clone())
            .unwrap_or_default()
    }

    /// Seed a collection without going through `upsert`.
    pub fn insert(&self, collection: &str, record: Record) {
        let mut records = self.shared.collections.entry(collection.to_string()).or_default();
        match records.iter_mut().find(|r| r.key == record.key) {
            Some(existing) => *existing = record,
            None => records.push(record),
        }
    }

    pub fn connect_count(&self) -> usize {
        self.shared.connects.load(Ordering::SeqCst)
    }

    pub fn close_count(&self) -> usize {
        self.shared.closes.load(Ordering::SeqCst)
    }

    /// Make subsequent `connect` calls fail with a connection error.
    pub fn refuse_connections(&self, refuse: bool) {
        self.shared.refuse_connections.store(refuse, Ordering::SeqCst);
    }

    /// Make `upsert` fail for the given key.
    pub fn reject_key(&self, key: &str) {
        if let Ok(mut keys) = self.shared.rejected_keys.lock() {
            keys.insert(key.to_string());
        }
    }

    fn is_rejected(&self, key: &str) -> bool {
        self.shared
            .rejected_keys
            .lock()
            .map(|keys| keys.contains(key))
            .unwrap_or(false)
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    fn kind(&self) -> BackendKind {
        BackendKind::Memory
    }

    async fn list_all(&self, collection: &str) -> Result<Vec<Result<Record, SyncError>>, SyncError> {
        Ok(self.records(collection).into_iter().map(Ok).collect())
    }

    async fn upsert(
        &self,
        collection: &str,
        record: &Record,
    ) -> Result<DateTime<Utc>, SyncError> {
        if self.is_rejected(&record.key) {
            return Err(SyncError::Remote(format!(
                "Write rejected for key {}",
                record.key
            )));
        }

        let updated_at = Utc::now();
        self.insert(collection, record.clone().with_updated_at(updated_at));
        debug!("Upserted {} into memory collection {}", record.key, collection);
        Ok(updated_at)
    }

    async fn close(self: Box<Self>) -> Result<(), SyncError> {
        self.shared.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Connector handing out connections to one shared [`MemoryStore`].
///
/// Matches descriptors starting with `memory`.
#[derive(Debug, Clone, Default)]
pub struct MemoryConnector {
    store: MemoryStore,
}

impl MemoryConnector {
    pub fn new(store: MemoryStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &MemoryStore {
        &self.store
    }
}

#[async_trait]
impl Connector for MemoryConnector {
    fn kind(&self) -> BackendKind {
        BackendKind::Memory
    }

    fn matches(&self, descriptor: &str) -> bool {
        descriptor.starts_with("memory")
    }

    async fn connect(
        &self,
        descriptor: &str,
        _credentials: &Credentials,
    ) -> Result<Box<dyn RecordStore>, SyncError> {
        if self.store.shared.refuse_connections.load(Ordering::SeqCst) {
            return Err(SyncError::Connection(format!(
                "Memory store refused connection for {}",
                descriptor
            )));
        }
        self.store.shared.connects.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(self.store.clone()))
    }
}
