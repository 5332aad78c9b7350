use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::credentials::Credentials;
use crate::error::SyncError;
use crate::record::Record;

/// Remote store families a connector can talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    Document,
    Graph,
    Spreadsheet,
    Memory,
}

impl BackendKind {
    /// Short display name for logs and reports.
    pub fn display_name(&self) -> &'static str {
        match self {
            BackendKind::Document => "MongoDB",
            BackendKind::Graph => "ArangoDB",
            BackendKind::Spreadsheet => "Google Sheets",
            BackendKind::Memory => "Memory",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Factory for [`RecordStore`] connections.
///
/// A connector declares which source descriptors it handles and opens a
/// connection for them.
#[async_trait]
pub trait Connector: Send + Sync {
    fn kind(&self) -> BackendKind;

    /// Whether this connector should run for the given source descriptor.
    fn matches(&self, descriptor: &str) -> bool;

    /// Open a connection to the remote store.
    ///
    /// Fails with `Connection` when the target is unreachable or rejects the
    /// credentials, and `MissingCredentials` when none were supplied.
    async fn connect(
        &self,
        descriptor: &str,
        credentials: &Credentials,
    ) -> Result<Box<dyn RecordStore>, SyncError>;
}

/// An open connection to a remote record store.
///
/// Calls are made sequentially by a single driver; implementations need not
/// support concurrent use of one connection.
#[async_trait]
pub trait RecordStore: Send + Sync {
    fn kind(&self) -> BackendKind;

    /// Fetch every entry of a collection (or sheet), in the store's natural order.
    ///
    /// The outer error stops the listing as a whole; an inner error marks one
    /// stored entry that could not be turned into a record.
    async fn list_all(&self, collection: &str) -> Result<Vec<Result<Record, SyncError>>, SyncError>;

    /// Hook run once before an init batch writes to `collection`.
    async fn prepare_push(&self, _collection: &str) -> Result<(), SyncError> {
        Ok(())
    }

    /// Insert or overwrite the record keyed by `record.key`.
    ///
    /// # Returns
    /// The `updated_at` timestamp stamped on the stored record
    async fn upsert(&self, collection: &str, record: &Record)
        -> Result<DateTime<Utc>, SyncError>;

    /// Release the connection.
    async fn close(self: Box<Self>) -> Result<(), SyncError>;
}
