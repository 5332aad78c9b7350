use async_trait::async_trait;
use chrono::{DateTime, Utc};
use confsync_core::{
    BackendKind, Connector, Credentials, Format, Record, RecordStore, RecordValue, SyncError,
};
use serde_json::{json, Value};
use tracing::{debug, info, instrument, warn};

use crate::client::{is_valid_document_key, parse_arango_url, ArangoClient};

/// Connector for ArangoDB sources (`arango`, `http(s)://arango…`).
#[derive(Debug, Clone, Default)]
pub struct ArangoConnector;

impl ArangoConnector {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Connector for ArangoConnector {
    fn kind(&self) -> BackendKind {
        BackendKind::Graph
    }

    fn matches(&self, descriptor: &str) -> bool {
        descriptor.contains("arango")
    }

    #[instrument(skip(self, credentials), level = "debug")]
    async fn connect(
        &self,
        descriptor: &str,
        credentials: &Credentials,
    ) -> Result<Box<dyn RecordStore>, SyncError> {
        let url = credentials.arango_url(descriptor)?;
        let client = ArangoClient::new(parse_arango_url(&url)?);
        let version = client.version().await?;

        info!(
            "Connected to ArangoDB {} (database: {})",
            version,
            client.endpoint().database
        );
        Ok(Box::new(ArangoStore::new(client)))
    }
}

/// Open ArangoDB connection.
///
/// Init is destructive here: `prepare_push` truncates the collection so the
/// pushed files fully replace its contents.
pub struct ArangoStore {
    client: ArangoClient,
}

impl ArangoStore {
    pub fn new(client: ArangoClient) -> Self {
        Self { client }
    }
}

/// Stored document for a record: `{ _key, key, value, js, yaml, date }`.
pub fn to_document(record: &Record, updated_at: DateTime<Utc>) -> Value {
    json!({
        "_key": record.key,
        "key": record.key,
        "date": updated_at.to_rfc3339(),
        "value": record.value.to_stored(),
        "js": record.format() == Format::Script,
        "yaml": record.format() == Format::Yaml,
    })
}

/// Rebuild a record from a stored document; `key` falls back to `_key`.
pub fn from_document(document: Value) -> Result<Record, SyncError> {
    let key = document
        .get("key")
        .or_else(|| document.get("_key"))
        .and_then(Value::as_str)
        .ok_or_else(|| SyncError::Remote(format!("Document without a key: {}", document)))?
        .to_string();

    let flag = |name: &str| document.get(name).and_then(Value::as_bool).unwrap_or(false);
    let (js, yaml) = (flag("js"), flag("yaml"));

    let updated_at = document
        .get("date")
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc));

    let value = document.get("value").cloned().unwrap_or(Value::Null);

    Ok(Record {
        key,
        value: RecordValue::from_stored(value, js, yaml),
        updated_at,
    })
}

#[async_trait]
impl RecordStore for ArangoStore {
    fn kind(&self) -> BackendKind {
        BackendKind::Graph
    }

    #[instrument(skip(self), level = "debug")]
    async fn list_all(&self, collection: &str) -> Result<Vec<Result<Record, SyncError>>, SyncError> {
        let documents = self.client.all_documents(collection).await?;

        Ok(documents
            .into_iter()
            .map(|document| {
                from_document(document).inspect_err(|e| {
                    warn!("Unreadable document in {}: {}", collection, e);
                })
            })
            .collect())
    }

    #[instrument(skip(self), level = "debug")]
    async fn prepare_push(&self, collection: &str) -> Result<(), SyncError> {
        if !self.client.truncate(collection).await? {
            info!("Collection {} does not exist, creating it", collection);
            self.client.create_collection(collection).await?;
        }
        Ok(())
    }

    #[instrument(skip(self, record), level = "debug", fields(key = %record.key))]
    async fn upsert(
        &self,
        collection: &str,
        record: &Record,
    ) -> Result<DateTime<Utc>, SyncError> {
        if !is_valid_document_key(&record.key) {
            return Err(SyncError::InvalidInputShape {
                key: record.key.clone(),
                message: "not a valid ArangoDB document key".to_string(),
            });
        }

        let updated_at = Utc::now();
        self.client
            .save_document(collection, &to_document(record, updated_at))
            .await?;

        debug!("Saved {} into {}", record.key, collection);
        Ok(updated_at)
    }

    async fn close(self: Box<Self>) -> Result<(), SyncError> {
        debug!("Closing ArangoDB client");
        Ok(())
    }
}
