use async_trait::async_trait;
use chrono::{DateTime, Utc};
use confsync_core::{BackendKind, Connector, Credentials, Record, RecordStore, SyncError};
use futures::TryStreamExt;
use mongodb::bson::{doc, Document};
use mongodb::{Client, Collection, Database};
use tracing::{debug, info, instrument, warn};

use crate::document::{from_document, to_document};

/// Database used when the connection URL does not name one.
const DEFAULT_DATABASE: &str = "test";

/// Connector for MongoDB sources (`mongo`, `mongodb://…`, `mongodb+srv://…`).
#[derive(Debug, Clone, Default)]
pub struct MongoConnector;

impl MongoConnector {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Connector for MongoConnector {
    fn kind(&self) -> BackendKind {
        BackendKind::Document
    }

    fn matches(&self, descriptor: &str) -> bool {
        descriptor.contains("mongo")
    }

    #[instrument(skip(self, credentials), level = "debug")]
    async fn connect(
        &self,
        descriptor: &str,
        credentials: &Credentials,
    ) -> Result<Box<dyn RecordStore>, SyncError> {
        let url = credentials.mongo_url(descriptor)?;
        Ok(Box::new(MongoStore::connect(&url).await?))
    }
}

/// Open MongoDB connection bound to one database.
pub struct MongoStore {
    client: Client,
    database: Database,
}

impl MongoStore {
    /// Connect and ping the server so unreachable targets fail up front.
    pub async fn connect(url: &str) -> Result<Self, SyncError> {
        let client = Client::with_uri_str(url)
            .await
            .map_err(|e| SyncError::Connection(format!("Invalid MongoDB URL: {}", e)))?;

        let database = client
            .default_database()
            .unwrap_or_else(|| client.database(DEFAULT_DATABASE));

        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|e| SyncError::Connection(format!("MongoDB unreachable: {}", e)))?;

        info!("Connected to MongoDB database {}", database.name());
        Ok(Self { client, database })
    }

    fn collection(&self, name: &str) -> Collection<Document> {
        self.database.collection(name)
    }
}

#[async_trait]
impl RecordStore for MongoStore {
    fn kind(&self) -> BackendKind {
        BackendKind::Document
    }

    #[instrument(skip(self), level = "debug")]
    async fn list_all(&self, collection: &str) -> Result<Vec<Result<Record, SyncError>>, SyncError> {
        let documents: Vec<Document> = self
            .collection(collection)
            .find(doc! {})
            .await
            .map_err(|e| SyncError::Remote(format!("MongoDB find failed: {}", e)))?
            .try_collect()
            .await
            .map_err(|e| SyncError::Remote(format!("MongoDB cursor failed: {}", e)))?;

        let records: Vec<_> = documents
            .into_iter()
            .map(|document| {
                from_document(document).inspect_err(|e| {
                    warn!("Unreadable document in {}: {}", collection, e);
                })
            })
            .collect();

        debug!("Listed {} records from {}", records.len(), collection);
        Ok(records)
    }

    #[instrument(skip(self, record), level = "debug", fields(key = %record.key))]
    async fn upsert(
        &self,
        collection: &str,
        record: &Record,
    ) -> Result<DateTime<Utc>, SyncError> {
        let updated_at = Utc::now();
        let fields = to_document(record, updated_at)?;

        self.collection(collection)
            .update_one(doc! { "key": record.key.as_str() }, doc! { "$set": fields })
            .upsert(true)
            .await
            .map_err(|e| {
                SyncError::Remote(format!("MongoDB upsert of {} failed: {}", record.key, e))
            })?;

        debug!("Upserted {} into {}", record.key, collection);
        Ok(updated_at)
    }

    async fn close(self: Box<Self>) -> Result<(), SyncError> {
        self.client.shutdown().await;
        debug!("MongoDB client shut down");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matches() {
        let connector = MongoConnector::new();
        assert!(connector.matches("mongo"));
        assert!(connector.matches("mongodb://localhost:27017/configs"));
        assert!(connector.matches("mongodb+srv://cluster0.example.net/app"));
        assert!(!connector.matches("arango"));
        assert!(!connector.matches("https://docs.google.com/spreadsheets/d/abc"));
    }

    #[tokio::test]
    async fn test_connect_without_url_is_missing_credentials() {
        let result = MongoConnector::new()
            .connect("mongo", &Credentials::default())
            .await;
        assert!(matches!(result, Err(SyncError::MissingCredentials(_))));
    }

    #[tokio::test]
    async fn test_connect_with_invalid_url() {
        let credentials = Credentials {
            mongo_url: Some("http://localhost:27017".into()),
            ..Default::default()
        };
        let result = MongoConnector::new().connect("mongo", &credentials).await;
        assert!(matches!(result, Err(SyncError::Connection(_))));
    }
}
