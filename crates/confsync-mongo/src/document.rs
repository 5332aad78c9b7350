//! Mapping between [`Record`]s and stored MongoDB documents.
//!
//! Stored shape: `{ key, value, js, yaml, date }`. `value` is a nested
//! document for JSON records and a string for YAML/script records.

use chrono::{DateTime, Utc};
use confsync_core::{Format, Record, RecordValue, SyncError};
use mongodb::bson::{self, doc, Bson, Document};

/// Build the `$set` body for an upsert of `record` stamped at `updated_at`.
pub fn to_document(record: &Record, updated_at: DateTime<Utc>) -> Result<Document, SyncError> {
    let value = bson::to_bson(&record.value.to_stored()).map_err(|e| {
        SyncError::Remote(format!("Cannot convert {} to BSON: {}", record.key, e))
    })?;

    Ok(doc! {
        "date": bson::DateTime::from_millis(updated_at.timestamp_millis()),
        "key": record.key.as_str(),
        "value": value,
        "js": record.format() == Format::Script,
        "yaml": record.format() == Format::Yaml,
    })
}

/// Rebuild a record from a stored document.
pub fn from_document(document: Document) -> Result<Record, SyncError> {
    let key = document
        .get_str("key")
        .map_err(|_| SyncError::Remote(format!("Document without a key: {}", document)))?
        .to_string();

    let js = document.get_bool("js").unwrap_or(false);
    let yaml = document.get_bool("yaml").unwrap_or(false);
    let value = document
        .get("value")
        .cloned()
        .unwrap_or(Bson::Null)
        .into_relaxed_extjson();

    let updated_at = document
        .get_datetime("date")
        .ok()
        .and_then(|date| DateTime::from_timestamp_millis(date.timestamp_millis()));

    Ok(Record {
        key,
        value: RecordValue::from_stored(value, js, yaml),
        updated_at,
    })
}
