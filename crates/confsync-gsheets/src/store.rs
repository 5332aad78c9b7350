//! Spreadsheet backend.
//!
//! A sheet is exchanged as ONE record: the key is the sheet title and the
//! value is a JSON array of row objects (header cell -> row cell). Locally
//! that is a single `<sheet>.json` file rather than one file per key.

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use confsync_core::{
    BackendKind, Connector, Credentials, Record, RecordStore, RecordValue, SyncError,
};
use serde_json::{Map, Value};
use tracing::{debug, info, instrument, warn};

use crate::auth::{fetch_access_token, load_service_account};
use crate::client::{parse_spreadsheet_id, sheet_range, SheetsClient, SheetsConfig};

/// Connector for Google Sheets sources (`https://docs.google.com/spreadsheets/d/<id>`).
#[derive(Debug, Clone, Default)]
pub struct SheetsConnector {
    config: SheetsConfig,
}

impl SheetsConnector {
    pub fn new(config: SheetsConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Connector for SheetsConnector {
    fn kind(&self) -> BackendKind {
        BackendKind::Spreadsheet
    }

    fn matches(&self, descriptor: &str) -> bool {
        let lower = descriptor.to_ascii_lowercase();
        lower.contains("sheet/") || lower.contains("sheets/")
    }

    #[instrument(skip(self, credentials), level = "debug")]
    async fn connect(
        &self,
        descriptor: &str,
        credentials: &Credentials,
    ) -> Result<Box<dyn RecordStore>, SyncError> {
        let key = load_service_account(credentials)?;
        let http = reqwest::Client::new();
        let token = fetch_access_token(&http, &self.config.oauth_base_url, &key).await?;

        let client = SheetsClient::new(http, &self.config, parse_spreadsheet_id(descriptor), token);
        Ok(Box::new(SheetsStore::open(client).await?))
    }
}

/// Open spreadsheet with its sheet titles loaded.
pub struct SheetsStore {
    client: SheetsClient,
    titles: Mutex<Vec<String>>,
}

impl SheetsStore {
    /// Load the spreadsheet info; fails with a connection error when the
    /// spreadsheet cannot be read with the current token.
    pub async fn open(client: SheetsClient) -> Result<Self, SyncError> {
        let titles = client
            .sheet_titles()
            .await
            .map_err(|e| SyncError::Connection(e.to_string()))?;

        info!(
            "Opened spreadsheet {} ({} sheets)",
            client.spreadsheet_id(),
            titles.len()
        );
        Ok(Self {
            client,
            titles: Mutex::new(titles),
        })
    }

    fn has_sheet(&self, title: &str) -> bool {
        self.titles
            .lock()
            .map(|titles| titles.iter().any(|t| t == title))
            .unwrap_or(false)
    }

    fn remember_sheet(&self, title: &str) {
        if let Ok(mut titles) = self.titles.lock() {
            titles.push(title.to_string());
        }
    }
}

/// Validate an init record: a JSON array of objects.
pub fn rows_of(record: &Record) -> Result<&[Value], SyncError> {
    let items = match &record.value {
        RecordValue::Json(Value::Array(items)) => items,
        other => {
            return Err(SyncError::InvalidInputShape {
                key: record.key.clone(),
                message: format!("expected a JSON array of rows, got {:?} content", other.format()),
            })
        }
    };

    if let Some(index) = items.iter().position(|item| !item.is_object()) {
        return Err(SyncError::InvalidInputShape {
            key: record.key.clone(),
            message: format!("row {} is not an object", index),
        });
    }
    Ok(items)
}

/// Header row taken from the first item's field names.
pub fn headers_from(items: &[Value]) -> Vec<String> {
    items
        .first()
        .and_then(Value::as_object)
        .map(|first| first.keys().cloned().collect())
        .unwrap_or_default()
}

/// Cells of one item laid out in header order.
pub fn row_cells(headers: &[String], item: &Value) -> Vec<Value> {
    headers
        .iter()
        .map(|header| match item.get(header) {
            None | Some(Value::Null) => Value::String(String::new()),
            Some(nested @ (Value::Array(_) | Value::Object(_))) => Value::String(nested.to_string()),
            Some(scalar) => scalar.clone(),
        })
        .collect()
}

/// Turn sheet values (header row first) into row objects.
///
/// Cells missing at the end of a row are omitted; columns with an empty
/// header are ignored.
pub fn rows_to_objects(values: Vec<Vec<Value>>) -> Vec<Value> {
    let mut rows = values.into_iter();
    let headers: Vec<String> = rows
        .next()
        .unwrap_or_default()
        .into_iter()
        .map(|cell| cell_text(&cell))
        .collect();

    rows.map(|row| {
        let mut object = Map::new();
        for (header, cell) in headers.iter().zip(row) {
            if !header.is_empty() {
                object.insert(header.clone(), Value::String(cell_text(&cell)));
            }
        }
        Value::Object(object)
    })
    .collect()
}

fn cell_text(cell: &Value) -> String {
    match cell {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[async_trait]
impl RecordStore for SheetsStore {
    fn kind(&self) -> BackendKind {
        BackendKind::Spreadsheet
    }

    /// The whole sheet as one record keyed by the sheet title.
    #[instrument(skip(self), level = "debug")]
    async fn list_all(&self, sheet: &str) -> Result<Vec<Result<Record, SyncError>>, SyncError> {
        if !self.has_sheet(sheet) {
            return Err(SyncError::SheetNotFound(sheet.to_string()));
        }

        let values = self.client.get_values(&sheet_range(sheet)).await?;
        let rows = rows_to_objects(values);

        debug!("Read {} rows from sheet {}", rows.len(), sheet);
        Ok(vec![Ok(Record::json(sheet, Value::Array(rows)))])
    }

    /// Write the record's rows into the sheet named by `record.key`.
    ///
    /// The sheet is created when missing and its header row filled from the
    /// first item when empty. Rows below the header are replaced, so pushing
    /// the same file twice leaves one copy of each row.
    #[instrument(skip(self, record), level = "debug", fields(key = %record.key))]
    async fn upsert(
        &self,
        _collection: &str,
        record: &Record,
    ) -> Result<DateTime<Utc>, SyncError> {
        let items = rows_of(record)?;
        let title = record.key.as_str();
        let range = sheet_range(title);
        let header_range = format!("{}!1:1", range);

        if !self.has_sheet(title) {
            self.client.add_sheet(title).await?;
            self.remember_sheet(title);
        }

        let mut headers: Vec<String> = self
            .client
            .get_values(&header_range)
            .await?
            .into_iter()
            .next()
            .unwrap_or_default()
            .iter()
            .map(cell_text)
            .collect();

        if headers.is_empty() {
            headers = headers_from(items);
            if headers.is_empty() {
                debug!("Nothing to write to sheet {}", title);
                return Ok(Utc::now());
            }
            let header_row: Vec<Value> = headers.iter().cloned().map(Value::String).collect();
            self.client.update_values(&header_range, &[header_row]).await?;
        }

        for item in items {
            if let Some(object) = item.as_object() {
                for field in object.keys().filter(|field| !headers.contains(field)) {
                    warn!("Field {} of sheet {} has no header column, dropped", field, title);
                }
            }
        }

        self.client.clear_values(&format!("{}!A2:ZZZ", range)).await?;

        let rows: Vec<Vec<Value>> = items.iter().map(|item| row_cells(&headers, item)).collect();
        if !rows.is_empty() {
            self.client.append_values(&range, &rows).await?;
        }

        debug!("Wrote {} rows to sheet {}", rows.len(), title);
        Ok(Utc::now())
    }

    async fn close(self: Box<Self>) -> Result<(), SyncError> {
        debug!("Closing spreadsheet {}", self.client.spreadsheet_id());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_matches() {
        let connector = SheetsConnector::default();
        assert!(connector.matches("https://docs.google.com/spreadsheets/d/1AbC/edit"));
        assert!(connector.matches("Sheets/1AbC"));
        assert!(!connector.matches("mongo"));
        assert!(!connector.matches("not-a-real-source"));
    }

    #[test]
    fn test_rows_of_rejects_non_array() {
        let err = rows_of(&Record::json("prod", json!({"x": 1}))).unwrap_err();
        assert!(matches!(err, SyncError::InvalidInputShape { .. }));

        let err = rows_of(&Record::yaml("prod", "- x: 1")).unwrap_err();
        assert!(matches!(err, SyncError::InvalidInputShape { .. }));

        let err = rows_of(&Record::json("prod", json!([{"x": 1}, 2]))).unwrap_err();
        assert!(err.to_string().contains("row 1"));
    }

    #[test]
    fn test_headers_from_first_item() {
        let items = vec![json!({"name": "a", "port": 1}), json!({"port": 2, "name": "b"})];
        assert_eq!(headers_from(&items), vec!["name", "port"]);
        assert!(headers_from(&[]).is_empty());
    }

    #[test]
    fn test_row_cells_follow_header_order() {
        let headers = vec!["name".to_string(), "port".to_string(), "tags".to_string()];
        let cells = row_cells(&headers, &json!({"port": 8080, "name": "api", "tags": ["a"]}));
        assert_eq!(cells, vec![json!("api"), json!(8080), json!("[\"a\"]")]);

        let cells = row_cells(&headers, &json!({"name": "db", "port": null}));
        assert_eq!(cells, vec![json!("db"), json!(""), json!("")]);
    }

    #[test]
    fn test_rows_to_objects() {
        let values = vec![
            vec![json!("name"), json!("port"), json!("")],
            vec![json!("api"), json!("8080"), json!("ignored")],
            vec![json!("db")],
        ];
        assert_eq!(
            rows_to_objects(values),
            vec![
                json!({"name": "api", "port": "8080"}),
                json!({"name": "db"}),
            ]
        );
        assert!(rows_to_objects(Vec::new()).is_empty());
    }
}
