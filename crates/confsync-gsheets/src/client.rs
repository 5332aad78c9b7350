//! Google Sheets API v4 client wrapper.

use reqwest::{Client, Method, RequestBuilder, Response, Url};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, instrument};

use confsync_core::SyncError;

/// Base URLs for the Google APIs; overridable for tests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SheetsConfig {
    /// Base URL for the Sheets API (e.g. `https://sheets.googleapis.com`).
    pub api_base_url: String,
    /// Base URL for Google OAuth2 (e.g. `https://oauth2.googleapis.com`).
    pub oauth_base_url: String,
}

impl Default for SheetsConfig {
    fn default() -> Self {
        Self {
            api_base_url: "https://sheets.googleapis.com".to_string(),
            oauth_base_url: "https://oauth2.googleapis.com".to_string(),
        }
    }
}

/// Extract the spreadsheet id from a `…/spreadsheets/d/<id>/…` URL.
///
/// Anything that is not such a URL is taken as the id itself.
pub fn parse_spreadsheet_id(descriptor: &str) -> String {
    if !descriptor.contains("http") && !descriptor.contains("/d/") {
        return descriptor.to_string();
    }

    let path = Url::parse(descriptor)
        .map(|url| url.path().to_string())
        .unwrap_or_else(|_| descriptor.to_string());

    let mut segments = path.split('/');
    while let Some(segment) = segments.next() {
        if segment == "d" {
            if let Some(id) = segments.next().filter(|id| !id.is_empty()) {
                return id.to_string();
            }
        }
    }
    descriptor.to_string()
}

/// A1 notation for a whole sheet: `'Title'` with embedded quotes doubled.
pub fn sheet_range(title: &str) -> String {
    format!("'{}'", title.replace('\'', "''"))
}

#[derive(Debug, Deserialize)]
struct SpreadsheetInfo {
    #[serde(default)]
    sheets: Vec<SheetEntry>,
}

#[derive(Debug, Deserialize)]
struct SheetEntry {
    properties: SheetProperties,
}

#[derive(Debug, Deserialize)]
struct SheetProperties {
    title: String,
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

/// Sheets API client bound to one spreadsheet and one access token.
pub struct SheetsClient {
    http: Client,
    api_base_url: String,
    spreadsheet_id: String,
    token: String,
}

impl SheetsClient {
    pub fn new(
        http: Client,
        config: &SheetsConfig,
        spreadsheet_id: impl Into<String>,
        token: impl Into<String>,
    ) -> Self {
        Self {
            http,
            api_base_url: config.api_base_url.clone(),
            spreadsheet_id: spreadsheet_id.into(),
            token: token.into(),
        }
    }

    pub fn spreadsheet_id(&self) -> &str {
        &self.spreadsheet_id
    }

    fn spreadsheet_url(&self) -> String {
        format!(
            "{}/v4/spreadsheets/{}",
            self.api_base_url,
            urlencoding::encode(&self.spreadsheet_id)
        )
    }

    fn values_url(&self, range: &str) -> String {
        format!("{}/values/{}", self.spreadsheet_url(), urlencoding::encode(range))
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        self.http.request(method, url).bearer_auth(&self.token)
    }

    async fn send(builder: RequestBuilder, what: &str) -> Result<Response, SyncError> {
        let resp = builder
            .send()
            .await
            .map_err(|e| SyncError::Remote(format!("Sheets {} request failed: {}", what, e)))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(SyncError::Remote(format!(
                "Sheets API {} error {}: {}",
                what, status, body
            )));
        }
        Ok(resp)
    }

    /// Titles of every sheet in the spreadsheet, in tab order.
    #[instrument(skip(self), level = "debug")]
    pub async fn sheet_titles(&self) -> Result<Vec<String>, SyncError> {
        let url = format!("{}?fields=sheets.properties.title", self.spreadsheet_url());
        let info: SpreadsheetInfo = Self::send(self.request(Method::GET, &url), "info")
            .await?
            .json()
            .await
            .map_err(|e| SyncError::Remote(format!("Unexpected spreadsheet info: {}", e)))?;

        Ok(info.sheets.into_iter().map(|s| s.properties.title).collect())
    }

    /// Add a sheet (tab) with the given title.
    #[instrument(skip(self), level = "debug")]
    pub async fn add_sheet(&self, title: &str) -> Result<(), SyncError> {
        let url = format!("{}:batchUpdate", self.spreadsheet_url());
        let body = json!({
            "requests": [ { "addSheet": { "properties": { "title": title } } } ]
        });
        Self::send(self.request(Method::POST, &url).json(&body), "addSheet").await?;
        debug!("Added sheet {}", title);
        Ok(())
    }

    /// Read the cells of a range, row by row.
    #[instrument(skip(self), level = "debug")]
    pub async fn get_values(&self, range: &str) -> Result<Vec<Vec<Value>>, SyncError> {
        let range: ValueRange = Self::send(self.request(Method::GET, &self.values_url(range)), "get")
            .await?
            .json()
            .await
            .map_err(|e| SyncError::Remote(format!("Unexpected values response: {}", e)))?;
        Ok(range.values)
    }

    /// Overwrite the cells of a range.
    #[instrument(skip(self, rows), level = "debug", fields(rows = rows.len()))]
    pub async fn update_values(&self, range: &str, rows: &[Vec<Value>]) -> Result<(), SyncError> {
        let url = format!("{}?valueInputOption=RAW", self.values_url(range));
        Self::send(
            self.request(Method::PUT, &url).json(&json!({ "values": rows })),
            "update",
        )
        .await?;
        Ok(())
    }

    /// Clear the cells of a range.
    #[instrument(skip(self), level = "debug")]
    pub async fn clear_values(&self, range: &str) -> Result<(), SyncError> {
        let url = format!("{}:clear", self.values_url(range));
        Self::send(self.request(Method::POST, &url).json(&json!({})), "clear").await?;
        Ok(())
    }

    /// Append rows after the last row of the table in `range`.
    #[instrument(skip(self, rows), level = "debug", fields(rows = rows.len()))]
    pub async fn append_values(&self, range: &str, rows: &[Vec<Value>]) -> Result<(), SyncError> {
        let url = format!(
            "{}:append?valueInputOption=RAW&insertDataOption=INSERT_ROWS",
            self.values_url(range)
        );
        Self::send(
            self.request(Method::POST, &url).json(&json!({ "values": rows })),
            "append",
        )
        .await?;
        debug!("Appended {} rows to {}", rows.len(), range);
        Ok(())
    }
}
