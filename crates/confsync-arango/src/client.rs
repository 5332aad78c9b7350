//! ArangoDB HTTP API client wrapper.
//!
//! Connection URL format: `http(s)://user:password@host:port/<database>`

use reqwest::{Client, Method, RequestBuilder, Response, StatusCode, Url};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, instrument};

use confsync_core::SyncError;

/// Database used when the URL path is empty.
const DEFAULT_DATABASE: &str = "_system";

/// Documents fetched per cursor round-trip.
const CURSOR_BATCH_SIZE: u32 = 1000;

/// Result of parsing an ArangoDB connection URL.
#[derive(Debug, Clone, PartialEq)]
pub struct ArangoEndpoint {
    /// `scheme://host[:port]`
    pub server: String,
    pub database: String,
    pub username: String,
    pub password: Option<String>,
}

/// Parse an ArangoDB connection URL into server, database and credentials.
pub fn parse_arango_url(url: &str) -> Result<ArangoEndpoint, SyncError> {
    let parsed = Url::parse(url)
        .map_err(|e| SyncError::Connection(format!("Invalid ArangoDB URL: {}", e)))?;

    let host = parsed
        .host_str()
        .ok_or_else(|| SyncError::Connection(format!("ArangoDB URL has no host: {}", url)))?;

    let server = match parsed.port() {
        Some(port) => format!("{}://{}:{}", parsed.scheme(), host, port),
        None => format!("{}://{}", parsed.scheme(), host),
    };

    let database = parsed.path().replace('/', "");
    let database = if database.is_empty() {
        DEFAULT_DATABASE.to_string()
    } else {
        decode(&database)
    };

    Ok(ArangoEndpoint {
        server,
        database,
        username: decode(parsed.username()),
        password: parsed.password().map(decode),
    })
}

fn decode(component: &str) -> String {
    urlencoding::decode(component)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| component.to_string())
}

/// Whether `key` is accepted by ArangoDB as a document `_key`.
pub fn is_valid_document_key(key: &str) -> bool {
    const EXTRA: &str = "_-:.@()+,=;$!*'%";
    !key.is_empty()
        && key.len() <= 254
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || EXTRA.contains(c))
}

/// Error body returned by the ArangoDB HTTP API.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiError {
    #[serde(default)]
    error_message: Option<String>,
    #[serde(default)]
    error_num: Option<i64>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CursorRequest<'a> {
    query: &'a str,
    bind_vars: Value,
    batch_size: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CursorBatch {
    #[serde(default)]
    result: Vec<Value>,
    #[serde(default)]
    has_more: bool,
    #[serde(default)]
    id: Option<String>,
}

/// ArangoDB HTTP API client bound to one database.
pub struct ArangoClient {
    http: Client,
    endpoint: ArangoEndpoint,
}

impl ArangoClient {
    pub fn new(endpoint: ArangoEndpoint) -> Self {
        Self {
            http: Client::new(),
            endpoint,
        }
    }

    pub fn endpoint(&self) -> &ArangoEndpoint {
        &self.endpoint
    }

    fn db_url(&self, path: &str) -> String {
        format!(
            "{}/_db/{}{}",
            self.endpoint.server,
            urlencoding::encode(&self.endpoint.database),
            path
        )
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self.http.request(method, self.db_url(path));
        if self.endpoint.username.is_empty() {
            builder
        } else {
            builder.basic_auth(&self.endpoint.username, self.endpoint.password.as_ref())
        }
    }

    async fn send(&self, builder: RequestBuilder, what: &str) -> Result<Response, SyncError> {
        builder
            .send()
            .await
            .map_err(|e| SyncError::Remote(format!("ArangoDB {} request failed: {}", what, e)))
    }

    /// Turn a non-success response into an error carrying ArangoDB's message.
    async fn api_error(response: Response, what: &str) -> SyncError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let detail = serde_json::from_str::<ApiError>(&body)
            .ok()
            .and_then(|e| {
                e.error_message
                    .map(|msg| format!("{} (errorNum {})", msg, e.error_num.unwrap_or_default()))
            })
            .unwrap_or(body);
        SyncError::Remote(format!("ArangoDB {} error {}: {}", what, status, detail))
    }

    /// Check that the server is reachable and accepts the credentials.
    #[instrument(skip(self), level = "debug")]
    pub async fn version(&self) -> Result<String, SyncError> {
        let response = self
            .request(Method::GET, "/_api/version")
            .send()
            .await
            .map_err(|e| SyncError::Connection(format!("ArangoDB unreachable: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(SyncError::Connection(format!(
                "ArangoDB rejected connection {}: {}",
                status, body
            )));
        }

        #[derive(Deserialize)]
        struct Version {
            version: String,
        }

        let version: Version = response
            .json()
            .await
            .map_err(|e| SyncError::Connection(format!("Unexpected version response: {}", e)))?;
        Ok(version.version)
    }

    /// Remove every document from a collection.
    ///
    /// # Returns
    /// `false` when the collection does not exist
    #[instrument(skip(self), level = "debug")]
    pub async fn truncate(&self, collection: &str) -> Result<bool, SyncError> {
        let path = format!(
            "/_api/collection/{}/truncate",
            urlencoding::encode(collection)
        );
        let response = self.send(self.request(Method::PUT, &path), "truncate").await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(false);
        }
        if !response.status().is_success() {
            return Err(Self::api_error(response, "truncate").await);
        }

        debug!("Truncated collection {}", collection);
        Ok(true)
    }

    /// Create a document collection.
    #[instrument(skip(self), level = "debug")]
    pub async fn create_collection(&self, collection: &str) -> Result<(), SyncError> {
        let response = self
            .send(
                self.request(Method::POST, "/_api/collection")
                    .json(&json!({ "name": collection })),
                "create collection",
            )
            .await?;

        if !response.status().is_success() {
            return Err(Self::api_error(response, "create collection").await);
        }

        debug!("Created collection {}", collection);
        Ok(())
    }

    /// Insert a document, replacing any existing document with the same `_key`.
    #[instrument(skip(self, document), level = "debug")]
    pub async fn save_document(&self, collection: &str, document: &Value) -> Result<(), SyncError> {
        let path = format!(
            "/_api/document/{}?overwriteMode=replace",
            urlencoding::encode(collection)
        );
        let response = self
            .send(self.request(Method::POST, &path).json(document), "save")
            .await?;

        if !response.status().is_success() {
            return Err(Self::api_error(response, "save").await);
        }
        Ok(())
    }

    /// Fetch every document of a collection through an AQL cursor.
    #[instrument(skip(self), level = "debug")]
    pub async fn all_documents(&self, collection: &str) -> Result<Vec<Value>, SyncError> {
        let request = CursorRequest {
            query: "FOR d IN @@collection RETURN d",
            bind_vars: json!({ "@collection": collection }),
            batch_size: CURSOR_BATCH_SIZE,
        };

        let response = self
            .send(
                self.request(Method::POST, "/_api/cursor").json(&request),
                "cursor",
            )
            .await?;
        let mut batch = Self::read_batch(response).await?;
        let mut documents = std::mem::take(&mut batch.result);

        while batch.has_more {
            let id = batch.id.take().ok_or_else(|| {
                SyncError::Remote("ArangoDB cursor has more results but no id".to_string())
            })?;
            let path = format!("/_api/cursor/{}", urlencoding::encode(&id));
            let response = self.send(self.request(Method::PUT, &path), "cursor").await?;
            batch = Self::read_batch(response).await?;
            documents.append(&mut batch.result);
        }

        debug!("Fetched {} documents from {}", documents.len(), collection);
        Ok(documents)
    }

    async fn read_batch(response: Response) -> Result<CursorBatch, SyncError> {
        if !response.status().is_success() {
            return Err(Self::api_error(response, "cursor").await);
        }
        response
            .json()
            .await
            .map_err(|e| SyncError::Remote(format!("Unexpected cursor response: {}", e)))
    }
}
