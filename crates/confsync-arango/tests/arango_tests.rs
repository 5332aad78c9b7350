use confsync_arango::ArangoConnector;
use confsync_core::{Connector, Credentials, Record, RecordStore, RecordValue, SyncError};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

// "root:secret"
const BASIC_AUTH: &str = "Basic cm9vdDpzZWNyZXQ=";

fn credentials(server: &MockServer) -> Credentials {
    let url = server.uri().replace("http://", "http://root:secret@");
    Credentials {
        arango_url: Some(format!("{}/configs", url)),
        ..Default::default()
    }
}

async fn mount_version(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/_db/configs/_api/version"))
        .and(header("authorization", BASIC_AUTH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "server": "arango", "version": "3.11.5" })),
        )
        .mount(server)
        .await;
}

async fn connect(server: &MockServer) -> Box<dyn RecordStore> {
    mount_version(server).await;
    match ArangoConnector::new()
        .connect("arango", &credentials(server))
        .await
    {
        Ok(store) => store,
        Err(e) => panic!("connect failed: {}", e),
    }
}

// ── connect ─────────────────────────────────────────────────────

#[tokio::test]
async fn connect_checks_version() {
    let server = MockServer::start().await;
    let store = connect(&server).await;
    store.close().await.unwrap();
}

#[tokio::test]
async fn connect_rejected_credentials() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/_db/configs/_api/version"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let result = ArangoConnector::new()
        .connect("arango", &credentials(&server))
        .await;
    assert!(matches!(result, Err(SyncError::Connection(_))));
}

#[tokio::test]
async fn connect_without_url() {
    let result = ArangoConnector::new()
        .connect("arango", &Credentials::default())
        .await;
    assert!(matches!(result, Err(SyncError::MissingCredentials(_))));
}

// ── prepare_push ────────────────────────────────────────────────

#[tokio::test]
async fn prepare_push_truncates() {
    let server = MockServer::start().await;
    let store = connect(&server).await;

    Mock::given(method("PUT"))
        .and(path("/_db/configs/_api/collection/settings/truncate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "name": "settings" })))
        .expect(1)
        .mount(&server)
        .await;

    store.prepare_push("settings").await.unwrap();
}

#[tokio::test]
async fn prepare_push_creates_missing_collection() {
    let server = MockServer::start().await;
    let store = connect(&server).await;

    Mock::given(method("PUT"))
        .and(path("/_db/configs/_api/collection/settings/truncate"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "error": true,
            "errorMessage": "collection or view not found",
            "errorNum": 1203
        })))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/_db/configs/_api/collection"))
        .and(body_partial_json(json!({ "name": "settings" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "name": "settings" })))
        .expect(1)
        .mount(&server)
        .await;

    store.prepare_push("settings").await.unwrap();
}

// ── upsert ──────────────────────────────────────────────────────

#[tokio::test]
async fn upsert_replaces_by_key() {
    let server = MockServer::start().await;
    let store = connect(&server).await;

    Mock::given(method("POST"))
        .and(path("/_db/configs/_api/document/settings"))
        .and(query_param("overwriteMode", "replace"))
        .and(body_partial_json(json!({
            "_key": "b",
            "key": "b",
            "value": "x: 1\n",
            "js": false,
            "yaml": true
        })))
        .respond_with(ResponseTemplate::new(202).set_body_json(json!({ "_key": "b" })))
        .expect(2)
        .mount(&server)
        .await;

    let record = Record::yaml("b", "x: 1\n");
    store.upsert("settings", &record).await.unwrap();
    store.upsert("settings", &record).await.unwrap();
}

#[tokio::test]
async fn upsert_reports_server_error() {
    let server = MockServer::start().await;
    let store = connect(&server).await;

    Mock::given(method("POST"))
        .and(path("/_db/configs/_api/document/settings"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": true,
            "errorMessage": "illegal document key",
            "errorNum": 1221
        })))
        .mount(&server)
        .await;

    let err = store
        .upsert("settings", &Record::script("c", "1"))
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::Remote(_)));
    assert!(err.to_string().contains("illegal document key"));
}

#[tokio::test]
async fn upsert_rejects_invalid_key_locally() {
    let server = MockServer::start().await;
    let store = connect(&server).await;

    let err = store
        .upsert("settings", &Record::script("has space", "1"))
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::InvalidInputShape { .. }));
}

// ── list_all ────────────────────────────────────────────────────

#[tokio::test]
async fn list_all_follows_cursor_batches() {
    let server = MockServer::start().await;
    let store = connect(&server).await;

    Mock::given(method("POST"))
        .and(path("/_db/configs/_api/cursor"))
        .and(body_partial_json(json!({ "bindVars": { "@collection": "settings" } })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "result": [
                { "_key": "a", "key": "a", "value": { "x": 1 }, "js": false, "yaml": false }
            ],
            "hasMore": true,
            "id": "4711"
        })))
        .mount(&server)
        .await;

    Mock::given(method("PUT"))
        .and(path("/_db/configs/_api/cursor/4711"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": [
                { "_key": "c", "key": "c", "value": "console.log(1)", "js": true, "yaml": false }
            ],
            "hasMore": false
        })))
        .mount(&server)
        .await;

    let records: Vec<Record> = store
        .list_all("settings")
        .await
        .unwrap()
        .into_iter()
        .map(Result::unwrap)
        .collect();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].key, "a");
    assert_eq!(records[0].value, RecordValue::Json(json!({ "x": 1 })));
    assert_eq!(records[1].key, "c");
    assert_eq!(records[1].value, RecordValue::Script("console.log(1)".into()));
}

#[tokio::test]
async fn list_all_reports_unreadable_documents() {
    let server = MockServer::start().await;
    let store = connect(&server).await;

    Mock::given(method("POST"))
        .and(path("/_db/configs/_api/cursor"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "result": [
                { "value": { "orphan": true } },
                { "_key": "a", "key": "a", "value": { "x": 1 }, "js": false, "yaml": false }
            ],
            "hasMore": false
        })))
        .mount(&server)
        .await;

    let entries = store.list_all("settings").await.unwrap();
    assert_eq!(entries.len(), 2);
    assert!(matches!(entries[0], Err(SyncError::Remote(_))));
    assert!(matches!(&entries[1], Ok(record) if record.key == "a"));
}

#[tokio::test]
async fn list_all_missing_collection() {
    let server = MockServer::start().await;
    let store = connect(&server).await;

    Mock::given(method("POST"))
        .and(path("/_db/configs/_api/cursor"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "error": true,
            "errorMessage": "collection or view not found: settings",
            "errorNum": 1203
        })))
        .mount(&server)
        .await;

    let err = store.list_all("settings").await.unwrap_err();
    assert!(err.to_string().contains("collection or view not found"));
}
