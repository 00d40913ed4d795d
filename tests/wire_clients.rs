//! Wire-level tests for the Google API clients
//!
//! Stands up loopback stand-ins for the Pub/Sub, Bigtable and metadata
//! endpoints, records what the blocking clients send, and answers with canned
//! responses. The blocking clients run on `spawn_blocking` threads.
//!
//! Run with: cargo test --test wire_clients

use axum::Router;
use axum::extract::Request;
use axum::http::StatusCode;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{TimeZone, Utc};
use climate_service::auth::TokenSource;
use climate_service::config::PublisherConfig;
use climate_service::error::{PublishError, StoreError};
use climate_service::ingest::{Ingestor, build_mutation};
use climate_service::logging::LogSettings;
use climate_service::model::{COLUMN_FAMILY, Reading};
use climate_service::publish::{Publisher, sample_reading};
use climate_service::status::StatusTable;
use climate_service::store::{BigtableTable, MemoryTable, MutationSink};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ---------------------------------------------------------------------------
// Test Helpers
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct Recorded {
    path: String,
    authorization: Option<String>,
    metadata_flavor: Option<String>,
    body: Vec<u8>,
}

type Log = Arc<Mutex<Vec<Recorded>>>;

fn header(request: &Request, name: &str) -> Option<String> {
    request
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(String::from)
}

/// Serve `reply` for every request and record what arrives.
async fn spawn_fake(status: StatusCode, reply: &'static str) -> (String, Log) {
    let log: Log = Arc::default();
    let recorder = log.clone();

    let app = Router::new().fallback(move |request: Request| {
        let recorder = recorder.clone();
        async move {
            let path = request.uri().path().to_string();
            let authorization = header(&request, "authorization");
            let metadata_flavor = header(&request, "metadata-flavor");
            let body = axum::body::to_bytes(request.into_body(), usize::MAX)
                .await
                .unwrap()
                .to_vec();

            recorder.lock().unwrap().push(Recorded {
                path,
                authorization,
                metadata_flavor,
                body,
            });
            (status, [("content-type", "application/json")], reply)
        }
    });

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{}", addr), log)
}

/// Accept every request but answer only after `delay`.
async fn spawn_stalled(delay: Duration) -> String {
    let app = Router::new().fallback(move || async move {
        tokio::time::sleep(delay).await;
        (StatusCode::OK, [("content-type", "application/json")], "{}")
    });

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

fn publisher_config(endpoint: &str) -> PublisherConfig {
    PublisherConfig {
        project: "demo".to_string(),
        topic: "climate-updates".to_string(),
        endpoint: endpoint.to_string(),
        token_source: TokenSource::Static("publish-token".to_string()),
        log: LogSettings::default(),
    }
}

fn publish_blocking(
    config: PublisherConfig,
    reading: Reading,
) -> tokio::task::JoinHandle<Result<String, PublishError>> {
    tokio::task::spawn_blocking(move || -> Result<String, PublishError> {
        Publisher::new(&config)?.publish(&reading)
    })
}

// ---------------------------------------------------------------------------
// Publisher
// ---------------------------------------------------------------------------

#[tokio::test(flavor = "multi_thread")]
async fn test_publish_returns_server_assigned_id() {
    let (base, log) = spawn_fake(StatusCode::OK, r#"{"messageIds":["3141"]}"#).await;

    let id = publish_blocking(publisher_config(&base), sample_reading())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(id, "3141");

    let requests = log.lock().unwrap().clone();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].path, "/v1/projects/demo/topics/climate-updates:publish");
    assert_eq!(requests[0].authorization.as_deref(), Some("Bearer publish-token"));

    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    let messages = body["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 1);
    let payload = STANDARD.decode(messages[0]["data"].as_str().unwrap()).unwrap();
    let published: Reading = serde_json::from_slice(&payload).unwrap();
    assert_eq!(published, sample_reading());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_published_message_flows_into_a_row() {
    let (base, log) = spawn_fake(StatusCode::OK, r#"{"messageIds":["99"]}"#).await;
    publish_blocking(publisher_config(&base), sample_reading())
        .await
        .unwrap()
        .unwrap();

    let publish_body: serde_json::Value =
        serde_json::from_slice(&log.lock().unwrap()[0].body).unwrap();
    let push = serde_json::json!({
        "message": {"data": publish_body["messages"][0]["data"], "messageId": "99"},
        "subscription": "projects/demo/subscriptions/climate-push"
    });

    let table = Arc::new(MemoryTable::new());
    let ingestor = Ingestor::new(StatusTable::standard(), table.clone());
    let outcome = ingestor.process(&serde_json::to_vec(&push).unwrap()).unwrap();
    assert_eq!(outcome.delivery_id, "99");

    let row = "IL#Will#Joliet#2023#1";
    assert_eq!(outcome.row_key, row);
    assert_eq!(table.latest(row, COLUMN_FAMILY, "pollution").as_deref(), Some("SEVERE"));
    assert_eq!(table.latest(row, COLUMN_FAMILY, "temperature").as_deref(), Some("39.600000"));
    assert_eq!(table.latest(row, COLUMN_FAMILY, "pressure").as_deref(), Some("30.000000"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_publish_surfaces_rejection_and_empty_response() {
    let (base, _) = spawn_fake(StatusCode::NOT_FOUND, r#"{"error":{"message":"topic not found"}}"#).await;
    let err = publish_blocking(publisher_config(&base), sample_reading())
        .await
        .unwrap()
        .unwrap_err();
    assert!(matches!(err, PublishError::Rejected { status: 404, .. }), "got {:?}", err);

    let (base, _) = spawn_fake(StatusCode::OK, r#"{"messageIds":[]}"#).await;
    let err = publish_blocking(publisher_config(&base), sample_reading())
        .await
        .unwrap()
        .unwrap_err();
    assert!(matches!(err, PublishError::EmptyResponse), "got {:?}", err);
}

// ---------------------------------------------------------------------------
// Bigtable
// ---------------------------------------------------------------------------

fn sample_mutation() -> climate_service::store::RowMutation {
    let now = Utc.with_ymd_and_hms(2023, 1, 10, 12, 0, 0).unwrap();
    let (mutation, _) = build_mutation(
        &sample_reading(),
        &StatusTable::standard(),
        climate_service::store::cell_timestamp(now),
    )
    .unwrap();
    mutation
}

#[tokio::test(flavor = "multi_thread")]
async fn test_mutate_row_request_shape() {
    let (base, log) = spawn_fake(StatusCode::OK, "{}").await;
    let table = BigtableTable::new(
        &base,
        "demo",
        "climate",
        "readings",
        TokenSource::Static("table-token".to_string()),
    );

    tokio::task::spawn_blocking(move || table.apply(&sample_mutation()))
        .await
        .unwrap()
        .unwrap();

    let requests = log.lock().unwrap().clone();
    assert_eq!(requests.len(), 1);
    assert_eq!(
        requests[0].path,
        "/v2/projects/demo/instances/climate/tables/readings:mutateRow"
    );
    assert_eq!(requests[0].authorization.as_deref(), Some("Bearer table-token"));

    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(
        STANDARD.decode(body["rowKey"].as_str().unwrap()).unwrap(),
        b"IL#Will#Joliet#2023#1".to_vec()
    );

    let cells: Vec<(String, Vec<u8>, String)> = body["mutations"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| {
            let set = &m["setCell"];
            assert_eq!(set["familyName"], "climate_summary");
            (
                String::from_utf8(STANDARD.decode(set["columnQualifier"].as_str().unwrap()).unwrap())
                    .unwrap(),
                STANDARD.decode(set["value"].as_str().unwrap()).unwrap(),
                set["timestampMicros"].as_str().unwrap().to_string(),
            )
        })
        .collect();

    let ts = "1673352000000000".to_string();
    assert_eq!(
        cells,
        vec![
            ("pollution".to_string(), b"SEVERE".to_vec(), ts.clone()),
            ("temperature".to_string(), b"39.600000".to_vec(), ts.clone()),
            ("pressure".to_string(), b"30.000000".to_vec(), ts),
        ]
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn test_mutate_row_rejection_is_reported() {
    let (base, _) = spawn_fake(StatusCode::SERVICE_UNAVAILABLE, r#"{"error":{"code":503}}"#).await;
    let table = BigtableTable::new(&base, "demo", "climate", "readings", TokenSource::Anonymous);

    let err = tokio::task::spawn_blocking(move || table.apply(&sample_mutation()))
        .await
        .unwrap()
        .unwrap_err();
    match err {
        StoreError::Rejected { status, body } => {
            assert_eq!(status, 503);
            assert!(body.contains("503"));
        }
        other => panic!("expected rejection, got {:?}", other),
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_mutate_row_gives_up_after_timeout() {
    let base = spawn_stalled(Duration::from_secs(3)).await;
    let table = BigtableTable::new(&base, "demo", "climate", "readings", TokenSource::Anonymous)
        .with_timeout(Some(Duration::from_secs(1)));

    let err = tokio::task::spawn_blocking(move || table.apply(&sample_mutation()))
        .await
        .unwrap()
        .unwrap_err();
    match err {
        StoreError::Transport { url, .. } => assert!(url.ends_with(":mutateRow"), "url was {}", url),
        other => panic!("expected a timed out transport error, got {:?}", other),
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_anonymous_requests_carry_no_authorization() {
    let (base, log) = spawn_fake(StatusCode::OK, "{}").await;
    let table = BigtableTable::new(&base, "demo", "climate", "readings", TokenSource::Anonymous);

    tokio::task::spawn_blocking(move || table.apply(&sample_mutation()))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(log.lock().unwrap()[0].authorization, None);
}

// ---------------------------------------------------------------------------
// Metadata server
// ---------------------------------------------------------------------------

#[tokio::test(flavor = "multi_thread")]
async fn test_metadata_server_token_is_used() {
    let (base, log) = spawn_fake(
        StatusCode::OK,
        r#"{"access_token":"meta-token","expires_in":3599,"token_type":"Bearer"}"#,
    )
    .await;
    let source = TokenSource::MetadataServer {
        url: format!("{}/computeMetadata/v1/instance/service-accounts/default/token", base),
    };

    let token = tokio::task::spawn_blocking(move || {
        let client = reqwest::blocking::Client::new();
        source.bearer(&client)
    })
    .await
    .unwrap()
    .unwrap();
    assert_eq!(token.as_deref(), Some("meta-token"));

    let requests = log.lock().unwrap().clone();
    assert_eq!(requests[0].metadata_flavor.as_deref(), Some("Google"));
}
