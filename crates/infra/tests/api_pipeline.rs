//! Pipeline against a mock events API with a SQLite-backed store.

mod support;

use std::sync::Arc;
use std::time::Duration;

use mindhit_core::{KeyValueStore, StoredCredentials};
use mindhit_domain::ControlMessage;
use mindhit_infra::{
    ApiClientConfig, ConnectivityProbe, DbManager, EventPipeline, EventsApiClient, PipelineDeps,
    PipelineHandle, SqliteKeyValueStore, TabRegistry,
};
use serde_json::json;
use support::{config, durable_records, eventually, scroll_events};
use tempfile::TempDir;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct Stack {
    handle: PipelineHandle,
    join: JoinHandle<()>,
    client: Arc<EventsApiClient>,
    store: Arc<SqliteKeyValueStore>,
    _dir: TempDir,
}

fn sqlite_store(dir: &TempDir) -> Arc<SqliteKeyValueStore> {
    let db = DbManager::new(dir.path().join("mindhit.db"), 2).expect("database opened");
    db.run_migrations().expect("schema created");
    Arc::new(SqliteKeyValueStore::new(Arc::new(db)))
}

fn client_for(server: &MockServer, store: Arc<SqliteKeyValueStore>) -> Arc<EventsApiClient> {
    let config = ApiClientConfig {
        base_url: server.uri(),
        timeout: Duration::from_secs(2),
        health_timeout: Duration::from_secs(1),
    };
    Arc::new(EventsApiClient::new(config, Arc::new(StoredCredentials::new(store))).unwrap())
}

fn stack(server: &MockServer, dir: TempDir, store: Arc<SqliteKeyValueStore>) -> Stack {
    let client = client_for(server, Arc::clone(&store));
    let (outbound, _) = mpsc::channel(8);

    let (handle, join) = EventPipeline::spawn(
        PipelineDeps {
            sink: client.clone(),
            store: store.clone(),
            notifier: Arc::new(TabRegistry::new(outbound)),
        },
        config(2, 3, Duration::from_secs(3600)),
    );

    Stack { handle, join, client, store, _dir: dir }
}

async fn posts(server: &MockServer) -> Vec<serde_json::Value> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|request| request.url.path() == "/events/batch")
        .map(|request| serde_json::from_slice(&request.body).unwrap())
        .collect()
}

async fn seed_durable_record(store: &SqliteKeyValueStore) {
    let record = mindhit_domain::RetryRecord::new(
        mindhit_domain::SessionId::new("old-session").unwrap(),
        scroll_events(2),
        chrono::Utc::now(),
    );
    store.set(&record.key, serde_json::to_value(&record.payload).unwrap()).await.unwrap();
}

#[tokio::test]
async fn batches_are_posted_with_the_stored_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/events/batch"))
        .and(header("authorization", "Bearer tok-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true})))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let store = sqlite_store(&dir);
    let stack = stack(&server, dir, store);

    stack.handle.send(ControlMessage::AuthUpdated { token: Some("tok-1".into()) }).await.unwrap();
    stack
        .handle
        .send(ControlMessage::SessionStarted { session_id: "s1".into() })
        .await
        .unwrap();
    for event in scroll_events(2) {
        stack.handle.send(ControlMessage::Event { event }).await.unwrap();
    }

    eventually("batch posted", || async { posts(&server).await.len() == 1 }).await;
    let body = &posts(&server).await[0];
    assert_eq!(body["session_id"], "s1");
    assert_eq!(body["events"].as_array().unwrap().len(), 2);
    assert_eq!(body["events"][0]["type"], "scroll");

    stack.handle.shutdown().await.unwrap();
    stack.join.await.unwrap();
}

#[tokio::test]
async fn unauthenticated_batches_wait_in_sqlite_until_sign_in() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/events/batch"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let store = sqlite_store(&dir);
    let stack = stack(&server, dir, store);

    stack
        .handle
        .send(ControlMessage::SessionStarted { session_id: "s1".into() })
        .await
        .unwrap();
    let event = scroll_events(1).remove(0);
    stack.handle.send(ControlMessage::Event { event }).await.unwrap();
    stack.handle.send(ControlMessage::SessionStopped).await.unwrap();

    eventually("record persisted", || async {
        durable_records(stack.store.as_ref()).await.len() == 1
    })
    .await;
    assert!(posts(&server).await.is_empty(), "no request without a token");

    stack.handle.send(ControlMessage::AuthUpdated { token: Some("tok-2".into()) }).await.unwrap();
    eventually("replayed after sign-in", || async {
        durable_records(stack.store.as_ref()).await.is_empty()
    })
    .await;

    let posted = posts(&server).await;
    assert_eq!(posted.len(), 1);
    assert_eq!(posted[0]["session_id"], "s1");

    stack.handle.shutdown().await.unwrap();
    stack.join.await.unwrap();
}

#[tokio::test]
async fn records_survive_a_restart() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/events/batch"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("mindhit.db");
    let store = sqlite_store(&dir);

    let stack = stack(&server, dir, store);
    stack
        .handle
        .send(ControlMessage::SessionStarted { session_id: "s1".into() })
        .await
        .unwrap();
    let event = scroll_events(1).remove(0);
    stack.handle.send(ControlMessage::Event { event }).await.unwrap();
    stack.handle.shutdown().await.unwrap();
    stack.join.await.unwrap();

    // Reopen the same file with a fresh pool
    let db = DbManager::new(&db_path, 1).unwrap();
    db.run_migrations().unwrap();
    let reopened = SqliteKeyValueStore::new(Arc::new(db));
    let records = durable_records(&reopened).await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].session_id.as_str(), "s1");
}

#[tokio::test]
async fn probe_reports_recovery_and_triggers_replay() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/events/batch"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/events/batch"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let store = sqlite_store(&dir);
    store
        .set("mindhit-auth", json!({"state": {"token": "tok"}}))
        .await
        .unwrap();
    seed_durable_record(&store).await;

    let stack = stack(&server, dir, store);

    // Startup replay hits the 503
    eventually("startup replay", || async { posts(&server).await.len() == 1 }).await;
    assert_eq!(durable_records(stack.store.as_ref()).await.len(), 1);

    let mut probe = ConnectivityProbe::new(
        Arc::clone(&stack.client),
        stack.handle.clone(),
        Duration::from_millis(50),
    );
    probe.start().unwrap();
    assert!(probe.is_running());
    assert!(probe.start().is_err());

    eventually("replay after recovery", || async {
        durable_records(stack.store.as_ref()).await.is_empty()
    })
    .await;
    let posted = posts(&server).await;
    assert_eq!(posted.last().unwrap()["session_id"], "old-session");

    probe.stop().await.unwrap();
    assert!(!probe.is_running());
    assert!(probe.stop().await.is_err());

    stack.handle.shutdown().await.unwrap();
    stack.join.await.unwrap();
}

#[tokio::test]
async fn probe_exits_when_pipeline_is_gone() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let store = sqlite_store(&dir);
    let stack = stack(&server, dir, store);

    let mut probe = ConnectivityProbe::new(
        Arc::clone(&stack.client),
        stack.handle.clone(),
        Duration::from_millis(20),
    );

    stack.handle.shutdown().await.unwrap();
    stack.join.await.unwrap();
    probe.start().unwrap();

    eventually("probe exit", || async { !probe.is_running() }).await;
}
