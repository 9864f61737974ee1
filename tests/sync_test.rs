//! End-to-end tests for the sync server and client channels over real WebSockets.
//!
//! Each test serves a schema file from a temp directory on an ephemeral port with a short settle
//! window, then drives it through [`SyncChannel`]s (or a raw WebSocket where the test needs to
//! send frames a well-behaved client never would).

#![cfg(feature = "service")]

mod common;

use common::{create_schema_file, init_logging, BLOG_SCHEMA};
use futures::SinkExt;
use schemaflow::{
    client::SyncChannel,
    config::ServerConfig,
    error::SchemaflowError,
    protocol::SyncMessage,
    server::SyncServer,
};
use std::time::Duration;
use tempfile::TempDir;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{TcpListener, TcpStream},
    sync::{mpsc::UnboundedReceiver, oneshot},
    task::JoinHandle,
    time::timeout,
};
use tokio_tungstenite::{connect_async, tungstenite::Message as WsMessage};

const SETTLE_MS: u64 = 400;
const WAIT: Duration = Duration::from_secs(10);
/// Long enough that any broadcast the server was going to make has happened.
const QUIET: Duration = Duration::from_millis(3 * SETTLE_MS);

struct TestServer {
    _temp_dir: TempDir,
    server: SyncServer,
    endpoint: String,
    http_addr: String,
    shutdown: Option<oneshot::Sender<()>>,
    handle: JoinHandle<Result<(), SchemaflowError>>,
}

impl TestServer {
    async fn start(content: &str) -> Self {
        init_logging();
        let temp_dir = TempDir::new().unwrap();
        let path = create_schema_file(&temp_dir, content);

        let mut config = ServerConfig::new(&path);
        config.stability_threshold_ms = SETTLE_MS;
        config.poll_interval_ms = 50;
        let server = SyncServer::new(config).unwrap();

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(server.clone().serve(listener, async move {
            let _ = shutdown_rx.await;
        }));

        // Give the watcher a moment to register before tests start writing
        tokio::time::sleep(Duration::from_millis(100)).await;

        TestServer {
            _temp_dir: temp_dir,
            server,
            endpoint: format!("ws://{addr}/ws"),
            http_addr: addr.to_string(),
            shutdown: Some(shutdown_tx),
            handle,
        }
    }

    async fn connect(&self) -> (SyncChannel, UnboundedReceiver<SyncMessage>) {
        let channel = SyncChannel::connect(&self.endpoint).await.unwrap();
        let updates = channel.subscribe();
        (channel, updates)
    }

    fn file_content(&self) -> String {
        std::fs::read_to_string(self.server.path()).unwrap()
    }

    async fn stop(mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        let result = timeout(WAIT, self.handle).await;
        assert!(matches!(result, Ok(Ok(Ok(())))), "server did not shut down cleanly");
    }
}

async fn next_content(updates: &mut UnboundedReceiver<SyncMessage>) -> String {
    match timeout(WAIT, updates.recv()).await {
        Ok(Some(SyncMessage::Content { data })) => data,
        other => panic!("expected a content message, got {other:?}"),
    }
}

async fn assert_quiet(updates: &mut UnboundedReceiver<SyncMessage>) {
    if let Ok(Some(message)) = timeout(QUIET, updates.recv()).await {
        panic!("unexpected message {message:?}");
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn connect_receives_current_content() {
    let server = TestServer::start(BLOG_SCHEMA).await;
    let (_channel, mut updates) = server.connect().await;

    assert_eq!(next_content(&mut updates).await, BLOG_SCHEMA);
    assert_eq!(server.server.client_count(), 1);
    server.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn save_fans_out_to_every_client() {
    let server = TestServer::start(BLOG_SCHEMA).await;
    let (channel_a, mut updates_a) = server.connect().await;
    let (_channel_b, mut updates_b) = server.connect().await;
    next_content(&mut updates_a).await;
    next_content(&mut updates_b).await;

    let edited = BLOG_SCHEMA.replace("ADMIN", "OWNER");
    channel_a.send_save(edited.clone()).unwrap();

    // The sender learns its save landed through the same broadcast as everyone else
    assert_eq!(next_content(&mut updates_a).await, edited);
    assert_eq!(next_content(&mut updates_b).await, edited);
    assert_eq!(server.file_content(), edited);

    assert_quiet(&mut updates_a).await;
    server.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn rapid_writes_settle_into_one_broadcast() {
    let server = TestServer::start(BLOG_SCHEMA).await;
    let (_channel, mut updates) = server.connect().await;
    next_content(&mut updates).await;

    let mut last = String::new();
    for i in 0..5 {
        last = format!("model Step{i} {{\n  id Int @id\n}}\n");
        std::fs::write(server.server.path(), &last).unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    assert_eq!(next_content(&mut updates).await, last);
    assert_quiet(&mut updates).await;
    server.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn external_edit_is_broadcast() {
    let server = TestServer::start(BLOG_SCHEMA).await;
    let (_channel, mut updates) = server.connect().await;
    next_content(&mut updates).await;

    std::fs::write(server.server.path(), "enum Color {\n  RED\n}\n").unwrap();
    assert_eq!(next_content(&mut updates).await, "enum Color {\n  RED\n}\n");
    server.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn unknown_message_is_dropped() {
    let server = TestServer::start(BLOG_SCHEMA).await;
    let (_observer, mut updates) = server.connect().await;
    next_content(&mut updates).await;

    let (mut raw, _) = connect_async(server.endpoint.as_str()).await.unwrap();
    raw.send(WsMessage::Text(r#"{"type":"ping"}"#.to_string()))
        .await
        .unwrap();
    raw.send(WsMessage::Text("{not json".to_string())).await.unwrap();

    assert_quiet(&mut updates).await;
    assert_eq!(server.file_content(), BLOG_SCHEMA);

    // The connection survives and still accepts saves
    raw.send(WsMessage::Text(
        r#"{"type":"save","data":"model Later {\n}\n"}"#.to_string(),
    ))
    .await
    .unwrap();
    assert_eq!(next_content(&mut updates).await, "model Later {\n}\n");
    server.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn closed_channel_stops_delivery() {
    let server = TestServer::start(BLOG_SCHEMA).await;
    let (mut channel_a, mut updates_a) = server.connect().await;
    let (_channel_b, mut updates_b) = server.connect().await;
    next_content(&mut updates_a).await;
    next_content(&mut updates_b).await;

    channel_a.close();
    channel_a.close();
    assert!(channel_a.is_closed());
    assert!(matches!(
        channel_a.send_save("model X {\n}\n"),
        Err(SchemaflowError::ChannelClosed(_))
    ));
    assert_eq!(timeout(WAIT, updates_a.recv()).await, Ok(None));

    // Other clients are unaffected
    std::fs::write(server.server.path(), "model Y {\n}\n").unwrap();
    assert_eq!(next_content(&mut updates_b).await, "model Y {\n}\n");
    server.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn shutdown_closes_client_channels() {
    let server = TestServer::start(BLOG_SCHEMA).await;
    let (channel, mut updates) = server.connect().await;
    next_content(&mut updates).await;
    assert!(!channel.is_closed());

    server.stop().await;
    assert_eq!(timeout(WAIT, updates.recv()).await, Ok(None));
    assert!(channel.is_closed());
    assert!(matches!(
        channel.send_save("model Late {\n}\n"),
        Err(SchemaflowError::ChannelClosed(_))
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn graph_endpoint_serves_derived_graph() {
    let server = TestServer::start(BLOG_SCHEMA).await;

    let mut stream = TcpStream::connect(&server.http_addr).await.unwrap();
    stream
        .write_all(b"GET /graph HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
        .await
        .unwrap();
    let mut response = String::new();
    timeout(WAIT, stream.read_to_string(&mut response))
        .await
        .unwrap()
        .unwrap();

    assert!(response.starts_with("HTTP/1.1 200"));
    assert!(response.contains(r#""id":"Post-author-User""#));
    server.stop().await;
}

#[test]
fn missing_file_refuses_to_start() {
    let temp_dir = TempDir::new().unwrap();
    let result = SyncServer::new(ServerConfig::new(temp_dir.path().join("schema.prisma")));
    assert!(matches!(result, Err(SchemaflowError::NotFound(_))));
}
