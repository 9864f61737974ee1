//! Sync server: the canonical schema file on one side, any number of live clients on the other.
//!
//! - On connect a client immediately receives the file as a `content` message, read fresh.
//! - A `save` message overwrites the file in full. Nothing is echoed back directly.
//! - Once write activity on the file settles, the file is re-read and broadcast as `content`
//!   to every connected client, the saving client included. That broadcast is how a client
//!   learns its save landed; there is no separate acknowledgement.
//!
//! Failures during a session (bad frames, read/write errors, sends to a vanished client) are
//! logged and dropped. Only a missing file at startup is fatal.
//!
//! The transport is a WebSocket served by axum on `/` and `/ws`. The derived data a UI needs is
//! also available as JSON on `/schema` and `/graph`.

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use std::{
    collections::BTreeMap,
    future::Future,
    path::{Path, PathBuf},
    sync::Arc,
};
use tokio::{
    net::TcpListener,
    sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender},
};
use tower_http::trace::TraceLayer;

use crate::{
    config::ServerConfig,
    error::SchemaflowError,
    graph::build,
    parser::parse,
    protocol::{self, Frame, SyncMessage},
    settle::SettleQueue,
    watch::FileWatcher,
};

pub type ClientId = u64;

type ContentDigest = [u8; 32];

/// Explicit registry of live client channels. Clients are only removed by
/// [`ClientRegistry::deregister`]; a failed send is logged but does not evict.
#[derive(Debug, Default)]
pub struct ClientRegistry {
    next_id: ClientId,
    clients: BTreeMap<ClientId, UnboundedSender<SyncMessage>>,
}

impl ClientRegistry {
    pub fn register(&mut self, tx: UnboundedSender<SyncMessage>) -> ClientId {
        let id = self.next_id;
        self.next_id += 1;
        self.clients.insert(id, tx);
        id
    }

    pub fn deregister(&mut self, id: ClientId) -> bool {
        self.clients.remove(&id).is_some()
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    pub fn ids(&self) -> Vec<ClientId> {
        self.clients.keys().copied().collect()
    }

    pub fn send(&self, id: ClientId, message: SyncMessage) -> Result<(), SchemaflowError> {
        let tx = self
            .clients
            .get(&id)
            .ok_or_else(|| SchemaflowError::NotFound(format!("client {id} is not connected")))?;
        tx.send(message)?;
        Ok(())
    }

    /// Pushes `message` to every registered client. Returns how many accepted it.
    pub fn broadcast(&self, message: &SyncMessage) -> usize {
        let mut delivered = 0;
        for (id, tx) in self.clients.iter() {
            match tx.send(message.clone()) {
                Ok(()) => delivered += 1,
                Err(_) => {
                    tracing::warn!("[SyncServer] Client {} channel closed, skipping", id);
                }
            }
        }
        delivered
    }

    /// Drops every channel, which ends each client's outbound stream.
    pub fn clear(&mut self) {
        self.clients.clear();
    }
}

struct SyncState {
    config: ServerConfig,
    path: PathBuf,
    registry: Mutex<ClientRegistry>,
    /// Digest of the most recent client save, used only to label the change that follows it.
    last_save: Mutex<Option<ContentDigest>>,
}

#[derive(Clone)]
pub struct SyncServer {
    state: Arc<SyncState>,
}

impl SyncServer {
    /// Fails if the schema file does not exist.
    pub fn new(config: ServerConfig) -> Result<Self, SchemaflowError> {
        config.validate()?;
        let path = config.schema_path.canonicalize().map_err(|e| {
            SchemaflowError::NotFound(format!(
                "File not found at {}: {e}",
                config.schema_path.display()
            ))
        })?;
        if !path.is_file() {
            return Err(SchemaflowError::NotFound(format!(
                "{} is not a file",
                path.display()
            )));
        }
        tracing::info!("[SyncServer] Loading schema from: {}", path.display());

        Ok(SyncServer {
            state: Arc::new(SyncState {
                config,
                path,
                registry: Mutex::new(ClientRegistry::default()),
                last_save: Mutex::new(None),
            }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.state.path
    }

    pub fn config(&self) -> &ServerConfig {
        &self.state.config
    }

    pub fn client_count(&self) -> usize {
        self.state.registry.lock().len()
    }

    pub async fn read_content(&self) -> Result<String, SchemaflowError> {
        tracing::debug!("[SyncServer] Reading {:?}", self.path());
        Ok(tokio::fs::read_to_string(self.path()).await?)
    }

    /// Registers a new client and queues the current file content as its first message.
    pub async fn on_client_connect(&self) -> (ClientId, UnboundedReceiver<SyncMessage>) {
        let (tx, rx) = unbounded_channel();
        let (id, count) = {
            let mut registry = self.state.registry.lock();
            let id = registry.register(tx);
            (id, registry.len())
        };
        tracing::info!("[SyncServer] Client {} connected ({} connected)", id, count);

        match self.read_content().await {
            Ok(data) => {
                if let Err(e) = self
                    .state
                    .registry
                    .lock()
                    .send(id, SyncMessage::Content { data })
                {
                    tracing::warn!("[SyncServer] Could not send initial content to client {}: {}", id, e);
                }
            }
            Err(e) => {
                tracing::error!("[SyncServer] Could not read schema for client {}: {}", id, e);
            }
        }
        (id, rx)
    }

    pub fn on_client_disconnect(&self, id: ClientId) {
        let (removed, count) = {
            let mut registry = self.state.registry.lock();
            (registry.deregister(id), registry.len())
        };
        if removed {
            tracing::info!("[SyncServer] Client {} disconnected ({} connected)", id, count);
        }
    }

    /// Handles one text frame from a client. Never fails; problems are logged.
    pub async fn on_client_message(&self, id: ClientId, frame: &str) {
        if let Err(e) = self.handle_frame(id, frame).await {
            tracing::warn!("[SyncServer] Dropping message from client {}: {}", id, e);
        }
    }

    async fn handle_frame(&self, id: ClientId, frame: &str) -> Result<(), SchemaflowError> {
        match protocol::decode(frame)? {
            Frame::Message(SyncMessage::Save { data }) => {
                tracing::info!(
                    "[SyncServer] Save from client {} ({} bytes)",
                    id,
                    data.len()
                );
                self.save(data).await
            }
            Frame::Message(message) => Err(SchemaflowError::Protocol(format!(
                "clients may not send '{}' messages",
                message.kind()
            ))),
            Frame::Unrecognized { kind } => Err(SchemaflowError::Protocol(format!(
                "unrecognized message type '{kind}'"
            ))),
        }
    }

    /// Overwrites the canonical file. The write has completed when this returns.
    pub async fn save(&self, data: String) -> Result<(), SchemaflowError> {
        let digest: ContentDigest = Sha256::digest(data.as_bytes()).into();
        *self.state.last_save.lock() = Some(digest);
        tokio::fs::write(self.path(), data).await?;
        tracing::info!(
            "[SyncServer] File updated from client (sha256 {})",
            hex::encode(&digest[..8])
        );
        Ok(())
    }

    /// Re-reads the file and broadcasts it to every client. Returns how many clients the
    /// content was queued for; a read failure is logged and broadcasts nothing.
    pub async fn on_file_changed(&self) -> usize {
        let data = match self.read_content().await {
            Ok(data) => data,
            Err(e) => {
                tracing::error!("[SyncServer] Could not read changed file: {}", e);
                return 0;
            }
        };

        let digest: ContentDigest = Sha256::digest(data.as_bytes()).into();
        let origin = if self.state.last_save.lock().take() == Some(digest) {
            "client save"
        } else {
            "external edit"
        };
        tracing::info!(
            "[SyncServer] File changed ({}): {}",
            origin,
            self.path().display()
        );

        let delivered = self
            .state
            .registry
            .lock()
            .broadcast(&SyncMessage::Content { data });
        tracing::info!("[SyncServer] Sent update to {} clients", delivered);
        delivered
    }

    /// Disconnects every client by dropping its channel.
    pub fn close_all(&self) {
        let mut registry = self.state.registry.lock();
        let count = registry.len();
        registry.clear();
        if count > 0 {
            tracing::info!("[SyncServer] Closed {} client channels", count);
        }
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route("/", get(ws_handler))
            .route("/ws", get(ws_handler))
            .route("/schema", get(schema_handler))
            .route("/graph", get(graph_handler))
            .layer(TraceLayer::new_for_http())
            .with_state(self.clone())
    }

    /// Serves clients on `listener` and watches the file until `shutdown` resolves.
    pub async fn serve(
        self,
        listener: TcpListener,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> Result<(), SchemaflowError> {
        let (settle, mut settled) = SettleQueue::spawn(self.config().settle_window());
        let watcher = FileWatcher::start(self.path(), self.config().poll_interval(), settle)?;

        let change_server = self.clone();
        let change_loop = tokio::spawn(async move {
            while settled.recv().await.is_some() {
                change_server.on_file_changed().await;
            }
        });

        if let Ok(addr) = listener.local_addr() {
            tracing::info!("[SyncServer] Listening on ws://{}", addr);
        }

        let shutdown_server = self.clone();
        let wrapped_shutdown = async move {
            shutdown.await;
            shutdown_server.close_all();
        };

        let result = axum::serve(listener, self.router().into_make_service())
            .with_graceful_shutdown(wrapped_shutdown)
            .await;

        watcher.stop();
        change_loop.abort();
        tracing::info!("[SyncServer] Shut down");
        Ok(result?)
    }
}

async fn ws_handler(State(server): State<SyncServer>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, server))
}

async fn handle_socket(socket: WebSocket, server: SyncServer) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let (id, mut outbound) = server.on_client_connect().await;

    let writer = tokio::spawn(async move {
        while let Some(message) = outbound.recv().await {
            let text = match protocol::encode(&message) {
                Ok(text) => text,
                Err(e) => {
                    tracing::warn!("[SyncServer] Could not encode message for client {}: {}", id, e);
                    continue;
                }
            };
            if let Err(e) = ws_tx.send(Message::Text(text)).await {
                tracing::warn!("[SyncServer] Send to client {} failed: {}", id, e);
                break;
            }
        }
        if let Err(e) = ws_tx.close().await {
            tracing::debug!("[SyncServer] Close for client {} failed: {}", id, e);
        }
    });

    while let Some(received) = ws_rx.next().await {
        match received {
            Ok(Message::Text(text)) => server.on_client_message(id, &text).await,
            Ok(Message::Binary(_)) => {
                tracing::warn!("[SyncServer] Ignoring binary frame from client {}", id);
            }
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                tracing::warn!("[SyncServer] Receive from client {} failed: {}", id, e);
                break;
            }
        }
    }

    server.on_client_disconnect(id);
    writer.abort();
}

async fn schema_handler(State(server): State<SyncServer>) -> Response {
    match server.read_content().await {
        Ok(text) => Json(parse(&text)).into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

async fn graph_handler(State(server): State<SyncServer>) -> Response {
    match server.read_content().await {
        Ok(text) => Json(build(&parse(&text))).into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}
