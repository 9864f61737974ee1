//! Client side of the sync protocol.
//!
//! A [`SyncChannel`] is one WebSocket connection to a [`crate::server::SyncServer`]. The client
//! never speaks first: the server pushes the current file content as soon as the connection
//! is up. Received frames are decoded and handed to the registered handler; frames that arrive
//! before a handler is registered are buffered and replayed on registration.
//!
//! There is no reconnection. Once the connection drops the channel stays closed.

use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::{
    sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender},
    task::JoinHandle,
};
use tokio_tungstenite::{connect_async, tungstenite::Message as WsMessage};

use crate::{
    error::SchemaflowError,
    protocol::{self, Frame, SyncMessage},
};

pub type MessageHandler = Box<dyn FnMut(SyncMessage) + Send + 'static>;

#[derive(Default)]
struct Inbox {
    handler: Option<MessageHandler>,
    pending: Vec<SyncMessage>,
    closed: bool,
}

impl Inbox {
    fn deliver(&mut self, message: SyncMessage) {
        if self.closed {
            return;
        }
        match self.handler.as_mut() {
            Some(handler) => handler(message),
            None => self.pending.push(message),
        }
    }
}

pub struct SyncChannel {
    endpoint: String,
    outbound: Option<UnboundedSender<WsMessage>>,
    inbox: Arc<Mutex<Inbox>>,
    reader: Option<JoinHandle<()>>,
}

impl SyncChannel {
    /// Opens the connection. Nothing is sent on success.
    pub async fn connect(endpoint: &str) -> Result<Self, SchemaflowError> {
        let (stream, _response) = connect_async(endpoint).await?;
        tracing::info!("[SyncChannel] Connected to {}", endpoint);
        let (mut sink, mut source) = stream.split();

        let (outbound, mut outbound_rx) = unbounded_channel::<WsMessage>();
        tokio::spawn(async move {
            while let Some(message) = outbound_rx.recv().await {
                if let Err(e) = sink.send(message).await {
                    tracing::warn!("[SyncChannel] Send failed: {}", e);
                    break;
                }
            }
            if let Err(e) = sink.close().await {
                tracing::debug!("[SyncChannel] Close failed: {}", e);
            }
        });

        let inbox = Arc::new(Mutex::new(Inbox::default()));
        let reader_inbox = inbox.clone();
        let reader_endpoint = endpoint.to_string();
        let reader = tokio::spawn(async move {
            while let Some(received) = source.next().await {
                match received {
                    Ok(WsMessage::Text(text)) => match protocol::decode(&text) {
                        Ok(Frame::Message(message)) => reader_inbox.lock().deliver(message),
                        Ok(Frame::Unrecognized { kind }) => {
                            tracing::warn!("[SyncChannel] Ignoring '{}' message", kind);
                        }
                        Err(e) => {
                            tracing::warn!("[SyncChannel] Dropping malformed frame: {}", e);
                        }
                    },
                    Ok(WsMessage::Close(_)) => break,
                    Ok(_) => {}
                    Err(e) => {
                        tracing::warn!("[SyncChannel] Receive failed: {}", e);
                        break;
                    }
                }
            }
            // Dropping the handler ends any subscriber stream
            let mut inbox = reader_inbox.lock();
            inbox.closed = true;
            inbox.handler = None;
            tracing::info!("[SyncChannel] Connection to {} ended", reader_endpoint);
        });

        Ok(SyncChannel {
            endpoint: endpoint.to_string(),
            outbound: Some(outbound),
            inbox,
            reader: Some(reader),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Registers the handler invoked once per received message, replacing any previous one.
    /// Messages buffered before registration are delivered immediately, in order.
    ///
    /// The handler runs while the channel's inbox lock is held and must not call back into
    /// this channel's `on_message`.
    pub fn on_message<F>(&self, handler: F)
    where
        F: FnMut(SyncMessage) + Send + 'static,
    {
        let mut inbox = self.inbox.lock();
        let mut handler: MessageHandler = Box::new(handler);
        for message in std::mem::take(&mut inbox.pending) {
            handler(message);
        }
        // A closed channel will never deliver again, so the handler is dropped right away
        if !inbox.closed {
            inbox.handler = Some(handler);
        }
    }

    /// Convenience over [`SyncChannel::on_message`] that forwards every message into a queue.
    pub fn subscribe(&self) -> UnboundedReceiver<SyncMessage> {
        let (tx, rx) = unbounded_channel();
        self.on_message(move |message| {
            if tx.send(message).is_err() {
                tracing::debug!("[SyncChannel] Subscriber dropped");
            }
        });
        rx
    }

    pub fn send_save(&self, data: impl Into<String>) -> Result<(), SchemaflowError> {
        let outbound = self
            .outbound
            .as_ref()
            .filter(|_| !self.inbox.lock().closed)
            .ok_or_else(|| SchemaflowError::ChannelClosed(self.endpoint.clone()))?;
        let text = protocol::encode(&SyncMessage::Save { data: data.into() })?;
        outbound
            .send(WsMessage::Text(text))
            .map_err(|_| SchemaflowError::ChannelClosed(self.endpoint.clone()))
    }

    /// True once [`SyncChannel::close`] was called or the server ended the connection.
    pub fn is_closed(&self) -> bool {
        self.outbound.is_none() || self.inbox.lock().closed
    }

    /// Stops delivery immediately and closes the connection. Safe to call more than once.
    pub fn close(&mut self) {
        let Some(outbound) = self.outbound.take() else {
            return;
        };
        {
            let mut inbox = self.inbox.lock();
            inbox.closed = true;
            inbox.handler = None;
            inbox.pending.clear();
        }
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
        // Dropping the sender lets the writer task send a close frame and exit
        drop(outbound);
        tracing::info!("[SyncChannel] Closed connection to {}", self.endpoint);
    }
}

impl Drop for SyncChannel {
    fn drop(&mut self) {
        self.close();
    }
}
