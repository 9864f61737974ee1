use std::{fmt, io};

use serde::{Deserialize, Serialize};
use serde_json::Error as JsonError;
use thiserror::Error;

#[cfg(feature = "service")]
use notify::{Error as NotifyError, ErrorKind as NotifyErrorKind};

#[cfg(feature = "service")]
use tokio_tungstenite::tungstenite::Error as TungsteniteError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
pub enum SchemaflowError {
    #[error("Sync channel closed: {0}")]
    ChannelClosed(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("File System error: {0}")]
    Io(String),
    #[error("Item Not Found: {0}")]
    NotFound(String),
    #[error("You do not have permission to access this resource")]
    PermissionDenied,
    #[error("Sync protocol error: {0}")]
    Protocol(String),
    #[error("(De)Serialization error: {0}")]
    Serialization(String),
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("File watch error: {0}")]
    Watch(String),
}

impl From<io::Error> for SchemaflowError {
    fn from(x: io::Error) -> Self {
        match x.kind() {
            io::ErrorKind::NotFound => SchemaflowError::NotFound(format!("{x}")),
            io::ErrorKind::PermissionDenied => SchemaflowError::PermissionDenied,
            _ => SchemaflowError::Io(format!("IOError: {}: {x}", x.kind())),
        }
    }
}

impl From<fmt::Error> for SchemaflowError {
    fn from(x: fmt::Error) -> Self {
        SchemaflowError::Serialization(format!("{x}"))
    }
}

impl From<JsonError> for SchemaflowError {
    fn from(src: JsonError) -> SchemaflowError {
        SchemaflowError::Serialization(format!("JSON (de)serialization error: {src}"))
    }
}

impl From<toml::de::Error> for SchemaflowError {
    fn from(src: toml::de::Error) -> SchemaflowError {
        SchemaflowError::Config(format!("Toml deserialization error: {src}"))
    }
}

impl From<std::net::AddrParseError> for SchemaflowError {
    fn from(src: std::net::AddrParseError) -> SchemaflowError {
        SchemaflowError::Config(format!("Invalid socket address: {src}"))
    }
}

impl<T> From<tokio::sync::mpsc::error::SendError<T>> for SchemaflowError {
    fn from(_: tokio::sync::mpsc::error::SendError<T>) -> Self {
        SchemaflowError::ChannelClosed("receiver dropped".to_string())
    }
}

#[cfg(feature = "service")]
impl From<NotifyError> for SchemaflowError {
    fn from(notify_error: NotifyError) -> Self {
        match notify_error.kind {
            NotifyErrorKind::Generic(msg) => SchemaflowError::Watch(format!(
                "notify-debouncer: {}, paths: {:?}",
                msg, notify_error.paths
            )),
            NotifyErrorKind::Io(io_error) => SchemaflowError::Watch(format!(
                "notify-debouncer: io error {}, paths: {:?}",
                io_error.kind(),
                notify_error.paths
            )),
            NotifyErrorKind::PathNotFound => SchemaflowError::NotFound(format!(
                "notify-debouncer: path(s) not found: {:?}",
                notify_error.paths
            )),
            NotifyErrorKind::WatchNotFound => SchemaflowError::NotFound(format!(
                "notify-debouncer: watch not found, paths: {:?}",
                notify_error.paths
            )),
            NotifyErrorKind::InvalidConfig(_) => {
                SchemaflowError::Watch("notify-debouncer invalid config".to_string())
            }
            NotifyErrorKind::MaxFilesWatch => {
                SchemaflowError::Watch("notify-debouncer max file watch limit reached".to_string())
            }
        }
    }
}

#[cfg(feature = "service")]
impl From<TungsteniteError> for SchemaflowError {
    fn from(ws_error: TungsteniteError) -> Self {
        match ws_error {
            TungsteniteError::ConnectionClosed | TungsteniteError::AlreadyClosed => {
                SchemaflowError::ChannelClosed(format!("{ws_error}"))
            }
            _ => SchemaflowError::Transport(format!("websocket error: {ws_error}")),
        }
    }
}

#[cfg(feature = "service")]
impl From<axum::Error> for SchemaflowError {
    fn from(axum_error: axum::Error) -> Self {
        SchemaflowError::Transport(format!("axum: {axum_error}"))
    }
}
