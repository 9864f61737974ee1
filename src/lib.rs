//! # schemaflow
//!
//! Live node/edge visualization of a database schema file, kept in two-way sync with the file
//! on disk.
//!
//! ## Overview
//!
//! schemaflow has two halves:
//!
//! - A **schema pipeline**: [`parser::parse`] turns schema text (Prisma-style `model` and
//!   `enum` blocks) into a [`schema::ParsedSchema`], and [`graph::build`] turns that into a
//!   [`graph::Graph`] of nodes and relation edges. Both are pure and total: malformed text is
//!   scanned on a best-effort basis, never rejected.
//! - A **sync protocol** (requires the `service` feature, on by default): a
//!   [`server::SyncServer`] owns the canonical file, pushes its content to every connected
//!   [`client::SyncChannel`], writes client saves back to disk, and rebroadcasts once file
//!   activity settles.
//!
//! ```text
//! disk file <-> SyncServer <-> SyncChannel (xN) <-> UI
//!                                                    |
//!                                      parse -> build -> rendered graph
//! ```
//!
//! ## Architecture
//!
//! - **[`schema`]**: Field / Model / Enum / ParsedSchema
//! - **[`parser`]**: line scanner with an explicit open-block state machine
//! - **[`graph`]**: node/edge builder with deterministic default layout
//! - **[`protocol`]**: JSON text frames (`content`, `save`)
//! - **[`settle`]**: timer-based coalescing of write bursts
//! - **[`watch`]**: file-watch subscription feeding the settle queue
//! - **[`server`]**: client registry, save handling, broadcast, WebSocket transport
//! - **[`client`]**: per-client channel used by a UI layer
//!
//! ## Quick Start
//!
//! ### Parsing
//!
//! ```rust
//! use schemaflow::{graph::build, parser::parse};
//!
//! let schema = parse("model User {\n  id Int @id\n}\n\nmodel Post {\n  author User\n}\n");
//! assert!(schema.model("Post").unwrap().field("author").unwrap().is_relation);
//!
//! let graph = build(&schema);
//! assert_eq!(graph.nodes.len(), 2);
//! assert_eq!(graph.edges[0].id, "Post-author-User");
//! ```
//!
//! ### Serving a file
//!
//! ```rust,no_run
//! # #[cfg(feature = "service")]
//! # async fn example() -> Result<(), schemaflow::SchemaflowError> {
//! use schemaflow::{config::ServerConfig, server::SyncServer};
//!
//! let config = ServerConfig::new("prisma/schema.prisma");
//! let listener = tokio::net::TcpListener::bind(config.listen).await?;
//! let server = SyncServer::new(config)?;
//! server.serve(listener, async { let _ = tokio::signal::ctrl_c().await; }).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ### Connecting a client
//!
//! ```rust,no_run
//! # #[cfg(feature = "service")]
//! # async fn example() -> Result<(), schemaflow::SchemaflowError> {
//! use schemaflow::{client::SyncChannel, graph::build, parser::parse, protocol::SyncMessage};
//!
//! let mut channel = SyncChannel::connect("ws://127.0.0.1:8080/ws").await?;
//! channel.on_message(|message| {
//!     if let SyncMessage::Content { data } = message {
//!         let graph = build(&parse(&data));
//!         println!("{} nodes, {} edges", graph.nodes.len(), graph.edges.len());
//!     }
//! });
//! channel.send_save("model User {\n  id Int @id\n}\n")?;
//! channel.close();
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod graph;
pub mod parser;
pub mod protocol;
pub mod schema;

#[cfg(feature = "service")]
pub mod client;
#[cfg(feature = "service")]
pub mod server;
#[cfg(feature = "service")]
pub mod settle;
#[cfg(feature = "service")]
pub mod watch;

pub use error::SchemaflowError;
