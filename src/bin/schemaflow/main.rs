//! schemaflow CLI tool
//!
//! Command-line interface for serving a schema file to live graph clients.
//!
//! ## Commands
//!
//! - `serve [path]`: Serve a schema file over WebSocket, watching it for changes. Prompts for the
//!   path when none is given.
//! - `parse <path>`: One-shot parse, printing models, enums and relations (or graph JSON)
//! - `view [endpoint]`: Connect as a client and print a graph summary on every update
//! - `push <file>`: Send a file's text to a running server as a save and wait for the broadcast
//!   that confirms it landed

use clap::{Parser, Subcommand};
use schemaflow::{
    client::SyncChannel,
    config::{ServerConfig, DEFAULT_ENDPOINT},
    graph::{build, Graph},
    parser::parse,
    protocol::SyncMessage,
    schema::ParsedSchema,
    server::SyncServer,
};
use std::{
    io::Write,
    net::SocketAddr,
    path::PathBuf,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

#[derive(Parser)]
#[command(name = "schemaflow")]
#[command(author, version, about = "Live graph view of a database schema file", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve a schema file to live clients and keep them in sync with it
    Serve {
        /// Path to the schema file (will prompt if not provided)
        path: Option<PathBuf>,

        /// Configuration file path
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Address for the WebSocket listener (default: 127.0.0.1:8080)
        #[arg(long)]
        listen: Option<SocketAddr>,

        /// Quiet period after the last file write before broadcasting, in milliseconds
        #[arg(long)]
        settle_ms: Option<u64>,

        /// File watcher polling interval, in milliseconds
        #[arg(long)]
        poll_ms: Option<u64>,
    },

    /// Parse a schema file once and display its models, enums and relations
    Parse {
        /// Path to the schema file
        path: PathBuf,

        /// Print the derived graph as JSON
        #[arg(long)]
        json: bool,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Connect to a running server and print a summary on every update
    View {
        /// Server endpoint
        #[arg(default_value = DEFAULT_ENDPOINT)]
        endpoint: String,
    },

    /// Save a file's contents through a running server
    Push {
        /// File whose text replaces the served schema
        file: PathBuf,

        /// Server endpoint
        #[arg(long, default_value = DEFAULT_ENDPOINT)]
        endpoint: String,

        /// Seconds to wait for the server to confirm the save
        #[arg(long, default_value = "10")]
        timeout: u64,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            path,
            config,
            listen,
            settle_ms,
            poll_ms,
        } => {
            let file_config = match config {
                Some(cfg) => Some(ServerConfig::from_toml_file(&cfg)?),
                None => None,
            };

            let schema_path = match (path, file_config.as_ref()) {
                (Some(path), _) => path,
                (None, Some(cfg)) => cfg.schema_path.clone(),
                (None, None) => prompt_for_path()?,
            };

            let mut config = file_config.unwrap_or_else(|| ServerConfig::new(&schema_path));
            config.schema_path = schema_path;
            if let Some(listen) = listen {
                config.listen = listen;
            }
            if let Some(settle_ms) = settle_ms {
                config.stability_threshold_ms = settle_ms;
            }
            if let Some(poll_ms) = poll_ms {
                config.poll_interval_ms = poll_ms;
            }

            let server = match SyncServer::new(config) {
                Ok(server) => server,
                Err(e) => {
                    eprintln!("Error: {e}");
                    std::process::exit(1);
                }
            };

            let running = install_ctrlc()?;
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()?;

            runtime.block_on(async {
                let listener = tokio::net::TcpListener::bind(server.config().listen).await?;
                println!("Serving {}", server.path().display());
                println!("WebSocket on ws://{}/ws", listener.local_addr()?);
                println!(
                    "Broadcasting after {}ms without writes. Press Ctrl-C to stop.",
                    server.config().stability_threshold_ms
                );

                server.serve(listener, wait_for_shutdown(running)).await?;
                Ok::<(), Box<dyn std::error::Error>>(())
            })?;

            println!("Shutdown complete");
            Ok(())
        }

        Commands::Parse {
            path,
            json,
            verbose,
        } => {
            let text = std::fs::read_to_string(&path)?;
            let schema = parse(&text);
            let graph = build(&schema);

            if json {
                println!("{}", serde_json::to_string_pretty(&graph)?);
            } else {
                if verbose {
                    println!("Parsing: {path:?}");
                }
                print_schema(&schema, verbose);
                print_graph_summary(&graph);
            }
            Ok(())
        }

        Commands::View { endpoint } => {
            let running = install_ctrlc()?;
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()?;

            runtime.block_on(async {
                let mut channel = SyncChannel::connect(&endpoint).await?;
                let mut updates = channel.subscribe();
                println!("Connected to {endpoint}. Press Ctrl-C to stop.");

                loop {
                    tokio::select! {
                        received = updates.recv() => match received {
                            Some(SyncMessage::Content { data }) => {
                                println!("\n=== Update ({} bytes) ===", data.len());
                                print_graph_summary(&build(&parse(&data)));
                            }
                            Some(other) => {
                                tracing::debug!("Ignoring '{}' message", other.kind());
                            }
                            None => {
                                println!("Server closed the connection");
                                break;
                            }
                        },
                        _ = wait_for_shutdown(running.clone()) => break,
                    }
                }

                channel.close();
                Ok::<(), Box<dyn std::error::Error>>(())
            })?;
            Ok(())
        }

        Commands::Push {
            file,
            endpoint,
            timeout,
        } => {
            let text = std::fs::read_to_string(&file)?;
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()?;

            runtime.block_on(async {
                let mut channel = SyncChannel::connect(&endpoint).await?;
                let mut updates = channel.subscribe();

                // The server speaks first; wait for the initial snapshot before saving
                let wait = Duration::from_secs(timeout);
                if tokio::time::timeout(wait, updates.recv()).await.is_err() {
                    eprintln!("Error: no initial content from {endpoint}");
                    std::process::exit(1);
                }

                channel.send_save(text.clone())?;
                println!("Sent {} bytes to {endpoint}, waiting for confirmation...", text.len());

                let confirmed = tokio::time::timeout(wait, async {
                    while let Some(message) = updates.recv().await {
                        if matches!(&message, SyncMessage::Content { data } if *data == text) {
                            return true;
                        }
                    }
                    false
                })
                .await;

                channel.close();
                match confirmed {
                    Ok(true) => println!("Saved"),
                    Ok(false) => {
                        eprintln!("Error: connection closed before the save was confirmed");
                        std::process::exit(1);
                    }
                    Err(_) => {
                        eprintln!("Error: save not confirmed within {timeout}s");
                        std::process::exit(1);
                    }
                }
                Ok::<(), Box<dyn std::error::Error>>(())
            })?;
            Ok(())
        }
    }
}

fn prompt_for_path() -> Result<PathBuf, Box<dyn std::error::Error>> {
    print!("Enter the path to your schema.prisma file: ");
    std::io::stdout().flush()?;
    let mut input = String::new();
    std::io::stdin().read_line(&mut input)?;
    let trimmed = input.trim();
    if trimmed.is_empty() {
        eprintln!("Error: Schema path cannot be empty");
        std::process::exit(1);
    }
    Ok(PathBuf::from(trimmed))
}

fn install_ctrlc() -> Result<Arc<AtomicBool>, Box<dyn std::error::Error>> {
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        println!("\nShutting down...");
        r.store(false, Ordering::SeqCst);
    })?;
    Ok(running)
}

async fn wait_for_shutdown(running: Arc<AtomicBool>) {
    while running.load(Ordering::SeqCst) {
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
}

fn print_schema(schema: &ParsedSchema, verbose: bool) {
    println!("=== Models ({}) ===", schema.models.len());
    for model in schema.models.iter() {
        println!("{} ({} fields)", model.name, model.fields.len());
        if verbose {
            for field in model.fields.iter() {
                let mut flags = Vec::new();
                if field.is_primary_key {
                    flags.push("primary key");
                }
                if field.is_nullable {
                    flags.push("nullable");
                }
                if field.is_relation {
                    flags.push("relation");
                }
                println!("  {}: {} [{}]", field.name, field.raw_type, flags.join(", "));
            }
        }
    }

    println!("\n=== Enums ({}) ===", schema.enums.len());
    for enum_def in schema.enums.iter() {
        println!("{}: {}", enum_def.name, enum_def.values.join(", "));
    }
}

fn print_graph_summary(graph: &Graph) {
    println!("\n=== Relations ({}) ===", graph.edges.len());
    for edge in graph.edges.iter() {
        println!("{}.{} -> {}", edge.source, edge.label, edge.target);
    }

    let dangling = graph.dangling_edges();
    if !dangling.is_empty() {
        println!("\n=== Dangling ({}) ===", dangling.len());
        for edge in dangling {
            println!("{} (no node named '{}')", edge.id, edge.target);
        }
    }
}
