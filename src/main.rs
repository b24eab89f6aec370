//! EmberKV - A Minimal RESP Key-Value Server
//!
//! This is the main entry point for the EmberKV server.
//! It parses the command line, sets up logging, and runs the event loop.

use anyhow::Context;
use clap::Parser;
use emberkv::commands::CommandHandler;
use emberkv::config::{ServerConfig, DEFAULT_MAX_CLIENTS};
use emberkv::reactor::Server;
use emberkv::storage::Store;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Command-line options
#[derive(Parser, Debug)]
#[command(name = "emberkv", version, about = "A minimal RESP key-value server", long_about = None)]
struct Cli {
    /// Host to bind to
    #[arg(long, default_value = emberkv::DEFAULT_HOST)]
    host: String,

    /// Port to listen on
    #[arg(short, long, default_value_t = emberkv::DEFAULT_PORT)]
    port: u16,

    /// Maximum number of connected clients (also the listen backlog)
    #[arg(long, default_value_t = DEFAULT_MAX_CLIENTS)]
    max_clients: usize,

    /// Upper bound in milliseconds on one multiplexer wait
    #[arg(long, default_value_t = 100)]
    poll_timeout_ms: u64,

    /// Log level used when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    log_level: String,
}

impl From<Cli> for ServerConfig {
    fn from(cli: Cli) -> Self {
        Self {
            host: cli.host,
            port: cli.port,
            max_clients: cli.max_clients,
            poll_timeout: Duration::from_millis(cli.poll_timeout_ms),
        }
    }
}

fn print_banner(config: &ServerConfig) {
    println!(
        r#"
EmberKV v{} - Minimal RESP Key-Value Server
──────────────────────────────────────────────
Listening on {} (max {} clients)
Ready to accept connections.

Use Ctrl+C to stop.
"#,
        emberkv::VERSION,
        config.bind_address(),
        config.max_clients
    );
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins over --log-level
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&cli.log_level))
        .with_context(|| format!("invalid log level '{}'", cli.log_level))?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    let config = ServerConfig::from(cli);

    let handler = CommandHandler::new(Store::new());
    let server = Server::bind(config.clone(), handler)
        .with_context(|| format!("failed to start server on {}", config.bind_address()))?;

    print_banner(&config);
    info!(
        addr = %server.local_addr().context("listener has no local address")?,
        "Listening"
    );

    server.run().context("event loop terminated")?;

    info!("Server shutdown complete");
    Ok(())
}
