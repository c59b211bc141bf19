//! Ridematch server binary.
//!
//! # Usage
//!
//! ```bash
//! # Relay only
//! ridematch-server --bind 0.0.0.0:3000
//!
//! # Relay plus the browser client
//! ridematch-server --bind 0.0.0.0:3000 --static-dir ./public
//! ```

use std::path::PathBuf;

use clap::Parser;
use ridematch_server::{DriverConfig, Server, ServerRuntimeConfig};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Ridematch relay server
#[derive(Parser, Debug)]
#[command(name = "ridematch-server")]
#[command(about = "Real-time ride-matching relay over WebSockets")]
#[command(version)]
struct Args {
    /// Address to bind to
    #[arg(short, long, default_value = "0.0.0.0:3000")]
    bind: String,

    /// Directory of static files to serve alongside the WebSocket endpoint
    #[arg(short, long)]
    static_dir: Option<PathBuf>,

    /// Maximum concurrent connections
    #[arg(long, default_value = "10000")]
    max_connections: usize,

    /// Messages buffered per connection before new ones are dropped
    #[arg(long, default_value = "256")]
    outbound_buffer: usize,

    /// Send the driver snapshot to each client as soon as it connects
    #[arg(long)]
    snapshot_on_connect: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    tracing::info!("Ridematch server starting");
    tracing::info!("Binding to {}", args.bind);

    match &args.static_dir {
        Some(dir) => tracing::info!("Serving static files from {}", dir.display()),
        None => tracing::info!("No static directory; serving /ws and /health only"),
    }

    let config = ServerRuntimeConfig {
        bind_address: args.bind,
        static_dir: args.static_dir,
        outbound_buffer: args.outbound_buffer,
        driver: DriverConfig {
            max_connections: args.max_connections,
            snapshot_on_connect: args.snapshot_on_connect,
        },
    };

    let server = Server::bind(config).await?;

    tracing::info!("Server listening on {}", server.local_addr()?);

    server.run().await?;

    Ok(())
}
