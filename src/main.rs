//! QUIC messenger (v1)
//!
//! # Architecture Overview
//!
//! ```text
//!   server                                              client
//!  ┌──────────────────────────────────────────┐        ┌──────────────────────────┐
//!  │ Listener (accept loop)                   │        │ ClientSession            │
//!  │   │                                      │  QUIC  │   ├─ read loop  ─▶ stdout│
//!  │   ├─ AdmissionController::try_acquire    │◀──────▶│   └─ write loop ◀─ stdin │
//!  │   │    ├─ slot  → ConnectionHandler      │        └──────────────────────────┘
//!  │   │    │           └─ StreamHandler ─▶ stdout
//!  │   │    └─ full  → rejection notice, close(PoolFull)
//!  │   └─ Shutdown (Ctrl+C) → endpoint closed → Stopped
//!  └──────────────────────────────────────────┘
//! ```

use std::path::Path;
use std::process::ExitCode;

use clap::Parser;
use tokio::sync::mpsc;

use quic_messenger::cli::{Cli, Mode};
use quic_messenger::client::{ClientError, ClientSession, SessionEnd};
use quic_messenger::config::{loader::load_or_default, MessengerConfig};
use quic_messenger::console::{self, Console};
use quic_messenger::lifecycle::{signals, Shutdown};
use quic_messenger::net::{tls, Listener};
use quic_messenger::observability::{logging, metrics};

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = load_or_default(cli.config.as_deref())?;
    logging::init_logging(&config.observability.log_level);

    tracing::info!("quic-messenger v{} starting", env!("CARGO_PKG_VERSION"));

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let mut console = Console::new();
    let mode = match cli.mode {
        Some(mode) => mode,
        None => match console.prompt_mode().await? {
            Some(mode) => mode,
            None => {
                println!("Invalid Mode");
                return Ok(ExitCode::SUCCESS);
            }
        },
    };

    match mode {
        Mode::Server => run_server(config).await,
        Mode::Client => run_client(config, console).await,
    }
}

async fn run_server(config: MessengerConfig) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let crypto = tls::load_server_crypto(
        Path::new(&config.server.cert_path),
        Path::new(&config.server.key_path),
        &config.transport.alpn,
    )
    .inspect_err(|e| tracing::error!(error = %e, "Failed to load TLS certificates"))?;

    let shutdown = Shutdown::new();
    let (deliveries, received) = mpsc::unbounded_channel();
    let listener = Listener::bind(&config.server, crypto, shutdown.clone(), deliveries)
        .inspect_err(|e| tracing::error!(error = %e, "Failed to start server"))?;

    println!("Server started on {}", listener.local_addr()?);
    console::spawn_printer(received, "Received");
    tokio::spawn(signals::shutdown_on_ctrl_c(shutdown));

    listener.run().await?;

    tracing::info!("Shutdown complete");
    Ok(ExitCode::SUCCESS)
}

async fn run_client(
    config: MessengerConfig,
    console: Console,
) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let crypto = tls::load_client_crypto(
        config.client.ca_cert_path.as_deref().map(Path::new),
        &config.transport.alpn,
    )
    .inspect_err(|e| tracing::error!(error = %e, "Failed to build TLS configuration"))?;

    let session = match ClientSession::connect(&config.client, crypto).await {
        Ok(session) => session,
        Err(ClientError::Rejected) => {
            println!("Client connection rejected: maximum connection limit reached");
            return Ok(ExitCode::SUCCESS);
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to connect to server");
            return Err(e.into());
        }
    };
    println!("Connected to server");

    let (deliveries, received) = mpsc::unbounded_channel();
    console::spawn_printer(received, "Client received");

    let code = match session.run(console.into_line_feed(), deliveries).await {
        Ok(SessionEnd::Exited) => 0,
        Ok(SessionEnd::Rejected) => {
            println!("Client connection rejected: maximum connection limit reached");
            0
        }
        Ok(SessionEnd::Disconnected(reason)) => {
            println!("Disconnected: {}", reason);
            1
        }
        Err(e) => {
            tracing::error!(error = %e, "Client session failed");
            1
        }
    };

    // The stdin reader sits in a blocking read that would keep the runtime
    // alive after main returns.
    std::process::exit(code);
}
