// Sats Comm - Satellite communication daemon
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! # Sats Comm
//!
//! Satellite communication daemon: sends vehicle telemetry over Iridium SBD,
//! executes commands received from the ground and serves a heartbeat
//! status endpoint for the process supervisor.
//!
//! ## Usage
//!
//! ```bash
//! # Run against the modem
//! sats-comm --serial /dev/ttyUSB0
//!
//! # With a configuration file and verbose logging
//! sats-comm --config /etc/sats-comm.toml --log-level debug
//!
//! # Without hardware
//! sats-comm --dry-run --startup-delay 0
//! ```

mod config;
mod loops;
mod mavlink;
mod telemetry;

use axum::{
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse},
    routing::get,
    Json, Router,
};
use clap::Parser;
use config::{ConfigError, DaemonConfig};
use mavlink::Mavlink2Rest;
use sats_link::{
    Actuator, ActuatorError, Dispatcher, LinkStatus, MemoryTransport, RecordingActuator,
    TransferSession, Transport, TransportError,
};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use telemetry::{HttpSampler, StaticSource, TelemetrySource};
use thiserror::Error;
use tokio::net::TcpListener;
use tracing::{error, info, warn, Level};
use tracing_subscriber::EnvFilter;

/// Satellite communication service
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Modem serial port
    #[arg(short, long)]
    serial: Option<String>,

    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Status endpoint port
    #[arg(short, long)]
    port: Option<u16>,

    /// Mavlink2Rest base URL
    #[arg(long)]
    mavlink2rest: Option<String>,

    /// Seconds to wait for sensors before touching the modem
    #[arg(long)]
    startup_delay: Option<u64>,

    /// Use an in-memory modem and log actuator calls instead of sending them
    #[arg(long)]
    dry_run: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

impl Args {
    /// Apply command-line overrides on top of the file configuration
    fn apply(&self, config: &mut DaemonConfig) {
        if let Some(serial) = &self.serial {
            config.modem.port = serial.clone();
        }
        if let Some(port) = self.port {
            config.status.port = port;
        }
        if let Some(url) = &self.mavlink2rest {
            config.mavlink.base_url = url.clone();
        }
        if let Some(delay) = self.startup_delay {
            config.startup_delay_secs = delay;
        }
    }
}

/// Errors that stop the daemon before its loops start
#[derive(Error, Debug)]
enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Modem unavailable: {0}")]
    Transport(#[from] TransportError),

    #[error("Autopilot bridge unavailable: {0}")]
    Actuator(#[from] ActuatorError),

    #[error("HTTP client: {0}")]
    Http(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Built without serial support; use --dry-run")]
    NoSerial,
}

type Link = TransferSession<Box<dyn Transport + Send>>;

fn main() -> ExitCode {
    let args = Args::parse();

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = match args.log_level.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "info" => Level::INFO,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::INFO,
        };
        EnvFilter::from_default_env().add_directive(level.into())
    });

    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("Sats Comm v{}", env!("CARGO_PKG_VERSION"));

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn load_config(args: &Args) -> Result<DaemonConfig, ConfigError> {
    let mut config = match &args.config {
        Some(path) => {
            info!("Loading configuration from {}", path.display());
            DaemonConfig::from_path(path)?
        }
        None => DaemonConfig::default(),
    };
    args.apply(&mut config);
    Ok(config)
}

fn open_transport(args: &Args, config: &DaemonConfig) -> Result<Box<dyn Transport + Send>, StartupError> {
    if args.dry_run {
        warn!("Dry run: using an in-memory modem");
        return Ok(Box::new(MemoryTransport::new()));
    }

    #[cfg(feature = "serial")]
    {
        let modem = sats_link::modem::open_serial(&config.modem)?;
        Ok(Box::new(modem))
    }

    #[cfg(not(feature = "serial"))]
    {
        let _ = config;
        Err(StartupError::NoSerial)
    }
}

fn log_modem_info(session: &Link) {
    match session.modem_info() {
        Ok(info) => {
            info!("Modem information:");
            info!("Model: {}", info.model);
            info!("Revision: {}", info.revision);
            info!("Serial number: {}", info.serial_number);
        }
        Err(e) => warn!("Could not read modem information: {}", e),
    }
    match session.with_transport(|t| t.status()) {
        Ok(status) => info!("Status: {:?}", status),
        Err(e) => warn!("Could not read modem status: {}", e),
    }
}

fn run(args: Args) -> Result<(), StartupError> {
    let config = load_config(&args)?;

    // Let the sensors boot before the first sample
    if config.startup_delay_secs > 0 {
        info!(
            "Waiting {} seconds for sensors to get online...",
            config.startup_delay_secs
        );
        std::thread::sleep(Duration::from_secs(config.startup_delay_secs));
    }

    let transport = open_transport(&args, &config)?;
    let session: Arc<Link> = Arc::new(TransferSession::with_config(transport, config.session()));
    log_modem_info(&session);

    let bridge = Mavlink2Rest::new(&config.mavlink)?;
    let (actuator, source): (Box<dyn Actuator + Send + Sync>, Arc<dyn TelemetrySource + Send + Sync>) =
        if args.dry_run {
            (
                Box::new(RecordingActuator::new()),
                Arc::new(StaticSource::default()),
            )
        } else {
            (
                Box::new(bridge.clone()),
                Arc::new(HttpSampler::new(bridge, config.sensors.clone())?),
            )
        };
    let dispatcher = Arc::new(Dispatcher::with_config(actuator, config.dispatcher()));

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async move {
        tokio::spawn(loops::run_inbound(Arc::clone(&session), dispatcher));
        tokio::spawn(loops::run_outbound(Arc::clone(&session), source));

        let app = router(session);
        let addr: SocketAddr = format!("{}:{}", config.status.host, config.status.port)
            .parse()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;
        info!("Starting status server on http://{}", addr);

        let listener = TcpListener::bind(addr).await?;
        axum::serve(listener, app).await?;
        Ok::<(), StartupError>(())
    })
}

/// Build the HTTP router
fn router<T: Transport + Send + 'static>(session: Arc<TransferSession<T>>) -> Router {
    Router::new()
        .route("/", get(root_handler))
        .route("/status", get(status_handler::<T>))
        .route("/health", get(health_handler::<T>))
        .with_state(session)
}

/// Root handler - shows a simple HTML page.
async fn root_handler() -> Html<&'static str> {
    Html(
        r#"<!DOCTYPE html>
<html>
<head>
    <title>Satellite communication service</title>
</head>
<body>
    <h1>Satellite communication service</h1>
    <ul>
        <li><a href="/status">/status</a> - Heartbeat and link status (JSON)</li>
        <li><a href="/health">/health</a> - Health check</li>
    </ul>
</body>
</html>"#,
    )
}

/// Status handler - returns the link snapshot as JSON.
async fn status_handler<T: Transport + Send + 'static>(
    State(session): State<Arc<TransferSession<T>>>,
) -> Json<LinkStatus> {
    Json(session.status())
}

/// Health check handler.
async fn health_handler<T: Transport + Send + 'static>(
    State(session): State<Arc<TransferSession<T>>>,
) -> impl IntoResponse {
    let health = session.status().health;
    if health.is_ok() {
        (StatusCode::OK, format!("{:?}", health))
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, format!("{:?}", health))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_status_handler() {
        let session = Arc::new(TransferSession::new(MemoryTransport::new()));
        session.enqueue(vec![b'$', 3, 1]);

        let Json(status) = status_handler(State(session)).await;

        assert_eq!(status.queue_depth, 1);
        assert_eq!(status.output_rest_secs, 120);
        let json = serde_json::to_value(&status).unwrap();
        assert!(json.get("secondsSinceLastHeartbeat").is_some());
        assert!(json.get("utcTimeNow").is_some());
    }

    #[tokio::test]
    async fn test_health_handler() {
        let session = Arc::new(TransferSession::new(MemoryTransport::new()));
        let response = health_handler(State(session)).await.into_response();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[test]
    fn test_args_override_config() {
        let args = Args::parse_from([
            "sats-comm",
            "--serial",
            "/dev/serial0",
            "--port",
            "8080",
            "--startup-delay",
            "0",
        ]);
        let mut config = DaemonConfig::default();
        args.apply(&mut config);

        assert_eq!(config.modem.port, "/dev/serial0");
        assert_eq!(config.status.port, 8080);
        assert_eq!(config.startup_delay_secs, 0);
        assert_eq!(config.mavlink.base_url, "http://127.0.0.1:6040");
    }

    #[test]
    fn test_router_builds() {
        let session = Arc::new(TransferSession::new(MemoryTransport::new()));
        let _app = router(session);
    }
}
