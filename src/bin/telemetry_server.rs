//! CLI: Run the telemetry server.
//!
//! Serves the REST API under `/api` and the control channel on `/ws`, both on one port.
//! The store lives in memory; with `--snapshot` it is loaded at startup and written back
//! on Ctrl-C.
//!
//! Usage: `telemetry_server [OPTIONS]`
//!
//! Set RUST_LOG=streamweave_telemetry=trace for TRACE-level span enter/exit and events.

use clap::Parser;
use std::env;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::time::Duration;
use streamweave_telemetry::config::{
  DEFAULT_INACTIVITY_THRESHOLD, DEFAULT_SWEEP_PERIOD, DEFAULT_TICK_PERIOD,
};
use streamweave_telemetry::store::snapshot_io::{
  load_snapshot_if_present, save_snapshot, snapshot_file,
};
use streamweave_telemetry::{Engine, EngineConfig, MemoryStore, ServerConfig, server};
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt::format::FmtSpan};

/// Run the telemetry server.
#[derive(Parser, Debug)]
#[command(name = "telemetry_server")]
#[command(
  after_help = r#"Environment variables (override the matching flag when set):
  TELEMETRY_HOST           Interface to bind.
  PORT                     Port for both REST and WebSocket traffic.
  TELEMETRY_SNAPSHOT       Store snapshot file or directory (loaded at start, written at shutdown).
  TELEMETRY_TICK_MS        Milliseconds between two readings of one device.
  TELEMETRY_SWEEP_MS       Milliseconds between two liveness sweeps.
  TELEMETRY_INACTIVITY_MS  Milliseconds without a reading before a device goes inactive.

Examples:
  telemetry_server
  telemetry_server --port 8080 --snapshot .telemetry/"#
)]
struct Args {
  /// Interface to bind. Overridden by TELEMETRY_HOST if set.
  #[arg(long, default_value = "0.0.0.0")]
  host: String,

  /// Port to listen on. Overridden by PORT if set.
  #[arg(long, default_value_t = 4000)]
  port: u16,

  /// Store snapshot file, or a directory holding telemetry.json. Overridden by
  /// TELEMETRY_SNAPSHOT if set.
  #[arg(long, value_name = "PATH")]
  snapshot: Option<PathBuf>,

  /// Tick period in milliseconds. Overridden by TELEMETRY_TICK_MS if set.
  #[arg(long, value_name = "MS")]
  tick_ms: Option<u64>,

  /// Sweep period in milliseconds. Overridden by TELEMETRY_SWEEP_MS if set.
  #[arg(long, value_name = "MS")]
  sweep_ms: Option<u64>,

  /// Inactivity threshold in milliseconds. Overridden by TELEMETRY_INACTIVITY_MS if set.
  #[arg(long, value_name = "MS")]
  inactivity_ms: Option<u64>,
}

fn env_u64(name: &str) -> Option<u64> {
  let raw = env::var(name).ok()?;
  match raw.parse() {
    Ok(ms) => Some(ms),
    Err(_) => {
      warn!(var = name, value = %raw, "ignoring non-numeric value");
      None
    }
  }
}

fn period(env_name: &str, flag: Option<u64>, default: Duration) -> Duration {
  env_u64(env_name)
    .or(flag)
    .map(Duration::from_millis)
    .unwrap_or(default)
}

#[tokio::main]
async fn main() {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .with_span_events(FmtSpan::ENTER | FmtSpan::EXIT)
    .init();

  let args = Args::parse();

  // Env vars override flags.
  let server_config = ServerConfig {
    host: env::var("TELEMETRY_HOST").unwrap_or_else(|_| args.host.clone()),
    port: env_u64("PORT")
      .and_then(|p| u16::try_from(p).ok())
      .unwrap_or(args.port),
    snapshot_path: env::var("TELEMETRY_SNAPSHOT")
      .ok()
      .map(PathBuf::from)
      .or_else(|| args.snapshot.clone())
      .map(|location| snapshot_file(&location)),
  };
  let engine_config = EngineConfig::default()
    .with_tick_period(period("TELEMETRY_TICK_MS", args.tick_ms, DEFAULT_TICK_PERIOD))
    .with_sweep_period(period("TELEMETRY_SWEEP_MS", args.sweep_ms, DEFAULT_SWEEP_PERIOD))
    .with_inactivity_threshold(period(
      "TELEMETRY_INACTIVITY_MS",
      args.inactivity_ms,
      DEFAULT_INACTIVITY_THRESHOLD,
    ));

  info!(server = ?server_config, engine = ?engine_config, "options (env or flags)");

  let snapshot = match &server_config.snapshot_path {
    Some(path) => match load_snapshot_if_present(path) {
      Ok(found) => {
        info!(path = %path.display(), loaded = found.is_some(), "store snapshot");
        found
      }
      Err(e) => {
        eprintln!("Error loading snapshot {}: {}", path.display(), e);
        process::exit(1);
      }
    },
    None => None,
  };
  let store = Arc::new(snapshot.map_or_else(MemoryStore::new, MemoryStore::from_snapshot));

  let engine = Arc::new(Engine::new(store.clone(), engine_config));
  engine.start();

  let addr = server_config.bind_addr();
  let listener = match tokio::net::TcpListener::bind(&addr).await {
    Ok(l) => l,
    Err(e) => {
      eprintln!("Error binding {}: {}", addr, e);
      process::exit(1);
    }
  };
  info!(addr = %addr, "telemetry server listening");

  let shutdown = async {
    if let Err(e) = tokio::signal::ctrl_c().await {
      error!(error = %e, "failed to listen for ctrl-c");
    }
    info!("shutting down");
  };
  if let Err(e) = server::serve(listener, Arc::clone(&engine), shutdown).await {
    error!(error = %e, "server error");
  }
  engine.shutdown();

  if let Some(path) = &server_config.snapshot_path {
    match save_snapshot(path, &store.snapshot().await) {
      Ok(()) => info!(path = %path.display(), "saved store snapshot"),
      Err(e) => {
        eprintln!("Error saving snapshot {}: {}", path.display(), e);
        process::exit(1);
      }
    }
  }
}
