//! proxy-admin-rpcd: JSON-RPC administrative control plane for a network proxy
//!
//! Serves the admin API on a local Unix socket, or on stdin/stdout with
//! `--stdio`.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info, warn, Level};
use tracing_subscriber::EnvFilter;

use proxy_admin_rpc::config::{self, Config};
use proxy_admin_rpc::error::ConfigError;
use proxy_admin_rpc::handlers::register_admin_handlers;
use proxy_admin_rpc::records::MemoryRecordStore;
use proxy_admin_rpc::rpc::Engine;
use proxy_admin_rpc::transport::{self, IpcSocketServer, StdioTransport};

/// JSON-RPC administrative control plane for a network proxy.
///
/// Exposes configuration records to local operators over a Unix socket.
#[derive(Parser, Debug)]
#[command(name = "proxy-admin-rpcd")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(value_name = "CONFIG_FILE")]
    config: Option<PathBuf>,

    /// Increase logging verbosity (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Decrease logging verbosity (only show errors)
    #[arg(short, long)]
    quiet: bool,

    /// Override the socket path from the configuration file
    #[arg(long, value_name = "PATH", conflicts_with = "stdio")]
    socket: Option<PathBuf>,

    /// Serve newline-delimited requests on stdin/stdout instead of the socket
    #[arg(long)]
    stdio: bool,
}

/// Determines the log level from CLI arguments.
#[allow(clippy::match_same_arms)] // Explicit "warn" arm for clarity
fn get_log_level(verbose: u8, quiet: bool, config_level: &str) -> Level {
    if quiet {
        return Level::ERROR;
    }

    match verbose {
        0 => match config_level.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "info" => Level::INFO,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::WARN, // Default to warn for unknown levels
        },
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

/// Initialises the tracing subscriber for logging.
fn init_tracing(level: Level) {
    let filter = EnvFilter::from_default_env().add_directive(level.into());

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Builds the engine, seeded store included, from the configuration.
fn build_engine(cfg: &Config) -> Result<Arc<Engine>, ConfigError> {
    let store: MemoryRecordStore = cfg.seed_records()?.into_iter().collect();
    info!(records = store.len(), "Record store seeded");

    let engine = Engine::new().with_required_version(cfg.rpc.require_version);
    let rejected = register_admin_handlers(&engine, Arc::new(store));
    if rejected > 0 {
        warn!(rejected, "Some admin handlers were not registered");
    }
    Ok(Arc::new(engine))
}

/// Entry point for the proxy-admin-rpcd server.
fn main() -> ExitCode {
    let args = Args::parse();

    // Load configuration
    let config_path = args.config.as_deref();
    let mut cfg = match config::load_config(config_path) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            return ExitCode::FAILURE;
        }
    };
    if let Some(socket) = args.socket {
        cfg.rpc.transport.sock_path = socket;
        if let Err(e) = cfg.validate() {
            eprintln!("Configuration error: {e}");
            return ExitCode::FAILURE;
        }
    }

    // Initialise logging
    let log_level = get_log_level(args.verbose, args.quiet, &cfg.logging.level);
    init_tracing(log_level);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "Starting proxy-admin-rpcd"
    );

    if !cfg.rpc.enabled {
        info!("RPC disabled by configuration, nothing to serve");
        return ExitCode::SUCCESS;
    }

    let engine = match build_engine(&cfg) {
        Ok(engine) => engine,
        Err(e) => {
            error!(error = %e, "Invalid record configuration");
            return ExitCode::FAILURE;
        }
    };

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!(error = %e, "Failed to create Tokio runtime");
            return ExitCode::FAILURE;
        }
    };

    let result = if args.stdio {
        runtime
            .block_on(async {
                StdioTransport::stdio()
                    .serve(&engine, transport::shutdown_signal())
                    .await
            })
            .map_err(|e| e.to_string())
    } else {
        let server = IpcSocketServer::new(engine, cfg.rpc.transport);
        runtime
            .block_on(server.run(transport::shutdown_signal()))
            .map_err(|e| e.to_string())
    };

    match result {
        Ok(()) => {
            info!("Server shut down gracefully");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "Server error");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        Args::command().debug_assert();
    }

    #[test]
    fn log_level_precedence() {
        assert_eq!(get_log_level(0, true, "trace"), Level::ERROR);
        assert_eq!(get_log_level(0, false, "debug"), Level::DEBUG);
        assert_eq!(get_log_level(0, false, "bogus"), Level::WARN);
        assert_eq!(get_log_level(2, false, "error"), Level::DEBUG);
    }

    #[test]
    fn engine_from_default_config() {
        let engine = build_engine(&Config::default()).unwrap();
        let handlers = engine.show_registered_handlers();
        assert!(handlers
            .methods
            .iter()
            .any(|m| m == "admin_config_set_records"));
    }
}
