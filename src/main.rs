//! fusion360-mcp: MCP server for the Fusion 360 scripting API
//!
//! The main thread owns the host and drains bridge requests; the MCP server
//! runs on its own thread and waits on the bridge for each host call.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use clap::Parser;
use tracing::{error, info, warn, Level};
use tracing_subscriber::EnvFilter;

use fusion360_mcp::bridge::{wake, Bridge, WakeSignal};
use fusion360_mcp::config::{self, Config};
use fusion360_mcp::error::ConfigError;
use fusion360_mcp::host::{CapabilityTable, Design, SimulatedHost};
use fusion360_mcp::mcp::McpServer;

/// MCP server bridging AI assistants to the Fusion 360 scripting API.
///
/// Tool calls are executed on the main thread, one at a time, through a
/// request queue.
#[derive(Parser, Debug)]
#[command(name = "fusion360-mcp")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(value_name = "CONFIG_FILE")]
    config: Option<PathBuf>,

    /// Design snapshot to load (overrides `design_path` in the config)
    #[arg(long, value_name = "DESIGN_FILE")]
    design: Option<PathBuf>,

    /// Seconds to wait for the main thread per call (overrides the config)
    #[arg(long, value_name = "SECONDS", value_parser = clap::value_parser!(u64).range(1..))]
    timeout_secs: Option<u64>,

    /// Increase logging verbosity (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Decrease logging verbosity (only show errors)
    #[arg(short, long)]
    quiet: bool,
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
            _ => Level::WARN,
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
        .with_thread_names(true)
        .with_writer(std::io::stderr)
        .init();
}

fn load_design(path: Option<&Path>) -> Result<Design, ConfigError> {
    match path {
        Some(path) => {
            let design = Design::load(path)?;
            info!(path = %path.display(), design = %design.name, "Loaded design snapshot");
            Ok(design)
        }
        None => {
            info!("Using bundled sample design");
            Ok(Design::sample())
        }
    }
}

/// Runs the MCP server on its own thread; closes `signal` when it stops.
fn spawn_server(
    bridge: Arc<Bridge>,
    timeout: Duration,
    signal: WakeSignal,
) -> std::io::Result<thread::JoinHandle<std::io::Result<()>>> {
    thread::Builder::new()
        .name("mcp-server".to_string())
        .spawn(move || {
            let result = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .and_then(|runtime| runtime.block_on(McpServer::stdio(bridge, timeout).run()));
            signal.close();
            result
        })
}

/// Entry point for the fusion360-mcp server.
fn main() -> ExitCode {
    let args = Args::parse();

    let config_path = args.config.as_deref();
    let cfg: Config = match config::load_config(config_path) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            if config_path.is_none() {
                if let Some(default_path) = config::default_config_path() {
                    eprintln!("\nConfig read from: {}", default_path.display());
                    eprintln!("See config/example-config.json for the format");
                }
            }
            return ExitCode::FAILURE;
        }
    };

    let log_level = get_log_level(args.verbose, args.quiet, &cfg.logging.level);
    init_tracing(log_level);

    // Display GPL license notice (required by GPLv3 Section 5d)
    eprintln!(
        "fusion360-mcp {}  Copyright (C) 2026  The Fusion360 MCP Contributors",
        env!("CARGO_PKG_VERSION")
    );
    eprintln!("This program comes with ABSOLUTELY NO WARRANTY.");
    eprintln!("This is free software, licensed under GPL-3.0-or-later.");
    eprintln!("Source: {}", env!("CARGO_PKG_REPOSITORY"));
    eprintln!();

    let design = match load_design(args.design.as_deref().or(cfg.design_path.as_deref())) {
        Ok(design) => design,
        Err(e) => {
            error!(error = %e, "Could not load design");
            return ExitCode::FAILURE;
        }
    };

    let timeout = args
        .timeout_secs
        .map_or_else(|| cfg.bridge.timeout(), Duration::from_secs);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        timeout_secs = timeout.as_secs(),
        "Starting fusion360-mcp server"
    );

    let (signal, mut main_loop) = wake::channel();
    let bridge = Arc::new(Bridge::new(signal.clone()));

    let mut table = CapabilityTable::new(SimulatedHost::new(design))
        .with_screenshot_size(cfg.screenshot.width, cfg.screenshot.height);
    let drain_bridge = Arc::clone(&bridge);
    main_loop.on_notify(move || {
        let stats = drain_bridge.drain_and_execute(&mut table);
        if stats.orphaned > 0 {
            warn!(orphaned = stats.orphaned, "Discarded results of timed-out calls");
        }
    });

    let server = match spawn_server(Arc::clone(&bridge), timeout, signal) {
        Ok(handle) => handle,
        Err(e) => {
            error!(error = %e, "Failed to start MCP server thread");
            return ExitCode::FAILURE;
        }
    };

    info!("MCP server ready, waiting for client connection...");
    let wakes = main_loop.run();
    info!(wakes, "Main loop stopped");

    match server.join() {
        Ok(Ok(())) => {
            info!("Server shut down gracefully");
            ExitCode::SUCCESS
        }
        Ok(Err(e)) => {
            error!(error = %e, "Server error");
            ExitCode::FAILURE
        }
        Err(_) => {
            error!("MCP server thread panicked");
            ExitCode::FAILURE
        }
    }
}
