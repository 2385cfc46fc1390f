//! MIDI Shortcuts
//!
//! Bind the pads and knobs of a MIDI controller (Akai LPD8 and friends) to
//! desktop shortcuts, PulseAudio volumes and sound effects.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use midi_shortcuts::actions::Xdotool;
use midi_shortcuts::app::run_app;
use midi_shortcuts::audio::{PactlServer, Reconciler, SinkInputMirror, SinkMirror};
use midi_shortcuts::bindings::{build_table, Services};
use midi_shortcuts::config::AppConfig;
use midi_shortcuts::controller::{HotplugMonitor, MidiController, MidirTransport};
use midi_shortcuts::focus::{Brotab, Wmctrl};
use midi_shortcuts::{paths, sniffer};

/// MIDI Shortcuts - drive your desktop from a MIDI pad controller
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file (defaults to ./config.yaml or the user config dir)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(short, long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Print every event received from the configured controller
    #[arg(long)]
    sniffer: bool,

    /// List available MIDI ports
    #[arg(long)]
    list_ports: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let args = Args::parse();

    init_logging(&args.log_level)?;

    if args.list_ports {
        sniffer::list_ports_formatted();
        return Ok(());
    }

    let config_path = args.config.unwrap_or_else(paths::default_config_path);
    info!("Configuration file: {}", config_path.display());
    let config = AppConfig::load(&config_path).await?;

    if args.sniffer {
        return sniffer::run_sniffer(config.name_pattern()?).await;
    }

    info!("🚀 Starting MIDI Shortcuts...");

    let server = Arc::new(PactlServer);
    let services = Services {
        server: server.clone(),
        sinks: Arc::new(SinkMirror::new("sinks")),
        sink_inputs: Arc::new(SinkInputMirror::new("sink inputs")),
        windows: Arc::new(Wmctrl),
        tabs: Arc::new(Brotab),
        keyboard: Arc::new(Xdotool),
    };
    let table = build_table(&config, &services).context("Failed to bind modes")?;
    info!("✅ {} bindings ready", table.len());

    let mut controller = MidiController::new(
        config.name_pattern()?,
        MidirTransport::new("midi-shortcuts"),
        table,
    )
    .with_poll_interval(config.poll_interval());
    if !controller.connect() {
        warn!("Controller not found, waiting for it to be plugged in");
    }

    let (reconnect_tx, reconnect_rx) = mpsc::unbounded_channel();
    let _hotplug = if config.controller.hotplug {
        match HotplugMonitor::spawn(reconnect_tx) {
            Ok(handle) => Some(handle),
            Err(e) => {
                warn!("Hot-plug detection disabled: {:#}", e);
                None
            }
        }
    } else {
        None
    };

    let reconciler = Reconciler::new(server, services.sinks.clone(), services.sink_inputs.clone());

    run_app(controller, reconnect_rx, reconciler, shutdown_signal()).await;

    info!("👋 MIDI Shortcuts shutdown complete");
    Ok(())
}

fn init_logging(level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_thread_names(false),
        )
        .init();

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
