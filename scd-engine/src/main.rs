//! Companion display engine (scd-engine) - Headless daemon
//!
//! Watches the frontend's event folder, runs the engine loop against the
//! file-system collaborators and logs every `CompanionEvent` (or prints them
//! as JSON lines with `--json`) for a renderer or a developer to follow.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use clap::Parser;
use scd_common::config::{validate_event_dir, LoggingConfig};
use scd_common::events::CompanionEvent;
use tokio::signal;
use tokio::sync::broadcast;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use scd_engine::engine::{Collaborators, CompanionEngine, EngineHandle, EngineOptions};
use scd_engine::ingest::{DirEventSource, DirectoryWatcher};
use scd_engine::media::FsMediaResolver;
use scd_engine::music::{FsMusicLibrary, HeadlessAudioBackend};
use scd_engine::widgets::{GamelistMetadata, JsonWidgetStore};
use scd_engine::{Config, ConfigOverrides};

/// Command-line arguments for scd-engine
#[derive(Parser, Debug)]
#[command(name = "scd-engine")]
#[command(about = "Second-screen companion display engine")]
#[command(version)]
struct Args {
    /// Bootstrap config file (defaults: SCD_CONFIG, ~/.config/scd/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Folder the frontend writes its event files to
    #[arg(short, long)]
    event_dir: Option<PathBuf>,

    /// Preferences file
    #[arg(short, long)]
    preferences: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "SCD_LOG_LEVEL")]
    log_level: Option<String>,

    /// Print every event as a JSON line on stdout
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = Config::load(ConfigOverrides {
        config_path: args.config.clone(),
        event_dir: args.event_dir.clone(),
        preferences_path: args.preferences.clone(),
        log_level: args.log_level.clone(),
    });

    init_tracing(&config.logging)?;

    info!("Starting scd-engine v{}", env!("CARGO_PKG_VERSION"));
    info!(event_dir = %config.event_dir.display(), "Event folder");
    info!(media_root = %config.media_root.display(), music_root = %config.music_root.display(), "Media folders");

    validate_event_dir(&config.event_dir).context("Event folder unusable")?;

    let collaborators = Collaborators {
        source: Arc::new(DirEventSource::new(config.event_dir.clone())),
        resolver: Arc::new(FsMediaResolver::new(
            config.media_root.clone(),
            config.system_logo_dir.clone(),
        )),
        library: Arc::new(FsMusicLibrary::new(config.music_root.clone())),
        audio: Arc::new(HeadlessAudioBackend),
        widget_store: Arc::new(JsonWidgetStore::new(config.widget_store.clone())),
        metadata: Arc::new(GamelistMetadata::new(config.gamelists_root.clone())),
    };

    let (engine, handle) = CompanionEngine::new(EngineOptions::from(&config), collaborators);
    let _watcher = DirectoryWatcher::start(&config.event_dir, handle.sender())
        .context("Failed to watch event folder")?;

    let printer = tokio::spawn(log_events(handle.subscribe(), args.json));
    #[cfg(unix)]
    tokio::spawn(reload_on_hangup(handle.clone()));

    let mut engine_task = tokio::spawn(engine.run());
    info!("Engine running");

    tokio::select! {
        result = &mut engine_task => {
            printer.abort();
            return result.context("Engine task failed")?.context("Engine error");
        }
        _ = shutdown_signal() => {}
    }

    shutdown(&handle);
    engine_task
        .await
        .context("Engine task failed")?
        .context("Engine error")?;
    printer.abort();

    info!("Shutdown complete");
    Ok(())
}

fn init_tracing(logging: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "scd_engine={level},scd_common={level}",
            level = logging.level
        ))
    });
    let registry = tracing_subscriber::registry().with(filter);

    match &logging.file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_ansi(false)
                        .with_writer(Mutex::new(file)),
                )
                .init();
        }
        None => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
    Ok(())
}

/// Log (or print) every event the engine emits
async fn log_events(mut rx: broadcast::Receiver<CompanionEvent>, json: bool) {
    loop {
        match rx.recv().await {
            Ok(event) if json => match serde_json::to_string(&event) {
                Ok(line) => println!("{}", line),
                Err(e) => warn!(event = event.name(), error = %e, "Event not serializable"),
            },
            Ok(event) => info!(event = event.name(), detail = ?event, "Companion event"),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "Event log lagging, events skipped")
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

/// SIGHUP re-reads the preferences file
#[cfg(unix)]
async fn reload_on_hangup(handle: EngineHandle) {
    let mut hangup = match signal::unix::signal(signal::unix::SignalKind::hangup()) {
        Ok(hangup) => hangup,
        Err(e) => {
            warn!(error = %e, "SIGHUP handler not installed, preferences reload disabled");
            return;
        }
    };
    while hangup.recv().await.is_some() {
        info!("Received SIGHUP, reloading preferences");
        if handle.reload_preferences().is_err() {
            break;
        }
    }
}

fn shutdown(handle: &EngineHandle) {
    if handle.shutdown().is_err() {
        // Loop already gone; make sure its tasks are too
        handle.cancel();
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Ctrl+C handler not installed");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut term) => {
                term.recv().await;
            }
            Err(e) => {
                error!(error = %e, "SIGTERM handler not installed");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
