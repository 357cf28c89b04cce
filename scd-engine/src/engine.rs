//! Companion engine
//!
//! One task owns the state machine, the ingestion pipeline and the three
//! orchestrators, and consumes `EngineMessage`s from a single channel. Every
//! state mutation happens here, in message order; deferred work (reads,
//! lookups, video delays, fade ticks) runs in spawned tasks that post their
//! results back onto the same channel.
//!
//! For each applied transition the loop commits the state, publishes
//! `StateChanged`, then dispatches the transition's effects in order. Music
//! is always re-evaluated last, against the committed state.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use scd_common::app_state::AppState;
use scd_common::config::IngestTiming;
use scd_common::events::{CompanionEvent, EventBus};
use scd_common::widgets::Widget;
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::{Config, Preferences};
use crate::error::{Error, Result};
use crate::ingest::files::{EventFile, ExternalEvent};
use crate::ingest::pipeline::EventPipeline;
use crate::ingest::source::EventSource;
use crate::media::{MediaOrchestrator, MediaResolver, VideoChange};
use crate::messages::{EngineMessage, EngineReceiver, EngineSender, RawSignal};
use crate::music::{AudioBackend, MusicLibrary, MusicMessage, MusicOrchestrator};
use crate::state::{Effect, StateMachine, Transition};
use crate::widgets::{GameMetadata, WidgetCommand, WidgetCoordinator, WidgetStore};

/// Default EventBus capacity
pub const DEFAULT_BUS_CAPACITY: usize = 256;

/// External collaborators the engine talks to
#[derive(Clone)]
pub struct Collaborators {
    pub source: Arc<dyn EventSource>,
    pub resolver: Arc<dyn MediaResolver>,
    pub library: Arc<dyn MusicLibrary>,
    pub audio: Arc<dyn AudioBackend>,
    pub widget_store: Arc<dyn WidgetStore>,
    pub metadata: Arc<dyn GameMetadata>,
}

/// Engine settings that are not collaborators
#[derive(Debug, Clone)]
pub struct EngineOptions {
    pub ingest: IngestTiming,
    pub preferences: Preferences,
    /// Re-read on `ReloadPreferences`; `None` keeps the initial preferences
    pub preferences_path: Option<PathBuf>,
    pub default_background: Option<PathBuf>,
    pub initial_state: AppState,
    pub bus_capacity: usize,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            ingest: IngestTiming::default(),
            preferences: Preferences::default(),
            preferences_path: None,
            default_background: None,
            initial_state: AppState::default(),
            bus_capacity: DEFAULT_BUS_CAPACITY,
        }
    }
}

impl From<&Config> for EngineOptions {
    fn from(config: &Config) -> Self {
        Self {
            ingest: config.ingest.clone(),
            preferences: config.preferences.clone(),
            preferences_path: Some(config.preferences_path.clone()),
            default_background: config.default_background.clone(),
            ..Self::default()
        }
    }
}

/// The engine loop and everything it owns
pub struct CompanionEngine {
    machine: StateMachine,
    pipeline: EventPipeline,
    media: MediaOrchestrator,
    music: MusicOrchestrator,
    widgets: WidgetCoordinator,
    preferences: Preferences,
    preferences_path: Option<PathBuf>,
    display_suppressed: bool,
    bus: Arc<EventBus>,
    rx: EngineReceiver,
    shutdown: CancellationToken,
}

impl CompanionEngine {
    /// Build the engine and the handle used to drive it
    ///
    /// Must be called inside a Tokio runtime (the ingestion worker is spawned
    /// here). Nothing is processed until `run` is awaited.
    pub fn new(options: EngineOptions, collaborators: Collaborators) -> (Self, EngineHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let bus = Arc::new(EventBus::new(options.bus_capacity));
        let shutdown = CancellationToken::new();

        let pipeline = EventPipeline::new(
            collaborators.source,
            options.ingest,
            tx.clone(),
            &shutdown,
        );
        let media = MediaOrchestrator::new(
            Arc::clone(&collaborators.resolver),
            Arc::clone(&bus),
            tx.clone(),
            options.default_background,
            &shutdown,
        );
        let music = MusicOrchestrator::new(
            collaborators.audio,
            collaborators.library,
            Arc::clone(&bus),
            tx.clone(),
            options.preferences.music.clone(),
            &shutdown,
        );
        let widgets = WidgetCoordinator::new(
            collaborators.widget_store,
            collaborators.resolver,
            collaborators.metadata,
            Arc::clone(&bus),
        );

        let handle = EngineHandle {
            tx,
            bus: Arc::clone(&bus),
            shutdown: shutdown.clone(),
        };
        let engine = Self {
            machine: StateMachine::with_state(options.initial_state),
            pipeline,
            media,
            music,
            widgets,
            preferences: options.preferences,
            preferences_path: options.preferences_path,
            display_suppressed: false,
            bus,
            rx,
            shutdown,
        };
        (engine, handle)
    }

    /// Run until `Shutdown` is received or the handle cancels the engine
    pub async fn run(mut self) -> Result<()> {
        info!(state = %self.machine.current().category(), "Engine started");
        self.present_initial_state();

        loop {
            let message = tokio::select! {
                _ = self.shutdown.cancelled() => break,
                message = self.rx.recv() => match message {
                    Some(message) => message,
                    None => break,
                },
            };
            if !self.handle(message) {
                break;
            }
        }

        self.pipeline.cancel_pending();
        self.music.release_all();
        self.shutdown.cancel();
        info!("Engine stopped");
        Ok(())
    }

    fn present_initial_state(&mut self) {
        let state = self.machine.current().clone();
        let mut effects = Vec::new();
        match &state {
            AppState::SystemBrowsing { system_name } if !system_name.is_empty() => {
                effects.push(Effect::ShowSystem {
                    system_name: system_name.clone(),
                });
            }
            AppState::GameBrowsing {
                system_name,
                game_filename,
                ..
            } => effects.push(Effect::ShowGame {
                system_name: system_name.clone(),
                game_filename: game_filename.clone(),
            }),
            _ => {}
        }
        effects.push(Effect::RefreshWidgets);
        // Nothing to play for until the frontend reports where it is
        if state.system_name().is_some() {
            effects.push(Effect::ReevaluateMusic);
        }
        for effect in effects {
            self.dispatch(effect);
        }
    }

    /// Process one message; returns `false` when the loop should stop
    fn handle(&mut self, message: EngineMessage) -> bool {
        match message {
            EngineMessage::Signal(signal) => self.pipeline.on_signal(signal),
            EngineMessage::Ingested { ticket, event } => {
                if let Some(event) = self.pipeline.accept(ticket, event, self.machine.current()) {
                    self.apply(event);
                }
            }
            EngineMessage::Media(message) => {
                let change = self.media.on_message(message);
                self.on_video_change(change);
            }
            EngineMessage::Music(message) => {
                self.music
                    .on_message(message, self.machine.current(), self.display_suppressed);
            }
            EngineMessage::VideoFinished => {
                let change = self.media.video_finished();
                self.on_video_change(change);
            }
            EngineMessage::VisibilityChanged(visible) => {
                debug!(visible, "Visibility changed");
                self.music.on_visibility_changed(
                    visible,
                    self.machine.current(),
                    &self.preferences.music,
                    self.display_suppressed,
                );
            }
            EngineMessage::DisplaySuppressed(suppressed) => {
                if suppressed != self.display_suppressed {
                    debug!(suppressed, "Display suppression changed");
                    self.display_suppressed = suppressed;
                    self.reevaluate_music();
                }
            }
            EngineMessage::ReloadPreferences => self.reload_preferences(),
            EngineMessage::Widget(command) => {
                if let Err(e) = self.widgets.handle_command(command, self.machine.current()) {
                    warn!(error = %e, "Widget command failed");
                }
            }
            EngineMessage::Shutdown => {
                info!("Shutdown requested");
                return false;
            }
        }
        true
    }

    fn apply(&mut self, event: ExternalEvent) {
        match self.machine.apply(event) {
            Transition::Applied {
                previous,
                current,
                effects,
            } => {
                self.bus.emit_lossy(CompanionEvent::StateChanged {
                    old_state: previous,
                    new_state: current,
                    timestamp: Utc::now(),
                });
                for effect in effects {
                    self.dispatch(effect);
                }
            }
            Transition::Ignored { .. } => {}
        }
    }

    fn dispatch(&mut self, effect: Effect) {
        match effect {
            Effect::ShowSystem { system_name } => {
                let change = self.media.show_system(&system_name, &self.preferences);
                self.on_video_change(change);
            }
            Effect::ShowGame {
                system_name,
                game_filename,
            } => {
                let change = self
                    .media
                    .show_game(&system_name, &game_filename, &self.preferences);
                self.on_video_change(change);
            }
            Effect::ShowGameLaunch {
                system_name,
                game_filename,
            } => {
                let change =
                    self.media
                        .show_game_launch(&system_name, &game_filename, &self.preferences);
                self.on_video_change(change);
            }
            Effect::ShowScreensaver => {
                let change = self.media.show_screensaver(&self.preferences);
                self.on_video_change(change);
            }
            Effect::ShowScreensaverGame(game) => {
                self.media.show_screensaver_game(&game, &self.preferences);
            }
            Effect::RefreshWidgets => self.widgets.refresh(self.machine.current()),
            Effect::RefreshScreensaverWidgets => {
                self.widgets.refresh_content(self.machine.current())
            }
            Effect::ReevaluateMusic => self.reevaluate_music(),
        }
    }

    fn on_video_change(&mut self, change: VideoChange) {
        match change {
            VideoChange::Unchanged => {}
            VideoChange::Started => self.music.on_video_started(),
            VideoChange::Stopped => self
                .music
                .on_video_ended(self.machine.current(), self.display_suppressed),
        }
    }

    fn reevaluate_music(&mut self) {
        self.music.reevaluate(
            self.machine.current(),
            &self.preferences.music,
            self.display_suppressed,
        );
        debug!(phase = ?self.music.phase(), "Music reevaluated");
    }

    fn reload_preferences(&mut self) {
        let Some(path) = self.preferences_path.as_deref() else {
            debug!("No preferences file, reload ignored");
            return;
        };
        self.preferences = Preferences::load(path);
        info!(path = %path.display(), "Preferences reloaded");
        self.reevaluate_music();
    }
}

/// Cloneable handle for feeding the engine and observing its output
#[derive(Clone)]
pub struct EngineHandle {
    tx: EngineSender,
    bus: Arc<EventBus>,
    shutdown: CancellationToken,
}

impl EngineHandle {
    /// Receive every `CompanionEvent` emitted from now on
    pub fn subscribe(&self) -> broadcast::Receiver<CompanionEvent> {
        self.bus.subscribe()
    }

    pub fn bus(&self) -> Arc<EventBus> {
        Arc::clone(&self.bus)
    }

    /// Sender for raw signal producers (the directory watcher)
    pub fn sender(&self) -> EngineSender {
        self.tx.clone()
    }

    /// Report that an event file changed
    pub fn signal(&self, file: EventFile) -> Result<()> {
        self.send(EngineMessage::Signal(RawSignal { file }))
    }

    /// The renderer's video reached its end
    pub fn video_finished(&self) -> Result<()> {
        self.send(EngineMessage::VideoFinished)
    }

    /// The audio backend finished playing a track
    pub fn track_finished(&self, track: impl Into<PathBuf>) -> Result<()> {
        self.send(EngineMessage::Music(MusicMessage::TrackFinished {
            track: track.into(),
        }))
    }

    pub fn set_visible(&self, visible: bool) -> Result<()> {
        self.send(EngineMessage::VisibilityChanged(visible))
    }

    /// A user overlay covers the display; music stops while set
    pub fn set_display_suppressed(&self, suppressed: bool) -> Result<()> {
        self.send(EngineMessage::DisplaySuppressed(suppressed))
    }

    pub fn reload_preferences(&self) -> Result<()> {
        self.send(EngineMessage::ReloadPreferences)
    }

    pub fn add_widget(&self, widget: Widget) -> Result<()> {
        self.widget(WidgetCommand::Add(widget))
    }

    pub fn update_widget(&self, widget: Widget) -> Result<()> {
        self.widget(WidgetCommand::Update(widget))
    }

    pub fn delete_widget(&self, id: Uuid) -> Result<()> {
        self.widget(WidgetCommand::Delete(id))
    }

    pub fn move_widget_forward(&self, id: Uuid) -> Result<()> {
        self.widget(WidgetCommand::MoveForward(id))
    }

    pub fn move_widget_backward(&self, id: Uuid) -> Result<()> {
        self.widget(WidgetCommand::MoveBackward(id))
    }

    pub fn save_widgets(&self) -> Result<()> {
        self.widget(WidgetCommand::Save)
    }

    pub fn clear_widgets(&self) -> Result<()> {
        self.widget(WidgetCommand::Clear)
    }

    pub fn widget(&self, command: WidgetCommand) -> Result<()> {
        self.send(EngineMessage::Widget(command))
    }

    /// Ask the loop to stop after the messages already queued
    pub fn shutdown(&self) -> Result<()> {
        self.send(EngineMessage::Shutdown)
    }

    /// Stop the loop and every deferred task immediately
    pub fn cancel(&self) {
        self.shutdown.cancel();
    }

    fn send(&self, message: EngineMessage) -> Result<()> {
        self.tx.send(message).map_err(|_| Error::ChannelClosed)
    }
}
