//! Media orchestrator
//!
//! Resolves and publishes the background for each state and schedules game
//! videos. Lookups run in spawned tasks; every new request cancels the
//! previous one and results from superseded generations are discarded, so a
//! slow lookup for an old game can never overwrite the current one.
//!
//! A failed lookup leaves the last displayed background in place.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use scd_common::app_state::ScreensaverGame;
use scd_common::display::{Background, Color};
use scd_common::events::{CompanionEvent, EventBus};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::background::{resolve_background, BackgroundRequest};
use super::resolver::{MediaKind, MediaResolver, MediaTarget};
use crate::config::{BackgroundSource, GameLaunchBehavior, Preferences, ScreensaverBehavior};
use crate::error::Result;
use crate::messages::{EngineMessage, EngineSender};
use crate::tasks::{TaskSlot, TaskTicket};

/// Results posted back to the engine loop by media tasks
#[derive(Debug)]
pub enum MediaMessage {
    BackgroundResolved {
        generation: u64,
        result: Result<Background>,
    },
    VideoDue {
        generation: u64,
        path: PathBuf,
        audio_enabled: bool,
        /// Hide the still image first (zero-delay start)
        hide_image: bool,
    },
}

/// Video transition the music orchestrator must react to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoChange {
    Unchanged,
    Started,
    Stopped,
}

pub struct MediaOrchestrator {
    resolver: Arc<dyn MediaResolver>,
    bus: Arc<EventBus>,
    tx: EngineSender,
    default_background: Option<PathBuf>,
    lookup: TaskSlot,
    video: TaskSlot,
    playing_video: Option<PathBuf>,
    displayed: Option<Background>,
}

impl MediaOrchestrator {
    pub fn new(
        resolver: Arc<dyn MediaResolver>,
        bus: Arc<EventBus>,
        tx: EngineSender,
        default_background: Option<PathBuf>,
        shutdown: &CancellationToken,
    ) -> Self {
        Self {
            resolver,
            bus,
            tx,
            default_background,
            lookup: TaskSlot::new("background_lookup", shutdown),
            video: TaskSlot::new("video_schedule", shutdown),
            playing_video: None,
            displayed: None,
        }
    }

    /// Background currently on screen, if any was published yet
    pub fn displayed(&self) -> Option<&Background> {
        self.displayed.as_ref()
    }

    pub fn show_system(&mut self, system_name: &str, prefs: &Preferences) -> VideoChange {
        let change = self.stop_video();
        let request = self.request(
            Some(MediaTarget::system(system_name)),
            prefs.system_background,
            prefs,
        );
        self.begin_lookup(request);
        change
    }

    pub fn show_game(
        &mut self,
        system_name: &str,
        game_filename: &str,
        prefs: &Preferences,
    ) -> VideoChange {
        let change = self.stop_video();
        let target = MediaTarget::game(system_name, game_filename);
        let request = self.request(Some(target.clone()), prefs.game_background, prefs);
        self.begin_lookup(request);

        if prefs.video.enabled {
            self.schedule_video(target, prefs.video.delay(), prefs.video.audio_enabled);
        }
        change
    }

    pub fn show_game_launch(
        &mut self,
        system_name: &str,
        game_filename: &str,
        prefs: &Preferences,
    ) -> VideoChange {
        let change = self.stop_video();
        match prefs.game_launch {
            GameLaunchBehavior::GameImage => {
                let target = MediaTarget::game(system_name, game_filename);
                let request = self.request(Some(target), prefs.game_background, prefs);
                self.begin_lookup(request);
            }
            GameLaunchBehavior::DefaultImage => {
                let request = self.request(None, BackgroundSource::Fanart, prefs);
                self.begin_lookup(request);
            }
            GameLaunchBehavior::Black => self.show_now(Background::SolidColor {
                color: Color::BLACK,
            }),
        }
        change
    }

    pub fn show_screensaver(&mut self, prefs: &Preferences) -> VideoChange {
        let change = self.stop_video();
        match prefs.screensaver {
            // Keep the current image until the screensaver highlights a game
            ScreensaverBehavior::GameImages => self.lookup.cancel(),
            ScreensaverBehavior::DefaultImage => {
                let request = self.request(None, BackgroundSource::Fanart, prefs);
                self.begin_lookup(request);
            }
            ScreensaverBehavior::Black => self.show_now(Background::SolidColor {
                color: Color::BLACK,
            }),
        }
        change
    }

    pub fn show_screensaver_game(&mut self, game: &ScreensaverGame, prefs: &Preferences) {
        if prefs.screensaver != ScreensaverBehavior::GameImages {
            return;
        }
        let target = MediaTarget::game(&game.system_name, &game.game_filename);
        let request = self.request(Some(target), prefs.game_background, prefs);
        self.begin_lookup(request);
    }

    /// Apply a task result; returns whether a video started
    pub fn on_message(&mut self, message: MediaMessage) -> VideoChange {
        match message {
            MediaMessage::BackgroundResolved { generation, result } => {
                if !self.lookup.finish(generation) {
                    debug!(generation, "Stale background lookup discarded");
                    return VideoChange::Unchanged;
                }
                match result {
                    Ok(background) => self.show_now(background),
                    Err(e) => warn!(error = %e, "Background lookup failed, keeping current image"),
                }
                VideoChange::Unchanged
            }
            MediaMessage::VideoDue {
                generation,
                path,
                audio_enabled,
                hide_image,
            } => {
                if !self.video.finish(generation) {
                    debug!(generation, "Stale video start discarded");
                    return VideoChange::Unchanged;
                }
                if hide_image {
                    self.bus.emit_lossy(CompanionEvent::ImageHidden {
                        timestamp: Utc::now(),
                    });
                }
                info!(path = %path.display(), "Video started");
                self.bus.emit_lossy(CompanionEvent::VideoStarted {
                    path: path.clone(),
                    audio_enabled,
                    timestamp: Utc::now(),
                });
                self.playing_video = Some(path);
                VideoChange::Started
            }
        }
    }

    /// Renderer reports the video reached its end
    pub fn video_finished(&mut self) -> VideoChange {
        match self.playing_video.take() {
            Some(path) => {
                debug!(path = %path.display(), "Video finished");
                VideoChange::Stopped
            }
            None => VideoChange::Unchanged,
        }
    }

    /// Cancel any scheduled video and stop the playing one
    pub fn stop_video(&mut self) -> VideoChange {
        self.video.cancel();
        match self.playing_video.take() {
            Some(_) => {
                self.bus.emit_lossy(CompanionEvent::VideoStopped {
                    timestamp: Utc::now(),
                });
                VideoChange::Stopped
            }
            None => VideoChange::Unchanged,
        }
    }

    fn request(
        &self,
        target: Option<MediaTarget>,
        source: BackgroundSource,
        prefs: &Preferences,
    ) -> BackgroundRequest {
        BackgroundRequest {
            target,
            source,
            custom_background: prefs.custom_background.clone(),
            default_background: self.default_background.clone(),
            solid_color: prefs.solid_color,
        }
    }

    fn begin_lookup(&mut self, request: BackgroundRequest) {
        if request.is_immediate() {
            self.lookup.cancel();
            self.show_now(Background::SolidColor {
                color: request.solid_color,
            });
            return;
        }

        let ticket = self.lookup.begin();
        let resolver = Arc::clone(&self.resolver);
        let tx = self.tx.clone();

        tokio::spawn(async move {
            // Directory scans block; keep them off the runtime workers
            let lookup =
                tokio::task::spawn_blocking(move || resolve_background(resolver.as_ref(), &request));
            let result = match lookup.await {
                Ok(result) => result,
                Err(e) => {
                    warn!(error = %e, "Background lookup task failed");
                    return;
                }
            };
            post(&tx, &ticket, |generation| MediaMessage::BackgroundResolved {
                generation,
                result,
            });
        });
    }

    fn schedule_video(&mut self, target: MediaTarget, delay: Duration, audio_enabled: bool) {
        let Some(game_filename) = target.game_filename.clone() else {
            return;
        };
        let ticket = self.video.begin();
        let resolver = Arc::clone(&self.resolver);
        let tx = self.tx.clone();

        tokio::spawn(async move {
            let system_name = target.system_name.clone();
            let lookup = tokio::task::spawn_blocking(move || {
                resolver.find_game_media(&system_name, &game_filename, MediaKind::Video)
            });
            let path = match lookup.await {
                Ok(Ok(Some(path))) => path,
                Ok(Ok(None)) => return,
                Ok(Err(e)) => {
                    warn!(error = %e, "Video lookup failed");
                    return;
                }
                Err(e) => {
                    warn!(error = %e, "Video lookup task failed");
                    return;
                }
            };
            let hide_image = delay.is_zero();
            if !ticket.sleep(delay).await {
                return;
            }
            post(&tx, &ticket, |generation| MediaMessage::VideoDue {
                generation,
                path,
                audio_enabled,
                hide_image,
            });
        });
    }

    fn show_now(&mut self, background: Background) {
        if self.displayed.as_ref() == Some(&background) {
            debug!("Background unchanged");
            return;
        }
        debug!(background = ?background, "Background changed");
        self.bus.emit_lossy(CompanionEvent::BackgroundChanged {
            background: background.clone(),
            timestamp: Utc::now(),
        });
        self.displayed = Some(background);
    }
}

fn post(tx: &EngineSender, ticket: &TaskTicket, message: impl FnOnce(u64) -> MediaMessage) {
    if ticket.is_cancelled() {
        return;
    }
    let _ = tx.send(EngineMessage::Media(message(ticket.generation())));
}
