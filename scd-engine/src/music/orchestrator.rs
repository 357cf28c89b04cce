//! Music orchestrator
//!
//! Decides what ambient music plays for the committed state and drives the
//! decks. Decisions compare *actual* sources (after the empty-folder fallback
//! to generic music), so moving between systems that both fall back to
//! generic music keeps the current track.
//!
//! At most two decks exist: the active one and one fading out. Starting a
//! third releases the oldest immediately.

use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use scd_common::app_state::AppState;
use scd_common::display::MusicSource;
use scd_common::events::{CompanionEvent, EventBus};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::deck::{AudioBackend, Deck, DeckId, DeckState};
use super::fade::{Fade, FadeEnd};
use super::library::MusicLibrary;
use super::MusicMessage;
use crate::config::{MusicPreferences, VideoMusicBehavior};
use crate::messages::EngineSender;

/// Observable playback phase
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MusicPhase {
    Stopped,
    Playing(MusicSource),
    /// A previous deck is still fading out
    Transitioning(MusicSource),
}

/// What was done to the music when a video started, reversed when it ends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VideoAction {
    Ducked,
    Paused,
}

pub struct MusicOrchestrator {
    backend: Arc<dyn AudioBackend>,
    library: Arc<dyn MusicLibrary>,
    bus: Arc<EventBus>,
    tx: EngineSender,
    shutdown: CancellationToken,
    prefs: MusicPreferences,
    active: Option<Deck>,
    outgoing: Option<Deck>,
    next_deck: DeckId,
    video_action: Option<VideoAction>,
    hidden: bool,
    resume_on_visible: bool,
}

impl MusicOrchestrator {
    pub fn new(
        backend: Arc<dyn AudioBackend>,
        library: Arc<dyn MusicLibrary>,
        bus: Arc<EventBus>,
        tx: EngineSender,
        prefs: MusicPreferences,
        shutdown: &CancellationToken,
    ) -> Self {
        Self {
            backend,
            library,
            bus,
            tx,
            shutdown: shutdown.clone(),
            prefs,
            active: None,
            outgoing: None,
            next_deck: 0,
            video_action: None,
            hidden: false,
            resume_on_visible: false,
        }
    }

    pub fn phase(&self) -> MusicPhase {
        match &self.active {
            None => MusicPhase::Stopped,
            Some(deck) if self.outgoing.is_some() => {
                MusicPhase::Transitioning(deck.source().clone())
            }
            Some(deck) => MusicPhase::Playing(deck.source().clone()),
        }
    }

    /// Actual source of the active deck
    pub fn active_source(&self) -> Option<&MusicSource> {
        self.active.as_ref().map(|d| d.source())
    }

    /// Source the state asks for, before the empty-folder fallback
    pub fn requested_source(state: &AppState, prefs: &MusicPreferences) -> Option<MusicSource> {
        match state {
            AppState::GamePlaying { .. } => None,
            AppState::Screensaver { .. } => Some(MusicSource::Generic),
            _ => match state.system_name() {
                Some(system) if prefs.system_specific => {
                    Some(MusicSource::System(system.to_string()))
                }
                _ => Some(MusicSource::Generic),
            },
        }
    }

    /// Source that will actually play: the requested one if it has tracks, else generic
    pub fn actual_source(&self, requested: MusicSource) -> Option<MusicSource> {
        if self.library.has_tracks(&requested) {
            return Some(requested);
        }
        if requested != MusicSource::Generic && self.library.has_tracks(&MusicSource::Generic) {
            debug!(requested = %requested, "No tracks, falling back to generic music");
            return Some(MusicSource::Generic);
        }
        None
    }

    /// Bring playback in line with the committed state
    pub fn reevaluate(&mut self, state: &AppState, prefs: &MusicPreferences, display_suppressed: bool) {
        self.prefs = prefs.clone();

        let target = if !prefs.enabled {
            Err("music disabled")
        } else if display_suppressed {
            Err("display suppressed")
        } else if self.hidden {
            Err("app hidden")
        } else if !prefs.plays_during(state.category()) {
            Err("disabled for state")
        } else {
            Self::requested_source(state, prefs)
                .and_then(|requested| self.actual_source(requested))
                .ok_or("no playable tracks")
        };

        let actual = match target {
            Ok(actual) => actual,
            Err(reason) => {
                debug!(reason, state = %state.category(), "Music target: stopped");
                self.stop();
                return;
            }
        };

        match self.active_source().cloned() {
            Some(current) if current == actual => {
                debug!(source = %actual, "Music source unchanged");
            }
            Some(current) => {
                info!(from = %current, to = %actual, "Music source changed, crossfading");
                self.retire_active();
                self.start(actual, true);
            }
            None => self.start(actual, false),
        }
    }

    pub fn on_message(&mut self, message: MusicMessage, state: &AppState, display_suppressed: bool) {
        match message {
            MusicMessage::FadeTick { deck, generation } => self.on_fade_tick(deck, generation),
            MusicMessage::TrackFinished { track } => {
                self.on_track_finished(&track, state, display_suppressed)
            }
        }
    }

    pub fn on_video_started(&mut self) {
        let action = match self.prefs.video_behavior {
            VideoMusicBehavior::Continue => return,
            VideoMusicBehavior::Duck => VideoAction::Ducked,
            VideoMusicBehavior::Pause => VideoAction::Paused,
        };
        self.video_action = Some(action);

        let ducked = self.prefs.ducked_volume();
        let (duration, curve, tick) = (self.prefs.crossfade(), self.prefs.curve, self.prefs.fade_tick());
        let Some(deck) = self.active.as_mut() else {
            return;
        };
        match action {
            VideoAction::Ducked => {
                debug!(volume = ducked, "Ducking music under video");
                deck.begin_fade(
                    Fade::new(deck.volume(), ducked, duration, curve, FadeEnd::Hold),
                    tick,
                    &self.tx,
                );
            }
            VideoAction::Paused => {
                debug!("Pausing music for video");
                deck.begin_fade(
                    Fade::new(deck.volume(), 0.0, duration, curve, FadeEnd::Pause),
                    tick,
                    &self.tx,
                );
                self.bus.emit_lossy(CompanionEvent::MusicPaused {
                    timestamp: Utc::now(),
                });
            }
        }
    }

    /// Reverse whatever `on_video_started` did
    pub fn on_video_ended(&mut self, state: &AppState, display_suppressed: bool) {
        let Some(action) = self.video_action.take() else {
            return;
        };
        let full = self.prefs.full_volume();
        let (duration, curve, tick) = (self.prefs.crossfade(), self.prefs.curve, self.prefs.fade_tick());

        match action {
            VideoAction::Ducked => {
                if let Some(deck) = self.active.as_mut() {
                    debug!("Restoring music volume after video");
                    deck.begin_fade(
                        Fade::new(deck.volume(), full, duration, curve, FadeEnd::Hold),
                        tick,
                        &self.tx,
                    );
                }
            }
            VideoAction::Paused => {
                if state.is_playing() {
                    debug!("Game running, music not resumed after video");
                    return;
                }
                match self.active.as_mut() {
                    Some(deck) => {
                        deck.resume();
                        deck.begin_fade(
                            Fade::new(deck.volume(), full, duration, curve, FadeEnd::Hold),
                            tick,
                            &self.tx,
                        );
                        self.bus.emit_lossy(CompanionEvent::MusicResumed {
                            timestamp: Utc::now(),
                        });
                    }
                    None => {
                        let prefs = self.prefs.clone();
                        self.reevaluate(state, &prefs, display_suppressed);
                    }
                }
            }
        }
    }

    pub fn on_visibility_changed(
        &mut self,
        visible: bool,
        state: &AppState,
        prefs: &MusicPreferences,
        display_suppressed: bool,
    ) {
        if !visible {
            if self.hidden {
                return;
            }
            self.hidden = true;
            self.resume_on_visible = self
                .active
                .as_ref()
                .map(|d| d.state() == DeckState::Playing)
                .unwrap_or(false);
            if self.retire_active() {
                info!(resume = self.resume_on_visible, "App hidden, music paused");
                self.bus.emit_lossy(CompanionEvent::MusicPaused {
                    timestamp: Utc::now(),
                });
            }
        } else {
            if !self.hidden {
                return;
            }
            self.hidden = false;
            if std::mem::take(&mut self.resume_on_visible) {
                // The old player is gone; reevaluation opens a fresh one
                self.reevaluate(state, prefs, display_suppressed);
            }
        }
    }

    /// Release every player without fading (engine shutdown)
    pub fn release_all(&mut self) {
        if let Some(mut deck) = self.outgoing.take() {
            deck.release();
        }
        if let Some(mut deck) = self.active.take() {
            deck.release();
        }
    }

    fn stop(&mut self) {
        if self.retire_active() {
            info!("Music stopped");
            self.bus.emit_lossy(CompanionEvent::MusicStopped {
                timestamp: Utc::now(),
            });
        }
    }

    fn start(&mut self, source: MusicSource, crossfade: bool) {
        if self.video_action == Some(VideoAction::Paused) {
            debug!(source = %source, "Music held until the video ends");
            return;
        }
        match self.library.pick_track(&source, None) {
            Some(track) => self.start_track(source, track, crossfade),
            None => warn!(source = %source, "Music source has no tracks"),
        }
    }

    fn start_track(&mut self, source: MusicSource, track: std::path::PathBuf, crossfade: bool) {
        self.next_deck += 1;
        let id = self.next_deck;

        let mut deck = match Deck::acquire(
            self.backend.as_ref(),
            id,
            source.clone(),
            track.clone(),
            &self.shutdown,
        ) {
            Ok(deck) => deck,
            Err(e) => {
                warn!(track = %track.display(), error = %e, "Could not open music track");
                return;
            }
        };

        let target = match self.video_action {
            Some(VideoAction::Ducked) => self.prefs.ducked_volume(),
            _ => self.prefs.full_volume(),
        };
        deck.begin_fade(
            Fade::new(0.0, target, self.prefs.crossfade(), self.prefs.curve, FadeEnd::Hold),
            self.prefs.fade_tick(),
            &self.tx,
        );

        info!(source = %source, track = %track.display(), crossfade, "Music started");
        self.bus.emit_lossy(CompanionEvent::MusicStarted {
            source,
            track,
            crossfade,
            timestamp: Utc::now(),
        });
        self.active = Some(deck);
    }

    /// Move the active deck to the outgoing slot, fading it out
    ///
    /// Returns `false` when nothing was playing.
    fn retire_active(&mut self) -> bool {
        let Some(mut deck) = self.active.take() else {
            return false;
        };
        if let Some(mut previous) = self.outgoing.take() {
            previous.release();
        }

        if deck.state() == DeckState::Paused || deck.volume() <= 0.0 {
            deck.release();
            return true;
        }
        deck.begin_fade(
            Fade::new(
                deck.volume(),
                0.0,
                self.prefs.crossfade(),
                self.prefs.curve,
                FadeEnd::Release,
            ),
            self.prefs.fade_tick(),
            &self.tx,
        );
        self.outgoing = Some(deck);
        true
    }

    fn deck_mut(&mut self, id: DeckId) -> Option<&mut Deck> {
        if self.active.as_ref().map(|d| d.id()) == Some(id) {
            self.active.as_mut()
        } else if self.outgoing.as_ref().map(|d| d.id()) == Some(id) {
            self.outgoing.as_mut()
        } else {
            None
        }
    }

    fn on_fade_tick(&mut self, id: DeckId, generation: u64) {
        let now = Instant::now();
        let Some(deck) = self.deck_mut(id) else {
            return;
        };
        if !deck.is_current_fade(generation) {
            return;
        }
        let Some(fade) = deck.fade().cloned() else {
            return;
        };

        deck.set_volume(fade.volume_at(now));
        if fade.is_complete(now) {
            deck.complete_fade(generation);
            match fade.end() {
                FadeEnd::Hold => {}
                FadeEnd::Pause => deck.pause(),
                FadeEnd::Release => deck.release(),
            }
        }
        self.reap();
    }

    fn on_track_finished(&mut self, track: &Path, state: &AppState, display_suppressed: bool) {
        if self.outgoing.as_ref().map(|d| d.track() == track).unwrap_or(false) {
            if let Some(mut deck) = self.outgoing.take() {
                deck.release();
            }
            return;
        }
        let Some(deck) = self.active.as_ref() else {
            return;
        };
        if deck.track() != track {
            return;
        }

        let source = deck.source().clone();
        let previous = deck.track().to_path_buf();
        if let Some(mut deck) = self.active.take() {
            deck.release();
        }

        match self.library.pick_track(&source, Some(&previous)) {
            Some(next) => {
                debug!(source = %source, "Track finished, playing next");
                self.start_track(source, next, false);
            }
            None => {
                let prefs = self.prefs.clone();
                self.reevaluate(state, &prefs, display_suppressed);
            }
        }
    }

    /// Drop decks whose player is gone
    fn reap(&mut self) {
        if self.outgoing.as_ref().map(|d| d.is_released()).unwrap_or(false) {
            self.outgoing = None;
        }
        if self.active.as_ref().map(|d| d.is_released()).unwrap_or(false) {
            debug!("Active player invalidated");
            self.active = None;
        }
    }
}

impl Drop for MusicOrchestrator {
    fn drop(&mut self) {
        self.release_all();
    }
}
