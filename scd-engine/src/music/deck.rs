//! Music decks
//!
//! A `Deck` owns exactly one player from an `AudioBackend` together with its
//! fade state. Releasing is idempotent, and errors from a player that is
//! already gone (`DeckError::Released`) are ignored: a backend may invalidate
//! a player on its own (device change, app backgrounded) while a fade is still
//! running.

use std::path::{Path, PathBuf};
use std::time::Duration;

use scd_common::display::MusicSource;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::fade::{spawn_ticker, Fade, FadeEnd};
use crate::messages::EngineSender;
use crate::tasks::TaskSlot;

pub type DeckId = u64;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeckError {
    /// Player was already released or invalidated by the backend
    #[error("Player already released")]
    Released,

    #[error("Audio backend error: {0}")]
    Backend(String),
}

/// Creates players for tracks
pub trait AudioBackend: Send + Sync {
    fn open(&self, track: &Path) -> Result<Box<dyn AudioPlayer>, DeckError>;
}

/// One playback resource
pub trait AudioPlayer: Send {
    fn play(&mut self) -> Result<(), DeckError>;
    fn pause(&mut self) -> Result<(), DeckError>;
    fn set_volume(&mut self, volume: f32) -> Result<(), DeckError>;
    fn release(&mut self) -> Result<(), DeckError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeckState {
    Playing,
    Paused,
    FadingOut,
    Released,
}

pub struct Deck {
    id: DeckId,
    source: MusicSource,
    track: PathBuf,
    player: Box<dyn AudioPlayer>,
    state: DeckState,
    volume: f32,
    fade: Option<Fade>,
    fade_slot: TaskSlot,
}

impl Deck {
    /// Open a player for `track` and start it silent
    pub fn acquire(
        backend: &dyn AudioBackend,
        id: DeckId,
        source: MusicSource,
        track: PathBuf,
        shutdown: &CancellationToken,
    ) -> Result<Self, DeckError> {
        let mut player = backend.open(&track)?;
        player.set_volume(0.0)?;
        player.play()?;
        debug!(deck = id, track = %track.display(), "Deck acquired");

        Ok(Self {
            id,
            source,
            track,
            player,
            state: DeckState::Playing,
            volume: 0.0,
            fade: None,
            fade_slot: TaskSlot::new("music_fade", shutdown),
        })
    }

    pub fn id(&self) -> DeckId {
        self.id
    }

    pub fn source(&self) -> &MusicSource {
        &self.source
    }

    pub fn track(&self) -> &Path {
        &self.track
    }

    pub fn state(&self) -> DeckState {
        self.state
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub fn fade(&self) -> Option<&Fade> {
        self.fade.as_ref()
    }

    pub fn is_released(&self) -> bool {
        self.state == DeckState::Released
    }

    /// Replace any running fade with `fade`, ticking every `interval`
    pub fn begin_fade(&mut self, fade: Fade, interval: Duration, tx: &EngineSender) {
        if self.is_released() {
            return;
        }
        if fade.target() <= 0.0 && fade.end() != FadeEnd::Hold {
            self.state = DeckState::FadingOut;
        }
        let ticket = self.fade_slot.begin();
        spawn_ticker(ticket, self.id, interval, tx.clone());
        self.fade = Some(fade);
    }

    /// Whether a tick with `generation` belongs to the running fade
    pub fn is_current_fade(&self, generation: u64) -> bool {
        self.fade_slot.is_current(generation)
    }

    /// Take the fade after its last tick and stop the ticker
    pub fn complete_fade(&mut self, generation: u64) -> Option<Fade> {
        if self.fade_slot.finish(generation) {
            self.fade.take()
        } else {
            None
        }
    }

    pub fn set_volume(&mut self, volume: f32) {
        let volume = volume.clamp(0.0, 1.0);
        if self.call("set_volume", |p| p.set_volume(volume)) {
            self.volume = volume;
        }
    }

    pub fn pause(&mut self) {
        if matches!(self.state, DeckState::Playing | DeckState::FadingOut)
            && self.call("pause", |p| p.pause())
        {
            self.state = DeckState::Paused;
        }
    }

    pub fn resume(&mut self) {
        if matches!(self.state, DeckState::Paused | DeckState::FadingOut)
            && self.call("play", |p| p.play())
        {
            self.state = DeckState::Playing;
        }
    }

    /// Release the player; safe to call any number of times
    pub fn release(&mut self) {
        if self.is_released() {
            return;
        }
        self.fade_slot.cancel();
        self.fade = None;
        match self.player.release() {
            Ok(()) | Err(DeckError::Released) => {}
            Err(e) => warn!(deck = self.id, error = %e, "Player release failed"),
        }
        self.state = DeckState::Released;
        debug!(deck = self.id, "Deck released");
    }

    /// Run a player call, tolerating a player that is already gone
    fn call(
        &mut self,
        op: &'static str,
        f: impl FnOnce(&mut dyn AudioPlayer) -> Result<(), DeckError>,
    ) -> bool {
        if self.is_released() {
            return false;
        }
        match f(self.player.as_mut()) {
            Ok(()) => true,
            Err(DeckError::Released) => {
                debug!(deck = self.id, op, "Player already released");
                self.state = DeckState::Released;
                self.fade_slot.cancel();
                self.fade = None;
                false
            }
            Err(e) => {
                warn!(deck = self.id, op, error = %e, "Player call failed");
                false
            }
        }
    }
}

impl Drop for Deck {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for Deck {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Deck")
            .field("id", &self.id)
            .field("source", &self.source)
            .field("track", &self.track)
            .field("state", &self.state)
            .field("volume", &self.volume)
            .finish()
    }
}

/// Backend for the headless daemon: logs deck operations, plays nothing
#[derive(Debug, Default, Clone)]
pub struct HeadlessAudioBackend;

impl AudioBackend for HeadlessAudioBackend {
    fn open(&self, track: &Path) -> Result<Box<dyn AudioPlayer>, DeckError> {
        if !track.is_file() {
            return Err(DeckError::Backend(format!(
                "Track not found: {}",
                track.display()
            )));
        }
        Ok(Box::new(HeadlessPlayer {
            track: track.to_path_buf(),
            released: false,
        }))
    }
}

struct HeadlessPlayer {
    track: PathBuf,
    released: bool,
}

impl HeadlessPlayer {
    fn check(&self) -> Result<(), DeckError> {
        if self.released {
            Err(DeckError::Released)
        } else {
            Ok(())
        }
    }
}

impl AudioPlayer for HeadlessPlayer {
    fn play(&mut self) -> Result<(), DeckError> {
        self.check()?;
        info!(track = %self.track.display(), "Playing");
        Ok(())
    }

    fn pause(&mut self) -> Result<(), DeckError> {
        self.check()?;
        info!(track = %self.track.display(), "Paused");
        Ok(())
    }

    fn set_volume(&mut self, volume: f32) -> Result<(), DeckError> {
        self.check()?;
        tracing::trace!(track = %self.track.display(), volume, "Volume");
        Ok(())
    }

    fn release(&mut self) -> Result<(), DeckError> {
        self.check()?;
        self.released = true;
        debug!(track = %self.track.display(), "Released");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// Player whose resource the backend can invalidate underneath it
    struct FlakyPlayer {
        invalidated: Arc<Mutex<bool>>,
        releases: Arc<Mutex<u32>>,
    }

    impl AudioPlayer for FlakyPlayer {
        fn play(&mut self) -> Result<(), DeckError> {
            Ok(())
        }
        fn pause(&mut self) -> Result<(), DeckError> {
            Ok(())
        }
        fn set_volume(&mut self, _volume: f32) -> Result<(), DeckError> {
            if *self.invalidated.lock().unwrap() {
                Err(DeckError::Released)
            } else {
                Ok(())
            }
        }
        fn release(&mut self) -> Result<(), DeckError> {
            *self.releases.lock().unwrap() += 1;
            if *self.invalidated.lock().unwrap() {
                Err(DeckError::Released)
            } else {
                Ok(())
            }
        }
    }

    struct FlakyBackend {
        invalidated: Arc<Mutex<bool>>,
        releases: Arc<Mutex<u32>>,
    }

    impl AudioBackend for FlakyBackend {
        fn open(&self, _track: &Path) -> Result<Box<dyn AudioPlayer>, DeckError> {
            Ok(Box::new(FlakyPlayer {
                invalidated: self.invalidated.clone(),
                releases: self.releases.clone(),
            }))
        }
    }

    fn backend() -> FlakyBackend {
        FlakyBackend {
            invalidated: Arc::new(Mutex::new(false)),
            releases: Arc::new(Mutex::new(0)),
        }
    }

    #[test]
    fn test_release_is_idempotent() {
        let backend = backend();
        let shutdown = CancellationToken::new();
        let mut deck = Deck::acquire(
            &backend,
            1,
            MusicSource::Generic,
            PathBuf::from("a.ogg"),
            &shutdown,
        )
        .unwrap();

        deck.release();
        deck.release();
        drop(deck);
        assert_eq!(*backend.releases.lock().unwrap(), 1);
    }

    #[test]
    fn test_invalidated_player_is_tolerated() {
        let backend = backend();
        let shutdown = CancellationToken::new();
        let mut deck = Deck::acquire(
            &backend,
            1,
            MusicSource::Generic,
            PathBuf::from("a.ogg"),
            &shutdown,
        )
        .unwrap();

        *backend.invalidated.lock().unwrap() = true;
        deck.set_volume(0.5);
        assert!(deck.is_released());
        // Already marked released: no further backend calls
        deck.release();
        assert_eq!(*backend.releases.lock().unwrap(), 0);
    }

    #[test]
    fn test_headless_backend_rejects_missing_track() {
        let result = HeadlessAudioBackend.open(Path::new("/nonexistent/track.ogg"));
        assert!(matches!(result, Err(DeckError::Backend(_))));
    }
}
