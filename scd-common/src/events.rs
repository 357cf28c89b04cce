//! Event types for the SCD event system
//!
//! Provides the outbound event definitions and the EventBus the engine
//! publishes on. A renderer (or the headless daemon) subscribes and turns
//! events into pixels and sound; the engine never draws anything itself.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::app_state::AppState;
use crate::display::{Background, MusicSource};
use crate::widgets::{ResolvedWidget, WidgetContext};

/// SCD event types
///
/// Events are broadcast via EventBus and can be serialized for JSON output.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum CompanionEvent {
    /// State machine committed a transition
    StateChanged {
        old_state: AppState,
        new_state: AppState,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// New background to display
    BackgroundChanged {
        background: Background,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Still image hidden ahead of an immediate video start
    ImageHidden {
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Video playback should start
    VideoStarted {
        path: PathBuf,
        /// Whether the video's own audio track should be audible
        audio_enabled: bool,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Video playback should stop
    VideoStopped {
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Active widget set (paint order) with resolved content
    WidgetsChanged {
        context: WidgetContext,
        widgets: Vec<ResolvedWidget>,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A music track started, possibly crossfading from a previous one
    MusicStarted {
        source: MusicSource,
        track: PathBuf,
        crossfade: bool,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Music fading out to silence and releasing its player
    MusicStopped {
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Music paused (video playback or app hidden)
    MusicPaused {
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Music resumed after a pause
    MusicResumed {
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl CompanionEvent {
    /// Short event name for log lines
    pub fn name(&self) -> &'static str {
        match self {
            CompanionEvent::StateChanged { .. } => "StateChanged",
            CompanionEvent::BackgroundChanged { .. } => "BackgroundChanged",
            CompanionEvent::ImageHidden { .. } => "ImageHidden",
            CompanionEvent::VideoStarted { .. } => "VideoStarted",
            CompanionEvent::VideoStopped { .. } => "VideoStopped",
            CompanionEvent::WidgetsChanged { .. } => "WidgetsChanged",
            CompanionEvent::MusicStarted { .. } => "MusicStarted",
            CompanionEvent::MusicStopped { .. } => "MusicStopped",
            CompanionEvent::MusicPaused { .. } => "MusicPaused",
            CompanionEvent::MusicResumed { .. } => "MusicResumed",
        }
    }
}

/// Central event distribution bus
///
/// Thin wrapper over a tokio broadcast channel. Slow subscribers lag and lose
/// the oldest events rather than blocking the engine.
pub struct EventBus {
    tx: broadcast::Sender<CompanionEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// # Examples
    ///
    /// ```
    /// use scd_common::events::EventBus;
    ///
    /// let event_bus = EventBus::new(256);
    /// assert_eq!(event_bus.capacity(), 256);
    /// ```
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<CompanionEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists.
    pub fn emit(
        &self,
        event: CompanionEvent,
    ) -> Result<usize, broadcast::error::SendError<CompanionEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: CompanionEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
