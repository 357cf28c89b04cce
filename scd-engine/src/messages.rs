//! Messages consumed by the engine loop
//!
//! Every deferred task, the file watcher and the renderer-facing handle post
//! onto one unbounded channel. The engine loop is the only consumer and the
//! only place state is mutated.

use tokio::sync::mpsc;

use crate::ingest::files::{EventFile, ExternalEvent, ScrollCategory};
use crate::media::MediaMessage;
use crate::music::MusicMessage;
use crate::widgets::WidgetCommand;

/// Sender half of the engine loop's channel
pub type EngineSender = mpsc::UnboundedSender<EngineMessage>;

/// Receiver half of the engine loop's channel
pub type EngineReceiver = mpsc::UnboundedReceiver<EngineMessage>;

/// "File changed" notification for one event file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawSignal {
    pub file: EventFile,
}

/// Which dispatch produced an ingested event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestTicket {
    /// Cancellable scroll dispatch; stale generations are discarded
    Scroll {
        category: ScrollCategory,
        generation: u64,
    },
    /// Sequential lifecycle dispatch (start/end/screensaver), always applied in order
    Ordered,
}

#[derive(Debug)]
pub enum EngineMessage {
    Signal(RawSignal),
    Ingested {
        ticket: IngestTicket,
        event: ExternalEvent,
    },
    Media(MediaMessage),
    Music(MusicMessage),
    /// Renderer reports that the current video reached its end
    VideoFinished,
    /// Companion app became visible/invisible
    VisibilityChanged(bool),
    /// A user overlay hides the display (music must stop while set)
    DisplaySuppressed(bool),
    ReloadPreferences,
    Widget(WidgetCommand),
    Shutdown,
}
