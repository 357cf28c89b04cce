//! Ambient music: library, decks, fades and the orchestrator

pub mod deck;
pub mod fade;
pub mod library;
pub mod orchestrator;

use std::path::PathBuf;

pub use deck::{AudioBackend, AudioPlayer, Deck, DeckError, DeckId, DeckState, HeadlessAudioBackend};
pub use fade::{Fade, FadeEnd};
pub use library::{FsMusicLibrary, MusicLibrary};
pub use orchestrator::{MusicOrchestrator, MusicPhase};

/// Results posted back to the engine loop by music tasks and the renderer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MusicMessage {
    /// Periodic wake-up for a running fade
    FadeTick { deck: DeckId, generation: u64 },
    /// Renderer reports a track reached its end
    TrackFinished { track: PathBuf },
}
