//! Volume fades driven by periodic ticks
//!
//! A `Fade` is a pure function of time: each tick the music orchestrator asks
//! for the volume at "now" and pushes it to the deck. The ticker task only
//! wakes the engine loop; it never touches a deck itself.

use std::time::Duration;

use scd_common::fade_curves::FadeCurve;
use tokio::time::Instant;

use super::deck::DeckId;
use super::MusicMessage;
use crate::messages::{EngineMessage, EngineSender};
use crate::tasks::TaskTicket;

/// What happens to the deck when the fade completes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FadeEnd {
    /// Keep playing at the target volume
    Hold,
    /// Pause playback (video pause behavior)
    Pause,
    /// Release the player
    Release,
}

#[derive(Debug, Clone)]
pub struct Fade {
    from: f32,
    to: f32,
    started: Instant,
    duration: Duration,
    curve: FadeCurve,
    end: FadeEnd,
}

impl Fade {
    pub fn new(from: f32, to: f32, duration: Duration, curve: FadeCurve, end: FadeEnd) -> Self {
        Self {
            from: from.clamp(0.0, 1.0),
            to: to.clamp(0.0, 1.0),
            started: Instant::now(),
            duration,
            curve,
            end,
        }
    }

    pub fn target(&self) -> f32 {
        self.to
    }

    pub fn end(&self) -> FadeEnd {
        self.end
    }

    /// Fade position 0.0..=1.0 at `now`
    pub fn position(&self, now: Instant) -> f32 {
        if self.duration.is_zero() {
            return 1.0;
        }
        let elapsed = now.saturating_duration_since(self.started);
        (elapsed.as_secs_f32() / self.duration.as_secs_f32()).clamp(0.0, 1.0)
    }

    pub fn volume_at(&self, now: Instant) -> f32 {
        self.curve.interpolate(self.from, self.to, self.position(now))
    }

    pub fn is_complete(&self, now: Instant) -> bool {
        self.position(now) >= 1.0
    }
}

/// Spawn the tick task for one fade
///
/// Runs until the ticket is cancelled (fade replaced, completed or the deck
/// released) or the engine loop has gone away.
pub fn spawn_ticker(ticket: TaskTicket, deck: DeckId, interval: Duration, tx: EngineSender) {
    tokio::spawn(async move {
        loop {
            if !ticket.sleep(interval).await {
                return;
            }
            let tick = EngineMessage::Music(MusicMessage::FadeTick {
                deck,
                generation: ticket.generation(),
            });
            if tx.send(tick).is_err() {
                return;
            }
        }
    });
}
