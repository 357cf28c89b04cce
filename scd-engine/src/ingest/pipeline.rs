//! Event ingestion pipeline
//!
//! Turns raw "file changed" signals into typed `ExternalEvent`s:
//!
//! 1. Coalesce signals for the same file arriving within the coalesce window.
//! 2. Scroll triggers: wait settle + adaptive debounce, then read the trigger
//!    and companion files with bounded retries. A newer scroll of the same
//!    category cancels the older one, and a result that lost the race is
//!    discarded by generation.
//! 3. Lifecycle triggers (game start/end, screensaver): read on a single
//!    sequential worker so they reach the state machine in arrival order.
//! 4. Suppression rules drop scrolls the frontend emits as side effects of
//!    launching a game or running the screensaver.
//!
//! The pipeline is owned by the engine loop. Reads happen in spawned tasks;
//! their results come back as `EngineMessage::Ingested` and pass through
//! `accept` before reaching the state machine.

use std::collections::HashMap;
use std::sync::Arc;

use scd_common::app_state::{AppState, ScreensaverGame};
use scd_common::config::IngestTiming;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use super::debounce::ScrollDebounce;
use super::files::{EventFile, ExternalEvent, ScreensaverEndReason, ScrollCategory, Trigger};
use super::source::EventSource;
use crate::messages::{EngineMessage, EngineSender, IngestTicket, RawSignal};
use crate::tasks::TaskSlot;

pub struct EventPipeline {
    source: Arc<dyn EventSource>,
    timing: IngestTiming,
    tx: EngineSender,
    shutdown: CancellationToken,
    last_signal: HashMap<EventFile, Instant>,
    system_slot: TaskSlot,
    game_slot: TaskSlot,
    system_debounce: ScrollDebounce,
    game_debounce: ScrollDebounce,
    ordered_tx: mpsc::UnboundedSender<Trigger>,
    /// Scrolls are dropped until this instant (screensaver ended with game-start)
    handoff_until: Option<Instant>,
    last_game_started: Option<Instant>,
}

impl EventPipeline {
    /// Create the pipeline and spawn its sequential lifecycle worker
    ///
    /// Must be called inside a Tokio runtime.
    pub fn new(
        source: Arc<dyn EventSource>,
        timing: IngestTiming,
        tx: EngineSender,
        shutdown: &CancellationToken,
    ) -> Self {
        let shutdown = shutdown.child_token();
        let (ordered_tx, ordered_rx) = mpsc::unbounded_channel();
        tokio::spawn(lifecycle_worker(
            Arc::clone(&source),
            timing.clone(),
            ordered_rx,
            tx.clone(),
            shutdown.clone(),
        ));

        Self {
            system_debounce: ScrollDebounce::system(&timing),
            game_debounce: ScrollDebounce::game(&timing),
            system_slot: TaskSlot::new("system_scroll", &shutdown),
            game_slot: TaskSlot::new("game_scroll", &shutdown),
            source,
            timing,
            tx,
            shutdown,
            last_signal: HashMap::new(),
            ordered_tx,
            handoff_until: None,
            last_game_started: None,
        }
    }

    /// Handle a raw "file changed" signal
    pub fn on_signal(&mut self, signal: RawSignal) {
        let Some(trigger) = signal.file.trigger() else {
            return;
        };
        let now = Instant::now();

        if let Some(last) = self.last_signal.get(&signal.file) {
            if now.saturating_duration_since(*last) < self.timing.coalesce() {
                trace!(file = signal.file.file_name(), "Signal coalesced");
                return;
            }
        }
        self.last_signal.insert(signal.file, now);

        match trigger.scroll_category() {
            Some(category) => self.dispatch_scroll(category, trigger, now),
            None => {
                if self.ordered_tx.send(trigger).is_err() {
                    warn!(?trigger, "Lifecycle worker stopped, event dropped");
                }
            }
        }
    }

    fn dispatch_scroll(&mut self, category: ScrollCategory, trigger: Trigger, now: Instant) {
        let (slot, debounce) = match category {
            ScrollCategory::System => (&mut self.system_slot, &mut self.system_debounce),
            ScrollCategory::Game => (&mut self.game_slot, &mut self.game_debounce),
        };
        let delay = self.timing.settle() + debounce.next_delay(now);
        let ticket = slot.begin();
        let generation = ticket.generation();

        let source = Arc::clone(&self.source);
        let timing = self.timing.clone();
        let tx = self.tx.clone();

        tokio::spawn(async move {
            if !ticket.sleep(delay).await {
                return;
            }
            match read_event(source.as_ref(), trigger, &timing, ticket.token()).await {
                Some(event) if !ticket.is_cancelled() => {
                    let _ = tx.send(EngineMessage::Ingested {
                        ticket: IngestTicket::Scroll {
                            category,
                            generation,
                        },
                        event,
                    });
                }
                Some(_) => {}
                None if ticket.is_cancelled() => {}
                None => warn!(?trigger, "Scroll abandoned, event files incomplete"),
            }
        });
    }

    /// Decide whether an ingested event reaches the state machine
    ///
    /// Applies the stale-generation check for scrolls and the suppression
    /// rules, and records the timing facts those rules depend on.
    pub fn accept(
        &mut self,
        ticket: IngestTicket,
        event: ExternalEvent,
        state: &AppState,
    ) -> Option<ExternalEvent> {
        if let IngestTicket::Scroll {
            category,
            generation,
        } = ticket
        {
            let slot = match category {
                ScrollCategory::System => &mut self.system_slot,
                ScrollCategory::Game => &mut self.game_slot,
            };
            if !slot.finish(generation) {
                debug!(event = event.name(), generation, "Stale scroll discarded");
                return None;
            }
        }

        let now = Instant::now();

        if event.is_scroll() {
            if let Some(until) = self.handoff_until {
                if now < until {
                    debug!(event = event.name(), "Scroll suppressed during game-start hand-off");
                    return None;
                }
                self.handoff_until = None;
            }
            if state.is_screensaver() {
                debug!(event = event.name(), "Scroll suppressed during screensaver");
                return None;
            }
            if matches!(event, ExternalEvent::GameScrolled { .. }) {
                if let Some(started) = self.last_game_started {
                    if now.saturating_duration_since(started) < self.timing.post_launch_window() {
                        debug!("Game scroll suppressed right after game start");
                        return None;
                    }
                }
            }
        }

        match &event {
            ExternalEvent::ScreensaverEnded {
                reason: ScreensaverEndReason::GameStart,
            } => {
                self.handoff_until = Some(now + self.timing.handoff_window());
            }
            ExternalEvent::GameStarted { .. } => {
                self.handoff_until = None;
                self.last_game_started = Some(now);
            }
            // Browsing resumes immediately after a game exits, however short it ran
            ExternalEvent::GameEnded { .. } => {
                self.last_game_started = None;
            }
            _ => {}
        }

        Some(event)
    }

    /// Whether scrolls are currently being dropped for a game-start hand-off
    pub fn in_handoff(&self) -> bool {
        self.handoff_until
            .map(|until| Instant::now() < until)
            .unwrap_or(false)
    }

    /// Cancel pending scroll reads
    pub fn cancel_pending(&mut self) {
        self.system_slot.cancel();
        self.game_slot.cancel();
    }
}

impl Drop for EventPipeline {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

async fn lifecycle_worker(
    source: Arc<dyn EventSource>,
    timing: IngestTiming,
    mut rx: mpsc::UnboundedReceiver<Trigger>,
    tx: EngineSender,
    shutdown: CancellationToken,
) {
    loop {
        let trigger = tokio::select! {
            _ = shutdown.cancelled() => break,
            next = rx.recv() => match next {
                Some(trigger) => trigger,
                None => break,
            },
        };

        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = tokio::time::sleep(timing.settle()) => {}
        }

        match read_event(source.as_ref(), trigger, &timing, &shutdown).await {
            Some(event) => {
                if tx
                    .send(EngineMessage::Ingested {
                        ticket: IngestTicket::Ordered,
                        event,
                    })
                    .is_err()
                {
                    break;
                }
            }
            None if shutdown.is_cancelled() => break,
            None => warn!(?trigger, "Event abandoned, event files incomplete"),
        }
    }
    trace!("Lifecycle worker stopped");
}

/// Read the files for one trigger into a typed event
///
/// Required values are retried; optional ones (display names) are read once.
async fn read_event(
    source: &dyn EventSource,
    trigger: Trigger,
    timing: &IngestTiming,
    cancel: &CancellationToken,
) -> Option<ExternalEvent> {
    let event = match trigger {
        Trigger::SystemScroll => ExternalEvent::SystemScrolled {
            system_name: read_required(source, EventFile::SystemName, timing, cancel).await?,
        },
        Trigger::GameScroll => {
            let game_filename = read_required(source, EventFile::GameFilename, timing, cancel).await?;
            let system_name = read_required(source, EventFile::GameSystem, timing, cancel).await?;
            ExternalEvent::GameScrolled {
                system_name,
                game_filename,
                game_name: source.read(EventFile::GameName),
            }
        }
        Trigger::GameStart => {
            let game_filename =
                read_required(source, EventFile::GameStartFilename, timing, cancel).await?;
            let system_name =
                read_required(source, EventFile::GameStartSystem, timing, cancel).await?;
            ExternalEvent::GameStarted {
                system_name,
                game_filename,
            }
        }
        Trigger::GameEnd => {
            let game_filename =
                read_required(source, EventFile::GameEndFilename, timing, cancel).await?;
            let system_name = read_required(source, EventFile::GameEndSystem, timing, cancel).await?;
            ExternalEvent::GameEnded {
                system_name,
                game_filename,
                game_name: source.read(EventFile::GameEndName),
            }
        }
        Trigger::ScreensaverStart => ExternalEvent::ScreensaverStarted,
        Trigger::ScreensaverEnd => {
            let reason = match read_required(source, EventFile::ScreensaverEnd, timing, cancel).await {
                Some(reason) => ScreensaverEndReason::parse(&reason),
                None if cancel.is_cancelled() => return None,
                None => {
                    warn!("Screensaver end reason missing, treating as cancel");
                    ScreensaverEndReason::Cancel
                }
            };
            ExternalEvent::ScreensaverEnded { reason }
        }
        Trigger::ScreensaverGameSelect => {
            let game_filename =
                read_required(source, EventFile::ScreensaverGameFilename, timing, cancel).await?;
            let system_name =
                read_required(source, EventFile::ScreensaverGameSystem, timing, cancel).await?;
            ExternalEvent::ScreensaverGameSelected(ScreensaverGame {
                system_name,
                game_filename,
                game_name: source.read(EventFile::ScreensaverGameName),
            })
        }
    };
    Some(event)
}

/// Read a file that must be present, retrying while the frontend finishes writing
async fn read_required(
    source: &dyn EventSource,
    file: EventFile,
    timing: &IngestTiming,
    cancel: &CancellationToken,
) -> Option<String> {
    let attempts = timing.retry_attempts.max(1);
    for attempt in 1..=attempts {
        if let Some(value) = source.read(file) {
            return Some(value);
        }
        if attempt == attempts {
            break;
        }
        trace!(file = file.file_name(), attempt, "Event file not ready, retrying");
        tokio::select! {
            _ = cancel.cancelled() => return None,
            _ = tokio::time::sleep(timing.retry_spacing()) => {}
        }
    }
    warn!(file = file.file_name(), attempts, "Event file missing after retries");
    None
}
