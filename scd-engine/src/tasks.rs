//! Cancellable deferred tasks
//!
//! Every suspension point in the engine (settle and debounce delays, read
//! retries, the scheduled video start, fade ticks) runs as a spawned task
//! holding a `TaskTicket` issued by a `TaskSlot`. Starting new work in a slot
//! cancels the previous ticket.
//!
//! Cancellation alone is not enough: a task may already have posted its result
//! when the slot moves on. Results therefore carry the ticket's generation and
//! the engine loop applies them only while `TaskSlot::is_current` holds.

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::trace;

/// Handle given to one deferred task
#[derive(Debug, Clone)]
pub struct TaskTicket {
    generation: u64,
    token: CancellationToken,
}

impl TaskTicket {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Sleep unless cancelled first
    ///
    /// Returns `false` when the ticket was cancelled, in which case the task
    /// should return without posting anything.
    pub async fn sleep(&self, duration: Duration) -> bool {
        if duration.is_zero() {
            return !self.token.is_cancelled();
        }
        tokio::select! {
            _ = self.token.cancelled() => false,
            _ = tokio::time::sleep(duration) => !self.token.is_cancelled(),
        }
    }
}

/// One category of deferred work where only the newest task may apply
#[derive(Debug)]
pub struct TaskSlot {
    name: &'static str,
    parent: CancellationToken,
    next_generation: u64,
    active: Option<(u64, CancellationToken)>,
}

impl TaskSlot {
    /// Create a slot whose tasks are also cancelled by `parent` (engine shutdown)
    pub fn new(name: &'static str, parent: &CancellationToken) -> Self {
        Self {
            name,
            parent: parent.clone(),
            next_generation: 0,
            active: None,
        }
    }

    /// Cancel the in-flight task, if any, and issue a ticket for a new one
    pub fn begin(&mut self) -> TaskTicket {
        self.cancel();
        self.next_generation += 1;
        let token = self.parent.child_token();
        self.active = Some((self.next_generation, token.clone()));
        trace!(slot = self.name, generation = self.next_generation, "Task started");
        TaskTicket {
            generation: self.next_generation,
            token,
        }
    }

    /// Cancel the in-flight task; its result will be discarded if already posted
    pub fn cancel(&mut self) {
        if let Some((generation, token)) = self.active.take() {
            trace!(slot = self.name, generation, "Task cancelled");
            token.cancel();
        }
    }

    /// Whether a result from `generation` may still be applied
    pub fn is_current(&self, generation: u64) -> bool {
        matches!(self.active, Some((g, _)) if g == generation)
    }

    /// Retire the ticket after its final result was applied
    ///
    /// Periodic tasks (fade tickers) stop at their next wake-up. Returns
    /// `false` (and changes nothing) for a stale generation.
    pub fn finish(&mut self, generation: u64) -> bool {
        if !self.is_current(generation) {
            return false;
        }
        if let Some((_, token)) = self.active.take() {
            token.cancel();
        }
        true
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl Drop for TaskSlot {
    fn drop(&mut self) {
        self.cancel();
    }
}
