//! Adaptive scroll debounce
//!
//! Fast scrolling (signals closer together than a threshold) waits longer
//! before reading, so only the final position triggers media work. Slow,
//! deliberate scrolling responds immediately.

use std::time::Duration;

use scd_common::config::IngestTiming;
use tokio::time::Instant;

#[derive(Debug, Clone)]
pub struct ScrollDebounce {
    fast_threshold: Duration,
    fast_delay: Duration,
    slow_delay: Duration,
    last: Option<Instant>,
}

impl ScrollDebounce {
    pub fn new(fast_threshold: Duration, fast_delay: Duration, slow_delay: Duration) -> Self {
        Self {
            fast_threshold,
            fast_delay,
            slow_delay,
            last: None,
        }
    }

    pub fn system(timing: &IngestTiming) -> Self {
        Self::new(
            Duration::from_millis(timing.system_fast_scroll_ms),
            Duration::from_millis(timing.system_fast_delay_ms),
            Duration::from_millis(timing.system_slow_delay_ms),
        )
    }

    pub fn game(timing: &IngestTiming) -> Self {
        Self::new(
            Duration::from_millis(timing.game_fast_scroll_ms),
            Duration::from_millis(timing.game_fast_delay_ms),
            Duration::from_millis(timing.game_slow_delay_ms),
        )
    }

    /// Record a scroll signal at `now` and return the delay before reading
    pub fn next_delay(&mut self, now: Instant) -> Duration {
        let fast = self
            .last
            .map(|last| now.saturating_duration_since(last) < self.fast_threshold)
            .unwrap_or(false);
        self.last = Some(now);
        if fast {
            self.fast_delay
        } else {
            self.slow_delay
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_scroll_is_slow() {
        let mut debounce = ScrollDebounce::game(&IngestTiming::default());
        assert_eq!(debounce.next_delay(Instant::now()), Duration::ZERO);
    }

    #[test]
    fn test_rapid_scroll_uses_fast_delay() {
        let mut debounce = ScrollDebounce::new(
            Duration::from_millis(150),
            Duration::from_millis(30),
            Duration::ZERO,
        );
        let start = Instant::now();
        debounce.next_delay(start);
        assert_eq!(
            debounce.next_delay(start + Duration::from_millis(100)),
            Duration::from_millis(30)
        );
        // A pause longer than the threshold goes back to immediate response
        assert_eq!(
            debounce.next_delay(start + Duration::from_millis(400)),
            Duration::ZERO
        );
    }
}
