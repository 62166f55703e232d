//! Poll bookkeeping: attempt counter, backoff, and log refresh cadence.

use std::time::Duration;

use tokio::time::Instant;

/// Minimum time between two log refreshes of an in-flight execution.
pub const LOG_POLL_INTERVAL: Duration = Duration::from_millis(2000);

const FAST_INTERVAL: Duration = Duration::from_millis(250);
const MEDIUM_INTERVAL: Duration = Duration::from_millis(500);
const SLOW_INTERVAL: Duration = Duration::from_millis(1000);

/// Delay before the next status poll after `attempts` in-flight polls.
///
/// Attempts 0-3 poll every 250 ms, 4-11 every 500 ms, and later attempts
/// every second.
#[must_use]
pub const fn polling_interval(attempts: u32) -> Duration {
    match attempts {
        0..4 => FAST_INTERVAL,
        4..12 => MEDIUM_INTERVAL,
        _ => SLOW_INTERVAL,
    }
}

#[derive(Debug, Default)]
pub(super) struct PollState {
    pub(super) attempts: u32,
    pub(super) last_log_poll: Option<Instant>,
    pub(super) polling: bool,
}

impl PollState {
    pub(super) fn logs_due(&self, now: Instant, terminal: bool) -> bool {
        terminal
            || self
                .last_log_poll
                .is_none_or(|last| now.saturating_duration_since(last) >= LOG_POLL_INTERVAL)
    }

    pub(super) const fn next_interval(&self) -> Duration {
        polling_interval(self.attempts)
    }

    pub(super) const fn record_attempt(&mut self) {
        self.attempts = self.attempts.saturating_add(1);
    }
}
