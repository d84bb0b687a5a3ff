// Lectern - app/debounce.rs
//
// Coalesce bursts of triggers into one action after a quiet period.
//
// Pure timing: the caller supplies `Instant`s and decides when to ask for the
// payload, so the same primitive works from a UI frame loop or a test.

use std::time::{Duration, Instant};

/// A single-shot timer that re-arming cancels and replaces.
#[derive(Debug)]
pub struct Debouncer<T> {
    delay: Duration,
    pending: Option<(Instant, T)>,
}

impl<T> Debouncer<T> {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: None,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Schedule `payload` for `now + delay`, dropping whatever was pending.
    pub fn arm(&mut self, now: Instant, payload: T) {
        self.pending = Some((now + self.delay, payload));
    }

    /// Drop the pending payload, if any. Returns it.
    pub fn cancel(&mut self) -> Option<T> {
        self.pending.take().map(|(_, payload)| payload)
    }

    pub fn is_armed(&self) -> bool {
        self.pending.is_some()
    }

    /// Time left before the pending payload is due; `None` when disarmed.
    pub fn time_remaining(&self, now: Instant) -> Option<Duration> {
        self.pending
            .as_ref()
            .map(|(deadline, _)| deadline.saturating_duration_since(now))
    }

    /// Take the payload once its deadline has passed. Disarms the timer.
    pub fn take_due(&mut self, now: Instant) -> Option<T> {
        let due = self
            .pending
            .as_ref()
            .is_some_and(|(deadline, _)| now >= *deadline);
        if due {
            self.cancel()
        } else {
            None
        }
    }
}
