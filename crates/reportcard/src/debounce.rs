//! Preview coalescing
//!
//! Live previews regenerate the whole document, so a burst of edits
//! should produce one run, not one per keystroke. The debouncer is
//! cooperative: callers report edits with [`signal`](Debouncer::signal)
//! and poll [`due`](Debouncer::due); there is no timer thread and no
//! mid-pipeline cancellation — a due debouncer means "re-run the whole
//! pipeline now".

use std::time::{Duration, Instant};

/// Trailing-edge debouncer over caller-supplied clocks
#[derive(Debug)]
pub struct Debouncer {
    delay: Duration,
    pending_since: Option<Instant>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending_since: None,
        }
    }

    /// Report an edit; restarts the pending deadline
    pub fn signal(&mut self, now: Instant) {
        self.pending_since = Some(now);
    }

    /// Whether the quiet period has elapsed; clears the pending state
    /// when it has
    pub fn due(&mut self, now: Instant) -> bool {
        match self.pending_since {
            Some(since) if now.duration_since(since) >= self.delay => {
                self.pending_since = None;
                true
            }
            _ => false,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending_since.is_some()
    }
}
