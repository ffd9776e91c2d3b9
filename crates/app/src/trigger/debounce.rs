use std::time::{Duration, Instant};

/// Collapses a burst of raw activations into one event.
///
/// Every trigger source runs its raw edges through one of these so switch
/// bounce and key autorepeat never reach the snapshot controller. The first
/// activation passes; anything inside the window after an accepted event is
/// rejected and restarts nothing.
#[derive(Debug)]
pub struct Debouncer {
    window: Duration,
    last_accepted: Option<Instant>,
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_accepted: None,
        }
    }

    /// Returns true when the activation at `at` should produce an event.
    pub fn accept(&mut self, at: Instant) -> bool {
        match self.last_accepted {
            Some(last) if at.duration_since(last) < self.window => false,
            _ => {
                self.last_accepted = Some(at);
                true
            }
        }
    }
}
