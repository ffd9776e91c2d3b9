use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Detects a stalled audio stream. The cpal callback feeds the timer on every
/// buffer; if no feed arrives within the timeout the capture thread treats the
/// stream as dead and goes through its restart path.
#[derive(Clone)]
pub struct WatchdogTimer {
    timeout: Duration,
    last_feed: Arc<Mutex<Instant>>,
    triggered: Arc<AtomicBool>,
}

impl WatchdogTimer {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            last_feed: Arc::new(Mutex::new(Instant::now())),
            triggered: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Reset the deadline. Called from the audio callback; must stay cheap.
    pub fn feed(&self) {
        *self.last_feed.lock() = Instant::now();
        self.triggered.store(false, Ordering::SeqCst);
    }

    /// Re-arm after a stream restart.
    pub fn rearm(&self) {
        self.feed();
    }

    /// Check the deadline. Called periodically from the capture thread's
    /// supervision loop; latches `triggered` until the next feed or rearm.
    pub fn poll(&self) -> bool {
        let elapsed = self.last_feed.lock().elapsed();
        if elapsed > self.timeout && !self.triggered.load(Ordering::SeqCst) {
            tracing::error!("Watchdog timeout: no audio data for {:?}", elapsed);
            self.triggered.store(true, Ordering::SeqCst);
        }
        self.triggered.load(Ordering::SeqCst)
    }

    pub fn is_triggered(&self) -> bool {
        self.triggered.load(Ordering::SeqCst)
    }
}
