#[cfg(unix)]
pub mod alsa_quiet;
pub mod batch;
pub mod capture;
pub mod device;
pub mod preroll;
pub mod pump;
pub mod transport;
pub mod watchdog;

// Public API
pub use batch::BatchReader;
pub use capture::{CaptureThread, DeviceConfig};
pub use device::{DeviceInfo, DeviceManager};
pub use preroll::PrerollBuffer;
pub use pump::{FramePump, PumpConfig};
pub use transport::SampleRing;
pub use watchdog::WatchdogTimer;

use std::sync::Arc;

/// Samples per frame emitted by the pump. 512 samples is ~32 ms at 16 kHz.
pub const FRAME_SIZE_SAMPLES: usize = 512;

/// One fixed-size chunk of mono 16-bit audio, immutable once produced.
///
/// `seq` is assigned by the pump and is strictly monotonic for the life of the
/// process, so the seam between a pre-roll snapshot and live post-roll frames
/// can be checked for gaps and overlaps by sequence alone.
#[derive(Debug, Clone)]
pub struct CapturedFrame {
    pub seq: u64,
    pub samples: Arc<[i16]>,
    pub sample_rate: u32,
}

impl CapturedFrame {
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration_secs(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }
}
