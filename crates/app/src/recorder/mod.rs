pub mod controller;
pub mod span;
pub mod writer;

pub use controller::{CaptureState, ControllerConfig, SnapshotController};
pub use span::RecordingSpan;
pub use writer::{spawn_writer, WriterConfig};
