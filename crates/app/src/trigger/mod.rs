pub mod debounce;
pub mod keyboard;

use tokio::sync::mpsc;

pub use debounce::Debouncer;

/// A single "fire now" instant. Carries no payload; all sources are treated
/// identically once their events land on the merged channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TriggerEvent;

/// Sender half handed to every trigger source (keyboard, GPIO adapter, test
/// injectors). Cloning the sender is how sources are merged.
pub type TriggerSender = mpsc::Sender<TriggerEvent>;

pub fn channel() -> (TriggerSender, mpsc::Receiver<TriggerEvent>) {
    // Small buffer: bursts beyond this are stale triggers by definition.
    mpsc::channel(8)
}
