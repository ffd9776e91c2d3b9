use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use flashback_audio::{CapturedFrame, PrerollBuffer};

use super::span::RecordingSpan;
use crate::trigger::TriggerEvent;

/// Capture sequence states. No terminal state: the machine cycles
/// `Idle -> Snapshotting -> PostRoll -> Flushing -> Idle` until shutdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    Idle,
    Snapshotting,
    PostRoll,
    Flushing,
}

fn transition_is_valid(from: CaptureState, to: CaptureState) -> bool {
    use CaptureState::*;
    matches!(
        (from, to),
        (Idle, Snapshotting)
            | (Snapshotting, PostRoll)
            | (Snapshotting, Idle)
            | (PostRoll, Flushing)
            | (PostRoll, Idle)
            | (Flushing, Idle)
    )
}

#[derive(Debug, Clone, Copy)]
pub struct ControllerConfig {
    pub post_roll_secs: u32,
    /// The negotiated capture rate; post-roll length is measured against this
    /// in samples, never wall clock.
    pub sample_rate: u32,
}

/// The trigger-to-snapshot state machine.
///
/// On a trigger while `Idle` it subscribes to the live stream *first*, then
/// snapshots the pre-roll window. The pump pushes to the pre-roll buffer
/// before broadcasting, so every frame is either in the snapshot or will
/// arrive on the subscription; frames that show up in both are deduplicated by
/// sequence index. The result is a span with no gap and no overlap at the
/// seam, without ever pausing capture.
///
/// At most one capture is in flight: triggers arriving in any other state are
/// coalesced (logged and dropped), by the state guard rather than ad hoc
/// flags.
pub struct SnapshotController {
    preroll: Arc<Mutex<PrerollBuffer>>,
    live_tx: broadcast::Sender<CapturedFrame>,
    trigger_rx: mpsc::Receiver<TriggerEvent>,
    writer_tx: mpsc::Sender<RecordingSpan>,
    cfg: ControllerConfig,
    state: CaptureState,
}

impl SnapshotController {
    pub fn new(
        preroll: Arc<Mutex<PrerollBuffer>>,
        live_tx: broadcast::Sender<CapturedFrame>,
        trigger_rx: mpsc::Receiver<TriggerEvent>,
        writer_tx: mpsc::Sender<RecordingSpan>,
        cfg: ControllerConfig,
    ) -> Self {
        Self {
            preroll,
            live_tx,
            trigger_rx,
            writer_tx,
            cfg,
            state: CaptureState::Idle,
        }
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    async fn run(mut self) {
        tracing::info!(
            "Snapshot controller ready (post-roll {}s at {} Hz)",
            self.cfg.post_roll_secs,
            self.cfg.sample_rate
        );

        while let Some(TriggerEvent) = self.trigger_rx.recv().await {
            self.capture_once().await;
        }

        tracing::info!("Snapshot controller stopped (trigger sources gone)");
    }

    async fn capture_once(&mut self) {
        self.transition(CaptureState::Snapshotting);

        // Subscribe before snapshotting; see the type-level comment.
        let mut live_rx = self.live_tx.subscribe();
        let snapshot = self.preroll.lock().snapshot();
        let snapshot_tail = snapshot.last().map(|f| f.seq);
        let mut span = RecordingSpan::from_snapshot(snapshot, self.cfg.sample_rate);
        tracing::info!(
            "Trigger accepted: {:.1}s of pre-roll snapshotted, recording {}s of post-roll",
            span.duration_secs(),
            self.cfg.post_roll_secs
        );

        self.transition(CaptureState::PostRoll);
        let needed_samples = self.cfg.post_roll_secs as usize * self.cfg.sample_rate as usize;
        let mut appended_samples = 0usize;

        let completed = loop {
            tokio::select! {
                frame = live_rx.recv() => match frame {
                    Ok(frame) => {
                        // Seam dedup: already part of the snapshot.
                        if snapshot_tail.is_some_and(|tail| frame.seq <= tail) {
                            continue;
                        }
                        appended_samples += frame.len();
                        span.append(frame);
                        if appended_samples >= needed_samples {
                            break true;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        tracing::warn!(
                            "Live stream lagged by {} frames during post-roll; dropping span",
                            missed
                        );
                        break false;
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        tracing::warn!("Live stream closed during post-roll; dropping span");
                        break false;
                    }
                },
                Some(TriggerEvent) = self.trigger_rx.recv() => {
                    tracing::info!("Trigger ignored: capture already in progress (PostRoll)");
                }
            }
        };

        if completed {
            self.transition(CaptureState::Flushing);
            if !span.is_contiguous() {
                tracing::error!("Assembled span has a sequence gap; dropping");
            } else {
                tracing::info!(
                    "Span complete: {:.1}s across {} frames",
                    span.duration_secs(),
                    span.frame_count()
                );
                if let Err(e) = self.writer_tx.try_send(span) {
                    // Writer backlogged or gone. The save is best-effort;
                    // capture must not stall behind it.
                    tracing::error!("Could not hand span to writer: {}", e);
                }
            }
        }

        // Triggers queued while busy are stale; coalesce them before idling.
        while self.trigger_rx.try_recv().is_ok() {
            tracing::info!("Trigger ignored: capture already in progress ({:?})", self.state);
        }

        self.transition(CaptureState::Idle);
    }

    fn transition(&mut self, to: CaptureState) {
        if !transition_is_valid(self.state, to) {
            tracing::error!("Invalid capture transition: {:?} -> {:?}", self.state, to);
        } else {
            tracing::debug!("Capture state: {:?} -> {:?}", self.state, to);
        }
        self.state = to;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use CaptureState::*;

    #[test]
    fn capture_cycle_transitions_are_valid() {
        assert!(transition_is_valid(Idle, Snapshotting));
        assert!(transition_is_valid(Snapshotting, PostRoll));
        assert!(transition_is_valid(PostRoll, Flushing));
        assert!(transition_is_valid(Flushing, Idle));
    }

    #[test]
    fn abort_paths_return_to_idle() {
        assert!(transition_is_valid(PostRoll, Idle));
        assert!(transition_is_valid(Snapshotting, Idle));
    }

    #[test]
    fn no_skipping_or_reversal() {
        assert!(!transition_is_valid(Idle, PostRoll));
        assert!(!transition_is_valid(Idle, Flushing));
        assert!(!transition_is_valid(Flushing, PostRoll));
        assert!(!transition_is_valid(PostRoll, Snapshotting));
    }
}
