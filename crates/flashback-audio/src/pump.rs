use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{self, Duration};

use crate::batch::BatchReader;
use crate::preroll::PrerollBuffer;
use crate::{CapturedFrame, FRAME_SIZE_SAMPLES};

#[derive(Debug, Clone, Copy)]
pub struct PumpConfig {
    pub frame_size_samples: usize,
}

impl Default for PumpConfig {
    fn default() -> Self {
        Self {
            frame_size_samples: FRAME_SIZE_SAMPLES,
        }
    }
}

/// The capture loop: the single writer of the pre-roll window and the single
/// producer of the live frame stream.
///
/// Drains the transport ring, cuts fixed-size mono frames, stamps each with a
/// strictly monotonic sequence index, then forwards every frame exactly once
/// to the pre-roll buffer and exactly once onto the broadcast stream, in that
/// order. The push-then-send order is what makes the controller's
/// subscribe-then-snapshot handshake seamless: anything missing from a
/// snapshot is guaranteed to arrive on the stream.
pub struct FramePump {
    batch_reader: BatchReader,
    preroll: Arc<Mutex<PrerollBuffer>>,
    live_tx: broadcast::Sender<CapturedFrame>,
    cfg: PumpConfig,
    running: Arc<AtomicBool>,
}

impl FramePump {
    pub fn new(
        batch_reader: BatchReader,
        preroll: Arc<Mutex<PrerollBuffer>>,
        live_tx: broadcast::Sender<CapturedFrame>,
        cfg: PumpConfig,
    ) -> Self {
        Self {
            batch_reader,
            preroll,
            live_tx,
            cfg,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn spawn(self) -> JoinHandle<()> {
        self.running.store(true, Ordering::SeqCst);
        let running = self.running.clone();
        let mut worker = PumpWorker {
            batch_reader: self.batch_reader,
            preroll: self.preroll,
            live_tx: self.live_tx,
            frame_size: self.cfg.frame_size_samples,
            accumulator: VecDeque::new(),
            next_seq: 0,
        };

        tokio::spawn(async move {
            worker.run(running).await;
        })
    }
}

struct PumpWorker {
    batch_reader: BatchReader,
    preroll: Arc<Mutex<PrerollBuffer>>,
    live_tx: broadcast::Sender<CapturedFrame>,
    frame_size: usize,
    accumulator: VecDeque<i16>,
    next_seq: u64,
}

impl PumpWorker {
    async fn run(&mut self, running: Arc<AtomicBool>) {
        tracing::info!("Frame pump started");

        while running.load(Ordering::SeqCst) {
            if let Some(batch) = self.batch_reader.read_batch(4096) {
                self.accumulator.extend(batch);
                self.emit_ready_frames();
            } else {
                // At 16 kHz a 512-sample frame lands every 32 ms; polling at
                // 25 ms checks at least once per frame period without busy
                // spinning.
                time::sleep(Duration::from_millis(25)).await;
            }
        }

        tracing::info!("Frame pump stopped");
    }

    fn emit_ready_frames(&mut self) {
        while self.accumulator.len() >= self.frame_size {
            let samples: Vec<i16> = self.accumulator.drain(..self.frame_size).collect();
            let frame = CapturedFrame {
                seq: self.next_seq,
                samples: Arc::from(samples),
                sample_rate: self.batch_reader.sample_rate(),
            };
            self.next_seq += 1;

            // Pre-roll first, stream second. Snapshot readers rely on this
            // order at the seam.
            self.preroll.lock().push(frame.clone());
            if self.live_tx.send(frame).is_err() {
                tracing::trace!("No live-stream subscribers");
            }
        }
    }
}
