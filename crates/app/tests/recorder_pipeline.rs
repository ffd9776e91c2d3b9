//! End-to-end controller tests over a synthetic capture pipeline: frames are
//! produced directly into the pre-roll buffer and live stream the same way the
//! pump does (push first, then send), so no audio hardware is involved and all
//! durations are measured in audio time.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{broadcast, mpsc};

use flashback_app::recorder::{
    writer::write_span, ControllerConfig, RecordingSpan, SnapshotController,
};
use flashback_app::trigger::{self, TriggerEvent};
use flashback_audio::{CapturedFrame, PrerollBuffer, FRAME_SIZE_SAMPLES};

const RATE: u32 = 16_000;

struct SyntheticPipeline {
    preroll: Arc<Mutex<PrerollBuffer>>,
    live_tx: broadcast::Sender<CapturedFrame>,
    trigger_tx: trigger::TriggerSender,
    span_rx: mpsc::Receiver<RecordingSpan>,
    next_seq: u64,
}

impl SyntheticPipeline {
    fn start(pre_roll_secs: u32, post_roll_secs: u32) -> Self {
        let preroll = Arc::new(Mutex::new(PrerollBuffer::new(pre_roll_secs, RATE)));
        let (live_tx, _) = broadcast::channel(1024);
        let (trigger_tx, trigger_rx) = trigger::channel();
        let (span_tx, span_rx) = mpsc::channel(4);

        let controller = SnapshotController::new(
            preroll.clone(),
            live_tx.clone(),
            trigger_rx,
            span_tx,
            ControllerConfig {
                post_roll_secs,
                sample_rate: RATE,
            },
        );
        controller.spawn();

        Self {
            preroll,
            live_tx,
            trigger_tx,
            span_rx,
            next_seq: 0,
        }
    }

    /// Produce frames exactly the way the pump does: pre-roll push, then
    /// broadcast.
    fn feed_frames(&mut self, count: usize, fill: i16) {
        for _ in 0..count {
            let frame = CapturedFrame {
                seq: self.next_seq,
                samples: Arc::from(vec![fill; FRAME_SIZE_SAMPLES]),
                sample_rate: RATE,
            };
            self.next_seq += 1;
            self.preroll.lock().push(frame.clone());
            let _ = self.live_tx.send(frame);
        }
    }

    async fn fire_trigger(&self) {
        self.trigger_tx.send(TriggerEvent).await.unwrap();
        // Give the controller time to snapshot and enter post-roll before the
        // caller feeds post-trigger audio.
        tokio::time::sleep(Duration::from_millis(200)).await;
    }

    async fn expect_span(&mut self) -> RecordingSpan {
        tokio::time::timeout(Duration::from_secs(2), self.span_rx.recv())
            .await
            .expect("span within timeout")
            .expect("controller alive")
    }

    async fn expect_no_span(&mut self) {
        let got = tokio::time::timeout(Duration::from_millis(500), self.span_rx.recv()).await;
        assert!(got.is_err(), "unexpected extra span");
    }
}

fn frames_for_secs(secs: u32) -> usize {
    // Smallest frame count covering `secs` of audio.
    ((secs as usize * RATE as usize) + FRAME_SIZE_SAMPLES - 1) / FRAME_SIZE_SAMPLES
}

fn assert_contiguous_seqs(span: &RecordingSpan) {
    assert!(span.is_contiguous(), "span has seq gaps or repeats");
}

#[tokio::test]
async fn short_history_yields_elapsed_plus_post_roll() {
    // Trigger before the 30s window has filled: only 10s elapsed, so the span
    // covers [T-10s, T+10s], not [T-30s, T+10s].
    let mut pipe = SyntheticPipeline::start(30, 10);
    let pre_frames = frames_for_secs(10);
    pipe.feed_frames(pre_frames, 3);

    pipe.fire_trigger().await;
    let post_frames = frames_for_secs(10);
    pipe.feed_frames(post_frames, 4);

    let span = pipe.expect_span().await;
    assert_contiguous_seqs(&span);
    assert_eq!(
        span.total_samples(),
        (pre_frames + post_frames) * FRAME_SIZE_SAMPLES
    );
    // ~20s, never 40s.
    assert!((span.duration_secs() - 20.0).abs() < 0.1);
}

#[tokio::test]
async fn silence_then_tone_scenario() {
    // 5s capacity, 3s of silence pushed, trigger, 2s of tone: the result is
    // 3s silence followed by 2s tone, 5s total.
    let mut pipe = SyntheticPipeline::start(5, 2);
    let silence_frames = frames_for_secs(3);
    pipe.feed_frames(silence_frames, 0);

    pipe.fire_trigger().await;
    let tone_frames = frames_for_secs(2);
    pipe.feed_frames(tone_frames, 1000);

    let span = pipe.expect_span().await;
    assert_contiguous_seqs(&span);
    assert!((span.duration_secs() - 5.0).abs() < 0.1);

    // Silence strictly before the seam, tone strictly after. The seam is
    // located from the post-roll side: feeding 3s as whole frames slightly
    // overfills the 5s window, so the oldest silence frame may be evicted.
    let samples: Vec<i16> = span.iter_samples().collect();
    let pre_samples = span.total_samples() - tone_frames * FRAME_SIZE_SAMPLES;
    assert!(pre_samples <= silence_frames * FRAME_SIZE_SAMPLES);
    assert!(samples[..pre_samples].iter().all(|&s| s == 0));
    assert!(samples[pre_samples..].iter().all(|&s| s == 1000));
}

#[tokio::test]
async fn pre_roll_is_capped_at_the_window() {
    // 13s reach the pipeline before the trigger but only the newest 5s can
    // appear in the span.
    let mut pipe = SyntheticPipeline::start(5, 2);
    pipe.feed_frames(frames_for_secs(13), 42);

    pipe.fire_trigger().await;
    let post_frames = frames_for_secs(2);
    pipe.feed_frames(post_frames, 43);

    let span = pipe.expect_span().await;
    assert_contiguous_seqs(&span);

    let capacity_samples = 5 * RATE as usize;
    let pre_samples = span.total_samples() - post_frames * FRAME_SIZE_SAMPLES;
    assert!(pre_samples <= capacity_samples);
    // Within one frame of the full window: eviction removes no more than
    // necessary.
    assert!(pre_samples > capacity_samples - FRAME_SIZE_SAMPLES);
}

#[tokio::test]
async fn triggers_during_capture_are_coalesced() {
    let mut pipe = SyntheticPipeline::start(5, 1);
    pipe.feed_frames(frames_for_secs(2), 7);

    pipe.fire_trigger().await;
    // Two more triggers while the first capture is in post-roll.
    pipe.trigger_tx.send(TriggerEvent).await.unwrap();
    pipe.trigger_tx.send(TriggerEvent).await.unwrap();
    pipe.feed_frames(frames_for_secs(1), 8);

    let span = pipe.expect_span().await;
    assert_contiguous_seqs(&span);
    pipe.expect_no_span().await;

    // Back in Idle, a fresh trigger produces a fresh span.
    pipe.fire_trigger().await;
    pipe.feed_frames(frames_for_secs(1), 9);
    let second = pipe.expect_span().await;
    assert_contiguous_seqs(&second);
    assert!(second.last_seq() > span.last_seq());
}

#[tokio::test]
async fn trigger_with_empty_buffer_still_records_post_roll() {
    let mut pipe = SyntheticPipeline::start(30, 1);

    pipe.fire_trigger().await;
    let post_frames = frames_for_secs(1);
    pipe.feed_frames(post_frames, 5);

    let span = pipe.expect_span().await;
    assert_eq!(span.total_samples(), post_frames * FRAME_SIZE_SAMPLES);
    assert_contiguous_seqs(&span);
}

#[tokio::test]
async fn span_round_trips_through_wav_bit_exact() {
    let mut pipe = SyntheticPipeline::start(5, 1);

    // A deterministic non-trivial waveform split across pre and post roll.
    let pre_frames = frames_for_secs(2);
    pipe.feed_frames(pre_frames, -12_345);
    pipe.fire_trigger().await;
    let post_frames = frames_for_secs(1);
    pipe.feed_frames(post_frames, 23_456);

    let span = pipe.expect_span().await;
    let expected: Vec<i16> = span.iter_samples().collect();

    let tmp = tempfile::tempdir().unwrap();
    let path = write_span(tmp.path(), &span, chrono::Local::now()).unwrap();

    let mut reader = hound::WavReader::open(&path).unwrap();
    let spec = reader.spec();
    assert_eq!(spec.channels, 1);
    assert_eq!(spec.sample_rate, RATE);
    assert_eq!(spec.bits_per_sample, 16);
    let read_back: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();
    assert_eq!(read_back, expected);
}
