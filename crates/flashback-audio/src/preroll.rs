use std::collections::VecDeque;

use crate::CapturedFrame;

/// Fixed-capacity pre-roll window over the most recent frames.
///
/// Capacity is expressed in samples (`capacity_seconds × sample_rate`) and
/// enforced frame-granularly: pushing a frame that would exceed the window
/// evicts the minimum number of oldest frames, strict FIFO. The pump is the
/// only writer; readers get a point-in-time copy via [`snapshot`], never a
/// live view, so a short lock around either operation is all the
/// synchronization required.
///
/// [`snapshot`]: PrerollBuffer::snapshot
pub struct PrerollBuffer {
    frames: VecDeque<CapturedFrame>,
    stored_samples: usize,
    capacity_samples: usize,
}

impl PrerollBuffer {
    pub fn new(capacity_seconds: u32, sample_rate: u32) -> Self {
        let capacity_samples = capacity_seconds as usize * sample_rate as usize;
        Self {
            frames: VecDeque::new(),
            stored_samples: 0,
            capacity_samples,
        }
    }

    /// Append a frame, evicting oldest frames first if the window would
    /// overflow. Bounded time: at most a handful of pop_front calls.
    pub fn push(&mut self, frame: CapturedFrame) {
        self.stored_samples += frame.len();
        self.frames.push_back(frame);
        while self.stored_samples > self.capacity_samples {
            match self.frames.pop_front() {
                Some(evicted) => self.stored_samples -= evicted.len(),
                None => break,
            }
        }
    }

    /// Point-in-time, time-ordered copy of the stored frames. Frame payloads
    /// are `Arc`-shared, so this is O(frame count) pointer clones and safe to
    /// hand to another task with no further synchronization.
    ///
    /// Before the window has filled this returns fewer than `capacity`
    /// seconds; that is valid, not an error.
    pub fn snapshot(&self) -> Vec<CapturedFrame> {
        self.frames.iter().cloned().collect()
    }

    /// Sequence index of the newest stored frame, if any.
    pub fn last_seq(&self) -> Option<u64> {
        self.frames.back().map(|f| f.seq)
    }

    pub fn stored_samples(&self) -> usize {
        self.stored_samples
    }

    pub fn capacity_samples(&self) -> usize {
        self.capacity_samples
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn frame(seq: u64, n_samples: usize) -> CapturedFrame {
        CapturedFrame {
            seq,
            samples: Arc::from(vec![seq as i16; n_samples]),
            sample_rate: 16_000,
        }
    }

    #[test]
    fn partial_buffer_snapshot_is_short_not_an_error() {
        let mut buf = PrerollBuffer::new(30, 16_000);
        buf.push(frame(0, 512));
        buf.push(frame(1, 512));

        let snap = buf.snapshot();
        assert_eq!(snap.len(), 2);
        assert_eq!(buf.stored_samples(), 1024);
        assert!(buf.stored_samples() < buf.capacity_samples());
    }

    #[test]
    fn stored_duration_never_exceeds_capacity() {
        // 1s window at 16kHz = 16000 samples.
        let mut buf = PrerollBuffer::new(1, 16_000);
        for seq in 0..100 {
            buf.push(frame(seq, 512));
            assert!(buf.stored_samples() <= buf.capacity_samples());
        }
    }

    #[test]
    fn eviction_is_strict_fifo() {
        let mut buf = PrerollBuffer::new(1, 16_000);
        for seq in 0..40 {
            buf.push(frame(seq, 512));
        }
        let snap = buf.snapshot();
        // 16000 / 512 = 31.25, so 31 frames fit; oldest 9 were evicted.
        assert_eq!(snap.len(), 31);
        assert_eq!(snap.first().map(|f| f.seq), Some(9));
        assert_eq!(snap.last().map(|f| f.seq), Some(39));
        let seqs: Vec<u64> = snap.iter().map(|f| f.seq).collect();
        assert!(seqs.windows(2).all(|w| w[1] == w[0] + 1));
    }

    #[test]
    fn exact_capacity_push_evicts_exactly_one() {
        // Window of exactly 8 frames worth of samples.
        let mut buf = PrerollBuffer::new(1, 4_096);
        for seq in 0..8 {
            buf.push(frame(seq, 512));
        }
        assert_eq!(buf.stored_samples(), buf.capacity_samples());

        buf.push(frame(8, 512));
        assert_eq!(buf.frame_count(), 8);
        assert_eq!(buf.snapshot().first().map(|f| f.seq), Some(1));
    }

    #[test]
    fn snapshot_is_isolated_from_later_pushes() {
        let mut buf = PrerollBuffer::new(30, 16_000);
        buf.push(frame(0, 512));
        let snap = buf.snapshot();
        buf.push(frame(1, 512));

        assert_eq!(snap.len(), 1);
        assert_eq!(buf.frame_count(), 2);
    }

    #[test]
    fn last_seq_tracks_newest_frame() {
        let mut buf = PrerollBuffer::new(30, 16_000);
        assert_eq!(buf.last_seq(), None);
        buf.push(frame(7, 512));
        assert_eq!(buf.last_seq(), Some(7));
    }
}
