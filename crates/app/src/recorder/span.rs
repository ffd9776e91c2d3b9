use flashback_audio::CapturedFrame;

/// One finished (or in-assembly) recording: the pre-roll snapshot followed by
/// post-roll frames, in capture order.
///
/// Created per trigger, fully assembled, handed to the writer, then dropped.
#[derive(Debug)]
pub struct RecordingSpan {
    frames: Vec<CapturedFrame>,
    sample_rate: u32,
}

impl RecordingSpan {
    /// Seed a span with the pre-roll snapshot taken at trigger time. An empty
    /// snapshot (trigger before any audio arrived) is valid.
    pub fn from_snapshot(snapshot: Vec<CapturedFrame>, sample_rate: u32) -> Self {
        Self {
            frames: snapshot,
            sample_rate,
        }
    }

    pub fn append(&mut self, frame: CapturedFrame) {
        self.frames.push(frame);
    }

    pub fn last_seq(&self) -> Option<u64> {
        self.frames.last().map(|f| f.seq)
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    pub fn total_samples(&self) -> usize {
        self.frames.iter().map(|f| f.len()).sum()
    }

    pub fn duration_secs(&self) -> f64 {
        self.total_samples() as f64 / self.sample_rate as f64
    }

    /// Sequence indices are strictly increasing with no gaps across the whole
    /// span, including the snapshot/post-roll seam.
    pub fn is_contiguous(&self) -> bool {
        self.frames
            .windows(2)
            .all(|pair| pair[1].seq == pair[0].seq + 1)
    }

    pub fn iter_samples(&self) -> impl Iterator<Item = i16> + '_ {
        self.frames
            .iter()
            .flat_map(|f| f.samples.iter().copied())
    }

    pub fn frames(&self) -> &[CapturedFrame] {
        &self.frames
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn frame(seq: u64, fill: i16) -> CapturedFrame {
        CapturedFrame {
            seq,
            samples: Arc::from(vec![fill; 512]),
            sample_rate: 16_000,
        }
    }

    #[test]
    fn seamless_span_is_contiguous() {
        let mut span = RecordingSpan::from_snapshot(vec![frame(3, 1), frame(4, 2)], 16_000);
        span.append(frame(5, 3));
        span.append(frame(6, 4));
        assert!(span.is_contiguous());
        assert_eq!(span.total_samples(), 4 * 512);
        assert_eq!(span.last_seq(), Some(6));
    }

    #[test]
    fn gap_at_seam_is_detected() {
        let mut span = RecordingSpan::from_snapshot(vec![frame(3, 1)], 16_000);
        span.append(frame(5, 2));
        assert!(!span.is_contiguous());
    }

    #[test]
    fn samples_iterate_in_capture_order() {
        let mut span = RecordingSpan::from_snapshot(vec![frame(0, 10)], 16_000);
        span.append(frame(1, 20));
        let samples: Vec<i16> = span.iter_samples().collect();
        assert_eq!(samples.len(), 1024);
        assert!(samples[..512].iter().all(|&s| s == 10));
        assert!(samples[512..].iter().all(|&s| s == 20));
    }

    #[test]
    fn empty_snapshot_is_valid() {
        let span = RecordingSpan::from_snapshot(Vec::new(), 16_000);
        assert_eq!(span.total_samples(), 0);
        assert_eq!(span.last_seq(), None);
        assert!(span.is_contiguous());
    }
}
