use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use flashback_foundation::WriteError;

use super::span::RecordingSpan;

#[derive(Debug, Clone)]
pub struct WriterConfig {
    pub output_dir: PathBuf,
}

/// Writer task: drains finished spans and serializes each to a WAV file.
///
/// Runs entirely off the capture path; the actual file I/O happens on the
/// blocking pool so disk latency can never stall a tokio worker either. A
/// failed write is logged and the span dropped; capture is unaffected.
pub fn spawn_writer(
    cfg: WriterConfig,
    mut span_rx: mpsc::Receiver<RecordingSpan>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        tracing::info!("Recording writer ready (output dir: {:?})", cfg.output_dir);

        while let Some(span) = span_rx.recv().await {
            let dir = cfg.output_dir.clone();
            let result =
                tokio::task::spawn_blocking(move || write_span(&dir, &span, Local::now())).await;

            match result {
                Ok(Ok(path)) => tracing::info!("Recording saved: {:?}", path),
                Ok(Err(e)) => tracing::error!("Recording dropped: {}", e),
                Err(e) => tracing::error!("Writer task panicked: {}", e),
            }
        }

        tracing::info!("Recording writer stopped");
    })
}

/// Serialize one span to `recording_YYYYMMDD_HHMMSS.wav` under `dir`,
/// creating the directory if absent. Triggers within the same second get
/// `_1`, `_2`, ... suffixes; existing files are never overwritten.
pub fn write_span(
    dir: &Path,
    span: &RecordingSpan,
    stamp: DateTime<Local>,
) -> Result<PathBuf, WriteError> {
    std::fs::create_dir_all(dir).map_err(|e| WriteError::Io {
        path: dir.to_path_buf(),
        source: e,
    })?;

    let path = unique_recording_path(dir, stamp);
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: span.sample_rate(),
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut wav = hound::WavWriter::create(&path, spec).map_err(|e| map_hound(&path, e))?;
    for sample in span.iter_samples() {
        wav.write_sample(sample).map_err(|e| map_hound(&path, e))?;
    }
    wav.finalize().map_err(|e| map_hound(&path, e))?;

    Ok(path)
}

fn unique_recording_path(dir: &Path, stamp: DateTime<Local>) -> PathBuf {
    let base = format!("recording_{}", stamp.format("%Y%m%d_%H%M%S"));
    let mut candidate = dir.join(format!("{base}.wav"));
    let mut suffix = 1u32;
    while candidate.exists() {
        candidate = dir.join(format!("{base}_{suffix}.wav"));
        suffix += 1;
    }
    candidate
}

fn map_hound(path: &Path, err: hound::Error) -> WriteError {
    match err {
        hound::Error::IoError(source) => WriteError::Io {
            path: path.to_path_buf(),
            source,
        },
        other => WriteError::Encode {
            path: path.to_path_buf(),
            reason: other.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use flashback_audio::CapturedFrame;
    use std::sync::Arc;

    fn span_of(samples: Vec<i16>) -> RecordingSpan {
        let mut span = RecordingSpan::from_snapshot(Vec::new(), 16_000);
        span.append(CapturedFrame {
            seq: 0,
            samples: Arc::from(samples),
            sample_rate: 16_000,
        });
        span
    }

    fn stamp() -> DateTime<Local> {
        Local.with_ymd_and_hms(2026, 8, 23, 12, 0, 0).unwrap()
    }

    #[test]
    fn writes_timestamped_wav_and_creates_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("audios");
        let span = span_of(vec![1, -1, 2, -2]);

        let path = write_span(&dir, &span, stamp()).unwrap();
        assert_eq!(
            path.file_name().unwrap().to_str().unwrap(),
            "recording_20260823_120000.wav"
        );
        assert!(path.exists());

        let mut reader = hound::WavReader::open(&path).unwrap();
        let spec = reader.spec();
        assert_eq!(spec.channels, 1);
        assert_eq!(spec.sample_rate, 16_000);
        assert_eq!(spec.bits_per_sample, 16);
        let read: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();
        assert_eq!(read, vec![1, -1, 2, -2]);
    }

    #[test]
    fn same_second_collisions_get_suffixes() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().to_path_buf();
        let at = stamp();

        let p1 = write_span(&dir, &span_of(vec![0; 4]), at).unwrap();
        let p2 = write_span(&dir, &span_of(vec![1; 4]), at).unwrap();
        let p3 = write_span(&dir, &span_of(vec![2; 4]), at).unwrap();

        assert!(p1.to_str().unwrap().ends_with("recording_20260823_120000.wav"));
        assert!(p2.to_str().unwrap().ends_with("recording_20260823_120000_1.wav"));
        assert!(p3.to_str().unwrap().ends_with("recording_20260823_120000_2.wav"));

        // First file untouched by the later writes.
        let mut reader = hound::WavReader::open(&p1).unwrap();
        let read: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();
        assert_eq!(read, vec![0; 4]);
    }

    #[test]
    fn unwritable_dir_is_an_io_error() {
        let tmp = tempfile::tempdir().unwrap();
        let blocked = tmp.path().join("blocked");
        std::fs::write(&blocked, b"not a dir").unwrap();

        let err = write_span(&blocked, &span_of(vec![0; 4]), stamp()).unwrap_err();
        assert!(matches!(err, WriteError::Io { .. }));
    }
}
