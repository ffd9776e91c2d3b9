use tokio::sync::broadcast;

use crate::capture::DeviceConfig;
use crate::transport::SampleReader;

/// Drains the transport ring into mono sample batches.
///
/// The stream delivers interleaved frames at whatever rate and channel count
/// was negotiated; this reader downmixes to mono by averaging and keeps any
/// partial channel group pending so interleaving never slips, even when a read
/// splits a group.
pub struct BatchReader {
    reader: SampleReader,
    sample_rate: u32,
    channels: u16,
    pending: Vec<i16>,
    config_rx: Option<broadcast::Receiver<DeviceConfig>>,
}

impl BatchReader {
    pub fn new(reader: SampleReader, sample_rate: u32, channels: u16) -> Self {
        Self {
            reader,
            sample_rate,
            channels: channels.max(1),
            pending: Vec::new(),
            config_rx: None,
        }
    }

    /// Follow device reconfigurations (stream restarts may renegotiate).
    pub fn with_config_updates(mut self, rx: broadcast::Receiver<DeviceConfig>) -> Self {
        self.config_rx = Some(rx);
        self
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Read up to `max_mono_samples` downmixed samples. Returns `None` when
    /// the ring has nothing complete to deliver.
    pub fn read_batch(&mut self, max_mono_samples: usize) -> Option<Vec<i16>> {
        self.apply_config_updates();

        let channels = self.channels as usize;
        let mut raw = vec![0i16; max_mono_samples * channels];
        let n = self.reader.read(&mut raw);
        if n == 0 && self.pending.len() < channels {
            return None;
        }
        raw.truncate(n);
        self.pending.extend_from_slice(&raw);

        let complete_groups = self.pending.len() / channels;
        if complete_groups == 0 {
            return None;
        }

        let consumed = complete_groups * channels;
        let mono: Vec<i16> = self.pending[..consumed]
            .chunks_exact(channels)
            .map(|group| {
                let sum: i32 = group.iter().map(|&s| s as i32).sum();
                (sum / channels as i32) as i16
            })
            .collect();
        self.pending.drain(..consumed);
        Some(mono)
    }

    pub fn available_samples(&self) -> usize {
        self.reader.available()
    }

    fn apply_config_updates(&mut self) {
        if let Some(rx) = &mut self.config_rx {
            while let Ok(cfg) = rx.try_recv() {
                if cfg.sample_rate != self.sample_rate || cfg.channels != self.channels {
                    tracing::info!(
                        "Device reconfigured: {} Hz {} ch -> {} Hz {} ch",
                        self.sample_rate,
                        self.channels,
                        cfg.sample_rate,
                        cfg.channels
                    );
                    self.sample_rate = cfg.sample_rate;
                    self.channels = cfg.channels.max(1);
                    self.pending.clear();
                }
            }
        }
    }
}
