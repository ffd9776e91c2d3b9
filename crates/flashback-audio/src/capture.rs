use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{SampleFormat, Stream, StreamConfig};

use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::device::DeviceManager;
use crate::transport::SampleWriter;
use crate::watchdog::WatchdogTimer;
use flashback_foundation::AudioError;

/// Stream restarts attempted after a watchdog timeout or stream error before
/// the failure is declared fatal and surfaced to the operator.
const MAX_RESTART_ATTEMPTS: u32 = 3;

/// The negotiated device parameters, broadcast to downstream consumers so
/// buffer sizing and the WAV header always match the actual stream.
#[derive(Debug, Clone)]
pub struct DeviceConfig {
    pub sample_rate: u32,
    pub channels: u16,
}

#[derive(Debug, Default)]
pub struct CaptureStats {
    pub batches_captured: AtomicU64,
    pub samples_dropped: AtomicU64,
    pub restarts: AtomicU64,
}

/// Handle to the dedicated audio capture thread.
///
/// The thread owns the cpal stream for the life of the process. Transient
/// stream failures are retried a bounded number of times; after that a fatal
/// [`AudioError`] is reported on the failure channel, because silently losing
/// capture would defeat the whole system.
pub struct CaptureThread {
    pub handle: JoinHandle<()>,
    pub shutdown: Arc<AtomicBool>,
}

impl CaptureThread {
    pub fn spawn(
        preferred_rate: u32,
        sample_writer: SampleWriter,
        device_name: Option<String>,
        fatal_tx: crossbeam_channel::Sender<AudioError>,
    ) -> Result<
        (
            Self,
            DeviceConfig,
            tokio::sync::broadcast::Receiver<DeviceConfig>,
        ),
        AudioError,
    > {
        let running = Arc::new(AtomicBool::new(true));
        let shutdown = running.clone();
        let negotiated = Arc::new(RwLock::new(None::<DeviceConfig>));
        let negotiated_clone = negotiated.clone();

        let (config_tx, config_rx) = tokio::sync::broadcast::channel(16);

        let handle = thread::Builder::new()
            .name("audio-capture".to_string())
            .spawn(move || {
                let mut capture =
                    match CaptureEngine::new(preferred_rate, sample_writer, running.clone()) {
                        Ok(c) => c,
                        Err(e) => {
                            tracing::error!("Failed to initialize capture engine: {}", e);
                            let _ = fatal_tx.send(AudioError::Fatal(e.to_string()));
                            return;
                        }
                    };

                match capture.start(device_name.as_deref()) {
                    Ok(cfg) => {
                        let _ = config_tx.send(cfg.clone());
                        *negotiated_clone.write() = Some(cfg);
                    }
                    Err(e) => {
                        tracing::error!("Failed to start audio stream: {}", e);
                        let _ = fatal_tx.send(AudioError::Fatal(e.to_string()));
                        return;
                    }
                }

                // Supervision loop: watch for stalls and stream errors, retry
                // a bounded number of times, then give up loudly.
                while running.load(Ordering::SeqCst) {
                    if capture.watchdog.poll() || capture.restart_needed.load(Ordering::SeqCst) {
                        tracing::warn!("Capture restart triggered (watchdog or stream error)");
                        capture.stop_stream();
                        capture.restart_needed.store(false, Ordering::SeqCst);

                        let mut restarted = false;
                        for attempt in 1..=MAX_RESTART_ATTEMPTS {
                            match capture.start(device_name.as_deref()) {
                                Ok(cfg) => {
                                    tracing::info!(
                                        "Capture restarted (attempt {}/{})",
                                        attempt,
                                        MAX_RESTART_ATTEMPTS
                                    );
                                    capture.stats.restarts.fetch_add(1, Ordering::Relaxed);
                                    let _ = config_tx.send(cfg.clone());
                                    *negotiated_clone.write() = Some(cfg);
                                    restarted = true;
                                    break;
                                }
                                Err(e) => {
                                    tracing::warn!(
                                        "Restart attempt {}/{} failed: {}",
                                        attempt,
                                        MAX_RESTART_ATTEMPTS,
                                        e
                                    );
                                    thread::sleep(Duration::from_millis(200));
                                }
                            }
                        }
                        if !restarted {
                            tracing::error!(
                                "Audio capture lost after {} restart attempts",
                                MAX_RESTART_ATTEMPTS
                            );
                            let _ = fatal_tx.send(AudioError::Fatal(format!(
                                "capture did not recover after {} restart attempts",
                                MAX_RESTART_ATTEMPTS
                            )));
                            return;
                        }
                    }
                    thread::sleep(Duration::from_millis(100));
                }

                tracing::info!("Audio capture thread shutting down");
                capture.stop_stream();
            })
            .map_err(|e| AudioError::Fatal(format!("Failed to spawn audio thread: {}", e)))?;

        // Wait for negotiation before the rest of the pipeline is sized.
        let start = Instant::now();
        let cfg = loop {
            if let Some(config) = negotiated.read().clone() {
                break Some(config);
            }
            if start.elapsed() > Duration::from_secs(3) {
                break None;
            }
            thread::sleep(Duration::from_millis(50));
        };

        let cfg = cfg.ok_or_else(|| {
            AudioError::Fatal("No device configuration within startup timeout".to_string())
        })?;

        Ok((Self { handle, shutdown }, cfg, config_rx))
    }

    pub fn stop(self) {
        self.shutdown.store(false, Ordering::SeqCst);
        let _ = self.handle.join();
    }
}

struct CaptureEngine {
    device_manager: DeviceManager,
    preferred_rate: u32,
    stream: Option<Stream>,
    sample_writer: Arc<Mutex<SampleWriter>>,
    watchdog: WatchdogTimer,
    stats: Arc<CaptureStats>,
    running: Arc<AtomicBool>,
    restart_needed: Arc<AtomicBool>,
}

impl CaptureEngine {
    fn new(
        preferred_rate: u32,
        sample_writer: SampleWriter,
        running: Arc<AtomicBool>,
    ) -> Result<Self, AudioError> {
        Ok(Self {
            device_manager: DeviceManager::new()?,
            preferred_rate,
            stream: None,
            sample_writer: Arc::new(Mutex::new(sample_writer)),
            watchdog: WatchdogTimer::new(Duration::from_secs(5)),
            stats: Arc::new(CaptureStats::default()),
            running,
            restart_needed: Arc::new(AtomicBool::new(false)),
        })
    }

    fn start(&mut self, device_name: Option<&str>) -> Result<DeviceConfig, AudioError> {
        let device = self.device_manager.open_device(device_name)?;
        if let Ok(name) = device.name() {
            tracing::info!(
                "Selected input device: {} (host: {:?})",
                name,
                self.device_manager.host_id()
            );
        }

        let (config, sample_format) = self
            .device_manager
            .negotiate_config(&device, self.preferred_rate)?;
        let device_config = DeviceConfig {
            sample_rate: config.sample_rate.0,
            channels: config.channels,
        };
        tracing::info!(
            "Negotiated stream: {} Hz, {} ch, {:?}",
            device_config.sample_rate,
            device_config.channels,
            sample_format
        );

        let stream = self.build_stream(device, config, sample_format)?;
        stream.play()?;
        self.stream = Some(stream);
        self.watchdog.rearm();
        Ok(device_config)
    }

    fn build_stream(
        &mut self,
        device: cpal::Device,
        config: StreamConfig,
        sample_format: SampleFormat,
    ) -> Result<Stream, AudioError> {
        let sample_writer = Arc::clone(&self.sample_writer);
        let stats = Arc::clone(&self.stats);
        let watchdog = self.watchdog.clone();
        let running = Arc::clone(&self.running);
        let restart_needed = Arc::clone(&self.restart_needed);

        let err_fn = move |err: cpal::StreamError| {
            tracing::error!("Audio stream error: {}", err);
            restart_needed.store(true, Ordering::SeqCst);
        };

        // Shared tail after conversion to i16. Runs on the real-time callback
        // thread: no allocation, no blocking, partial writes drop the tail.
        let push_i16 = move |samples: &[i16]| {
            if !running.load(Ordering::SeqCst) {
                return;
            }
            watchdog.feed();
            let written = sample_writer.lock().write(samples);
            stats.batches_captured.fetch_add(1, Ordering::Relaxed);
            if written < samples.len() {
                let dropped = (samples.len() - written) as u64;
                stats.samples_dropped.fetch_add(dropped, Ordering::Relaxed);
            }
        };

        // Reused conversion scratch, local to the callback thread.
        thread_local! {
            static CONVERT: std::cell::RefCell<Vec<i16>> = const { std::cell::RefCell::new(Vec::new()) };
        }

        let stream = match sample_format {
            SampleFormat::I16 => device.build_input_stream(
                &config,
                move |data: &[i16], _: &_| push_i16(data),
                err_fn,
                None,
            )?,
            SampleFormat::U16 => device.build_input_stream(
                &config,
                move |data: &[u16], _: &_| {
                    CONVERT.with(|buf| {
                        let mut converted = buf.borrow_mut();
                        converted.clear();
                        converted.reserve(data.len());
                        converted.extend(data.iter().map(|&s| (s as i32 - 32768) as i16));
                        push_i16(&converted);
                    });
                },
                err_fn,
                None,
            )?,
            SampleFormat::F32 => device.build_input_stream(
                &config,
                move |data: &[f32], _: &_| {
                    CONVERT.with(|buf| {
                        let mut converted = buf.borrow_mut();
                        converted.clear();
                        converted.reserve(data.len());
                        converted.extend(
                            data.iter()
                                .map(|&s| (s.clamp(-1.0, 1.0) * 32767.0).round() as i16),
                        );
                        push_i16(&converted);
                    });
                },
                err_fn,
                None,
            )?,
            other => {
                return Err(AudioError::FormatNotSupported {
                    format: format!("{:?}", other),
                });
            }
        };

        Ok(stream)
    }

    fn stop_stream(&mut self) {
        if let Some(stream) = self.stream.take() {
            drop(stream);
        }
    }
}

#[cfg(test)]
mod convert_tests {
    #[test]
    fn f32_to_i16_full_scale() {
        let src = [-1.0f32, -0.5, 0.0, 0.5, 1.0];
        let out: Vec<i16> = src
            .iter()
            .map(|&s| (s.clamp(-1.0, 1.0) * 32767.0).round() as i16)
            .collect();
        assert_eq!(out, vec![-32767, -16384, 0, 16384, 32767]);
    }

    #[test]
    fn f32_out_of_range_is_clamped() {
        let src = [-2.0f32, 2.0];
        let out: Vec<i16> = src
            .iter()
            .map(|&s| (s.clamp(-1.0, 1.0) * 32767.0).round() as i16)
            .collect();
        assert_eq!(out, vec![-32767, 32767]);
    }

    #[test]
    fn u16_to_i16_recentering() {
        let src = [0u16, 32768, 65535];
        let out: Vec<i16> = src.iter().map(|&s| (s as i32 - 32768) as i16).collect();
        assert_eq!(out, vec![-32768, 0, 32767]);
    }
}
