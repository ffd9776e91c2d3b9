use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{broadcast, mpsc};

use flashback_audio::{
    BatchReader, CaptureThread, FramePump, PrerollBuffer, PumpConfig, SampleRing,
};
use flashback_foundation::{AppError, AudioError, ShutdownGuard};

use crate::config::Config;
use crate::recorder::{spawn_writer, ControllerConfig, SnapshotController, WriterConfig};
use crate::trigger;

/// Assemble and run the whole pipeline until shutdown or a fatal capture
/// error.
///
/// Wiring order matters: the capture thread comes up first so the negotiated
/// device rate can size the pre-roll window and parameterize everything
/// downstream.
pub async fn run(config: Config, shutdown: ShutdownGuard) -> Result<(), AppError> {
    // Transport ring between the cpal callback and the pump. A few seconds of
    // headroom at the preferred rate; pressure beyond that means the pump has
    // stalled and dropping at the callback is the correct behavior.
    let transport = SampleRing::new((config.sample_rate as usize * 4).max(65_536));
    let (sample_writer, sample_reader) = transport.split();

    let (fatal_tx, fatal_rx) = crossbeam_channel::bounded::<AudioError>(1);
    let (capture, device_cfg, device_cfg_rx) = CaptureThread::spawn(
        config.sample_rate,
        sample_writer,
        config.device.clone(),
        fatal_tx,
    )?;
    let sample_rate = device_cfg.sample_rate;
    tracing::info!(
        "Capture running at {} Hz, {} channel(s)",
        sample_rate,
        device_cfg.channels
    );

    let preroll = Arc::new(Mutex::new(PrerollBuffer::new(
        config.pre_roll_secs,
        sample_rate,
    )));
    let (live_tx, _) = broadcast::channel(512);

    let batch_reader = BatchReader::new(sample_reader, sample_rate, device_cfg.channels)
        .with_config_updates(device_cfg_rx);
    let pump = FramePump::new(
        batch_reader,
        preroll.clone(),
        live_tx.clone(),
        PumpConfig::default(),
    );
    let pump_handle = pump.spawn();

    let (span_tx, span_rx) = mpsc::channel(4);
    let writer_handle = spawn_writer(
        WriterConfig {
            output_dir: config.output_dir.clone(),
        },
        span_rx,
    );

    let (trigger_tx, trigger_rx) = trigger::channel();
    let controller = SnapshotController::new(
        preroll,
        live_tx,
        trigger_rx,
        span_tx,
        ControllerConfig {
            post_roll_secs: config.post_roll_secs,
            sample_rate,
        },
    );
    let controller_handle = controller.spawn();

    if let Some(pin) = config.trigger_pin {
        // Physical wiring is an external collaborator; whatever watches the
        // pin feeds the same merged trigger channel the keyboard does.
        tracing::info!("Trigger pin {} configured for external edge source", pin);
    }

    let keyboard_handle = match trigger::keyboard::spawn(
        trigger_tx.clone(),
        shutdown.clone(),
        Duration::from_millis(config.debounce_ms),
    ) {
        Ok(handle) => Some(handle),
        Err(e) => {
            tracing::warn!("Keyboard trigger disabled: {}", e);
            None
        }
    };

    // Supervise: wait for shutdown while polling the capture thread's fatal
    // channel (crossbeam, so polled rather than awaited).
    let mut fatal: Option<AudioError> = None;
    loop {
        tokio::select! {
            _ = shutdown.wait() => {
                tracing::info!("Shutdown requested");
                break;
            }
            _ = tokio::time::sleep(Duration::from_millis(200)) => {
                if let Ok(err) = fatal_rx.try_recv() {
                    tracing::error!("Fatal capture error: {}", err);
                    fatal = Some(err);
                    shutdown.request();
                    break;
                }
            }
        }
    }

    tracing::info!("Beginning graceful shutdown");

    // Stop the source first, then the tasks. A span still in assembly is
    // discarded, not flushed half-finished.
    capture.stop();
    pump_handle.abort();
    controller_handle.abort();
    writer_handle.abort();
    let _ = pump_handle.await;
    let _ = controller_handle.await;
    let _ = writer_handle.await;
    drop(trigger_tx);
    if let Some(handle) = keyboard_handle {
        let _ = handle.join();
    }

    tracing::info!("Shutdown complete");

    match fatal {
        Some(err) => Err(AppError::Audio(err)),
        None => Ok(()),
    }
}
