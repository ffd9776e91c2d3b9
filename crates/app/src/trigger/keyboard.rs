use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use crossterm::terminal;

use flashback_foundation::{ShutdownGuard, TriggerError};

use super::{Debouncer, TriggerEvent, TriggerSender};

const RECORD_KEY: char = 'r';
const QUIT_KEY: char = 'q';

/// Keyboard trigger source: raw-mode terminal, `r` fires a trigger, `q`
/// requests clean shutdown.
///
/// Runs on its own blocking thread polling at 100 ms so shutdown is noticed
/// promptly. Init failure (no tty) is surfaced as a [`TriggerError`] and the
/// caller disables this source while the rest of the system keeps running.
pub fn spawn(
    trigger_tx: TriggerSender,
    shutdown: ShutdownGuard,
    debounce_window: Duration,
) -> Result<JoinHandle<()>, TriggerError> {
    terminal::enable_raw_mode().map_err(|e| TriggerError::Unavailable {
        source_name: "keyboard".into(),
        reason: e.to_string(),
    })?;

    let handle = thread::Builder::new()
        .name("keyboard-trigger".to_string())
        .spawn(move || {
            tracing::info!(
                "Keyboard trigger ready: '{}' records, '{}' quits",
                RECORD_KEY,
                QUIT_KEY
            );
            let mut debouncer = Debouncer::new(debounce_window);

            while !shutdown.is_requested() {
                match event::poll(Duration::from_millis(100)) {
                    Ok(true) => match event::read() {
                        Ok(Event::Key(key)) if key.kind == KeyEventKind::Press => {
                            match key.code {
                                KeyCode::Char(c) if c == RECORD_KEY => {
                                    if debouncer.accept(Instant::now()) {
                                        if trigger_tx.try_send(TriggerEvent).is_err() {
                                            tracing::warn!(
                                                "Trigger channel full or closed; key press dropped"
                                            );
                                        }
                                    }
                                }
                                KeyCode::Char(c) if c == QUIT_KEY => {
                                    tracing::info!("Quit key pressed");
                                    shutdown.request();
                                }
                                _ => {}
                            }
                        }
                        Ok(_) => {}
                        Err(e) => {
                            tracing::warn!("Keyboard read failed: {}; disabling source", e);
                            break;
                        }
                    },
                    Ok(false) => {}
                    Err(e) => {
                        tracing::warn!("Keyboard poll failed: {}; disabling source", e);
                        break;
                    }
                }
            }

            if let Err(e) = terminal::disable_raw_mode() {
                tracing::warn!("Failed to restore terminal mode: {}", e);
            }
            tracing::info!("Keyboard trigger stopped");
        })
        .map_err(|e| TriggerError::Unavailable {
            source_name: "keyboard".into(),
            reason: e.to_string(),
        })?;

    Ok(handle)
}
