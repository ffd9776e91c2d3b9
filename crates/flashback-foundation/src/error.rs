use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Audio subsystem error: {0}")]
    Audio(#[from] AudioError),

    #[error("Trigger source error: {0}")]
    Trigger(#[from] TriggerError),

    #[error("Recording write error: {0}")]
    Write(#[from] WriteError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Shutdown requested")]
    ShutdownRequested,

    #[error("Fatal error, cannot recover: {0}")]
    Fatal(String),
}

#[derive(Error, Debug)]
pub enum AudioError {
    #[error("Device not found: {name:?}")]
    DeviceNotFound { name: Option<String> },

    #[error("Device disconnected")]
    DeviceDisconnected,

    #[error("Format not supported: {format}")]
    FormatNotSupported { format: String },

    #[error("No audio data for {duration:?}")]
    NoDataTimeout { duration: Duration },

    #[error("CPAL error: {0}")]
    Cpal(#[from] cpal::StreamError),

    #[error("Build stream error: {0}")]
    BuildStream(#[from] cpal::BuildStreamError),

    #[error("Play stream error: {0}")]
    PlayStream(#[from] cpal::PlayStreamError),

    #[error("Supported stream configs error: {0}")]
    SupportedStreamConfigs(#[from] cpal::SupportedStreamConfigsError),

    #[error("Fatal error, cannot recover: {0}")]
    Fatal(String),
}

#[derive(Error, Debug)]
pub enum TriggerError {
    #[error("Trigger source unavailable: {source_name}: {reason}")]
    Unavailable { source_name: String, reason: String },

    #[error("Trigger channel closed")]
    ChannelClosed,
}

#[derive(Error, Debug)]
pub enum WriteError {
    #[error("I/O error writing {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("WAV encoding failed for {path:?}: {reason}")]
    Encode { path: PathBuf, reason: String },
}

/// How the runtime should react to an error. Only the capture path is allowed
/// to take the process down; everything downstream of captured audio degrades.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Severity {
    /// Log and continue; the current unit of work (span, event) is dropped.
    Degraded,
    /// The affected source is disabled; the rest of the system keeps running.
    SourceDisabled,
    /// Terminate with a diagnostic.
    Fatal,
}

impl AppError {
    pub fn severity(&self) -> Severity {
        match self {
            AppError::Audio(AudioError::Fatal(_)) => Severity::Fatal,
            AppError::Audio(_) => Severity::Degraded,
            AppError::Trigger(_) => Severity::SourceDisabled,
            AppError::Write(_) => Severity::Degraded,
            AppError::Config(_) | AppError::Fatal(_) => Severity::Fatal,
            AppError::ShutdownRequested => Severity::Fatal,
        }
    }
}
