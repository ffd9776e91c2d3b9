use clap::Parser;
use flashback_foundation::AppError;
use std::path::PathBuf;

/// Runtime configuration. Every flag also reads a `FLASHBACK_*` environment
/// variable, CLI taking precedence.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "flashback",
    about = "Continuously buffers the microphone and saves pre-roll + post-roll audio on trigger"
)]
pub struct Config {
    /// Seconds of audio retained before a trigger.
    #[arg(long, env = "FLASHBACK_PRE_ROLL_SECS", default_value_t = 30)]
    pub pre_roll_secs: u32,

    /// Seconds of audio captured after a trigger.
    #[arg(long, env = "FLASHBACK_POST_ROLL_SECS", default_value_t = 10)]
    pub post_roll_secs: u32,

    /// Preferred capture sample rate in Hz; the device may negotiate another.
    #[arg(long, env = "FLASHBACK_SAMPLE_RATE", default_value_t = 16_000)]
    pub sample_rate: u32,

    /// Directory recordings are written to (created if absent).
    #[arg(long, env = "FLASHBACK_OUTPUT_DIR", default_value = "audios")]
    pub output_dir: PathBuf,

    /// GPIO pin identifier for an external button trigger, if wired.
    #[arg(long, env = "FLASHBACK_TRIGGER_PIN")]
    pub trigger_pin: Option<u8>,

    /// Input device name; substring match, host default when omitted.
    #[arg(long, env = "FLASHBACK_DEVICE")]
    pub device: Option<String>,

    /// Trigger debounce window in milliseconds.
    #[arg(long, env = "FLASHBACK_DEBOUNCE_MS", default_value_t = 300)]
    pub debounce_ms: u64,
}

impl Config {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.pre_roll_secs == 0 {
            return Err(AppError::Config("pre-roll must be at least 1 second".into()));
        }
        if self.post_roll_secs == 0 {
            return Err(AppError::Config(
                "post-roll must be at least 1 second".into(),
            ));
        }
        if self.pre_roll_secs > 600 || self.post_roll_secs > 600 {
            return Err(AppError::Config(
                "pre-roll and post-roll are capped at 600 seconds".into(),
            ));
        }
        if !(8_000..=192_000).contains(&self.sample_rate) {
            return Err(AppError::Config(format!(
                "sample rate {} Hz outside supported range 8000-192000",
                self.sample_rate
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Config {
        Config::parse_from(["flashback"])
    }

    #[test]
    fn defaults_match_documented_surface() {
        let cfg = base();
        assert_eq!(cfg.pre_roll_secs, 30);
        assert_eq!(cfg.post_roll_secs, 10);
        assert_eq!(cfg.sample_rate, 16_000);
        assert_eq!(cfg.output_dir, PathBuf::from("audios"));
        assert_eq!(cfg.debounce_ms, 300);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn zero_durations_are_fatal() {
        let mut cfg = base();
        cfg.pre_roll_secs = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = base();
        cfg.post_roll_secs = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn absurd_sample_rate_is_rejected() {
        let mut cfg = base();
        cfg.sample_rate = 1_000;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn cli_overrides_parse() {
        let cfg = Config::parse_from([
            "flashback",
            "--pre-roll-secs",
            "5",
            "--post-roll-secs",
            "2",
            "--output-dir",
            "/tmp/rec",
            "--trigger-pin",
            "2",
        ]);
        assert_eq!(cfg.pre_roll_secs, 5);
        assert_eq!(cfg.post_roll_secs, 2);
        assert_eq!(cfg.trigger_pin, Some(2));
        assert_eq!(cfg.output_dir, PathBuf::from("/tmp/rec"));
    }
}
