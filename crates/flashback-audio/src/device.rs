use cpal::traits::{DeviceTrait, HostTrait};
use cpal::{Device, Host, SampleFormat, StreamConfig};
use flashback_foundation::AudioError;

/// Input device selection and sample-rate negotiation.
///
/// Selection is heuristic but deterministic: an explicitly named device wins,
/// otherwise candidates are ranked so dedicated microphones beat virtual
/// bridges, and the host default is the last resort.
pub struct DeviceManager {
    host: Host,
    current_device: Option<Device>,
}

impl DeviceManager {
    pub fn new() -> Result<Self, AudioError> {
        let host = {
            #[cfg(unix)]
            let _quiet = crate::alsa_quiet::StderrQuiet::new();
            cpal::default_host()
        };
        Ok(Self {
            host,
            current_device: None,
        })
    }

    pub fn host_id(&self) -> cpal::HostId {
        self.host.id()
    }

    pub fn enumerate_devices(&self) -> Vec<DeviceInfo> {
        let mut devices = Vec::new();

        if let Ok(inputs) = self.host.input_devices() {
            for device in inputs {
                if let Ok(name) = device.name() {
                    devices.push(DeviceInfo {
                        name,
                        is_default: false,
                    });
                }
            }
        }

        if let Some(default_name) = self.default_input_device_name() {
            for device in &mut devices {
                if device.name == default_name {
                    device.is_default = true;
                }
            }
        }

        devices
    }

    pub fn default_input_device_name(&self) -> Option<String> {
        self.host.default_input_device().and_then(|d| d.name().ok())
    }

    /// Candidate device names, best first. Pure ranking over the enumeration
    /// so tests can exercise the ordering with synthetic name lists.
    pub fn candidate_device_names(&self) -> Vec<String> {
        let names: Vec<String> = self
            .enumerate_devices()
            .into_iter()
            .map(|d| d.name)
            .collect();
        rank_candidates(&names, self.default_input_device_name().as_deref())
    }

    pub fn open_device(&mut self, name: Option<&str>) -> Result<Device, AudioError> {
        // An explicit name is honored or surfaced as an error; no silent
        // fallback when the operator asked for a specific device.
        if let Some(preferred) = name {
            if let Some(device) = self.find_device(|n| n == preferred) {
                self.current_device = Some(device.clone());
                return Ok(device);
            }
            if let Some(device) =
                self.find_device(|n| n.to_lowercase().contains(&preferred.to_lowercase()))
            {
                tracing::warn!(
                    "Device '{}' not found exactly; using closest match '{}'",
                    preferred,
                    device.name().unwrap_or_default()
                );
                self.current_device = Some(device.clone());
                return Ok(device);
            }
            return Err(AudioError::DeviceNotFound {
                name: Some(preferred.to_string()),
            });
        }

        for candidate in self.candidate_device_names() {
            if let Some(device) = self.find_device(|n| n == candidate) {
                self.current_device = Some(device.clone());
                return Ok(device);
            }
        }

        self.host
            .default_input_device()
            .ok_or(AudioError::DeviceNotFound { name: None })
            .map(|device| {
                self.current_device = Some(device.clone());
                device
            })
    }

    fn find_device<F>(&self, pred: F) -> Option<Device>
    where
        F: Fn(&str) -> bool,
    {
        if let Ok(devices) = self.host.input_devices() {
            for device in devices {
                if let Ok(name) = device.name() {
                    if pred(&name) {
                        return Some(device);
                    }
                }
            }
        }
        None
    }

    /// Pick a stream config, preferring `preferred_rate` mono if any supported
    /// range covers it. Falls back to the device's default input config; the
    /// caller propagates whatever rate was actually negotiated.
    pub fn negotiate_config(
        &self,
        device: &Device,
        preferred_rate: u32,
    ) -> Result<(StreamConfig, SampleFormat), AudioError> {
        if let Ok(supported) = device.supported_input_configs() {
            let mut best: Option<(cpal::SupportedStreamConfigRange, u16)> = None;
            for range in supported {
                if range.min_sample_rate().0 <= preferred_rate
                    && range.max_sample_rate().0 >= preferred_rate
                {
                    let channels = range.channels();
                    // Fewer channels preferred: mono is the target format.
                    if best.as_ref().map(|(_, c)| channels < *c).unwrap_or(true) {
                        best = Some((range, channels));
                    }
                }
            }
            if let Some((range, channels)) = best {
                let sample_format = range.sample_format();
                return Ok((
                    StreamConfig {
                        channels,
                        sample_rate: cpal::SampleRate(preferred_rate),
                        buffer_size: cpal::BufferSize::Default,
                    },
                    sample_format,
                ));
            }
        }

        // Preferred rate unsupported: degrade to the device default and let
        // the negotiated rate flow through buffer sizing and the WAV header.
        if let Ok(default_config) = device.default_input_config() {
            tracing::warn!(
                "Preferred rate {} Hz unsupported; using device default {} Hz",
                preferred_rate,
                default_config.sample_rate().0
            );
            return Ok((
                StreamConfig {
                    channels: default_config.channels(),
                    sample_rate: default_config.sample_rate(),
                    buffer_size: cpal::BufferSize::Default,
                },
                default_config.sample_format(),
            ));
        }

        Err(AudioError::FormatNotSupported {
            format: "no supported input configs".to_string(),
        })
    }
}

/// Rank device names: likely dedicated microphones first, then the ALSA/pipewire
/// bridges, then the host default, then everything else. Duplicates removed.
pub fn rank_candidates(names: &[String], default_name: Option<&str>) -> Vec<String> {
    let mut scored: Vec<(i32, &String)> = names
        .iter()
        .map(|name| (score_device_name(name), name))
        .collect();
    // Stable sort keeps enumeration order for equal scores.
    scored.sort_by_key(|(score, _)| -*score);

    let mut out: Vec<String> = Vec::new();
    for (_, name) in scored {
        if !out.iter().any(|n| n == name) {
            out.push(name.clone());
        }
    }
    if let Some(def) = default_name {
        if !out.iter().any(|n| n == def) {
            out.push(def.to_string());
        }
    }
    out
}

fn score_device_name(name: &str) -> i32 {
    let lname = name.to_lowercase();
    let mut score = 0;
    if lname.contains("mic") || lname.contains("microphone") {
        score += 3;
    }
    if lname.contains("respeaker") {
        score += 3;
    }
    if lname.contains("array") {
        score += 2;
    }
    if lname.contains("usb") {
        score += 1;
    }
    // Virtual bridges are serviceable but rank below any real microphone.
    if lname == "default" || lname == "sysdefault" || lname == "pipewire" {
        score -= 1;
    }
    score
}

#[derive(Debug, Clone)]
pub struct DeviceInfo {
    pub name: String,
    pub is_default: bool,
}
