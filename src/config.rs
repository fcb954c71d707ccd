//! Audio configuration
//!
//! Options are read from a simple property file of `key = value` lines.
//! `#` starts a comment, either on its own line or after a value. Recognized
//! keys:
//!
//! ```text
//! mix_rate = 44100
//! stereo = true
//! interpolation = true
//! stream_buffer_ms = 100
//! headless = false
//! log_level = info
//! gain.Music = 0.5
//! ```

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};

use crate::logging::LogLevel;
use crate::sound::mixer::types::{SOUND_TYPES, STREAM_BUFFER_LENGTH};

/// Mixer output and playback options
#[derive(Debug, Clone, PartialEq)]
pub struct AudioOptions {
    /// Output sample rate in Hz
    pub mix_rate: u32,
    /// Interleaved stereo output
    pub stereo: bool,
    /// Linear interpolation in the mixing kernels
    pub interpolation: bool,
    /// Length of the per-source stream ring buffer
    pub stream_buffer_ms: u32,
    /// Run without an output device; sources advance time in `update`
    pub headless: bool,
    /// Master gain per sound type
    pub master_gains: HashMap<String, f32>,
    pub log_level: LogLevel,
}

impl Default for AudioOptions {
    fn default() -> Self {
        Self {
            mix_rate: 44100,
            stereo: true,
            interpolation: true,
            stream_buffer_ms: STREAM_BUFFER_LENGTH,
            headless: false,
            master_gains: SOUND_TYPES
                .iter()
                .map(|name| (name.to_string(), 1.0))
                .collect(),
            log_level: LogLevel::Info,
        }
    }
}

impl AudioOptions {
    /// Default options without an output device
    pub fn headless() -> Self {
        Self {
            headless: true,
            ..Self::default()
        }
    }

    pub fn with_mix_rate(mut self, mix_rate: u32) -> Self {
        self.mix_rate = mix_rate;
        self
    }

    pub fn with_stereo(mut self, stereo: bool) -> Self {
        self.stereo = stereo;
        self
    }

    pub fn with_interpolation(mut self, interpolation: bool) -> Self {
        self.interpolation = interpolation;
        self
    }

    pub fn with_master_gain(mut self, sound_type: &str, gain: f32) -> Self {
        self.master_gains
            .insert(sound_type.to_string(), gain.clamp(0.0, 1.0));
        self
    }

    /// Load options from a property file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read audio config {}", path.display()))?;
        Self::from_properties(&content)
            .with_context(|| format!("Invalid audio config {}", path.display()))
    }

    /// Parse options from property file content, starting from the defaults
    pub fn from_properties(content: &str) -> Result<Self> {
        let mut options = Self::default();

        for (line_number, key, value) in parse_properties(content) {
            options
                .apply(key, value)
                .with_context(|| format!("line {}: {} = {}", line_number, key, value))?;
        }

        Ok(options)
    }

    fn apply(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "mix_rate" => {
                let rate: u32 = value.parse().context("Invalid mix rate")?;
                if rate == 0 {
                    bail!("Mix rate must be positive");
                }
                self.mix_rate = rate;
            }
            "stereo" => self.stereo = parse_bool(value)?,
            "interpolation" => self.interpolation = parse_bool(value)?,
            "headless" => self.headless = parse_bool(value)?,
            "stream_buffer_ms" => {
                let ms: u32 = value.parse().context("Invalid stream buffer length")?;
                if ms == 0 {
                    bail!("Stream buffer length must be positive");
                }
                self.stream_buffer_ms = ms;
            }
            "log_level" => {
                self.log_level = LogLevel::from_name(value)
                    .with_context(|| format!("Unknown log level '{}'", value))?;
            }
            _ => {
                if let Some(sound_type) = key.strip_prefix("gain.") {
                    let gain: f32 = value.parse().context("Invalid gain")?;
                    self.master_gains
                        .insert(sound_type.to_string(), gain.clamp(0.0, 1.0));
                } else {
                    log::warn!("Ignoring unknown audio option '{}'", key);
                }
            }
        }
        Ok(())
    }
}

/// Parse a boolean option value
pub fn parse_bool(value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Ok(true),
        "false" | "no" | "off" | "0" => Ok(false),
        _ => bail!("Invalid boolean value '{}'", value),
    }
}

/// Split property file content into `(line number, key, value)` entries.
///
/// Lines without `=` are skipped with a warning.
fn parse_properties(content: &str) -> Vec<(usize, &str, &str)> {
    let mut entries = Vec::new();

    for (index, line) in content.lines().enumerate() {
        let line = match line.find('#') {
            Some(comment) => &line[..comment],
            None => line,
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match line.split_once('=') {
            Some((key, value)) if !key.trim().is_empty() => {
                entries.push((index + 1, key.trim(), value.trim()));
            }
            _ => log::warn!("Key without value on line {}", index + 1),
        }
    }

    entries
}
