use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use dry_audio::config::parse_bool;
use dry_audio::{AudioOptions, LogLevel};

/// Render a sound through a sound source into raw 16-bit PCM
#[derive(Parser, Debug)]
#[command(name = "dry-audio-render")]
#[command(version = "0.1.0")]
#[command(about = "Render a tone or Ogg Vorbis file through the sound source mixer", long_about = None)]
pub struct Cli {
    /// Audio configuration file
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Output file for little-endian 16-bit PCM
    #[arg(short, long, value_name = "FILE")]
    pub output: PathBuf,

    /// Ogg Vorbis file to render instead of a generated tone
    #[arg(long, value_name = "FILE")]
    pub ogg: Option<PathBuf>,

    /// Tone pitch in Hz
    #[arg(short, long, default_value_t = 440.0, value_name = "HZ")]
    pub tone: f32,

    /// Length of the generated tone in seconds
    #[arg(long, default_value_t = 1.0, value_name = "SECONDS")]
    pub tone_length: f32,

    /// Playback frequency of the source; defaults to the sound's own rate
    #[arg(short, long, value_name = "HZ")]
    pub frequency: Option<f32>,

    /// Source gain
    #[arg(short, long, default_value_t = 1.0)]
    pub gain: f32,

    /// Stereo panning from -1 (left) to 1 (right)
    #[arg(short, long, default_value_t = 0.0, allow_hyphen_values = true)]
    pub pan: f32,

    /// Rendered duration in seconds
    #[arg(short, long, default_value_t = 1.0, value_name = "SECONDS")]
    pub duration: f32,

    /// Loop the sound
    #[arg(short, long = "loop")]
    pub looped: bool,

    /// Feed the tone through a buffered stream instead of playing it directly
    #[arg(short, long)]
    pub stream: bool,

    /// Output sample rate
    #[arg(short, long, value_name = "HZ")]
    pub mix_rate: Option<u32>,

    /// Mono output
    #[arg(long)]
    pub mono: bool,

    /// Linear interpolation (true/false)
    #[arg(long, value_name = "BOOL")]
    pub interpolation: Option<String>,

    /// Log level (nothing, error, warning, info, debug, all)
    #[arg(long, value_name = "LEVEL")]
    pub log_level: Option<String>,
}

impl Cli {
    /// Merge CLI arguments into the options struct
    pub fn merge_into_options(&self, mut opts: AudioOptions) -> Result<AudioOptions> {
        if let Some(rate) = self.mix_rate {
            if rate == 0 {
                bail!("Mix rate must be positive");
            }
            opts.mix_rate = rate;
        }
        if self.mono {
            opts.stereo = false;
        }
        if let Some(ref interpolation) = self.interpolation {
            opts.interpolation = parse_bool(interpolation).context("Invalid interpolation flag")?;
        }
        if let Some(ref level) = self.log_level {
            opts.log_level = LogLevel::from_name(level)
                .with_context(|| format!("Unknown log level '{}'", level))?;
        }
        if opts.headless {
            log::warn!("Ignoring headless option: rendering needs mixed output");
            opts.headless = false;
        }
        Ok(opts)
    }

    /// Check the numeric arguments
    pub fn validate(&self) -> Result<()> {
        if !(self.duration > 0.0) {
            bail!("Duration must be positive");
        }
        if !(self.tone > 0.0) {
            bail!("Tone pitch must be positive");
        }
        if !(self.tone_length > 0.0) {
            bail!("Tone length must be positive");
        }
        if let Some(frequency) = self.frequency {
            if !(frequency > 0.0) {
                bail!("Playback frequency must be positive");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        let mut argv = vec!["dry-audio-render", "-o", "out.raw"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_defaults() {
        let cli = parse(&[]);
        assert_eq!(cli.tone, 440.0);
        assert_eq!(cli.gain, 1.0);
        assert_eq!(cli.pan, 0.0);
        assert!(!cli.looped);
        assert!(!cli.stream);
        assert!(cli.validate().is_ok());
    }

    #[test]
    fn test_negative_pan() {
        let cli = parse(&["--pan", "-0.5", "--loop"]);
        assert_eq!(cli.pan, -0.5);
        assert!(cli.looped);
    }

    #[test]
    fn test_output_is_required() {
        assert!(Cli::try_parse_from(["dry-audio-render"]).is_err());
    }

    #[test]
    fn test_merge_into_options() {
        let cli = parse(&[
            "--mix-rate",
            "22050",
            "--mono",
            "--interpolation",
            "off",
            "--log-level",
            "debug",
        ]);
        let opts = cli.merge_into_options(AudioOptions::headless()).unwrap();
        assert_eq!(opts.mix_rate, 22050);
        assert!(!opts.stereo);
        assert!(!opts.interpolation);
        assert_eq!(opts.log_level, LogLevel::Debug);
        assert!(!opts.headless);
    }

    #[test]
    fn test_merge_rejects_bad_values() {
        let cli = parse(&["--interpolation", "sometimes"]);
        assert!(cli.merge_into_options(AudioOptions::default()).is_err());

        let cli = parse(&["--mix-rate", "0"]);
        assert!(cli.merge_into_options(AudioOptions::default()).is_err());
    }

    #[test]
    fn test_validate() {
        assert!(parse(&["--duration", "0"]).validate().is_err());
        assert!(parse(&["--frequency=-1"]).validate().is_err());
        assert!(parse(&["--tone-length", "0.5"]).validate().is_ok());
    }
}
