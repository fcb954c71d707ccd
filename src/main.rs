mod cli;

use std::f32::consts::TAU;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use cli::Cli;
use dry_audio::logging::apply_log_level;
use dry_audio::sound::mixer::{AudioDevice, SoundSource};
use dry_audio::sound::{BufferedSoundStream, Sound};
use dry_audio::{AudioOptions, LogLevel};

/// Output frames mixed per device callback
const BLOCK_FRAMES: usize = 1024;

/// Sample rate of generated tones
const TONE_RATE: u32 = 44100;

fn main() -> Result<()> {
    let cli = Cli::parse();

    let initial_level = cli
        .log_level
        .as_deref()
        .and_then(LogLevel::from_name)
        .unwrap_or_default();
    env_logger::Builder::new()
        .filter_level(initial_level.to_level_filter())
        .parse_default_env()
        .init();

    cli.validate()?;

    let options = match &cli.config {
        Some(path) => AudioOptions::load(path)?,
        None => AudioOptions::default(),
    };
    let options = cli.merge_into_options(options)?;
    apply_log_level(options.log_level);

    let device = AudioDevice::new(options);
    let source = SoundSource::new(&device);
    start_playback(&cli, &source)?;

    let file = File::create(&cli.output)
        .with_context(|| format!("Failed to create {}", cli.output.display()))?;
    let mut writer = BufWriter::new(file);

    let frames = render(&cli, &device, &source, &mut writer)?;
    writer.flush().context("Failed to write output")?;

    log::info!(
        "Rendered {} frames ({} channel{}) to {}",
        frames,
        device.channels(),
        if device.channels() == 1 { "" } else { "s" },
        cli.output.display()
    );
    Ok(())
}

/// One sine period repeated over `seconds` at half scale
fn tone(pitch: f32, seconds: f32) -> Vec<i16> {
    let count = (seconds * TONE_RATE as f32) as usize;
    let amplitude = i16::MAX as f32 * 0.5;
    (0..count)
        .map(|i| {
            let phase = TAU * pitch * i as f32 / TONE_RATE as f32;
            (phase.sin() * amplitude) as i16
        })
        .collect()
}

fn start_playback(cli: &Cli, source: &SoundSource) -> Result<()> {
    if let Some(path) = &cli.ogg {
        let data =
            fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
        let mut sound = Sound::load_ogg_vorbis(data)
            .with_context(|| format!("Failed to load {}", path.display()))?;
        sound.set_name(path.display().to_string());
        sound.set_looped(cli.looped);

        let frequency = cli.frequency.unwrap_or(sound.frequency());
        source.play_with_panning(Arc::new(sound), frequency, cli.gain, cli.pan);
        return Ok(());
    }

    let samples = tone(cli.tone, cli.tone_length);
    let frequency = cli.frequency.unwrap_or(TONE_RATE as f32);

    if cli.stream {
        if cli.looped {
            log::warn!("Streams do not loop; playing the tone once");
        }
        let stream = BufferedSoundStream::with_format(TONE_RATE, true, false);
        stream.set_stop_at_end(true);
        stream.add_samples(&samples);

        source.set_frequency(frequency);
        source.set_gain(cli.gain);
        source.set_panning(cli.pan);
        source.play_stream(stream);
    } else {
        let mut sound = Sound::from_samples(&samples, TONE_RATE, false);
        sound.set_name(format!("tone {} Hz", cli.tone));
        sound.set_looped(cli.looped);
        source.play_with_panning(Arc::new(sound), frequency, cli.gain, cli.pan);
    }
    Ok(())
}

/// Mix `cli.duration` seconds in device-sized blocks and write them out
fn render(
    cli: &Cli,
    device: &AudioDevice,
    source: &SoundSource,
    writer: &mut impl Write,
) -> Result<usize> {
    let mix_rate = device.mix_rate();
    let channels = device.channels();
    let total = (cli.duration * mix_rate as f32) as usize;
    let mut block = vec![0i16; BLOCK_FRAMES * channels];
    let mut rendered = 0;

    while rendered < total {
        let frames = (total - rendered).min(BLOCK_FRAMES);
        let out = &mut block[..frames * channels];
        device.mix_to_i16(out);

        for sample in out.iter() {
            writer.write_all(&sample.to_le_bytes())?;
        }
        rendered += frames;

        if let Some(finished) = source.update(frames as f32 / mix_rate as f32) {
            log::info!(
                "Source {} finished at {:.3}s",
                finished.source,
                rendered as f32 / mix_rate as f32
            );
        }
    }

    Ok(rendered)
}
