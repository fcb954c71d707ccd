//! Integration tests for the sound source mixer

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use dry_audio::sound::mixer::{
    AudioDevice, AutoRemoveMode, SoundListener, SoundSource, SpatialSoundSource, Transform,
};
use dry_audio::sound::{BufferedSoundStream, Sound};
use dry_audio::AudioOptions;
use glam::Vec3;
use rstest::rstest;

fn mono_device() -> Arc<AudioDevice> {
    AudioDevice::new(
        AudioOptions::default()
            .with_stereo(false)
            .with_interpolation(false),
    )
}

fn ramp(count: usize) -> Vec<i16> {
    (0..count).map(|i| (i as i32 * 7 - 3000) as i16).collect()
}

#[rstest]
#[case(1.0)]
#[case(0.5)]
#[case(2.0)]
fn test_stream_round_trip_across_calls(#[case] ratio: f32) {
    const SAMPLES: usize = 1000;
    const CALL_FRAMES: usize = 37;

    let device = mono_device();
    let source = SoundSource::new(&device);
    let samples = ramp(SAMPLES);

    // Uneven buffers so reads straddle buffer boundaries
    let stream = BufferedSoundStream::with_format(44100, true, false);
    for chunk in samples.chunks(93) {
        stream.add_samples(chunk);
    }

    source.set_frequency(44100.0 * ratio);
    source.play_stream(stream.clone());

    let played = (SAMPLES as f32 / ratio) as usize;
    let total = played + 3 * CALL_FRAMES;
    let mut output = Vec::with_capacity(total);
    while output.len() < total {
        let mut block = vec![0; CALL_FRAMES];
        device.mix_output(&mut block, CALL_FRAMES);
        output.extend_from_slice(&block);
    }

    for (j, &value) in output.iter().enumerate() {
        let index = (j as f32 * ratio) as usize;
        let expected = if j < played { samples[index] as i32 } else { 0 };
        assert_eq!(value, expected, "frame {} at ratio {}", j, ratio);
    }

    // The stream does not stop at its end, so the source keeps playing silence
    assert!(source.is_playing());
    assert_eq!(stream.buffer_num_bytes(), 0);
}

#[test]
fn test_stream_stop_at_end_finishes_source() {
    let device = mono_device();
    let source = SoundSource::new(&device);
    source.set_auto_remove_mode(AutoRemoveMode::RemoveSelf);

    let stream = BufferedSoundStream::with_format(44100, true, false);
    stream.set_stop_at_end(true);
    stream.add_samples(&ramp(100));
    source.play_stream(stream);

    let mut block = vec![0; 64];
    for _ in 0..4 {
        device.mix_output(&mut block, 64);
    }
    assert!(!source.is_playing());

    let finished = source.update(0.0).expect("finished notification");
    assert_eq!(finished.source, source.id());
    assert_eq!(finished.auto_remove, AutoRemoveMode::RemoveSelf);
    assert!(finished.sound.is_none());
}

#[test]
fn test_concurrent_play_and_stop() {
    const VALUE: i16 = 1000;

    let device = mono_device();
    let source = SoundSource::new(&device);
    let sound = Arc::new(Sound::from_samples(&[VALUE; 300], 44100, false));
    let mut looped = Sound::from_samples(&[VALUE; 64], 44100, false);
    looped.set_looped(true);
    let looped = Arc::new(looped);

    let done = Arc::new(AtomicBool::new(false));
    let mixer = {
        let device = Arc::clone(&device);
        let done = Arc::clone(&done);
        thread::spawn(move || {
            let mut out = vec![0i16; 128];
            let mut passes = 0usize;
            while !done.load(Ordering::Relaxed) || passes < 100 {
                device.mix_to_i16(&mut out);
                for &sample in &out {
                    assert!(sample == 0 || sample == VALUE, "corrupt sample {}", sample);
                }
                passes += 1;
            }
            passes
        })
    };

    for i in 0..2000 {
        match i % 6 {
            0 => source.play(Arc::clone(&sound)),
            1 => source.stop(),
            2 => source.play(Arc::clone(&looped)),
            3 => {
                let stream = BufferedSoundStream::with_format(44100, true, false);
                stream.add_samples(&[VALUE; 200]);
                source.play_stream(stream);
            }
            4 => source.set_play_position(i % 500),
            _ => {
                source.update(0.01);
                source.set_sound_attr(Some(Arc::clone(&sound)));
            }
        }
    }
    done.store(true, Ordering::Relaxed);

    let passes = mixer.join().expect("mixer thread panicked");
    assert!(passes >= 100);
}

#[test]
fn test_sources_created_and_dropped_while_mixing() {
    let device = mono_device();
    let sound = Arc::new(Sound::from_samples(&[500; 64], 44100, false));

    let done = Arc::new(AtomicBool::new(false));
    let mixer = {
        let device = Arc::clone(&device);
        let done = Arc::clone(&done);
        thread::spawn(move || {
            let mut out = vec![0i16; 64];
            while !done.load(Ordering::Relaxed) {
                device.mix_to_i16(&mut out);
            }
        })
    };

    for _ in 0..500 {
        let source = SoundSource::new(&device);
        source.play(Arc::clone(&sound));
    }
    done.store(true, Ordering::Relaxed);
    mixer.join().expect("mixer thread panicked");

    assert_eq!(device.source_count(), 0);
}

fn listener_at(x: f32) -> SoundListener {
    SoundListener::new(Transform::from_position(Vec3::new(x, 0.0, 0.0)))
}

#[test]
fn test_symmetric_listeners_center_panning() {
    let device = AudioDevice::new(AudioOptions::default());
    let source = SpatialSoundSource::new(&device);
    source.set_transform(Some(Transform::from_position(Vec3::ZERO)));
    device.set_listeners(vec![listener_at(-5.0), listener_at(5.0)]);

    source.calculate_attenuation();
    assert!(source.panning().abs() < 1e-6);
    assert!((source.attenuation() - 0.9025).abs() < 1e-5);
}

#[rstest]
#[case(5.0, 1.0)]
#[case(-5.0, -1.0)]
fn test_one_sided_listener_pans_fully(#[case] emitter_x: f32, #[case] expected: f32) {
    let device = AudioDevice::new(AudioOptions::default());
    let source = SpatialSoundSource::new(&device);
    source.set_transform(Some(Transform::from_position(Vec3::new(emitter_x, 0.0, 0.0))));
    device.add_listener(listener_at(0.0));

    source.calculate_attenuation();
    assert!((source.panning() - expected).abs() < 1e-6);
}

#[test]
fn test_spatial_source_mixes_to_one_channel() {
    let device = AudioDevice::new(AudioOptions::default().with_interpolation(false));
    let source = SpatialSoundSource::new(&device);
    source.set_transform(Some(Transform::from_position(Vec3::new(10.0, 0.0, 0.0))));
    device.add_listener(listener_at(0.0));

    source.play(Arc::new(Sound::from_samples(&[1000; 256], 44100, false)));

    // Silent until the first tick computes attenuation
    let mut out = vec![0i16; 16];
    device.mix_to_i16(&mut out);
    assert_eq!(out, vec![0; 16]);

    assert!(source.update(0.0).is_none());
    device.mix_to_i16(&mut out);
    for frame in out.chunks(2) {
        assert_eq!(frame[0], 0);
        assert!(frame[1] > 1000);
    }
}

#[test]
fn test_headless_device_finishes_in_update() {
    let device = AudioDevice::new(AudioOptions::headless());
    let source = SoundSource::new(&device);
    source.play(Arc::new(Sound::from_samples(&[0; 4410], 44100, false)));

    let mut finished = None;
    for _ in 0..20 {
        if let Some(event) = source.update(1.0 / 60.0) {
            finished = Some(event);
            break;
        }
    }
    let finished = finished.expect("sound should finish within 20 ticks");
    assert_eq!(finished.source, source.id());
    assert!(!source.is_playing());
}
