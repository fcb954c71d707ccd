// mix.rs - Main mixing logic

//! The audio device: source registry and the mix pass.
//!
//! Sources register themselves on construction and deregister on drop. The
//! output callback calls `mix_output` or `mix_to_i16`, which hold the device
//! lock for the whole pass so playback transitions on the simulation thread
//! land between passes.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, MutexGuard};

use crate::config::AudioOptions;
use crate::sound::mixer::source::SoundSource;
use crate::sound::mixer::spatial::SoundListener;
use crate::sound::mixer::types::SOUND_MASTER;

/// Identifier of a registered sound source
pub type SourceId = u64;

/// Output settings and shared state for all sound sources
pub struct AudioDevice {
    options: AudioOptions,
    initialized: bool,
    /// Serializes mix passes against playback transitions
    device_lock: Mutex<()>,
    sources: Mutex<Vec<(SourceId, Weak<SoundSource>)>>,
    next_id: AtomicU64,
    master_gains: Mutex<HashMap<String, f32>>,
    listeners: Mutex<Vec<SoundListener>>,
    /// 32-bit accumulation buffer for `mix_to_i16`
    scratch: Mutex<Vec<i32>>,
}

impl AudioDevice {
    pub fn new(options: AudioOptions) -> Arc<Self> {
        let master_gains = options
            .master_gains
            .iter()
            .map(|(name, gain)| (name.clone(), gain.clamp(0.0, 1.0)))
            .collect();

        log::info!(
            "Audio device: {} Hz, {}, interpolation {}{}",
            options.mix_rate,
            if options.stereo { "stereo" } else { "mono" },
            if options.interpolation { "on" } else { "off" },
            if options.headless { ", headless" } else { "" }
        );

        Arc::new(AudioDevice {
            initialized: !options.headless,
            options,
            device_lock: Mutex::new(()),
            sources: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
            master_gains: Mutex::new(master_gains),
            listeners: Mutex::new(Vec::new()),
            scratch: Mutex::new(Vec::new()),
        })
    }

    pub fn options(&self) -> &AudioOptions {
        &self.options
    }

    pub fn mix_rate(&self) -> u32 {
        self.options.mix_rate
    }

    pub fn is_stereo(&self) -> bool {
        self.options.stereo
    }

    pub fn interpolation(&self) -> bool {
        self.options.interpolation
    }

    pub fn stream_buffer_ms(&self) -> u32 {
        self.options.stream_buffer_ms
    }

    /// Whether an output device drives `mix_output`. Sources of a headless
    /// device advance their time in `update` instead.
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn channels(&self) -> usize {
        if self.options.stereo {
            2
        } else {
            1
        }
    }

    /// Acquire the device lock
    pub fn lock(&self) -> MutexGuard<'_, ()> {
        self.device_lock.lock()
    }

    pub(crate) fn next_source_id(&self) -> SourceId {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    pub(crate) fn add_source(&self, source: &Arc<SoundSource>) {
        self.sources
            .lock()
            .push((source.id(), Arc::downgrade(source)));
    }

    pub(crate) fn remove_source(&self, id: SourceId) {
        self.sources.lock().retain(|(source_id, _)| *source_id != id);
    }

    /// Number of registered sources
    pub fn source_count(&self) -> usize {
        self.sources.lock().len()
    }

    fn live_sources(&self) -> Vec<Arc<SoundSource>> {
        self.sources
            .lock()
            .iter()
            .filter_map(|(_, source)| source.upgrade())
            .collect()
    }

    pub fn listeners(&self) -> Vec<SoundListener> {
        self.listeners.lock().clone()
    }

    pub fn set_listeners(&self, listeners: Vec<SoundListener>) {
        *self.listeners.lock() = listeners;
    }

    pub fn add_listener(&self, listener: SoundListener) {
        self.listeners.lock().push(listener);
    }

    /// Master gain of a sound type, 1.0 when unset
    pub fn master_gain(&self, sound_type: &str) -> f32 {
        self.master_gains
            .lock()
            .get(sound_type)
            .copied()
            .unwrap_or(1.0)
    }

    /// Set the master gain of a sound type and refresh every source
    pub fn set_master_gain(&self, sound_type: &str, gain: f32) {
        self.master_gains
            .lock()
            .insert(sound_type.to_string(), gain.clamp(0.0, 1.0));

        for source in self.live_sources() {
            source.update_master_gain();
        }
    }

    /// Effective master gain of a source of `sound_type`
    pub fn source_master_gain(&self, sound_type: &str) -> f32 {
        let gains = self.master_gains.lock();
        let gain = |name: &str| gains.get(name).copied().unwrap_or(1.0);
        gain(sound_type) * gain(SOUND_MASTER)
    }

    /// Mix `frames` output frames of every playing source additively into
    /// `dest`, which holds interleaved frames in the output layout.
    pub fn mix_output(&self, dest: &mut [i32], frames: usize) {
        if !self.initialized {
            return;
        }

        let frames = frames.min(dest.len() / self.channels());
        let _device = self.lock();
        let sources = self.live_sources();

        for source in &sources {
            source.mix(
                dest,
                frames,
                self.options.mix_rate,
                self.options.stereo,
                self.options.interpolation,
            );
        }
    }

    /// Mix into 16-bit output, clipping the accumulated sum.
    ///
    /// Returns the number of frames written.
    pub fn mix_to_i16(&self, out: &mut [i16]) -> usize {
        let frames = out.len() / self.channels();
        let samples = frames * self.channels();

        let mut scratch = self.scratch.lock();
        scratch.clear();
        scratch.resize(samples, 0);

        self.mix_output(&mut scratch, frames);

        for (out, &sum) in out.iter_mut().zip(scratch.iter()) {
            *out = sum.clamp(i16::MIN as i32, i16::MAX as i32) as i16;
        }

        frames
    }
}

impl std::fmt::Debug for AudioDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioDevice")
            .field("options", &self.options)
            .field("initialized", &self.initialized)
            .field("sources", &self.source_count())
            .finish()
    }
}
