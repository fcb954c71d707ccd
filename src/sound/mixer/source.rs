// source.rs - Sound sources

//! Sound sources: one playback instance per sound emitting entity.
//!
//! The simulation thread drives a source through `play`, `stop`, `seek` and
//! the scalar setters, and calls `update` once per tick. The audio thread
//! calls `mix` from the device's mix pass.
//!
//! Structural playback state (which sound or stream is playing and where)
//! lives behind a per-source lock. Transitions on a playing source also
//! take the device lock, so they never land in the middle of a mix pass.
//! Frequency, gain, attenuation and panning are relaxed atomics that the
//! mixer reads once per call without locking.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use portable_atomic::AtomicF32;

use crate::sound::buffer::Sound;
use crate::sound::mixer::mix::{AudioDevice, SourceId};
use crate::sound::mixer::resample::{self, MixRequest, PlayHead, Volume};
use crate::sound::mixer::types::{
    AutoRemoveMode, MAX_FREQUENCY, SOUND_EFFECT, SOUND_MASTER, STREAM_SAFETY_SAMPLES,
};
use crate::sound::stream::SoundStream;

/// Notification returned by `SoundSource::update` when playback finishes
#[derive(Debug, Clone)]
pub struct SoundFinished {
    pub source: SourceId,
    /// The sound that was playing, if any
    pub sound: Option<Arc<Sound>>,
    /// What the owner should remove in response
    pub auto_remove: AutoRemoveMode,
}

/// Stream and ring buffer released by a transition, dropped outside the locks
type Detached = Option<(Box<dyn SoundStream>, Sound)>;

/// Playback prepared before taking any lock
enum PlayRequest {
    Direct(Arc<Sound>),
    Stream {
        stream: Box<dyn SoundStream>,
        buffer: Sound,
        sound: Option<Arc<Sound>>,
    },
    Stop {
        sound: Option<Arc<Sound>>,
    },
}

impl PlayRequest {
    fn for_sound(sound: Option<Arc<Sound>>, buffer_ms: u32) -> Self {
        match sound {
            Some(sound) if sound.is_compressed() => match sound.decoder_stream() {
                Some(stream) => Self::for_stream(stream, Some(sound), buffer_ms),
                None => PlayRequest::Stop { sound: Some(sound) },
            },
            Some(sound) if sound.has_data() => PlayRequest::Direct(sound),
            _ => PlayRequest::Stop { sound: None },
        }
    }

    fn for_stream(
        stream: Box<dyn SoundStream>,
        sound: Option<Arc<Sound>>,
        buffer_ms: u32,
    ) -> Self {
        let frames = stream.int_frequency() as usize * buffer_ms as usize / 1000;
        let mut buffer = Sound::new();
        buffer.set_size(frames * stream.sample_size());
        buffer.set_format(
            stream.int_frequency(),
            stream.is_sixteen_bit(),
            stream.is_stereo(),
        );
        buffer.set_looped(true);

        PlayRequest::Stream {
            stream,
            buffer,
            sound,
        }
    }
}

/// Structural playback state shared with the audio thread
#[derive(Default)]
struct Playback {
    sound: Option<Arc<Sound>>,
    stream: Option<Box<dyn SoundStream>>,
    /// Ring buffer adapting `stream` to the mixing kernels
    stream_buffer: Option<Sound>,
    head: PlayHead,
    /// Seconds played
    time_position: f32,
    /// Bytes at the front of the ring carried over to the next mix
    unused_stream_size: usize,
    send_finished_event: bool,
}

impl Playback {
    fn is_playing(&self) -> bool {
        (self.sound.is_some() || self.stream.is_some()) && self.head.position.is_some()
    }

    fn start(&mut self, request: PlayRequest) -> Detached {
        self.time_position = 0.0;

        match request {
            PlayRequest::Direct(sound) => {
                let detached = self.detach();
                self.sound = Some(sound);
                self.head = PlayHead::at(0);
                self.send_finished_event = true;
                detached
            }
            PlayRequest::Stream {
                stream,
                buffer,
                sound,
            } => {
                let detached = self.detach();
                self.stream = Some(stream);
                self.stream_buffer = Some(buffer);
                self.sound = sound;
                self.unused_stream_size = 0;
                self.head = PlayHead::at(0);
                self.send_finished_event = true;
                detached
            }
            PlayRequest::Stop { sound } => {
                let detached = self.stop();
                self.sound = sound;
                detached
            }
        }
    }

    fn stop(&mut self) -> Detached {
        self.head.position = None;
        self.time_position = 0.0;
        self.detach()
    }

    fn detach(&mut self) -> Detached {
        let stream = self.stream.take();
        let buffer = self.stream_buffer.take();
        stream.zip(buffer)
    }

    fn set_play_position(&mut self, offset: usize) {
        if self.stream.is_some() {
            return;
        }
        let Some(sound) = self.sound.as_ref() else {
            return;
        };

        let mut pos = offset;
        if sound.is_sixteen_bit() && pos & 1 == 1 {
            pos += 1;
        }
        pos = pos.min(sound.end());

        self.head.position = Some(pos);
        self.time_position = direct_time(sound, pos);
    }

    fn mix(&mut self, dest: &mut [i32], request: &MixRequest) {
        if !self.is_playing() || request.mix_rate == 0 {
            return;
        }

        if let (Some(stream), Some(buffer)) = (self.stream.as_mut(), self.stream_buffer.as_mut()) {
            let channels = if request.stereo { 2 } else { 1 };
            let request = MixRequest {
                frames: request.frames.min(dest.len() / channels),
                ..*request
            };

            let sample_size = stream.sample_size();
            let capacity = buffer.end();
            let unused = self.unused_stream_size.min(capacity);
            let source_frames = (request.frames as f64 * request.frequency as f64
                / request.mix_rate as f64)
                .ceil() as usize;
            let needed = ((source_frames + STREAM_SAFETY_SAMPLES) * sample_size)
                .saturating_sub(unused)
                .min(capacity - unused);

            // The ring always replays from its start
            self.head.position = Some(0);

            let region = &mut buffer.data_mut()[unused..unused + needed];
            let produced = if needed > 0 {
                stream.get_data(region).min(needed)
            } else {
                0
            };
            if produced < needed {
                log::trace!("Stream starved: {} of {} bytes", produced, needed);
                region[produced..].fill(0);
            }
            let filled = unused + needed;

            resample::mix_sound(buffer, &mut self.head, dest, &request);

            let stream_frequency = stream.frequency();
            if stream_frequency > 0.0 {
                self.time_position += request.frames as f32 / request.mix_rate as f32
                    * request.frequency
                    / stream_frequency;
            }

            let consumed = self.head.position.unwrap_or(filled);
            self.unused_stream_size = filled.saturating_sub(consumed);
            if self.unused_stream_size > 0 {
                buffer.data_mut().copy_within(consumed..filled, 0);
            }

            if needed > 0 && produced == 0 && stream.stop_at_end() {
                self.head.position = None;
            }
        } else if let Some(sound) = self.sound.as_deref() {
            resample::mix_sound(sound, &mut self.head, dest, request);
            if let Some(pos) = self.head.position {
                self.time_position = direct_time(sound, pos);
            }
        }
    }
}

/// Seconds into `sound` at byte offset `pos`
fn direct_time(sound: &Sound, pos: usize) -> f32 {
    let bytes_per_second = sound.sample_size() as f32 * sound.frequency();
    if bytes_per_second > 0.0 {
        pos as f32 / bytes_per_second
    } else {
        0.0
    }
}

#[derive(Debug)]
struct Control {
    sound_type: String,
    auto_remove: AutoRemoveMode,
}

/// A playback instance mixing one sound or stream at a time
pub struct SoundSource {
    id: SourceId,
    device: Arc<AudioDevice>,
    playback: Mutex<Playback>,
    /// Mirrors `Playback::is_playing` for the lock-free early out in `mix`
    playing: AtomicBool,
    enabled: AtomicBool,
    frequency: AtomicF32,
    gain: AtomicF32,
    attenuation: AtomicF32,
    panning: AtomicF32,
    master_gain: AtomicF32,
    control: Mutex<Control>,
    network_dirty: AtomicBool,
}

impl SoundSource {
    /// Create a source and register it with `device`
    pub fn new(device: &Arc<AudioDevice>) -> Arc<Self> {
        Self::with_attenuation(device, 1.0)
    }

    pub(crate) fn with_attenuation(device: &Arc<AudioDevice>, attenuation: f32) -> Arc<Self> {
        let source = Arc::new(SoundSource {
            id: device.next_source_id(),
            device: Arc::clone(device),
            playback: Mutex::new(Playback::default()),
            playing: AtomicBool::new(false),
            enabled: AtomicBool::new(true),
            frequency: AtomicF32::new(0.0),
            gain: AtomicF32::new(1.0),
            attenuation: AtomicF32::new(attenuation),
            panning: AtomicF32::new(0.0),
            master_gain: AtomicF32::new(1.0),
            control: Mutex::new(Control {
                sound_type: SOUND_EFFECT.to_string(),
                auto_remove: AutoRemoveMode::Disabled,
            }),
            network_dirty: AtomicBool::new(false),
        });
        device.add_source(&source);
        source.update_master_gain();
        source
    }

    pub fn id(&self) -> SourceId {
        self.id
    }

    pub fn device(&self) -> &Arc<AudioDevice> {
        &self.device
    }

    /// Run a playback transition, taking the device lock when the source is
    /// playing and a mix pass may be reading it
    fn with_transition_lock<R>(&self, f: impl FnOnce(&mut Playback) -> R) -> R {
        let _device = self
            .playing
            .load(Ordering::Acquire)
            .then(|| self.device.lock());
        let mut playback = self.playback.lock();
        let result = f(&mut playback);
        self.playing.store(playback.is_playing(), Ordering::Release);
        result
    }

    /// Play a sound from the start. `None` or an empty sound stops playback.
    pub fn play(&self, sound: impl Into<Option<Arc<Sound>>>) {
        let sound = sound.into();
        if let Some(sound) = sound.as_ref() {
            if self.frequency() == 0.0 {
                self.set_frequency(sound.frequency());
            }
        }

        let request = PlayRequest::for_sound(sound, self.device.stream_buffer_ms());
        let detached = self.with_transition_lock(|playback| playback.start(request));
        drop(detached);

        if self.is_playing() {
            log::debug!("Source {} playing", self.id);
        }
        self.mark_network_update();
    }

    pub fn play_with_frequency(&self, sound: impl Into<Option<Arc<Sound>>>, frequency: f32) {
        self.set_frequency(frequency);
        self.play(sound);
    }

    pub fn play_with_gain(
        &self,
        sound: impl Into<Option<Arc<Sound>>>,
        frequency: f32,
        gain: f32,
    ) {
        self.set_frequency(frequency);
        self.set_gain(gain);
        self.play(sound);
    }

    pub fn play_with_panning(
        &self,
        sound: impl Into<Option<Arc<Sound>>>,
        frequency: f32,
        gain: f32,
        panning: f32,
    ) {
        self.set_frequency(frequency);
        self.set_gain(gain);
        self.set_panning(panning);
        self.play(sound);
    }

    /// Play a stream through a ring buffer. Any current sound is cleared.
    pub fn play_stream(&self, stream: impl SoundStream + 'static) {
        self.play_boxed_stream(Box::new(stream));
    }

    pub fn play_boxed_stream(&self, stream: Box<dyn SoundStream>) {
        if self.frequency() == 0.0 {
            self.set_frequency(stream.frequency());
        }

        let request = PlayRequest::for_stream(stream, None, self.device.stream_buffer_ms());
        let detached = self.with_transition_lock(|playback| playback.start(request));
        drop(detached);

        log::debug!("Source {} playing stream", self.id);
    }

    pub fn stop(&self) {
        let detached = self.with_transition_lock(Playback::stop);
        drop(detached);

        log::debug!("Source {} stopped", self.id);
        self.mark_network_update();
    }

    /// Seek to `seconds`, clamped to the sound's length.
    ///
    /// Ignored for streams without a compressed sound behind them.
    pub fn seek(&self, seconds: f32) {
        let (sound, streaming) = {
            let playback = self.playback.lock();
            (playback.sound.clone(), playback.stream.is_some())
        };
        let Some(sound) = sound else {
            return;
        };
        if streaming && !sound.is_compressed() {
            return;
        }

        let seconds = seconds.max(0.0).min(sound.length());

        if !streaming {
            let offset = seconds * sound.sample_size() as f32 * sound.frequency();
            self.set_position_attr(offset as usize);
            return;
        }

        self.with_transition_lock(|playback| {
            let Some(stream) = playback.stream.as_mut() else {
                return;
            };
            let sample = (seconds * stream.frequency()) as u32;
            if stream.seek(sample) {
                playback.time_position = seconds;
                playback.unused_stream_size = 0;
            } else {
                log::warn!("Source {}: stream seek to {:.3}s failed", self.id, seconds);
            }
        });
    }

    /// Set the byte offset of direct playback. Starts playback at that
    /// offset if the source is stopped.
    pub fn set_play_position(&self, offset: usize) {
        let _device = self.device.lock();
        let mut playback = self.playback.lock();
        playback.set_play_position(offset);
        self.playing.store(playback.is_playing(), Ordering::Release);
    }

    /// Set the sound type used for master gain lookup. `Master` is not a
    /// valid type for a source and is ignored.
    pub fn set_sound_type(&self, sound_type: &str) {
        if sound_type == SOUND_MASTER {
            return;
        }
        self.control.lock().sound_type = sound_type.to_string();
        self.update_master_gain();
        self.mark_network_update();
    }

    pub fn set_frequency(&self, frequency: f32) {
        self.frequency
            .store(frequency.clamp(0.0, MAX_FREQUENCY), Ordering::Relaxed);
        self.mark_network_update();
    }

    pub fn set_gain(&self, gain: f32) {
        self.gain.store(gain.max(0.0), Ordering::Relaxed);
        self.mark_network_update();
    }

    pub fn set_attenuation(&self, attenuation: f32) {
        self.attenuation
            .store(attenuation.clamp(0.0, 1.0), Ordering::Relaxed);
        self.mark_network_update();
    }

    pub fn set_panning(&self, panning: f32) {
        self.panning.store(panning.clamp(-1.0, 1.0), Ordering::Relaxed);
        self.mark_network_update();
    }

    /// Store spatial results without touching replication state
    pub(crate) fn store_spatial(&self, attenuation: f32, panning: Option<f32>) {
        self.attenuation
            .store(attenuation.clamp(0.0, 1.0), Ordering::Relaxed);
        if let Some(panning) = panning {
            self.panning.store(panning.clamp(-1.0, 1.0), Ordering::Relaxed);
        }
    }

    pub fn set_auto_remove_mode(&self, mode: AutoRemoveMode) {
        self.control.lock().auto_remove = mode;
        self.mark_network_update();
    }

    /// Disabled sources neither mix nor update
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    /// Refresh the cached master gain from the device
    pub fn update_master_gain(&self) {
        let gain = self.device.source_master_gain(&self.sound_type());
        self.master_gain.store(gain, Ordering::Relaxed);
    }

    pub fn sound(&self) -> Option<Arc<Sound>> {
        self.playback.lock().sound.clone()
    }

    /// Byte offset of the play head, `None` when stopped
    pub fn play_position(&self) -> Option<usize> {
        self.playback.lock().head.position
    }

    pub fn sound_type(&self) -> String {
        self.control.lock().sound_type.clone()
    }

    pub fn time_position(&self) -> f32 {
        self.playback.lock().time_position
    }

    pub fn frequency(&self) -> f32 {
        self.frequency.load(Ordering::Relaxed)
    }

    pub fn gain(&self) -> f32 {
        self.gain.load(Ordering::Relaxed)
    }

    pub fn attenuation(&self) -> f32 {
        self.attenuation.load(Ordering::Relaxed)
    }

    pub fn panning(&self) -> f32 {
        self.panning.load(Ordering::Relaxed)
    }

    pub fn master_gain(&self) -> f32 {
        self.master_gain.load(Ordering::Relaxed)
    }

    pub fn auto_remove_mode(&self) -> AutoRemoveMode {
        self.control.lock().auto_remove
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    pub fn is_playing(&self) -> bool {
        self.playing.load(Ordering::Acquire)
    }

    /// Current sound, as stored by the attribute system
    pub fn sound_attr(&self) -> Option<Arc<Sound>> {
        self.sound()
    }

    /// Replace the sound. A playing source restarts with the new sound, a
    /// stopped one just swaps it and frees any stream.
    pub fn set_sound_attr(&self, sound: Option<Arc<Sound>>) {
        if self.is_playing() {
            self.play(sound);
        } else {
            let detached = self.with_transition_lock(|playback| {
                let detached = playback.detach();
                playback.sound = sound;
                detached
            });
            drop(detached);
        }
    }

    pub fn set_playing_attr(&self, playing: bool) {
        if playing {
            if !self.is_playing() {
                self.play(self.sound());
            }
        } else {
            self.stop();
        }
    }

    /// Byte offset of direct playback from the sound start, 0 when stopped or streaming
    pub fn position_attr(&self) -> usize {
        let playback = self.playback.lock();
        match (&playback.sound, &playback.stream, playback.head.position) {
            (Some(sound), None, Some(pos)) => pos - sound.start(),
            _ => 0,
        }
    }

    pub fn set_position_attr(&self, offset: usize) {
        let start = match self.playback.lock().sound.as_ref() {
            Some(sound) => sound.start(),
            None => return,
        };
        self.set_play_position(start + offset);
    }

    pub(crate) fn mark_network_update(&self) {
        self.network_dirty.store(true, Ordering::Relaxed);
    }

    /// Return and clear the pending replication flag
    pub fn take_network_update(&self) -> bool {
        self.network_dirty.swap(false, Ordering::Relaxed)
    }

    fn volume(&self) -> Volume {
        let total_gain = self.master_gain() * self.attenuation() * self.gain();
        Volume::new(total_gain, self.panning())
    }

    /// Mix `frames` output frames additively into `dest`.
    ///
    /// Called from the device's mix pass with the device lock held.
    pub fn mix(&self, dest: &mut [i32], frames: usize, mix_rate: u32, stereo: bool, interpolate: bool) {
        if !self.playing.load(Ordering::Acquire) || !self.is_enabled() {
            return;
        }

        let request = MixRequest {
            frames,
            mix_rate,
            stereo,
            interpolate,
            frequency: self.frequency(),
            volume: self.volume(),
        };

        let mut playback = self.playback.lock();
        playback.mix(dest, &request);
        self.playing.store(playback.is_playing(), Ordering::Release);
    }

    /// Advance time without mixing, for devices without output
    fn mix_null(&self, time_step: f32) {
        let frequency = self.frequency();
        let mut playback = self.playback.lock();
        let Some(sound) = playback.sound.clone() else {
            return;
        };
        if playback.head.position.is_none() || sound.frequency() <= 0.0 {
            return;
        }

        playback.time_position += time_step * frequency / sound.frequency();

        let length = sound.length();
        if playback.time_position >= length {
            if sound.is_looped() {
                playback.time_position -= length;
            } else {
                playback.head.position = None;
                playback.time_position = 0.0;
            }
        }
        self.playing.store(playback.is_playing(), Ordering::Release);
    }

    /// Per-tick update on the simulation thread.
    ///
    /// Returns the finished notification once when playback has ended.
    pub fn update(&self, time_step: f32) -> Option<SoundFinished> {
        if !self.is_enabled() {
            return None;
        }

        if !self.device.is_initialized() {
            self.mix_null(time_step);
        }

        let (finished, detached) = {
            let mut playback = self.playback.lock();

            let detached = if playback.stream.is_some() && playback.head.position.is_none() {
                playback.stop()
            } else {
                None
            };

            let finished = if !playback.is_playing() && playback.send_finished_event {
                playback.send_finished_event = false;
                Some(playback.sound.clone())
            } else {
                None
            };
            self.playing.store(playback.is_playing(), Ordering::Release);
            (finished, detached)
        };
        drop(detached);

        finished.map(|sound| {
            log::debug!("Source {} finished", self.id);
            SoundFinished {
                source: self.id,
                sound,
                auto_remove: self.auto_remove_mode(),
            }
        })
    }
}

impl Drop for SoundSource {
    fn drop(&mut self) {
        self.device.remove_source(self.id);
    }
}

impl std::fmt::Debug for SoundSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SoundSource")
            .field("id", &self.id)
            .field("playing", &self.is_playing())
            .field("frequency", &self.frequency())
            .field("gain", &self.gain())
            .field("attenuation", &self.attenuation())
            .field("panning", &self.panning())
            .finish()
    }
}
