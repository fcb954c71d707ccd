// mod.rs - Sound source mixer

//! Sound source mixer.
//!
//! Sound sources resample PCM sounds and streams into a 32-bit accumulation
//! buffer with fixed-point stepping, optional linear interpolation, and
//! gain and panning applied per call.
//!
//! # Architecture
//!
//! - `types` - Constants, sound types and auto-remove modes
//! - `resample` - Fixed-point mixing kernels
//! - `source` - Sound sources and stream ring buffers
//! - `spatial` - Positional sources and listeners
//! - `mix` - The audio device: source registry and mix pass
//!
//! # Example
//!
//! ```rust,ignore
//! use dry_audio::sound::mixer::{AudioDevice, SoundSource};
//! use dry_audio::AudioOptions;
//!
//! let device = AudioDevice::new(AudioOptions::default());
//! let source = SoundSource::new(&device);
//! source.play(sound);
//!
//! let mut out = vec![0i16; 2048];
//! device.mix_to_i16(&mut out);
//! ```

pub mod mix;
pub mod resample;
pub mod source;
pub mod spatial;
pub mod types;

pub use mix::{AudioDevice, SourceId};
pub use resample::{MixRequest, PlayHead, Step, Volume};
pub use source::{SoundFinished, SoundSource};
pub use spatial::{SceneId, SoundListener, SpatialSoundSource, Transform};
pub use types::{
    AutoRemoveMode, MAX_FREQUENCY, SOUND_AMBIENT, SOUND_EFFECT, SOUND_MASTER, SOUND_MUSIC,
    SOUND_TYPES, SOUND_VOICE, STREAM_BUFFER_LENGTH,
};
