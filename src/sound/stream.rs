//! Pull-based PCM stream interface
//!
//! A `SoundStream` produces raw interleaved PCM bytes on demand. The mixer
//! pulls from it on the audio thread, so implementations must be `Send` and
//! must never block for long inside `get_data`.

use super::formats::AudioFormat;

/// Format of the PCM data a stream produces
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StreamFormat {
    /// Native sample rate in Hz
    pub frequency: u32,
    /// 16-bit samples if true, 8-bit otherwise
    pub sixteen_bit: bool,
    /// Interleaved stereo if true
    pub stereo: bool,
}

impl StreamFormat {
    pub fn new(frequency: u32, sixteen_bit: bool, stereo: bool) -> Self {
        Self {
            frequency,
            sixteen_bit,
            stereo,
        }
    }

    pub fn audio_format(&self) -> AudioFormat {
        AudioFormat::from_flags(self.sixteen_bit, self.stereo)
    }

    /// Bytes per frame
    pub fn sample_size(&self) -> usize {
        self.audio_format().sample_size()
    }
}

impl Default for StreamFormat {
    fn default() -> Self {
        Self::new(44100, false, false)
    }
}

/// Producer of raw PCM bytes
pub trait SoundStream: Send {
    /// Write up to `dest.len()` bytes and return how many were produced.
    fn get_data(&mut self, dest: &mut [u8]) -> usize;

    /// Returns the format of the produced data
    fn format(&self) -> StreamFormat;

    /// Seek to a sample frame. Returns false if the stream cannot seek.
    fn seek(&mut self, _sample_number: u32) -> bool {
        false
    }

    /// Whether playback should stop once the stream produces no data
    fn stop_at_end(&self) -> bool {
        false
    }

    fn sample_size(&self) -> usize {
        self.format().sample_size()
    }

    fn frequency(&self) -> f32 {
        self.format().frequency as f32
    }

    fn int_frequency(&self) -> u32 {
        self.format().frequency
    }

    fn is_sixteen_bit(&self) -> bool {
        self.format().sixteen_bit
    }

    fn is_stereo(&self) -> bool {
        self.format().stereo
    }
}

/// Creates decoder streams for compressed sounds
///
/// Each call returns a fresh stream positioned at the beginning, so several
/// sources can play the same compressed sound independently.
pub trait StreamFactory: Send + Sync {
    fn create_stream(&self, looped: bool) -> Option<Box<dyn SoundStream>>;
}

impl<F> StreamFactory for F
where
    F: Fn(bool) -> Option<Box<dyn SoundStream>> + Send + Sync,
{
    fn create_stream(&self, looped: bool) -> Option<Box<dyn SoundStream>> {
        self(looped)
    }
}
