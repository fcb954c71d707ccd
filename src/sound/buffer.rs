// buffer.rs - Sound sample buffers

//! PCM sample buffers played by sound sources.
//!
//! A `Sound` owns its sample bytes and describes the playable region with
//! byte offsets: playback starts at 0, a one-shot sound stops at `end`, and
//! a looped sound jumps back to `repeat` when it reaches `end`.
//!
//! Compressed sounds carry no sample data. Instead they hold a
//! `StreamFactory` that creates a decoder stream for each playback.

use std::fmt;
use std::sync::Arc;

use super::formats::AudioFormat;
use super::stream::{SoundStream, StreamFactory, StreamFormat};

/// Default sample rate for new sounds
pub const DEFAULT_FREQUENCY: u32 = 44100;

/// PCM sound resource
pub struct Sound {
    name: String,
    data: Vec<u8>,
    repeat: usize,
    end: usize,
    frequency: u32,
    looped: bool,
    sixteen_bit: bool,
    stereo: bool,
    compressed: Option<Arc<dyn StreamFactory>>,
    compressed_length: f32,
}

impl Sound {
    /// Create an empty uncompressed 8-bit mono sound
    pub fn new() -> Self {
        Sound {
            name: String::new(),
            data: Vec::new(),
            repeat: 0,
            end: 0,
            frequency: DEFAULT_FREQUENCY,
            looped: false,
            sixteen_bit: false,
            stereo: false,
            compressed: None,
            compressed_length: 0.0,
        }
    }

    /// Create an uncompressed sound from raw PCM bytes
    pub fn from_pcm(data: &[u8], frequency: u32, sixteen_bit: bool, stereo: bool) -> Self {
        let mut sound = Sound::new();
        sound.set_data(data);
        sound.set_format(frequency, sixteen_bit, stereo);
        sound
    }

    /// Create a sound from signed 16-bit samples
    pub fn from_samples(samples: &[i16], frequency: u32, stereo: bool) -> Self {
        let bytes: Vec<u8> = samples.iter().flat_map(|s| s.to_le_bytes()).collect();
        Sound::from_pcm(&bytes, frequency, true, stereo)
    }

    /// Create a compressed sound decoded on demand by `factory`
    pub fn new_compressed(
        factory: Arc<dyn StreamFactory>,
        format: StreamFormat,
        length: f32,
    ) -> Self {
        let mut sound = Sound::new();
        sound.set_format(format.frequency, format.sixteen_bit, format.stereo);
        sound.compressed = Some(factory);
        sound.compressed_length = length.max(0.0);
        sound
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Set sound size in bytes.
    ///
    /// The data is zeroed, and the sound becomes uncompressed and one-shot.
    pub fn set_size(&mut self, size: usize) {
        self.data = vec![0; size];
        self.repeat = 0;
        self.end = size;
        self.looped = false;
        self.compressed = None;
        self.compressed_length = 0.0;
    }

    /// Replace the sample data with a copy of `data`
    pub fn set_data(&mut self, data: &[u8]) {
        self.set_size(data.len());
        self.data.copy_from_slice(data);
    }

    pub fn set_format(&mut self, frequency: u32, sixteen_bit: bool, stereo: bool) {
        self.frequency = frequency;
        self.sixteen_bit = sixteen_bit;
        self.stereo = stereo;
    }

    /// Enable or disable looping over the whole sound
    pub fn set_looped(&mut self, enable: bool) {
        // Decoder streams of compressed sounds rewind themselves
        if self.compressed.is_some() {
            self.looped = enable;
            return;
        }
        if enable {
            self.set_loop(0, self.data.len());
        } else {
            self.looped = false;
            self.repeat = 0;
            self.end = self.data.len();
        }
    }

    /// Define the loop region as byte offsets and enable looping.
    ///
    /// Offsets are clamped to the data and aligned down to whole frames. An
    /// empty region cannot loop, so the sound falls back to one-shot.
    pub fn set_loop(&mut self, repeat_offset: usize, end_offset: usize) {
        let sample_size = self.sample_size();
        let end = end_offset.min(self.data.len());
        let end = end - end % sample_size;
        let repeat = repeat_offset.min(end);
        let repeat = repeat - repeat % sample_size;

        if end <= repeat {
            log::warn!(
                "Sound '{}': empty loop region {}..{}, playing one-shot",
                self.name,
                repeat,
                end
            );
            self.looped = false;
            self.repeat = 0;
            self.end = self.data.len();
            return;
        }

        self.repeat = repeat;
        self.end = end;
        self.looped = true;
    }

    /// Create a decoder stream for a compressed sound
    pub fn decoder_stream(&self) -> Option<Box<dyn SoundStream>> {
        self.compressed
            .as_ref()
            .and_then(|factory| factory.create_stream(self.looped))
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub(crate) fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Byte offset where playback starts
    pub fn start(&self) -> usize {
        0
    }

    /// Byte offset where playback ends or loops
    pub fn end(&self) -> usize {
        self.end
    }

    /// Byte offset where a looped sound resumes
    pub fn repeat(&self) -> usize {
        self.repeat
    }

    pub fn data_size(&self) -> usize {
        self.data.len()
    }

    pub fn format(&self) -> AudioFormat {
        AudioFormat::from_flags(self.sixteen_bit, self.stereo)
    }

    /// Bytes per frame
    pub fn sample_size(&self) -> usize {
        self.format().sample_size()
    }

    pub fn frequency(&self) -> f32 {
        self.frequency as f32
    }

    pub fn int_frequency(&self) -> u32 {
        self.frequency
    }

    /// Length in seconds
    pub fn length(&self) -> f32 {
        if self.compressed.is_some() {
            return self.compressed_length;
        }
        if self.frequency == 0 {
            return 0.0;
        }
        self.data.len() as f32 / self.sample_size() as f32 / self.frequency as f32
    }

    pub fn is_looped(&self) -> bool {
        self.looped
    }

    pub fn is_sixteen_bit(&self) -> bool {
        self.sixteen_bit
    }

    pub fn is_stereo(&self) -> bool {
        self.stereo
    }

    pub fn is_compressed(&self) -> bool {
        self.compressed.is_some()
    }

    /// Whether there is anything to play directly
    pub fn has_data(&self) -> bool {
        !self.data.is_empty()
    }
}

impl Default for Sound {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Sound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sound")
            .field("name", &self.name)
            .field("data_size", &self.data.len())
            .field("repeat", &self.repeat)
            .field("end", &self.end)
            .field("frequency", &self.frequency)
            .field("looped", &self.looped)
            .field("sixteen_bit", &self.sixteen_bit)
            .field("stereo", &self.stereo)
            .field("compressed", &self.compressed.is_some())
            .finish()
    }
}

/// Read a signed 8-bit sample by element index, silence when out of range
#[inline]
pub(crate) fn read_i8(data: &[u8], index: usize) -> i32 {
    data.get(index).map_or(0, |&b| b as i8 as i32)
}

/// Read a little-endian 16-bit sample by element index, silence when out of range
#[inline]
pub(crate) fn read_i16(data: &[u8], index: usize) -> i32 {
    let byte = index * 2;
    match data.get(byte..byte + 2) {
        Some(b) => i16::from_le_bytes([b[0], b[1]]) as i32,
        None => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_sound_is_empty_one_shot() {
        let sound = Sound::new();
        assert_eq!(sound.data_size(), 0);
        assert_eq!(sound.end(), 0);
        assert!(!sound.is_looped());
        assert!(!sound.is_compressed());
        assert_eq!(sound.int_frequency(), DEFAULT_FREQUENCY);
        assert!(!sound.has_data());
    }

    #[test]
    fn test_set_data_resets_region() {
        let mut sound = Sound::new();
        sound.set_data(&[1, 2, 3, 4]);
        assert_eq!(sound.data(), &[1, 2, 3, 4]);
        assert_eq!(sound.start(), 0);
        assert_eq!(sound.end(), 4);
        assert_eq!(sound.repeat(), 0);
    }

    #[test]
    fn test_set_looped_covers_whole_sound() {
        let mut sound = Sound::from_pcm(&[0; 8], 22050, true, false);
        sound.set_looped(true);
        assert!(sound.is_looped());
        assert_eq!(sound.repeat(), 0);
        assert_eq!(sound.end(), 8);

        sound.set_looped(false);
        assert!(!sound.is_looped());
        assert_eq!(sound.end(), 8);
    }

    #[test]
    fn test_set_loop_aligns_to_frames() {
        let mut sound = Sound::from_pcm(&[0; 16], 22050, true, true);
        sound.set_loop(5, 15);
        assert!(sound.is_looped());
        assert_eq!(sound.repeat(), 4);
        assert_eq!(sound.end(), 12);
    }

    #[test]
    fn test_degenerate_loop_falls_back_to_one_shot() {
        let mut sound = Sound::from_pcm(&[0; 8], 22050, false, false);
        sound.set_loop(6, 6);
        assert!(!sound.is_looped());
        assert_eq!(sound.end(), 8);

        let mut empty = Sound::new();
        empty.set_looped(true);
        assert!(!empty.is_looped());
    }

    #[test]
    fn test_length() {
        let sound = Sound::from_pcm(&[0; 44100 * 4], 44100, true, true);
        assert!((sound.length() - 1.0).abs() < 1e-6);

        let mut silent = Sound::new();
        silent.set_format(0, false, false);
        assert_eq!(silent.length(), 0.0);
    }

    #[test]
    fn test_from_samples_is_little_endian() {
        let sound = Sound::from_samples(&[0x1234, -2], 8000, false);
        assert_eq!(sound.data(), &[0x34, 0x12, 0xFE, 0xFF]);
        assert!(sound.is_sixteen_bit());
        assert_eq!(sound.sample_size(), 2);
    }

    #[test]
    fn test_sample_reads_are_bounds_checked() {
        let data = [0x80u8, 0x7F, 0x01];
        assert_eq!(read_i8(&data, 0), -128);
        assert_eq!(read_i8(&data, 1), 127);
        assert_eq!(read_i8(&data, 3), 0);

        assert_eq!(read_i16(&data, 0), 0x7F80);
        // Half a sample at the end reads as silence
        assert_eq!(read_i16(&data, 1), 0);
    }

    #[test]
    fn test_uncompressed_has_no_decoder_stream() {
        let sound = Sound::from_pcm(&[0; 4], 8000, false, false);
        assert!(sound.decoder_stream().is_none());
    }
}
