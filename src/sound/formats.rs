//! PCM sample format definitions
//!
//! Samples are signed: 8-bit data is `i8`, 16-bit data is little-endian
//! `i16`. Stereo data is interleaved left/right.

/// Audio sample format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AudioFormat {
    /// 8-bit mono (1 byte per frame)
    #[default]
    Mono8,
    /// 16-bit mono (2 bytes per frame)
    Mono16,
    /// 8-bit stereo (2 bytes per frame)
    Stereo8,
    /// 16-bit stereo (4 bytes per frame)
    Stereo16,
}

impl AudioFormat {
    /// Build a format from the bit depth and channel flags
    pub fn from_flags(sixteen_bit: bool, stereo: bool) -> Self {
        match (sixteen_bit, stereo) {
            (false, false) => AudioFormat::Mono8,
            (true, false) => AudioFormat::Mono16,
            (false, true) => AudioFormat::Stereo8,
            (true, true) => AudioFormat::Stereo16,
        }
    }

    /// Returns the number of bytes per channel sample
    pub fn bytes_per_channel(&self) -> usize {
        if self.is_16bit() {
            2
        } else {
            1
        }
    }

    /// Returns the number of channels
    pub fn channels(&self) -> usize {
        if self.is_stereo() {
            2
        } else {
            1
        }
    }

    /// Returns the number of bytes in one frame (all channels)
    pub fn sample_size(&self) -> usize {
        self.bytes_per_channel() * self.channels()
    }

    /// Returns true if this is a 16-bit format
    pub fn is_16bit(&self) -> bool {
        matches!(self, AudioFormat::Mono16 | AudioFormat::Stereo16)
    }

    /// Returns true if this is a stereo format
    pub fn is_stereo(&self) -> bool {
        matches!(self, AudioFormat::Stereo8 | AudioFormat::Stereo16)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(AudioFormat::Mono8, 1, 1)]
    #[case(AudioFormat::Mono16, 2, 1)]
    #[case(AudioFormat::Stereo8, 2, 2)]
    #[case(AudioFormat::Stereo16, 4, 2)]
    fn test_sample_size_and_channels(
        #[case] format: AudioFormat,
        #[case] sample_size: usize,
        #[case] channels: usize,
    ) {
        assert_eq!(format.sample_size(), sample_size);
        assert_eq!(format.channels(), channels);
    }

    #[test]
    fn test_from_flags() {
        assert_eq!(AudioFormat::from_flags(false, false), AudioFormat::Mono8);
        assert_eq!(AudioFormat::from_flags(true, true), AudioFormat::Stereo16);
        assert!(AudioFormat::from_flags(true, false).is_16bit());
        assert!(!AudioFormat::from_flags(true, false).is_stereo());
    }
}
