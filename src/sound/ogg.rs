//! Ogg Vorbis compressed sounds
//!
//! Uses the `lewton` crate for pure Rust Ogg Vorbis decoding. A compressed
//! `Sound` keeps the encoded bytes and hands every source its own decoder
//! stream producing interleaved 16-bit PCM.

use std::io::{Cursor, Read, Seek, SeekFrom};
use std::sync::Arc;

use lewton::inside_ogg::OggStreamReader;

use super::buffer::Sound;
use super::error::{AudioError, Result};
use super::stream::{SoundStream, StreamFactory, StreamFormat};

/// Calculate the duration of an Ogg Vorbis file by finding the last granule position
/// and the sample rate from the headers.
fn calculate_ogg_duration<R: Read + Seek>(data: &mut R, sample_rate: u32) -> f32 {
    let file_size = match data.seek(SeekFrom::End(0)) {
        Ok(size) => size,
        Err(_) => return 0.0,
    };

    // Search backwards for the last "OggS" page marker in the last 64KB
    let search_size = std::cmp::min(65536, file_size) as usize;
    if data.seek(SeekFrom::Start(file_size - search_size as u64)).is_err() {
        return 0.0;
    }
    let mut buffer = vec![0u8; search_size];
    if data.read_exact(&mut buffer).is_err() {
        return 0.0;
    }

    let mut last_granule: Option<u64> = None;
    for i in (0..buffer.len().saturating_sub(13)).rev() {
        if buffer[i..].starts_with(b"OggS") {
            // Granule position is at offset 6-13 (8 bytes, little-endian)
            let mut granule = [0u8; 8];
            granule.copy_from_slice(&buffer[i + 6..i + 14]);
            let granule = u64::from_le_bytes(granule);

            // Granule position of -1 means "no granule"
            if granule != u64::MAX {
                last_granule = Some(granule);
                break;
            }
        }
    }

    let _ = data.seek(SeekFrom::Start(0));

    match last_granule {
        Some(granule) if sample_rate > 0 => granule as f32 / sample_rate as f32,
        _ => 0.0,
    }
}

fn open_reader(data: &Arc<[u8]>) -> Result<OggStreamReader<Cursor<Arc<[u8]>>>> {
    OggStreamReader::new(Cursor::new(Arc::clone(data)))
        .map_err(|e| AudioError::Vorbis(format!("Failed to open Ogg stream: {:?}", e)))
}

impl Sound {
    /// Load a compressed Ogg Vorbis sound from encoded bytes
    pub fn load_ogg_vorbis(data: Vec<u8>) -> Result<Sound> {
        let data: Arc<[u8]> = data.into();
        let reader = open_reader(&data)?;

        let sample_rate = reader.ident_hdr.audio_sample_rate;
        let channels = reader.ident_hdr.audio_channels;
        if channels != 1 && channels != 2 {
            return Err(AudioError::UnsupportedFormat(format!(
                "{} channel Ogg Vorbis",
                channels
            )));
        }
        if sample_rate == 0 {
            return Err(AudioError::InvalidFormat(
                "Ogg Vorbis sample rate is zero".to_string(),
            ));
        }
        drop(reader);

        let length = calculate_ogg_duration(&mut Cursor::new(&data[..]), sample_rate);
        let format = StreamFormat::new(sample_rate, true, channels == 2);
        log::debug!(
            "Loaded Ogg Vorbis sound: {} Hz, {} channel(s), {:.2}s",
            sample_rate,
            channels,
            length
        );

        Ok(Sound::new_compressed(
            Arc::new(OggVorbisData { data, format }),
            format,
            length,
        ))
    }
}

/// Encoded Ogg Vorbis data shared by all streams of a sound
pub struct OggVorbisData {
    data: Arc<[u8]>,
    format: StreamFormat,
}

impl StreamFactory for OggVorbisData {
    fn create_stream(&self, looped: bool) -> Option<Box<dyn SoundStream>> {
        match OggVorbisStream::open(Arc::clone(&self.data), self.format, looped) {
            Ok(stream) => Some(Box::new(stream)),
            Err(e) => {
                log::warn!("Could not create Ogg Vorbis decoder stream: {}", e);
                None
            }
        }
    }
}

/// Decoder stream over shared Ogg Vorbis bytes
pub struct OggVorbisStream {
    data: Arc<[u8]>,
    reader: OggStreamReader<Cursor<Arc<[u8]>>>,
    format: StreamFormat,
    looped: bool,
    /// Decoded interleaved samples not yet handed out
    pending: Vec<i16>,
    pending_pos: usize,
    /// Current sample frame
    current_pcm: u64,
    finished: bool,
}

impl OggVorbisStream {
    pub fn open(data: Arc<[u8]>, format: StreamFormat, looped: bool) -> Result<Self> {
        let reader = open_reader(&data)?;
        Ok(Self {
            data,
            reader,
            format,
            looped,
            pending: Vec::new(),
            pending_pos: 0,
            current_pcm: 0,
            finished: false,
        })
    }

    fn channels(&self) -> u64 {
        if self.format.stereo {
            2
        } else {
            1
        }
    }

    fn rewind(&mut self) -> Result<()> {
        self.reader = open_reader(&self.data)?;
        self.pending.clear();
        self.pending_pos = 0;
        self.current_pcm = 0;
        self.finished = false;
        Ok(())
    }

    /// Decode the next packet into the pending buffer. Returns false at end of stream.
    fn decode_next_packet(&mut self) -> Result<bool> {
        match self.reader.read_dec_packet_itl() {
            Ok(Some(samples)) => {
                self.pending = samples;
                self.pending_pos = 0;
                Ok(true)
            }
            Ok(None) => Ok(false),
            Err(e) => Err(AudioError::Vorbis(format!("Ogg decode error: {:?}", e))),
        }
    }
}

impl SoundStream for OggVorbisStream {
    fn get_data(&mut self, dest: &mut [u8]) -> usize {
        let mut written = 0;
        // Set after a rewind; cleared once data arrives. Guards against empty streams.
        let mut rewound = false;

        while !self.finished && dest.len() - written >= 2 {
            if self.pending_pos >= self.pending.len() {
                match self.decode_next_packet() {
                    Ok(true) => {
                        continue;
                    }
                    Ok(false) if self.looped && !rewound => {
                        if let Err(e) = self.rewind() {
                            log::warn!("Ogg Vorbis rewind failed: {}", e);
                            self.finished = true;
                        }
                        rewound = true;
                        continue;
                    }
                    Ok(false) => {
                        self.finished = true;
                        break;
                    }
                    Err(e) => {
                        log::warn!("{}", e);
                        self.finished = true;
                        break;
                    }
                }
            }

            let room = (dest.len() - written) / 2;
            let count = room.min(self.pending.len() - self.pending_pos);
            for (chunk, sample) in dest[written..written + count * 2]
                .chunks_exact_mut(2)
                .zip(&self.pending[self.pending_pos..self.pending_pos + count])
            {
                chunk.copy_from_slice(&sample.to_le_bytes());
            }
            self.pending_pos += count;
            written += count * 2;
            rewound = false;
        }

        self.current_pcm = self
            .current_pcm
            .wrapping_add((written / 2) as u64 / self.channels());
        written
    }

    fn format(&self) -> StreamFormat {
        self.format
    }

    /// Seek by rewinding and discarding decoded packets up to the target frame
    fn seek(&mut self, sample_number: u32) -> bool {
        let target = sample_number as u64;

        if target <= self.current_pcm {
            if let Err(e) = self.rewind() {
                log::warn!("Ogg Vorbis seek failed: {}", e);
                return false;
            }
        }

        // Skip the remainder of the pending packet first
        let channels = self.channels();
        while self.current_pcm < target {
            if self.pending_pos >= self.pending.len() {
                match self.decode_next_packet() {
                    Ok(true) => {}
                    Ok(false) => {
                        self.finished = !self.looped;
                        return false;
                    }
                    Err(e) => {
                        log::warn!("Ogg Vorbis seek failed: {}", e);
                        return false;
                    }
                }
            }

            let frames_left = (self.pending.len() - self.pending_pos) as u64 / channels;
            let skip = frames_left.min(target - self.current_pcm);
            self.pending_pos += (skip * channels) as usize;
            self.current_pcm += skip;
            if frames_left == 0 {
                self.pending_pos = self.pending.len();
            }
        }

        true
    }

    fn stop_at_end(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page_header(granule: u64) -> Vec<u8> {
        let mut page = b"OggS".to_vec();
        page.push(0); // version
        page.push(0); // header type
        page.extend_from_slice(&granule.to_le_bytes());
        page.extend_from_slice(&[0u8; 13]);
        page
    }

    #[test]
    fn test_invalid_data_is_rejected() {
        let result = Sound::load_ogg_vorbis(b"definitely not vorbis".to_vec());
        assert!(matches!(result, Err(AudioError::Vorbis(_))));
    }

    #[test]
    fn test_empty_data_is_rejected() {
        assert!(Sound::load_ogg_vorbis(Vec::new()).is_err());
    }

    #[test]
    fn test_duration_from_last_granule() {
        let mut data = vec![0u8; 100];
        data.extend(page_header(22050));
        data.extend(vec![0u8; 50]);
        data.extend(page_header(44100));

        let duration = calculate_ogg_duration(&mut Cursor::new(data), 44100);
        assert!((duration - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_duration_skips_missing_granule() {
        let mut data = page_header(88200);
        data.extend(page_header(u64::MAX));

        let duration = calculate_ogg_duration(&mut Cursor::new(data), 44100);
        assert!((duration - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_duration_without_pages() {
        let mut cursor = Cursor::new(vec![0u8; 64]);
        assert_eq!(calculate_ogg_duration(&mut cursor, 44100), 0.0);
        assert_eq!(calculate_ogg_duration(&mut Cursor::new(page_header(10)), 0), 0.0);
    }

    #[test]
    fn test_stream_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<OggVorbisStream>();
    }
}
