// buffered.rs - Manually fed sound stream

//! A sound stream fed with PCM buffers from the main thread.
//!
//! `BufferedSoundStream` is a cheap cloneable handle. The producer keeps one
//! clone and pushes data with `add_data`, while the source that plays it
//! drains the same queue from the mixing thread through `get_data`.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;

use super::stream::{SoundStream, StreamFormat};

#[derive(Debug, Default)]
struct BufferQueue {
    buffers: VecDeque<Vec<u8>>,
    /// Byte position in the front buffer
    position: usize,
    format: StreamFormat,
    stop_at_end: bool,
}

impl BufferQueue {
    fn num_bytes(&self) -> usize {
        let total: usize = self.buffers.iter().map(Vec::len).sum();
        total.saturating_sub(self.position)
    }
}

/// Sound stream backed by a queue of byte buffers
#[derive(Debug, Clone, Default)]
pub struct BufferedSoundStream {
    queue: Arc<Mutex<BufferQueue>>,
}

impl BufferedSoundStream {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_format(frequency: u32, sixteen_bit: bool, stereo: bool) -> Self {
        let stream = Self::new();
        stream.set_format(frequency, sixteen_bit, stereo);
        stream
    }

    /// Set the format of the buffered data
    pub fn set_format(&self, frequency: u32, sixteen_bit: bool, stereo: bool) {
        self.queue.lock().format = StreamFormat::new(frequency, sixteen_bit, stereo);
    }

    /// Stop playback once the queue runs dry instead of playing silence
    pub fn set_stop_at_end(&self, enable: bool) {
        self.queue.lock().stop_at_end = enable;
    }

    /// Buffer a copy of `data`
    pub fn add_data(&self, data: &[u8]) {
        self.add_data_owned(data.to_vec());
    }

    /// Buffer `data`, taking ownership of it
    pub fn add_data_owned(&self, data: Vec<u8>) {
        if data.is_empty() {
            return;
        }
        self.queue.lock().buffers.push_back(data);
    }

    /// Buffer signed 16-bit samples
    pub fn add_samples(&self, samples: &[i16]) {
        let bytes: Vec<u8> = samples.iter().flat_map(|s| s.to_le_bytes()).collect();
        self.add_data_owned(bytes);
    }

    /// Remove all buffered data
    pub fn clear(&self) {
        let mut queue = self.queue.lock();
        queue.buffers.clear();
        queue.position = 0;
    }

    /// Amount of unplayed data in bytes
    pub fn buffer_num_bytes(&self) -> usize {
        self.queue.lock().num_bytes()
    }

    /// Amount of unplayed data in seconds
    pub fn buffer_length(&self) -> f32 {
        let queue = self.queue.lock();
        let bytes_per_second = queue.format.sample_size() * queue.format.frequency as usize;
        if bytes_per_second == 0 {
            return 0.0;
        }
        queue.num_bytes() as f32 / bytes_per_second as f32
    }
}

impl SoundStream for BufferedSoundStream {
    fn get_data(&mut self, dest: &mut [u8]) -> usize {
        let mut queue = self.queue.lock();
        let mut written = 0;

        while written < dest.len() {
            let position = queue.position;
            let Some(front) = queue.buffers.front() else {
                break;
            };

            let available = front.len() - position;
            let count = available.min(dest.len() - written);
            dest[written..written + count].copy_from_slice(&front[position..position + count]);
            written += count;

            if count == available {
                queue.buffers.pop_front();
                queue.position = 0;
            } else {
                queue.position += count;
            }
        }

        written
    }

    fn format(&self) -> StreamFormat {
        self.queue.lock().format
    }

    fn stop_at_end(&self) -> bool {
        self.queue.lock().stop_at_end
    }
}
