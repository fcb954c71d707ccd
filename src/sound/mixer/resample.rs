// resample.rs - Fixed-point resampling kernels

//! Fixed-point resampling kernels for the mixer.
//!
//! A source plays its sound by stepping a byte position through the sample
//! data at `frequency / mix_rate` source frames per output frame. The whole
//! part of the step is added directly, the fractional part accumulates in a
//! 16-bit fixed-point counter that carries into the position on overflow.
//!
//! There is one kernel per (source channels, output channels, interpolation)
//! combination, each monomorphized over sample depth and loop mode so the
//! inner loop carries no per-sample dispatch:
//!
//! - mono to mono, mono to stereo (split by panned volumes)
//! - stereo to mono (channel average), stereo to stereo
//!
//! 8-bit samples accumulate as `sample * volume`, 16-bit samples as
//! `sample * volume / 256`. Both land in the same 32-bit accumulation
//! buffer, which kernels add to and never clear.

use std::marker::PhantomData;

use crate::sound::buffer::{read_i16, read_i8, Sound};
use crate::sound::mixer::types::{FRACT_MASK, FRACT_ONE};

/// Sample bit depth of a sound
pub(crate) trait SampleDepth {
    /// Bytes per channel sample
    const BYTES: usize;

    fn read(data: &[u8], index: usize) -> i64;

    /// Scale a sample by an integer volume into accumulation units
    fn scale(sample: i64, volume: i64) -> i64;
}

/// Signed 8-bit samples
pub(crate) struct Eight;

/// Signed little-endian 16-bit samples
pub(crate) struct Sixteen;

impl SampleDepth for Eight {
    const BYTES: usize = 1;

    #[inline(always)]
    fn read(data: &[u8], index: usize) -> i64 {
        read_i8(data, index) as i64
    }

    #[inline(always)]
    fn scale(sample: i64, volume: i64) -> i64 {
        sample * volume
    }
}

impl SampleDepth for Sixteen {
    const BYTES: usize = 2;

    #[inline(always)]
    fn read(data: &[u8], index: usize) -> i64 {
        read_i16(data, index) as i64
    }

    #[inline(always)]
    fn scale(sample: i64, volume: i64) -> i64 {
        sample * volume / 256
    }
}

/// Per-output-frame position increment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Step {
    /// Whole source frames
    pub int_add: usize,
    /// Fractional source frames in 1/65536 units
    pub fract_add: u32,
}

impl Step {
    /// Step for playing at `frequency` into a mix at `mix_rate`
    pub fn new(frequency: f32, mix_rate: u32) -> Self {
        if mix_rate == 0 {
            return Step {
                int_add: 0,
                fract_add: 0,
            };
        }
        let ratio = frequency as f64 / mix_rate as f64;
        let whole = ratio.floor();
        Step {
            int_add: whole as usize,
            fract_add: ((ratio - whole) * FRACT_ONE as f64).round() as u32,
        }
    }
}

/// Integer mixing volumes in 1/256 units
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Volume {
    /// Volume for mono output and for stereo sources
    pub mono: i32,
    /// Left volume for mono sources mixed to stereo
    pub left: i32,
    /// Right volume for mono sources mixed to stereo
    pub right: i32,
}

impl Volume {
    /// Volumes from the combined linear gain and stereo panning
    pub fn new(total_gain: f32, panning: f32) -> Self {
        let panned = 256.0 * total_gain + 0.5;
        Volume {
            mono: (256.0 * total_gain).round() as i32,
            left: ((-panning + 1.0) * panned) as i32,
            right: ((panning + 1.0) * panned) as i32,
        }
    }

    /// Whether the kernel for this layout would add nothing
    pub fn is_silent(&self, stereo_source: bool, stereo_output: bool) -> bool {
        if !stereo_source && stereo_output {
            self.left == 0 && self.right == 0
        } else {
            self.mono == 0
        }
    }
}

/// Playback position of a source within its sound
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PlayHead {
    /// Byte offset into the sound data, `None` when stopped
    pub position: Option<usize>,
    /// Fractional sample position, 0..=65535
    pub fract: u32,
}

impl PlayHead {
    pub fn at(position: usize) -> Self {
        PlayHead {
            position: Some(position),
            fract: 0,
        }
    }
}

/// Parameters of one mix call
#[derive(Debug, Clone, Copy)]
pub struct MixRequest {
    /// Output frames to produce
    pub frames: usize,
    pub mix_rate: u32,
    /// Interleaved stereo output
    pub stereo: bool,
    pub interpolate: bool,
    /// Playback frequency of the source
    pub frequency: f32,
    pub volume: Volume,
}

/// Sound data seen through element indices
struct Region<'a, D> {
    data: &'a [u8],
    end: usize,
    repeat: usize,
    looped: bool,
    _depth: PhantomData<D>,
}

impl<'a, D: SampleDepth> Region<'a, D> {
    fn new(sound: &'a Sound) -> Self {
        Region {
            data: sound.data(),
            end: sound.end() / D::BYTES,
            repeat: sound.repeat() / D::BYTES,
            looped: sound.is_looped(),
            _depth: PhantomData,
        }
    }

    /// Sample at `index`. Past the end a looped sound continues from its
    /// loop start and a one-shot sound is silent.
    #[inline(always)]
    fn sample(&self, index: usize) -> i64 {
        if index < self.end {
            D::read(self.data, index)
        } else if self.looped {
            D::read(self.data, self.repeat + (index - self.end))
        } else {
            0
        }
    }

    /// Sample at `index`, optionally blended with the next frame's sample
    #[inline(always)]
    fn fetch<const IP: bool>(&self, index: usize, stride: usize, fract: u32) -> i64 {
        let curr = self.sample(index);
        if IP {
            let next = self.sample(index + stride);
            (next - curr) * fract as i64 / FRACT_ONE as i64 + curr
        } else {
            curr
        }
    }

    /// Advance by one output frame. Returns false when a one-shot sound ends.
    #[inline(always)]
    fn advance<const LOOPED: bool>(
        &self,
        pos: &mut usize,
        fract: &mut u32,
        step: Step,
        channels: usize,
    ) -> bool {
        *pos += step.int_add * channels;
        *fract += step.fract_add;
        if *fract > FRACT_MASK {
            *fract &= FRACT_MASK;
            *pos += channels;
        }

        if LOOPED {
            while *pos >= self.end {
                *pos -= self.end - self.repeat;
            }
            true
        } else {
            *pos < self.end
        }
    }
}

#[inline(always)]
fn accumulate(dest: &mut i32, value: i64) {
    let value = value.clamp(i32::MIN as i64, i32::MAX as i64) as i32;
    *dest = dest.saturating_add(value);
}

type Kernel = fn(&Sound, &mut PlayHead, &mut [i32], usize, Step, Volume);

fn mono_to_mono<D: SampleDepth, const LOOPED: bool, const IP: bool>(
    sound: &Sound,
    head: &mut PlayHead,
    dest: &mut [i32],
    frames: usize,
    step: Step,
    volume: Volume,
) {
    let Some(byte_pos) = head.position else {
        return;
    };
    let region = Region::<D>::new(sound);
    let vol = volume.mono as i64;
    let mut pos = byte_pos / D::BYTES;
    let mut fract = head.fract;
    let mut playing = true;

    for out in dest.iter_mut().take(frames) {
        accumulate(out, D::scale(region.fetch::<IP>(pos, 1, fract), vol));
        if !region.advance::<LOOPED>(&mut pos, &mut fract, step, 1) {
            playing = false;
            break;
        }
    }

    head.position = playing.then_some(pos * D::BYTES);
    head.fract = fract;
}

fn mono_to_stereo<D: SampleDepth, const LOOPED: bool, const IP: bool>(
    sound: &Sound,
    head: &mut PlayHead,
    dest: &mut [i32],
    frames: usize,
    step: Step,
    volume: Volume,
) {
    let Some(byte_pos) = head.position else {
        return;
    };
    let region = Region::<D>::new(sound);
    let (left, right) = (volume.left as i64, volume.right as i64);
    let mut pos = byte_pos / D::BYTES;
    let mut fract = head.fract;
    let mut playing = true;

    for out in dest.chunks_exact_mut(2).take(frames) {
        let s = region.fetch::<IP>(pos, 1, fract);
        accumulate(&mut out[0], D::scale(s, left));
        accumulate(&mut out[1], D::scale(s, right));
        if !region.advance::<LOOPED>(&mut pos, &mut fract, step, 1) {
            playing = false;
            break;
        }
    }

    head.position = playing.then_some(pos * D::BYTES);
    head.fract = fract;
}

fn stereo_to_mono<D: SampleDepth, const LOOPED: bool, const IP: bool>(
    sound: &Sound,
    head: &mut PlayHead,
    dest: &mut [i32],
    frames: usize,
    step: Step,
    volume: Volume,
) {
    let Some(byte_pos) = head.position else {
        return;
    };
    let region = Region::<D>::new(sound);
    let vol = volume.mono as i64;
    let mut pos = byte_pos / D::BYTES;
    let mut fract = head.fract;
    let mut playing = true;

    for out in dest.iter_mut().take(frames) {
        let s = (region.fetch::<IP>(pos, 2, fract) + region.fetch::<IP>(pos + 1, 2, fract)) / 2;
        accumulate(out, D::scale(s, vol));
        if !region.advance::<LOOPED>(&mut pos, &mut fract, step, 2) {
            playing = false;
            break;
        }
    }

    head.position = playing.then_some(pos * D::BYTES);
    head.fract = fract;
}

fn stereo_to_stereo<D: SampleDepth, const LOOPED: bool, const IP: bool>(
    sound: &Sound,
    head: &mut PlayHead,
    dest: &mut [i32],
    frames: usize,
    step: Step,
    volume: Volume,
) {
    let Some(byte_pos) = head.position else {
        return;
    };
    let region = Region::<D>::new(sound);
    let vol = volume.mono as i64;
    let mut pos = byte_pos / D::BYTES;
    let mut fract = head.fract;
    let mut playing = true;

    for out in dest.chunks_exact_mut(2).take(frames) {
        accumulate(&mut out[0], D::scale(region.fetch::<IP>(pos, 2, fract), vol));
        accumulate(&mut out[1], D::scale(region.fetch::<IP>(pos + 1, 2, fract), vol));
        if !region.advance::<LOOPED>(&mut pos, &mut fract, step, 2) {
            playing = false;
            break;
        }
    }

    head.position = playing.then_some(pos * D::BYTES);
    head.fract = fract;
}

fn select_kernel<D: SampleDepth, const LOOPED: bool>(
    stereo_source: bool,
    stereo_output: bool,
    interpolate: bool,
) -> Kernel {
    match (stereo_source, stereo_output, interpolate) {
        (false, false, false) => mono_to_mono::<D, LOOPED, false>,
        (false, true, false) => mono_to_stereo::<D, LOOPED, false>,
        (false, false, true) => mono_to_mono::<D, LOOPED, true>,
        (false, true, true) => mono_to_stereo::<D, LOOPED, true>,
        (true, false, false) => stereo_to_mono::<D, LOOPED, false>,
        (true, true, false) => stereo_to_stereo::<D, LOOPED, false>,
        (true, false, true) => stereo_to_mono::<D, LOOPED, true>,
        (true, true, true) => stereo_to_stereo::<D, LOOPED, true>,
    }
}

/// Mix `request.frames` output frames of `sound` into `dest`, advancing `head`.
///
/// `dest` holds interleaved frames in the output layout. A one-shot sound
/// that ends mid-call stops the head and leaves the remaining frames of
/// `dest` untouched.
pub fn mix_sound(sound: &Sound, head: &mut PlayHead, dest: &mut [i32], request: &MixRequest) {
    if head.position.is_none() || request.mix_rate == 0 {
        return;
    }

    let channels = if request.stereo { 2 } else { 1 };
    let frames = request.frames.min(dest.len() / channels);

    if request
        .volume
        .is_silent(sound.is_stereo(), request.stereo)
    {
        advance_silent(sound, head, frames, request.frequency, request.mix_rate);
        return;
    }

    let step = Step::new(request.frequency, request.mix_rate);
    let (stereo, interpolate) = (sound.is_stereo(), request.interpolate);
    let kernel = match (sound.is_sixteen_bit(), sound.is_looped()) {
        (false, false) => select_kernel::<Eight, false>(stereo, request.stereo, interpolate),
        (false, true) => select_kernel::<Eight, true>(stereo, request.stereo, interpolate),
        (true, false) => select_kernel::<Sixteen, false>(stereo, request.stereo, interpolate),
        (true, true) => select_kernel::<Sixteen, true>(stereo, request.stereo, interpolate),
    };

    kernel(sound, head, dest, frames, step, request.volume);
}

/// Advance the head by `frames` output frames in one step without reading samples
pub fn advance_silent(
    sound: &Sound,
    head: &mut PlayHead,
    frames: usize,
    frequency: f32,
    mix_rate: u32,
) {
    let Some(mut pos) = head.position else {
        return;
    };
    if mix_rate == 0 {
        return;
    }

    let add = frames as f64 * frequency as f64 / mix_rate as f64;
    let whole = add.floor();
    let sample_size = sound.sample_size();

    head.fract += ((add - whole) * FRACT_ONE as f64).round() as u32;
    if head.fract > FRACT_MASK {
        head.fract &= FRACT_MASK;
        pos += sample_size;
    }
    pos += whole as usize * sample_size;

    let (end, repeat) = (sound.end(), sound.repeat());
    if pos >= end {
        if !sound.is_looped() {
            head.position = None;
            return;
        }
        while pos >= end {
            pos -= end - repeat;
        }
    }

    head.position = Some(pos);
}
