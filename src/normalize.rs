//! Pure conversion pipeline from device packets to the canonical stream.
//!
//! Three ordered stages, each skipped when already satisfied: sample-type
//! conversion (f32 -> i16 with clamping), channel downmix (interleaved ->
//! mono by averaging), and linear-interpolation resampling to 16 kHz.
//! Conversion happens before mixing so clipping is applied per source sample.

use crate::format::{NormalizedChunk, PacketSamples, RawPacket, TARGET_RATE};

/// Fractional source position carried across chunk boundaries so the
/// resampler stays continuous when the rate ratio is not an even divisor.
/// Reset on every session start.
#[derive(Debug, Default)]
pub(crate) struct ResampleState {
    next_pos: f64,
}

impl ResampleState {
    fn reset(&mut self) {
        self.next_pos = 0.0;
    }
}

/// Per-session normalizer. Stateless apart from [`ResampleState`]; every
/// packet produces exactly one chunk.
#[derive(Debug, Default)]
pub(crate) struct Normalizer {
    resample: ResampleState,
}

impl Normalizer {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn reset(&mut self) {
        self.resample.reset();
    }

    /// Consume one packet and produce its normalized chunk. An empty packet
    /// yields an empty chunk; that is not an error.
    pub(crate) fn normalize(&mut self, packet: RawPacket) -> NormalizedChunk {
        let format = packet.format;
        let interleaved = match packet.samples {
            PacketSamples::I16(samples) => samples,
            PacketSamples::F32(samples) => convert_f32_to_i16(&samples),
        };
        let mono = downmix_to_mono(interleaved, usize::from(format.channels.max(1)));
        let resampled = resample_linear(&mut self.resample, &mono, format.sample_rate_hz);
        NormalizedChunk::from_samples(&resampled)
    }
}

/// Clamp each float sample to [-1.0, 1.0] and scale to signed 16-bit.
fn convert_f32_to_i16(samples: &[f32]) -> Vec<i16> {
    samples
        .iter()
        .map(|&sample| (sample.clamp(-1.0, 1.0) * 32_767.0).round() as i16)
        .collect()
}

/// Average each interleaved frame into one mono sample. The i32 accumulator
/// cannot overflow for any realistic channel count, and the truncating
/// division keeps the mean inside the i16 range.
fn downmix_to_mono(interleaved: Vec<i16>, channels: usize) -> Vec<i16> {
    if channels <= 1 {
        return interleaved;
    }
    let mut mono = Vec::with_capacity(interleaved.len() / channels);
    for frame in interleaved.chunks_exact(channels) {
        let sum: i32 = frame.iter().map(|&sample| i32::from(sample)).sum();
        mono.push((sum / channels as i32) as i16);
    }
    mono
}

/// Linear-interpolation resample to [`TARGET_RATE`].
///
/// Outputs every source position `state.next_pos + k / ratio` that falls
/// inside this chunk, interpolating between neighbours and clamping the upper
/// index at the last sample. With a fresh state the output length is exactly
/// `ceil(len * ratio)`; the leftover fractional position is carried into the
/// next chunk.
fn resample_linear(state: &mut ResampleState, mono: &[i16], source_rate_hz: u32) -> Vec<i16> {
    if source_rate_hz == TARGET_RATE || source_rate_hz == 0 {
        return mono.to_vec();
    }
    if mono.is_empty() {
        return Vec::new();
    }

    let ratio = f64::from(TARGET_RATE) / f64::from(source_rate_hz);
    let step = 1.0 / ratio;
    let len = mono.len();
    let mut out = Vec::with_capacity((len as f64 * ratio).ceil() as usize + 1);

    let mut pos = state.next_pos;
    while pos < len as f64 {
        let lower = pos.floor() as usize;
        let upper = (lower + 1).min(len - 1);
        let frac = pos - lower as f64;
        let sample = f64::from(mono[lower]) * (1.0 - frac) + f64::from(mono[upper]) * frac;
        // Interpolation between i16 values stays inside the i16 range.
        out.push(sample.round() as i16);
        pos += step;
    }
    state.next_pos = pos - len as f64;

    out
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    pub(crate) fn convert(samples: &[f32]) -> Vec<i16> {
        convert_f32_to_i16(samples)
    }

    pub(crate) fn downmix(interleaved: Vec<i16>, channels: usize) -> Vec<i16> {
        downmix_to_mono(interleaved, channels)
    }

    pub(crate) fn resample(state: &mut ResampleState, mono: &[i16], rate: u32) -> Vec<i16> {
        resample_linear(state, mono, rate)
    }
}
