//! Data model for the capture pipeline: negotiated device formats, raw
//! interleaved packets, and normalized output chunks.

use std::fmt;

/// Sample rate of the canonical output stream.
pub const TARGET_RATE: u32 = 16_000;

/// Channel count of the canonical output stream.
pub const TARGET_CHANNELS: u16 = 1;

/// On-the-wire sample representation a device can deliver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleKind {
    /// Signed 16-bit integer PCM.
    I16,
    /// 32-bit IEEE float in [-1.0, 1.0].
    F32,
}

impl SampleKind {
    pub fn bits_per_sample(self) -> u16 {
        match self {
            SampleKind::I16 => 16,
            SampleKind::F32 => 32,
        }
    }

    pub fn is_float(self) -> bool {
        matches!(self, SampleKind::F32)
    }
}

/// Format negotiated with the device for one session, or the fixed canonical
/// output format. Immutable once a session is open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureFormat {
    pub channels: u16,
    pub sample_rate_hz: u32,
    pub sample_kind: SampleKind,
}

impl CaptureFormat {
    /// The fixed output format: mono, 16 kHz, 16-bit integer PCM.
    pub fn canonical() -> Self {
        Self {
            channels: TARGET_CHANNELS,
            sample_rate_hz: TARGET_RATE,
            sample_kind: SampleKind::I16,
        }
    }

    pub fn is_canonical(&self) -> bool {
        *self == Self::canonical()
    }
}

impl fmt::Display for CaptureFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}ch {}Hz {}{}",
            self.channels,
            self.sample_rate_hz,
            self.sample_kind.bits_per_sample(),
            if self.sample_kind.is_float() { "f" } else { "i" }
        )
    }
}

/// Interleaved frames as the device delivered them.
#[derive(Debug, Clone, PartialEq)]
pub enum PacketSamples {
    I16(Vec<i16>),
    F32(Vec<f32>),
}

impl PacketSamples {
    fn len(&self) -> usize {
        match self {
            PacketSamples::I16(s) => s.len(),
            PacketSamples::F32(s) => s.len(),
        }
    }
}

/// One packet pulled from the device.
///
/// Owns a copy of the device buffer, so releasing the underlying OS memory is
/// tied to `Drop` and cannot be forgotten on any path. A packet lives for at
/// most one capture-loop iteration before it is consumed by the normalizer.
#[derive(Debug, Clone, PartialEq)]
pub struct RawPacket {
    pub format: CaptureFormat,
    pub samples: PacketSamples,
}

impl RawPacket {
    pub fn from_i16(samples: Vec<i16>, format: CaptureFormat) -> Self {
        Self {
            format,
            samples: PacketSamples::I16(samples),
        }
    }

    pub fn from_f32(samples: Vec<f32>, format: CaptureFormat) -> Self {
        Self {
            format,
            samples: PacketSamples::F32(samples),
        }
    }

    /// Number of whole frames in the packet.
    pub fn frames(&self) -> usize {
        self.samples.len() / usize::from(self.format.channels.max(1))
    }
}

/// Canonical output: little-endian 16-bit mono samples at 16 kHz. Ownership
/// moves to the sink when emitted; chunks are never shared or buffered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedChunk {
    pub bytes: Vec<u8>,
}

impl NormalizedChunk {
    pub fn from_samples(samples: &[i16]) -> Self {
        let mut bytes = Vec::with_capacity(samples.len() * 2);
        for sample in samples {
            bytes.extend_from_slice(&sample.to_le_bytes());
        }
        Self { bytes }
    }

    /// Decode back into samples. Intended for consumers and tests; the hot
    /// path only ever moves the byte buffer.
    pub fn samples(&self) -> Vec<i16> {
        self.bytes
            .chunks_exact(2)
            .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
            .collect()
    }

    pub fn sample_count(&self) -> usize {
        self.bytes.len() / 2
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}
