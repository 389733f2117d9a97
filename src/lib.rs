//! Real-time audio capture normalized for speech recognition.
//!
//! Pulls raw frames from the default system audio endpoint, converts them to
//! the canonical stream (mono, 16 kHz, 16-bit little-endian PCM), and emits
//! ordered byte chunks to a consumer sink. Capture runs on one dedicated
//! thread with a safe start/stop lifecycle; the format pipeline itself is
//! pure and testable without any device.

mod controller;
mod device;
mod error;
mod format;
mod meter;
mod normalize;
mod puller;
mod sink;
mod telemetry;

pub use controller::{CaptureController, Lifecycle};
pub use device::{CpalSession, DeviceSession};
pub use error::{CaptureError, ErrorKind};
pub use format::{
    CaptureFormat, NormalizedChunk, PacketSamples, RawPacket, SampleKind, TARGET_CHANNELS,
    TARGET_RATE,
};
pub use meter::LiveMeter;
pub use sink::{AudioSink, ChannelSink, ErrorEvent};
pub use telemetry::init_tracing;
