//! Device session: the capability contract against the OS audio endpoint,
//! plus the cpal-backed implementation used by default.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, SampleRate, StreamConfig, SupportedStreamConfig};
use crossbeam_channel::{bounded, Receiver, TryRecvError};

use crate::error::CaptureError;
use crate::format::{CaptureFormat, RawPacket, SampleKind, TARGET_CHANNELS, TARGET_RATE};

/// Contract the capture loop drives. Sessions are constructed and used on the
/// capture thread only; once streaming begins no other thread touches them.
///
/// An alternative platform backend slots in behind this same trait as long as
/// it preserves the negotiation and packet-lifecycle semantics.
pub trait DeviceSession {
    /// Acquire the default endpoint and negotiate the session format.
    /// Prefers the canonical mono/16 kHz/16-bit layout, falling back to the
    /// endpoint's native format when the device declines.
    fn open(&mut self) -> Result<CaptureFormat, CaptureError>;

    /// Begin hardware streaming.
    fn start(&mut self) -> Result<(), CaptureError>;

    /// Halt hardware streaming. Idempotent.
    fn stop(&mut self);

    /// Non-blocking: the next pending packet, or `None` when the device has
    /// nothing queued. `DeviceIo` faults are recoverable; the caller skips
    /// the poll and escalates only when they persist.
    fn poll_packet(&mut self) -> Result<Option<RawPacket>, CaptureError>;

    /// Release every OS-level resource. Safe to call when never opened.
    fn close(&mut self);
}

/// Packets the queue holds before the capture callback starts counting
/// overflow. Sized for roughly half a second of 10 ms device buffers, the
/// same short fixed duration the OS-side ring would cover.
pub(crate) const DEFAULT_QUEUE_PACKETS: usize = 64;

/// [`DeviceSession`] over the default cpal input endpoint.
///
/// cpal delivers audio on its own callback thread; the callback copies each
/// buffer into an owned [`RawPacket`] and hands it to a bounded queue, so OS
/// buffer pointers never escape the callback and `poll_packet` stays
/// non-blocking. Stream faults are latched into flags the next poll reports.
pub struct CpalSession {
    queue_packets: usize,
    device: Option<cpal::Device>,
    stream: Option<cpal::Stream>,
    packets: Option<Receiver<RawPacket>>,
    lost: Arc<AtomicBool>,
    fault: Arc<Mutex<Option<String>>>,
    overflow: Arc<AtomicUsize>,
}

impl CpalSession {
    pub fn new() -> Self {
        Self::with_queue(DEFAULT_QUEUE_PACKETS)
    }

    pub(crate) fn with_queue(queue_packets: usize) -> Self {
        Self {
            queue_packets: queue_packets.max(1),
            device: None,
            stream: None,
            packets: None,
            lost: Arc::new(AtomicBool::new(false)),
            fault: Arc::new(Mutex::new(None)),
            overflow: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn stream_fault_handler(&self) -> impl FnMut(cpal::StreamError) {
        let lost = self.lost.clone();
        let fault = self.fault.clone();
        move |err| {
            if matches!(err, cpal::StreamError::DeviceNotAvailable) {
                lost.store(true, Ordering::Release);
            }
            if let Ok(mut slot) = fault.lock() {
                *slot = Some(err.to_string());
            }
            tracing::warn!("capture stream fault: {err}");
        }
    }

    fn take_fault(&self) -> Option<String> {
        self.fault.lock().ok().and_then(|mut slot| slot.take())
    }

    /// Human-readable name of the open endpoint, when the backend knows it.
    pub fn device_name(&self) -> Option<String> {
        self.device.as_ref().and_then(|device| device.name().ok())
    }
}

impl Default for CpalSession {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceSession for CpalSession {
    fn open(&mut self) -> Result<CaptureFormat, CaptureError> {
        let host = cpal::default_host();
        let device = host.default_input_device().ok_or_else(|| {
            CaptureError::DeviceUnavailable("no default input endpoint".to_string())
        })?;
        let device_name = device
            .name()
            .unwrap_or_else(|_| "unknown endpoint".to_string());

        let chosen = negotiate_config(&device)?;
        let sample_kind = match chosen.sample_format() {
            SampleFormat::I16 => SampleKind::I16,
            SampleFormat::F32 => SampleKind::F32,
            other => {
                return Err(CaptureError::FormatNegotiationFailed(format!(
                    "endpoint '{device_name}' offers unsupported sample format {other:?}"
                )))
            }
        };
        let config: StreamConfig = chosen.config();
        let format = CaptureFormat {
            channels: config.channels,
            sample_rate_hz: config.sample_rate.0,
            sample_kind,
        };

        let (sender, receiver) = bounded::<RawPacket>(self.queue_packets);
        let stream = match sample_kind {
            SampleKind::F32 => {
                let overflow = self.overflow.clone();
                device.build_input_stream(
                    &config,
                    move |data: &[f32], _| {
                        let packet = RawPacket::from_f32(data.to_vec(), format);
                        if sender.try_send(packet).is_err() {
                            overflow.fetch_add(1, Ordering::Relaxed);
                        }
                    },
                    self.stream_fault_handler(),
                    None,
                )
            }
            SampleKind::I16 => {
                let overflow = self.overflow.clone();
                device.build_input_stream(
                    &config,
                    move |data: &[i16], _| {
                        let packet = RawPacket::from_i16(data.to_vec(), format);
                        if sender.try_send(packet).is_err() {
                            overflow.fetch_add(1, Ordering::Relaxed);
                        }
                    },
                    self.stream_fault_handler(),
                    None,
                )
            }
        }
        .map_err(|err| CaptureError::ResourceAllocationFailed(err.to_string()))?;

        tracing::debug!(device = %device_name, %format, "capture endpoint opened");
        self.device = Some(device);
        self.stream = Some(stream);
        self.packets = Some(receiver);
        Ok(format)
    }

    fn start(&mut self) -> Result<(), CaptureError> {
        let stream = self.stream.as_ref().ok_or_else(|| {
            CaptureError::StreamStartFailed("session is not open".to_string())
        })?;
        stream
            .play()
            .map_err(|err| CaptureError::StreamStartFailed(err.to_string()))
    }

    fn stop(&mut self) {
        if let Some(stream) = &self.stream {
            if let Err(err) = stream.pause() {
                tracing::debug!("pause on stop failed: {err}");
            }
        }
    }

    fn poll_packet(&mut self) -> Result<Option<RawPacket>, CaptureError> {
        if self.lost.load(Ordering::Acquire) {
            return Err(CaptureError::DeviceIo(
                "capture endpoint is no longer available".to_string(),
            ));
        }
        if let Some(message) = self.take_fault() {
            return Err(CaptureError::DeviceIo(message));
        }
        let Some(packets) = &self.packets else {
            return Ok(None);
        };
        match packets.try_recv() {
            Ok(packet) => Ok(Some(packet)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(CaptureError::DeviceIo(
                "capture stream went away".to_string(),
            )),
        }
    }

    fn close(&mut self) {
        let overflowed = self.overflow.swap(0, Ordering::Relaxed);
        if overflowed > 0 {
            tracing::debug!(packets = overflowed, "device queue overflowed during session");
        }
        self.stream = None;
        self.packets = None;
        self.device = None;
        self.lost.store(false, Ordering::Release);
        if let Ok(mut slot) = self.fault.lock() {
            *slot = None;
        }
    }
}

/// Ask for the canonical layout first; take the endpoint's default otherwise.
fn negotiate_config(device: &cpal::Device) -> Result<SupportedStreamConfig, CaptureError> {
    if let Ok(mut ranges) = device.supported_input_configs() {
        if let Some(range) = ranges.find(|range| {
            range.channels() == TARGET_CHANNELS
                && range.sample_format() == SampleFormat::I16
                && range.min_sample_rate().0 <= TARGET_RATE
                && range.max_sample_rate().0 >= TARGET_RATE
        }) {
            return Ok(range.with_sample_rate(SampleRate(TARGET_RATE)));
        }
    }
    device
        .default_input_config()
        .map_err(|err| CaptureError::FormatNegotiationFailed(err.to_string()))
}
