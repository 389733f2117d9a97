//! End-to-end pipeline tests against the public API: a fake device session
//! behind the `DeviceSession` contract, a `ChannelSink` on the consumer side.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use loopcap::{
    CaptureController, CaptureError, CaptureFormat, ChannelSink, DeviceSession, ErrorKind,
    RawPacket, SampleKind,
};

struct FakeDevice {
    format: CaptureFormat,
    packets: VecDeque<RawPacket>,
    lose_after: Option<usize>,
    polls: usize,
}

impl FakeDevice {
    fn with_packets(format: CaptureFormat, packets: Vec<RawPacket>) -> Self {
        Self {
            format,
            packets: packets.into(),
            lose_after: None,
            polls: 0,
        }
    }

    fn losing_device(format: CaptureFormat, lose_after: usize) -> Self {
        Self {
            format,
            packets: VecDeque::new(),
            lose_after: Some(lose_after),
            polls: 0,
        }
    }
}

impl DeviceSession for FakeDevice {
    fn open(&mut self) -> Result<CaptureFormat, CaptureError> {
        Ok(self.format)
    }

    fn start(&mut self) -> Result<(), CaptureError> {
        Ok(())
    }

    fn stop(&mut self) {}

    fn poll_packet(&mut self) -> Result<Option<RawPacket>, CaptureError> {
        self.polls += 1;
        if let Some(threshold) = self.lose_after {
            if self.polls > threshold {
                return Err(CaptureError::DeviceIo("endpoint unplugged".to_string()));
            }
        }
        Ok(self.packets.pop_front())
    }

    fn close(&mut self) {}
}

fn recv_chunks(
    rx: &crossbeam_channel::Receiver<loopcap::NormalizedChunk>,
    count: usize,
) -> Vec<loopcap::NormalizedChunk> {
    let mut chunks = Vec::with_capacity(count);
    let deadline = Instant::now() + Duration::from_secs(2);
    while chunks.len() < count && Instant::now() < deadline {
        if let Ok(chunk) = rx.recv_timeout(Duration::from_millis(50)) {
            chunks.push(chunk);
        }
    }
    chunks
}

#[test]
fn stereo_float_device_reaches_the_sink_normalized() {
    let (sink, chunk_rx, error_rx) = ChannelSink::new();
    let mut controller = CaptureController::new(sink);

    let format = CaptureFormat {
        channels: 2,
        sample_rate_hz: 48_000,
        sample_kind: SampleKind::F32,
    };
    let packet = RawPacket::from_f32(vec![0.5; 960], format);
    controller
        .start_with_session(move || FakeDevice::with_packets(format, vec![packet]))
        .expect("start should succeed");
    assert!(controller.is_capturing());

    let chunks = recv_chunks(&chunk_rx, 1);
    assert_eq!(chunks.len(), 1);
    let samples = chunks[0].samples();
    assert_eq!(samples.len(), 160);
    assert!(samples.iter().all(|&s| s == 16_384));

    controller.stop_capture();
    assert!(!controller.is_capturing());
    assert!(error_rx.try_recv().is_err());
}

#[test]
fn chunks_arrive_in_order_across_many_packets() {
    let (sink, chunk_rx, _error_rx) = ChannelSink::new();
    let mut controller = CaptureController::new(sink);

    let format = CaptureFormat::canonical();
    let packets = (0..10)
        .map(|i| RawPacket::from_i16(vec![i as i16 + 1; 32], format))
        .collect();
    controller
        .start_with_session(move || FakeDevice::with_packets(format, packets))
        .expect("start should succeed");

    let chunks = recv_chunks(&chunk_rx, 10);
    controller.stop_capture();

    assert_eq!(chunks.len(), 10);
    for (i, chunk) in chunks.iter().enumerate() {
        assert_eq!(chunk.samples(), vec![i as i16 + 1; 32]);
    }
}

#[test]
fn device_loss_is_reported_once_and_capture_ends() {
    let (sink, _chunk_rx, error_rx) = ChannelSink::new();
    let mut controller = CaptureController::new(sink);

    let format = CaptureFormat::canonical();
    controller
        .start_with_session(move || FakeDevice::losing_device(format, 2))
        .expect("start should succeed");

    let deadline = Instant::now() + Duration::from_secs(5);
    while controller.is_capturing() && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(10));
    }
    assert!(!controller.is_capturing());

    let mut kinds = Vec::new();
    while let Ok(event) = error_rx.recv_timeout(Duration::from_millis(100)) {
        kinds.push(event.kind);
    }
    assert_eq!(
        kinds.iter().filter(|&&k| k == ErrorKind::DeviceLost).count(),
        1
    );
    assert_eq!(*kinds.last().expect("at least one error"), ErrorKind::DeviceLost);
    assert!(kinds[..kinds.len() - 1]
        .iter()
        .all(|&k| k == ErrorKind::DeviceIo));
}

#[test]
fn start_stop_round_trip_does_not_leak_the_session() {
    let (sink, _chunk_rx, error_rx) = ChannelSink::new();
    let mut controller = CaptureController::new(sink);
    let format = CaptureFormat::canonical();

    for _ in 0..3 {
        controller
            .start_with_session(move || FakeDevice::with_packets(format, Vec::new()))
            .expect("start should succeed");
        assert!(controller.is_capturing());
        controller.stop_capture();
        assert!(!controller.is_capturing());
    }
    assert!(error_rx.try_recv().is_err());
}

#[test]
fn failed_start_surfaces_synchronously_and_leaves_idle() {
    struct NoDevice;
    impl DeviceSession for NoDevice {
        fn open(&mut self) -> Result<CaptureFormat, CaptureError> {
            Err(CaptureError::DeviceUnavailable("unplugged".to_string()))
        }
        fn start(&mut self) -> Result<(), CaptureError> {
            Ok(())
        }
        fn stop(&mut self) {}
        fn poll_packet(&mut self) -> Result<Option<RawPacket>, CaptureError> {
            Ok(None)
        }
        fn close(&mut self) {}
    }

    let (sink, _chunk_rx, error_rx) = ChannelSink::new();
    let mut controller = CaptureController::new(sink);

    let err = controller
        .start_with_session(|| NoDevice)
        .expect_err("open failure must surface");
    assert_eq!(err.kind(), ErrorKind::DeviceUnavailable);
    assert!(!controller.is_capturing());
    // start() surfaces synchronously; the error channel stays quiet.
    assert!(error_rx.try_recv().is_err());
}
