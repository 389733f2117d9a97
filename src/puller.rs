//! Capture-thread main loop: bridge the device session into the normalizer
//! and push the result at the sink.

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use crate::controller::PipelineTuning;
use crate::device::DeviceSession;
use crate::error::{CaptureError, ErrorKind};
use crate::meter::{rms_db, LiveMeter};
use crate::normalize::Normalizer;
use crate::sink::AudioSink;

/// Drive the poll/normalize/emit loop until the run flag clears or the
/// device is declared lost.
///
/// Each pass sleeps one poll interval, then drains every packet the device
/// has queued, since buffers can arrive faster than we poll. Transient
/// `DeviceIo` faults are reported and survived; once they persist past the
/// tuned threshold the loop reports `DeviceLost` exactly once, clears the
/// run flag itself, and exits. Audio still queued when the loop leaves is
/// dropped on purpose, stop being caller-initiated.
pub(crate) fn run_capture_loop<S: DeviceSession>(
    session: &mut S,
    normalizer: &mut Normalizer,
    running: &AtomicBool,
    sink: &dyn AudioSink,
    meter: &LiveMeter,
    tuning: &PipelineTuning,
) {
    let mut chunk_log = ChunkLog::every(tuning.log_every_chunks);
    let mut consecutive_faults: u32 = 0;

    while running.load(Ordering::Acquire) {
        thread::sleep(tuning.poll_interval);

        loop {
            match session.poll_packet() {
                Ok(Some(packet)) => {
                    consecutive_faults = 0;
                    if packet.frames() == 0 {
                        continue;
                    }
                    let in_frames = packet.frames();
                    let chunk = normalizer.normalize(packet);
                    let samples = chunk.samples();
                    meter.set_db(rms_db(&samples));
                    chunk_log.observe(in_frames, samples.len());
                    sink.on_chunk(chunk);
                }
                Ok(None) => {
                    consecutive_faults = 0;
                    break;
                }
                Err(err) => {
                    consecutive_faults += 1;
                    if consecutive_faults >= tuning.device_loss_threshold {
                        let lost = CaptureError::DeviceLost(err.to_string());
                        tracing::warn!("{lost}");
                        sink.on_error(&lost.to_string(), ErrorKind::DeviceLost);
                        running.store(false, Ordering::Release);
                        meter.reset();
                        return;
                    }
                    tracing::debug!(
                        kind = err.kind().label(),
                        streak = consecutive_faults,
                        "transient capture fault: {err}"
                    );
                    sink.on_error(&err.to_string(), err.kind());
                    break;
                }
            }
        }
    }

    meter.reset();
}

/// Sampling policy for chunk-flow logging: one debug line per N chunks keeps
/// the trace readable at ~100 packets per second.
pub(crate) struct ChunkLog {
    every: u32,
    seen: u32,
}

impl ChunkLog {
    pub(crate) fn every(every: u32) -> Self {
        Self {
            every: every.max(1),
            seen: 0,
        }
    }

    /// Returns true on the chunks it logs, which the tests lean on.
    pub(crate) fn observe(&mut self, in_frames: usize, out_samples: usize) -> bool {
        self.seen = self.seen.wrapping_add(1);
        if self.seen % self.every != 0 {
            return false;
        }
        tracing::debug!(
            chunk = self.seen,
            in_frames,
            out_samples,
            "normalized chunk flow"
        );
        true
    }
}
