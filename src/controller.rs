//! Public lifecycle controller composing the device session, the capture
//! loop, and the format normalizer.
//!
//! The only state shared with the capture thread is an atomic run flag; the
//! session and its OS handles live entirely on that thread, so teardown can
//! never release device resources while the loop still uses them.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::bounded;

use crate::device::{CpalSession, DeviceSession, DEFAULT_QUEUE_PACKETS};
use crate::error::CaptureError;
use crate::format::CaptureFormat;
use crate::meter::LiveMeter;
use crate::normalize::Normalizer;
use crate::puller::run_capture_loop;
use crate::sink::AudioSink;

/// Lifecycle states. `Initializing` and `Stopping` are transient and only
/// observable from the control thread itself; a session is either live
/// (`Capturing`) or torn down (`Idle`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Idle,
    Initializing,
    Capturing,
    Stopping,
}

/// Timing and sizing knobs for the pipeline. Defaults are the production
/// values; tests shrink the intervals to keep the suite fast.
#[derive(Debug, Clone)]
pub(crate) struct PipelineTuning {
    /// Sleep between device polls. Balances CPU against latency.
    pub(crate) poll_interval: Duration,
    /// Consecutive poll faults before the session is declared lost.
    pub(crate) device_loss_threshold: u32,
    /// Capacity of the device packet queue.
    pub(crate) queue_packets: usize,
    /// Chunk-flow log sampling rate.
    pub(crate) log_every_chunks: u32,
}

impl Default for PipelineTuning {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(10),
            device_loss_threshold: 5,
            queue_packets: DEFAULT_QUEUE_PACKETS,
            log_every_chunks: 100,
        }
    }
}

/// Owns the capture thread and exposes the start/stop surface.
///
/// `start`/`stop` must be serialized on one control thread (they take
/// `&mut self`, so the borrow checker enforces it); the capture thread is
/// the only other thread in play.
pub struct CaptureController {
    sink: Arc<dyn AudioSink>,
    tuning: PipelineTuning,
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
    format: Option<CaptureFormat>,
    meter: LiveMeter,
    phase: Lifecycle,
}

impl CaptureController {
    pub fn new(sink: impl AudioSink + 'static) -> Self {
        Self::with_tuning(sink, PipelineTuning::default())
    }

    pub(crate) fn with_tuning(sink: impl AudioSink + 'static, tuning: PipelineTuning) -> Self {
        Self {
            sink: Arc::new(sink),
            tuning,
            running: Arc::new(AtomicBool::new(false)),
            handle: None,
            format: None,
            meter: LiveMeter::new(),
            phase: Lifecycle::Idle,
        }
    }

    /// Start capturing from the default endpoint. Errors are reported on the
    /// sink's error channel; the return value mirrors success.
    pub fn start_capture(&mut self) -> bool {
        match self.start() {
            Ok(()) => true,
            Err(err) => {
                self.sink.on_error(&err.to_string(), err.kind());
                false
            }
        }
    }

    /// `Result`-returning form of [`start_capture`](Self::start_capture).
    /// A no-op returning `Ok` while a session is already live.
    pub fn start(&mut self) -> Result<(), CaptureError> {
        let queue_packets = self.tuning.queue_packets;
        self.start_with_session(move || CpalSession::with_queue(queue_packets))
    }

    /// Start against a caller-provided [`DeviceSession`] backend.
    ///
    /// The factory runs on the capture thread, which lets backends hold
    /// non-`Send` OS handles. `open()` and `start()` run before this method
    /// returns, so negotiation and startup failures surface synchronously
    /// and leave the controller at `Idle` with no thread behind.
    pub fn start_with_session<S, F>(&mut self, make_session: F) -> Result<(), CaptureError>
    where
        S: DeviceSession + 'static,
        F: FnOnce() -> S + Send + 'static,
    {
        if self.running.load(Ordering::Acquire) {
            return Ok(());
        }
        self.reap_finished_thread();

        self.phase = Lifecycle::Initializing;
        self.running.store(true, Ordering::Release);
        let running = self.running.clone();
        let sink = self.sink.clone();
        let meter = self.meter.clone();
        let tuning = self.tuning.clone();
        let (ready_tx, ready_rx) = bounded::<Result<CaptureFormat, CaptureError>>(1);

        let spawned = thread::Builder::new()
            .name("audio-capture".to_string())
            .spawn(move || {
                let mut session = make_session();
                let format = match session
                    .open()
                    .and_then(|format| session.start().map(|()| format))
                {
                    Ok(format) => format,
                    Err(err) => {
                        session.close();
                        let _ = ready_tx.send(Err(err));
                        return;
                    }
                };
                let _ = ready_tx.send(Ok(format));

                let mut normalizer = Normalizer::new();
                run_capture_loop(
                    &mut session,
                    &mut normalizer,
                    &running,
                    sink.as_ref(),
                    &meter,
                    &tuning,
                );
                session.stop();
                session.close();
            });

        let handle = match spawned {
            Ok(handle) => handle,
            Err(err) => {
                self.running.store(false, Ordering::Release);
                self.phase = Lifecycle::Idle;
                return Err(CaptureError::ThreadCreationFailed(err.to_string()));
            }
        };

        match ready_rx.recv() {
            Ok(Ok(format)) => {
                tracing::debug!(%format, "capture session running");
                self.format = Some(format);
                self.handle = Some(handle);
                self.phase = Lifecycle::Capturing;
                Ok(())
            }
            Ok(Err(err)) => {
                self.running.store(false, Ordering::Release);
                let _ = handle.join();
                self.phase = Lifecycle::Idle;
                Err(err)
            }
            Err(_) => {
                self.running.store(false, Ordering::Release);
                let _ = handle.join();
                self.phase = Lifecycle::Idle;
                Err(CaptureError::ThreadCreationFailed(
                    "capture thread exited before reporting readiness".to_string(),
                ))
            }
        }
    }

    /// Signal the capture loop to exit, join it, and return to `Idle`.
    /// A no-op from `Idle`; calling it twice emits nothing extra. The join
    /// is bounded by one poll interval plus in-flight packet work.
    pub fn stop_capture(&mut self) {
        if self.handle.is_none() {
            return;
        }
        self.phase = Lifecycle::Stopping;
        self.running.store(false, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::warn!("capture thread panicked during shutdown");
            }
        }
        self.format = None;
        self.phase = Lifecycle::Idle;
    }

    pub fn is_capturing(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Current lifecycle state. After a device loss the capture thread has
    /// already cleared the run flag, so this reads `Idle` even before the
    /// finished thread is reaped.
    pub fn lifecycle(&self) -> Lifecycle {
        if self.running.load(Ordering::Acquire) {
            Lifecycle::Capturing
        } else if matches!(self.phase, Lifecycle::Initializing | Lifecycle::Stopping) {
            self.phase
        } else {
            Lifecycle::Idle
        }
    }

    /// Format negotiated with the device for the live session.
    pub fn negotiated_format(&self) -> Option<CaptureFormat> {
        if self.is_capturing() {
            self.format
        } else {
            None
        }
    }

    /// Shared handle to the live input level.
    pub fn meter(&self) -> LiveMeter {
        self.meter.clone()
    }

    /// A device-loss self-stop leaves a finished thread behind; collect it
    /// before starting the next session.
    fn reap_finished_thread(&mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
        self.format = None;
    }
}

impl Drop for CaptureController {
    fn drop(&mut self) {
        self.stop_capture();
    }
}
