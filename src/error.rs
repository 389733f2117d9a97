//! Error taxonomy for the capture pipeline.
//!
//! Initialization failures abort `start()` synchronously; `DeviceIo` is
//! transient and reported per packet; `DeviceLost` ends the session the same
//! way a user stop would. Nothing here ever terminates the process.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("no capture endpoint available: {0}")]
    DeviceUnavailable(String),

    #[error("format negotiation failed: {0}")]
    FormatNegotiationFailed(String),

    #[error("resource allocation failed: {0}")]
    ResourceAllocationFailed(String),

    #[error("stream start failed: {0}")]
    StreamStartFailed(String),

    #[error("device i/o fault: {0}")]
    DeviceIo(String),

    #[error("capture device lost: {0}")]
    DeviceLost(String),

    #[error("capture thread creation failed: {0}")]
    ThreadCreationFailed(String),
}

impl CaptureError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CaptureError::DeviceUnavailable(_) => ErrorKind::DeviceUnavailable,
            CaptureError::FormatNegotiationFailed(_) => ErrorKind::FormatNegotiationFailed,
            CaptureError::ResourceAllocationFailed(_) => ErrorKind::ResourceAllocationFailed,
            CaptureError::StreamStartFailed(_) => ErrorKind::StreamStartFailed,
            CaptureError::DeviceIo(_) => ErrorKind::DeviceIo,
            CaptureError::DeviceLost(_) => ErrorKind::DeviceLost,
            CaptureError::ThreadCreationFailed(_) => ErrorKind::ThreadCreationFailed,
        }
    }
}

/// Payload-free classification carried on the error channel next to the
/// human-readable message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    DeviceUnavailable,
    FormatNegotiationFailed,
    ResourceAllocationFailed,
    StreamStartFailed,
    DeviceIo,
    DeviceLost,
    ThreadCreationFailed,
}

impl ErrorKind {
    pub fn label(self) -> &'static str {
        match self {
            ErrorKind::DeviceUnavailable => "device_unavailable",
            ErrorKind::FormatNegotiationFailed => "format_negotiation_failed",
            ErrorKind::ResourceAllocationFailed => "resource_allocation_failed",
            ErrorKind::StreamStartFailed => "stream_start_failed",
            ErrorKind::DeviceIo => "device_io",
            ErrorKind::DeviceLost => "device_lost",
            ErrorKind::ThreadCreationFailed => "thread_creation_failed",
        }
    }

    /// True for faults the capture loop keeps running through.
    pub fn is_transient(self) -> bool {
        matches!(self, ErrorKind::DeviceIo)
    }
}
