use std::time::Duration;

/// Errors surfaced by session read and write calls.
#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] serlink_frame::FrameError),

    /// Transport-level error, surfaced verbatim.
    #[error("transport error: {0}")]
    Transport(#[from] serlink_transport::TransportError),

    /// The destination buffer is empty.
    #[error("destination buffer is empty")]
    EmptyBuffer,

    /// The destination buffer could never be filled from the
    /// reassembly window.
    #[error("destination of {len} bytes exceeds the {capacity}-byte reassembly window")]
    BufferExceedsWindow { len: usize, capacity: usize },

    /// The payload does not fit the configured buffer.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// No acknowledgement arrived within the write timeout on any
    /// attempt.
    #[error("no acknowledgement after {attempts} attempts of {timeout:?}")]
    Timeout { attempts: u32, timeout: Duration },

    /// The peer rejected the frame on the final attempt.
    #[error("frame rejected by peer after {attempts} attempts")]
    Rejected { attempts: u32 },

    /// The session was closed.
    #[error("session closed")]
    Closed,
}

pub type Result<T> = std::result::Result<T, LinkError>;
