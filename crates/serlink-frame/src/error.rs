/// Errors that can occur while framing or buffering bytes.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// Data frames must carry at least one payload byte.
    #[error("data frame requires a non-empty payload")]
    EmptyPayload,

    /// The address byte collides with a reserved delimiter byte and
    /// would not survive the receive-side flag scan.
    #[error("address {0:#04x} collides with a reserved delimiter byte")]
    ReservedAddress(u8),

    /// Appending would grow the reassembly window past its capacity.
    #[error("window overflow (appending {len} bytes to a {capacity}-byte window)")]
    WindowOverflow { len: usize, capacity: usize },
}

pub type Result<T> = std::result::Result<T, FrameError>;
