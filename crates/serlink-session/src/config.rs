use std::time::Duration;

// Worst-case non-payload wire bytes of a data frame: two flags, the
// address and control bytes, and a fully escaped FCS.
const FRAME_WIRE_OVERHEAD: usize = 8;

/// Construction-time options for a [`Session`](crate::Session).
#[derive(Debug, Clone)]
pub struct LinkConfig {
    /// Reassembly window capacity in bytes; bounds the largest
    /// receivable frame.
    pub read_buffer: usize,
    /// Encode scratch capacity in bytes. Must be at least
    /// `2 * payload + 8` for the largest payload written; writes above
    /// the derived bound are rejected.
    pub write_buffer: usize,
    /// Per-attempt wait for an acknowledgement. Zero disables waiting
    /// entirely (fire and forget).
    pub write_timeout: Duration,
    /// Additional transmission attempts after the first.
    pub write_retries: u8,
}

impl LinkConfig {
    /// Largest payload the write buffer can hold fully escaped.
    pub fn max_payload(&self) -> usize {
        self.write_buffer.saturating_sub(FRAME_WIRE_OVERHEAD) / 2
    }
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            read_buffer: 256,
            write_buffer: 256,
            write_timeout: Duration::from_millis(100),
            write_retries: 1,
        }
    }
}
