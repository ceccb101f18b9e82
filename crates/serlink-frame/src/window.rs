//! Bounded reassembly window.

use bytes::{Buf, BytesMut};

use crate::error::{FrameError, Result};

/// Bounded byte window the transport reader appends to and the decoder
/// scans.
///
/// The readable prefix stays stable until [`consume`](Window::consume)
/// removes it, which keeps a [`Decoder`](crate::Decoder)'s cross-call
/// scan positions valid. The capacity bounds the largest frame that can
/// be reassembled.
#[derive(Debug)]
pub struct Window {
    buf: BytesMut,
    capacity: usize,
}

impl Window {
    pub fn new(capacity: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(capacity),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.buf.len() >= self.capacity
    }

    /// Bytes that can still be appended.
    pub fn remaining(&self) -> usize {
        self.capacity - self.buf.len()
    }

    /// The readable prefix.
    pub fn data(&self) -> &[u8] {
        &self.buf
    }

    /// Append bytes read from the transport.
    pub fn extend(&mut self, bytes: &[u8]) -> Result<()> {
        if bytes.len() > self.remaining() {
            return Err(FrameError::WindowOverflow {
                len: bytes.len(),
                capacity: self.capacity,
            });
        }
        self.buf.extend_from_slice(bytes);
        Ok(())
    }

    /// Drop the first `n` readable bytes.
    pub fn consume(&mut self, n: usize) {
        self.buf.advance(n.min(self.buf.len()));
    }

    /// Drop everything, recovering from a window full of noise.
    pub fn clear(&mut self) {
        self.buf.clear();
    }
}
