use std::io::{ErrorKind, Read, Write};

use crate::error::{Result, TransportError};

/// Reading end of a byte transport.
///
/// A call may block until at least one byte is available and returns
/// the number of bytes placed into `buf`.
pub trait TransportRead {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize>;
}

/// Writing end of a byte transport.
///
/// A call is expected to be synchronous and atomic: the bytes it
/// accepts reach the wire contiguously. Returns the number of bytes
/// taken from `buf`.
pub trait TransportWrite {
    fn write(&mut self, buf: &[u8]) -> Result<usize>;
}

/// Wraps a read callback as a [`TransportRead`].
pub struct ReadFn<F>(F);

impl<F> ReadFn<F>
where
    F: FnMut(&mut [u8]) -> Result<usize>,
{
    pub fn new(callback: F) -> Self {
        Self(callback)
    }
}

impl<F> TransportRead for ReadFn<F>
where
    F: FnMut(&mut [u8]) -> Result<usize>,
{
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        (self.0)(buf)
    }
}

/// Wraps a write callback as a [`TransportWrite`].
pub struct WriteFn<F>(F);

impl<F> WriteFn<F>
where
    F: FnMut(&[u8]) -> Result<usize>,
{
    pub fn new(callback: F) -> Self {
        Self(callback)
    }
}

impl<F> TransportWrite for WriteFn<F>
where
    F: FnMut(&[u8]) -> Result<usize>,
{
    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        (self.0)(buf)
    }
}

/// Drives [`TransportRead`] from any [`Read`] stream.
///
/// Interrupted reads are retried; a zero-length read surfaces as
/// [`TransportError::Closed`].
pub struct StreamRead<T> {
    inner: T,
}

impl<T: Read> StreamRead<T> {
    pub fn new(inner: T) -> Self {
        Self { inner }
    }

    /// Consume the adapter and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }
}

impl<T: Read> TransportRead for StreamRead<T> {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        loop {
            match self.inner.read(buf) {
                Ok(0) => return Err(TransportError::Closed),
                Ok(n) => return Ok(n),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(TransportError::Io(err)),
            }
        }
    }
}

/// Drives [`TransportWrite`] from any [`Write`] stream.
///
/// Interrupted and would-block writes are retried; a zero-length write
/// surfaces as [`TransportError::Closed`]. Accepted bytes are flushed
/// before the call returns, so each frame reaches the wire promptly.
pub struct StreamWrite<T> {
    inner: T,
}

impl<T: Write> StreamWrite<T> {
    pub fn new(inner: T) -> Self {
        Self { inner }
    }

    /// Consume the adapter and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    fn flush(&mut self) -> Result<()> {
        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
                Err(err) => return Err(TransportError::Io(err)),
            }
        }
    }
}

impl<T: Write> TransportWrite for StreamWrite<T> {
    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        loop {
            match self.inner.write(buf) {
                Ok(0) => return Err(TransportError::Closed),
                Ok(n) => {
                    self.flush()?;
                    return Ok(n);
                }
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
                Err(err) => return Err(TransportError::Io(err)),
            }
        }
    }
}
