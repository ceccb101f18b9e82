//! Frame encoding and the resumable decoder.
//!
//! Encoding is a pure append into a [`BytesMut`] sink. Decoding runs as
//! a [`Decoder`] that keeps its scan position, escape state and running
//! FCS across calls, so it can be polled repeatedly against a window
//! that grows as transport bytes arrive without rescanning earlier
//! input. The window's readable prefix must stay stable between polls;
//! once a poll reports a terminal outcome the caller consumes exactly
//! the reported byte count and the decoder starts over.

use bytes::{BufMut, Bytes, BytesMut};

use crate::control::{self, FrameKind};
use crate::error::{FrameError, Result};
use crate::escape::{self, push_escaped, ESCAPE, FLAG, MASK};
use crate::fcs;

/// Framing overhead of an unescaped frame: two flags, address, control
/// and two FCS bytes.
pub const OVERHEAD: usize = 6;

/// The all-stations address, used when no address is given.
pub const BROADCAST: u8 = 0xFF;

/// A decoded frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub address: u8,
    pub kind: FrameKind,
    pub seq: u8,
    /// Payload bytes; empty for supervisory frames.
    pub payload: Bytes,
}

/// Encode a frame into `dst`, returning the number of bytes appended.
///
/// Layout: flag, address, control, payload (data frames only), the
/// inverted FCS little-endian, flag — everything between the flags
/// transparency-escaped. The FCS covers the unescaped address, control
/// and payload bytes.
pub fn encode_frame(
    address: u8,
    kind: FrameKind,
    seq: u8,
    payload: &[u8],
    dst: &mut BytesMut,
) -> Result<usize> {
    if escape::is_reserved(address) {
        return Err(FrameError::ReservedAddress(address));
    }
    if kind == FrameKind::Data && payload.is_empty() {
        return Err(FrameError::EmptyPayload);
    }

    let start = dst.len();
    dst.reserve(OVERHEAD + payload.len() * 2);
    dst.put_u8(FLAG);

    let mut fcs = fcs::update(fcs::INIT, address);
    push_escaped(dst, address);

    let ctrl = control::encode(kind, seq);
    fcs = fcs::update(fcs, ctrl);
    push_escaped(dst, ctrl);

    if kind == FrameKind::Data {
        for &byte in payload {
            fcs = fcs::update(fcs, byte);
            push_escaped(dst, byte);
        }
    }

    for byte in (fcs ^ 0xFFFF).to_le_bytes() {
        push_escaped(dst, byte);
    }

    dst.put_u8(FLAG);
    Ok(dst.len() - start)
}

/// Outcome of one decode attempt against the window's readable prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded {
    /// No complete frame yet. Nothing was consumed; append more
    /// transport bytes and poll again.
    Pending,
    /// Delimiters were found but the frame is too short or fails the
    /// FCS check. `control` carries the kind and sequence number
    /// decoded from the bad frame, if it got that far.
    Corrupt {
        control: Option<(FrameKind, u8)>,
        consumed: usize,
    },
    /// An intact frame. `consumed` covers everything up to and
    /// including the closing flag.
    Complete { frame: Frame, consumed: usize },
}

/// Resumable frame scanner.
pub struct Decoder {
    max_body: usize,
    scan: usize,
    start: Option<usize>,
    escape: bool,
    fcs: u16,
    body_pos: usize,
    address: u8,
    control: Option<(FrameKind, u8)>,
    body: BytesMut,
    oversized: bool,
}

impl Decoder {
    /// `max_body` bounds the decoded payload-plus-FCS accumulator; a
    /// frame growing past it terminates as [`Decoded::Corrupt`].
    pub fn new(max_body: usize) -> Self {
        Self {
            max_body,
            scan: 0,
            start: None,
            escape: false,
            fcs: fcs::INIT,
            body_pos: 0,
            address: 0,
            control: None,
            body: BytesMut::new(),
            oversized: false,
        }
    }

    /// Drop all scan state, ready for a fresh window.
    pub fn reset(&mut self) {
        self.scan = 0;
        self.start = None;
        self.escape = false;
        self.fcs = fcs::INIT;
        self.body_pos = 0;
        self.address = 0;
        self.control = None;
        self.body.clear();
        self.oversized = false;
    }

    /// Scan `window` from where the previous poll stopped.
    ///
    /// On a terminal outcome the decoder resets itself; the caller must
    /// then drop the reported `consumed` prefix from the window before
    /// the next poll.
    pub fn poll(&mut self, window: &[u8]) -> Decoded {
        let mut stop = None;

        while self.scan < window.len() {
            let i = self.scan;
            let byte = window[i];

            match self.start {
                None => {
                    if byte == FLAG {
                        // A flag directly followed by another flag is
                        // idle filler between frames.
                        if window.get(i + 1) == Some(&FLAG) {
                            self.scan += 1;
                            continue;
                        }
                        self.start = Some(i);
                    }
                    // Non-flag bytes before the opening flag are noise.
                }
                Some(start) => {
                    if byte == FLAG {
                        if i == start + 1 {
                            // The tail of a flag run split across
                            // transport reads: slide the opening flag
                            // instead of closing an empty frame.
                            self.start = Some(i);
                        } else {
                            stop = Some(i);
                            break;
                        }
                    } else if byte == ESCAPE {
                        self.escape = true;
                    } else {
                        let value = if self.escape {
                            self.escape = false;
                            byte ^ MASK
                        } else {
                            byte
                        };
                        self.fcs = fcs::update(self.fcs, value);
                        match self.body_pos {
                            0 => self.address = value,
                            1 => self.control = Some(control::decode(value)),
                            _ => {
                                if self.body.len() < self.max_body {
                                    self.body.put_u8(value);
                                } else {
                                    self.oversized = true;
                                }
                            }
                        }
                        self.body_pos += 1;
                    }
                }
            }
            self.scan += 1;
        }

        let (start, stop) = match (self.start, stop) {
            (Some(start), Some(stop)) => (start, stop),
            _ => return Decoded::Pending,
        };

        let consumed = stop + 1;
        let intact = stop >= start + 4
            && self.fcs == fcs::GOOD
            && !self.oversized
            && self.body.len() >= 2;

        let outcome = match (intact, self.control) {
            (true, Some((kind, seq))) => {
                let mut body = self.body.split().freeze();
                let payload = body.split_to(body.len() - 2);
                Decoded::Complete {
                    frame: Frame {
                        address: self.address,
                        kind,
                        seq,
                        payload,
                    },
                    consumed,
                }
            }
            (_, control) => Decoded::Corrupt { control, consumed },
        };
        self.reset();
        outcome
    }
}

impl std::fmt::Debug for Decoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Decoder")
            .field("scan", &self.scan)
            .field("start", &self.start)
            .field("body_pos", &self.body_pos)
            .finish()
    }
}
