//! The Stop-and-Wait ARQ session.

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;

use bytes::BytesMut;
use serlink_frame::{codec, Decoded, Decoder, FrameKind, Window, BROADCAST, OVERHEAD};
use serlink_transport::{TransportError, TransportRead, TransportWrite};
use tracing::{debug, trace};

use crate::config::LinkConfig;
use crate::error::{LinkError, Result};

// Tri-state published by the reader to a waiting writer.
const RESULT_NONE: u8 = 0;
const RESULT_ACK: u8 = 1;
const RESULT_NACK: u8 = 2;

const POLL_INTERVAL: Duration = Duration::from_millis(1);

/// A delivered payload: its length in the caller's buffer and the
/// address byte the frame carried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Received {
    pub len: usize,
    pub address: u8,
}

/// Stop-and-Wait ARQ session over a byte transport.
///
/// One thread drives [`read`](Session::read) in a loop; any number of
/// threads call [`write`](Session::write), serialized internally. The
/// reader acknowledges incoming data frames, rejects corrupt ones and
/// publishes incoming acknowledgements to the waiting writer, so a
/// session without a running reader never sees its writes acknowledged.
pub struct Session<R, W> {
    rx: Mutex<RxHalf<R>>,
    tx: Mutex<TxHalf>,
    port: Mutex<W>,
    write_result: AtomicU8,
    stopped: AtomicBool,
    config: LinkConfig,
}

/// Reader-owned state: the transport reading end, the reassembly
/// window and decoder, and the receive-side counters.
struct RxHalf<R> {
    transport: R,
    window: Window,
    decoder: Decoder,
    chunk: Box<[u8]>,
    scratch: BytesMut,
    rx_seq: u8,
    last_delivered: Option<u8>,
}

/// Writer-owned state, guarded by the writer-exclusion lock.
struct TxHalf {
    tx_seq: u8,
    scratch: BytesMut,
}

impl<R: TransportRead, W: TransportWrite> Session<R, W> {
    pub fn new(read: R, write: W) -> Self {
        Self::with_config(read, write, LinkConfig::default())
    }

    pub fn with_config(read: R, write: W, config: LinkConfig) -> Self {
        Self {
            rx: Mutex::new(RxHalf {
                transport: read,
                window: Window::new(config.read_buffer),
                decoder: Decoder::new(config.read_buffer),
                chunk: vec![0u8; config.read_buffer].into_boxed_slice(),
                scratch: BytesMut::with_capacity(OVERHEAD + 2),
                rx_seq: 0,
                last_delivered: None,
            }),
            tx: Mutex::new(TxHalf {
                tx_seq: 0,
                scratch: BytesMut::with_capacity(config.write_buffer),
            }),
            port: Mutex::new(write),
            write_result: AtomicU8::new(RESULT_NONE),
            stopped: AtomicBool::new(false),
            config,
        }
    }

    pub fn config(&self) -> &LinkConfig {
        &self.config
    }

    /// Read the next data payload into `dst`, blocking until one is
    /// delivered, the transport fails or the session is closed.
    ///
    /// Returns the payload length and the address byte of the frame.
    /// Supervisory frames encountered along the way are consumed and
    /// published to any waiting writer; corrupt data frames are
    /// rejected with an outgoing NACK; a retransmission of the last
    /// delivered data frame is re-acknowledged but not delivered again.
    pub fn read(&self, dst: &mut [u8]) -> Result<Received> {
        if dst.is_empty() {
            return Err(LinkError::EmptyBuffer);
        }
        if dst.len() > self.config.read_buffer {
            return Err(LinkError::BufferExceedsWindow {
                len: dst.len(),
                capacity: self.config.read_buffer,
            });
        }

        let mut guard = lock(&self.rx);
        let rx = &mut *guard;

        loop {
            // Drain anything already buffered before blocking in the
            // transport: a complete frame may be sitting in the window.
            let mut outcome = Decoded::Pending;
            if !rx.window.is_empty() {
                outcome = rx.decoder.poll(rx.window.data());
                if outcome == Decoded::Pending && rx.window.is_full() {
                    // A window of flagless noise can never complete;
                    // drop it so the link resynchronizes.
                    debug!(
                        capacity = rx.window.capacity(),
                        "reassembly window full without a frame, clearing"
                    );
                    rx.window.clear();
                    rx.decoder.reset();
                }
            }
            if outcome == Decoded::Pending {
                rx.fill_from_transport()?;
                outcome = rx.decoder.poll(rx.window.data());
            }

            match outcome {
                Decoded::Complete { frame, consumed } => {
                    rx.window.consume(consumed);
                    match frame.kind {
                        FrameKind::Data => {
                            if frame.payload.len() > dst.len() {
                                return Err(LinkError::PayloadTooLarge {
                                    size: frame.payload.len(),
                                    max: dst.len(),
                                });
                            }
                            rx.rx_seq = (frame.seq + 1) & 0x7;
                            let ack = rx.rx_seq;
                            self.send_supervisory(&mut rx.scratch, FrameKind::Ack, ack)?;

                            if rx.last_delivered == Some(frame.seq) {
                                trace!(seq = frame.seq, "suppressing replayed data frame");
                            } else {
                                dst[..frame.payload.len()].copy_from_slice(&frame.payload);
                                rx.last_delivered = Some(frame.seq);
                                return Ok(Received {
                                    len: frame.payload.len(),
                                    address: frame.address,
                                });
                            }
                        }
                        FrameKind::Ack => {
                            trace!(seq = frame.seq, "acknowledgement received");
                            self.write_result.store(RESULT_ACK, Ordering::Release);
                        }
                        FrameKind::Nack => {
                            trace!(seq = frame.seq, "reject received");
                            self.write_result.store(RESULT_NACK, Ordering::Release);
                        }
                    }
                }
                Decoded::Corrupt { control, consumed } => {
                    rx.window.consume(consumed);
                    debug!(?control, consumed, "discarding corrupt frame");
                    if let Some((FrameKind::Data, seq)) = control {
                        rx.rx_seq = seq;
                        let nack = rx.rx_seq;
                        self.send_supervisory(&mut rx.scratch, FrameKind::Nack, nack)?;
                    }
                }
                Decoded::Pending => {}
            }

            if self.stopped.load(Ordering::Acquire) {
                return Err(LinkError::Closed);
            }
        }
    }

    /// Encode `payload` as a data frame addressed to `address` and send
    /// it, retransmitting until acknowledged or attempts run out.
    ///
    /// Thread safe: concurrent writers are serialized and each frame
    /// reaches the wire contiguously. Requires a concurrently running
    /// [`read`](Session::read) loop to observe acknowledgements unless
    /// the write timeout is zero.
    pub fn write(&self, address: u8, payload: &[u8]) -> Result<usize> {
        if payload.is_empty() {
            return Err(serlink_frame::FrameError::EmptyPayload.into());
        }
        let max = self.config.max_payload();
        if payload.len() > max {
            return Err(LinkError::PayloadTooLarge {
                size: payload.len(),
                max,
            });
        }

        let mut guard = lock(&self.tx);
        let tx = &mut *guard;

        tx.tx_seq = (tx.tx_seq + 1) & 0x7;
        tx.scratch.clear();
        codec::encode_frame(address, FrameKind::Data, tx.tx_seq, payload, &mut tx.scratch)?;

        let attempts = 1 + u32::from(self.config.write_retries);
        let timeout = self.config.write_timeout;
        let poll_ticks = timeout.as_millis() as u64;

        let mut rejected = false;
        for attempt in 0..attempts {
            self.write_result.store(RESULT_NONE, Ordering::Release);
            if attempt > 0 {
                debug!(seq = tx.tx_seq, attempt, "retransmitting data frame");
            }
            self.write_wire(&tx.scratch)?;

            if timeout.is_zero() {
                // Fire and forget.
                return Ok(payload.len());
            }

            rejected = false;
            for _ in 0..poll_ticks {
                match self.write_result.load(Ordering::Acquire) {
                    RESULT_ACK => {
                        self.write_result.store(RESULT_NONE, Ordering::Release);
                        return Ok(payload.len());
                    }
                    RESULT_NACK => {
                        self.write_result.store(RESULT_NONE, Ordering::Release);
                        rejected = true;
                        break;
                    }
                    _ => thread::sleep(POLL_INTERVAL),
                }
            }
        }

        if rejected {
            Err(LinkError::Rejected { attempts })
        } else {
            Err(LinkError::Timeout { attempts, timeout })
        }
    }

    /// Mark the session stopped. The reader loop exits at its next
    /// iteration boundary; a transport read already in progress is not
    /// interrupted.
    pub fn close(&self) {
        self.stopped.store(true, Ordering::Release);
    }

    pub fn is_closed(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    fn send_supervisory(&self, scratch: &mut BytesMut, kind: FrameKind, seq: u8) -> Result<()> {
        scratch.clear();
        codec::encode_frame(BROADCAST, kind, seq, &[], scratch)?;
        trace!(?kind, seq, "sending supervisory frame");
        self.write_wire(scratch)
    }

    /// Push one encoded frame through the transport writer. The port
    /// lock is held for the whole frame, so frames from the reader
    /// (supervisory) and writers (data) never interleave on the wire.
    fn write_wire(&self, frame: &[u8]) -> Result<()> {
        let mut port = lock(&self.port);
        let mut offset = 0;
        while offset < frame.len() {
            let n = port.write(&frame[offset..])?;
            if n == 0 {
                return Err(TransportError::Closed.into());
            }
            offset += n;
        }
        Ok(())
    }
}

impl<R: TransportRead> RxHalf<R> {
    /// One transport read into the window's unused tail.
    fn fill_from_transport(&mut self) -> Result<()> {
        let max = self.window.remaining().min(self.chunk.len());
        let n = self.transport.read(&mut self.chunk[..max])?;
        if n == 0 {
            return Err(TransportError::Closed.into());
        }
        self.window.extend(&self.chunk[..n])?;
        Ok(())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    use super::*;

    const FRAME_DATA: [u8; 7] = [0x7E, 0xFF, 0x12, 0x55, 0x36, 0xA3, 0x7E];
    const FRAME_DATA_BAD_FCS: [u8; 7] = [0x7E, 0xFF, 0x12, 0x33, 0x67, 0xF8, 0x7E];
    const FRAME_ACK_NR2: [u8; 6] = [0x7E, 0xFF, 0x41, 0x0A, 0xA3, 0x7E];
    const FRAME_NACK_NR1: [u8; 6] = [0x7E, 0xFF, 0x29, 0x44, 0x4C, 0x7E];

    /// Transport read scripted with a fixed chunk sequence; reads past
    /// the script report a closed transport.
    struct ScriptRead {
        chunks: VecDeque<Vec<u8>>,
    }

    impl ScriptRead {
        fn new(chunks: &[&[u8]]) -> Self {
            Self {
                chunks: chunks.iter().map(|c| c.to_vec()).collect(),
            }
        }
    }

    impl TransportRead for ScriptRead {
        fn read(&mut self, buf: &mut [u8]) -> serlink_transport::Result<usize> {
            let Some(chunk) = self.chunks.pop_front() else {
                return Err(TransportError::Closed);
            };
            assert!(chunk.len() <= buf.len(), "script chunk exceeds read capacity");
            buf[..chunk.len()].copy_from_slice(&chunk);
            Ok(chunk.len())
        }
    }

    /// Captures every transport write as one wire frame.
    #[derive(Clone, Default)]
    struct WireTap {
        frames: Arc<Mutex<Vec<Vec<u8>>>>,
    }

    impl WireTap {
        fn frames(&self) -> Vec<Vec<u8>> {
            self.frames.lock().unwrap().clone()
        }
    }

    impl TransportWrite for WireTap {
        fn write(&mut self, buf: &[u8]) -> serlink_transport::Result<usize> {
            self.frames.lock().unwrap().push(buf.to_vec());
            Ok(buf.len())
        }
    }

    fn session_with_script(chunks: &[&[u8]]) -> (Session<ScriptRead, WireTap>, WireTap) {
        let tap = WireTap::default();
        let session = Session::new(ScriptRead::new(chunks), tap.clone());
        (session, tap)
    }

    fn encode(address: u8, kind: FrameKind, seq: u8, payload: &[u8]) -> Vec<u8> {
        let mut dst = BytesMut::new();
        codec::encode_frame(address, kind, seq, payload, &mut dst).unwrap();
        dst.to_vec()
    }

    #[test]
    fn read_rejects_invalid_destination() {
        let (session, _) = session_with_script(&[]);

        let err = session.read(&mut []).unwrap_err();
        assert!(matches!(err, LinkError::EmptyBuffer));

        let mut oversized = vec![0u8; 512];
        let err = session.read(&mut oversized).unwrap_err();
        assert!(matches!(
            err,
            LinkError::BufferExceedsWindow { len: 512, capacity: 256 }
        ));
    }

    #[test]
    fn read_delivers_data_and_acknowledges() {
        let (session, tap) = session_with_script(&[&FRAME_DATA]);
        let mut buf = [0u8; 16];

        let received = session.read(&mut buf).unwrap();
        assert_eq!(received, Received { len: 1, address: 0xFF });
        assert_eq!(buf[0], 0x55);
        // Data frame seq 1 is acknowledged with N(R) = 2.
        assert_eq!(tap.frames(), vec![FRAME_ACK_NR2.to_vec()]);
    }

    #[test]
    fn read_assembles_chunked_frames() {
        let (session, tap) = session_with_script(&[&FRAME_DATA[..3], &FRAME_DATA[3..]]);
        let mut buf = [0u8; 16];

        let received = session.read(&mut buf).unwrap();
        assert_eq!(received.len, 1);
        assert_eq!(buf[0], 0x55);
        assert_eq!(tap.frames(), vec![FRAME_ACK_NR2.to_vec()]);
    }

    #[test]
    fn read_nacks_corrupt_data_frames() {
        let (session, tap) = session_with_script(&[&FRAME_DATA_BAD_FCS]);
        let mut buf = [0u8; 16];

        // The corrupt frame is rejected and the loop keeps reading
        // until the scripted transport closes.
        let err = session.read(&mut buf).unwrap_err();
        assert!(matches!(
            err,
            LinkError::Transport(TransportError::Closed)
        ));
        assert_eq!(tap.frames(), vec![FRAME_NACK_NR1.to_vec()]);
    }

    #[test]
    fn read_drains_buffered_frames_without_transport_reads() {
        let second = encode(BROADCAST, FrameKind::Data, 2, &[0x66]);
        let mut wire = FRAME_DATA.to_vec();
        wire.extend_from_slice(&second);

        // A single transport read delivers both frames; the second
        // read call must not touch the transport again (the script is
        // exhausted and would report Closed).
        let (session, tap) = session_with_script(&[&wire]);
        let mut buf = [0u8; 16];

        assert_eq!(session.read(&mut buf).unwrap().len, 1);
        assert_eq!(buf[0], 0x55);

        assert_eq!(session.read(&mut buf).unwrap().len, 1);
        assert_eq!(buf[0], 0x66);

        assert_eq!(tap.frames().len(), 2);
    }

    #[test]
    fn read_suppresses_replayed_data_frames() {
        let next = encode(BROADCAST, FrameKind::Data, 2, &[0x66]);
        let (session, tap) =
            session_with_script(&[&FRAME_DATA, &FRAME_DATA, &next]);
        let mut buf = [0u8; 16];

        assert_eq!(session.read(&mut buf).unwrap().len, 1);
        assert_eq!(buf[0], 0x55);

        // The replay of seq 1 is re-acknowledged but not delivered;
        // the next distinct frame is.
        assert_eq!(session.read(&mut buf).unwrap().len, 1);
        assert_eq!(buf[0], 0x66);

        let acks = tap.frames();
        assert_eq!(acks.len(), 3);
        assert_eq!(acks[0], FRAME_ACK_NR2.to_vec());
        assert_eq!(acks[1], FRAME_ACK_NR2.to_vec());
        assert_eq!(acks[2], encode(BROADCAST, FrameKind::Ack, 3, &[]));
    }

    #[test]
    fn read_acknowledgement_sequence_wraps_modulo_eight() {
        let wrap = encode(BROADCAST, FrameKind::Data, 7, &[0x01]);
        let (session, tap) = session_with_script(&[&wrap]);
        let mut buf = [0u8; 16];

        session.read(&mut buf).unwrap();
        assert_eq!(tap.frames(), vec![encode(BROADCAST, FrameKind::Ack, 0, &[])]);
    }

    #[test]
    fn read_recovers_from_window_overflow() {
        // A full window of flagless noise, then a valid frame.
        let noise = vec![0xAA; 256];
        let (session, tap) = session_with_script(&[&noise, &FRAME_DATA]);
        let mut buf = [0u8; 16];

        let received = session.read(&mut buf).unwrap();
        assert_eq!(received.len, 1);
        assert_eq!(buf[0], 0x55);
        assert_eq!(tap.frames(), vec![FRAME_ACK_NR2.to_vec()]);
    }

    #[test]
    fn read_returns_closed_after_close() {
        let (session, _) = session_with_script(&[&FRAME_ACK_NR2]);
        session.close();
        assert!(session.is_closed());

        // The buffered supervisory frame is consumed, then the stop
        // flag ends the loop instead of another transport read.
        let mut buf = [0u8; 16];
        let err = session.read(&mut buf).unwrap_err();
        assert!(matches!(err, LinkError::Closed));
    }

    #[test]
    fn write_fire_and_forget_sends_one_frame() {
        let config = LinkConfig {
            write_timeout: Duration::ZERO,
            ..LinkConfig::default()
        };
        let tap = WireTap::default();
        let session = Session::with_config(ScriptRead::new(&[]), tap.clone(), config);

        assert_eq!(session.write(BROADCAST, &[0x55]).unwrap(), 1);
        assert_eq!(tap.frames(), vec![FRAME_DATA.to_vec()]);
    }

    #[test]
    fn write_sequence_wraps_modulo_eight() {
        let config = LinkConfig {
            write_timeout: Duration::ZERO,
            ..LinkConfig::default()
        };
        let tap = WireTap::default();
        let session = Session::with_config(ScriptRead::new(&[]), tap.clone(), config);

        for _ in 0..9 {
            session.write(BROADCAST, &[0x55]).unwrap();
        }

        let frames = tap.frames();
        assert_eq!(frames.len(), 9);
        for (i, frame) in frames.iter().enumerate() {
            let expected = ((i + 1) % 8) as u8;
            assert_eq!(frame[2], 0x10 | (expected << 1), "frame {i}");
        }
    }

    #[test]
    fn write_rejects_bad_payloads() {
        let (session, _) = session_with_script(&[]);

        let err = session.write(BROADCAST, &[]).unwrap_err();
        assert!(matches!(
            err,
            LinkError::Frame(serlink_frame::FrameError::EmptyPayload)
        ));

        let oversized = vec![0u8; 200];
        let err = session.write(BROADCAST, &oversized).unwrap_err();
        assert!(matches!(
            err,
            LinkError::PayloadTooLarge { size: 200, max: 124 }
        ));
    }

    #[test]
    fn write_times_out_after_all_attempts() {
        let config = LinkConfig {
            write_timeout: Duration::from_millis(3),
            write_retries: 2,
            ..LinkConfig::default()
        };
        let tap = WireTap::default();
        let session = Session::with_config(ScriptRead::new(&[]), tap.clone(), config);

        let err = session.write(BROADCAST, &[0x55]).unwrap_err();
        assert!(matches!(err, LinkError::Timeout { attempts: 3, .. }));
        // The frame went out once per attempt, identical every time.
        let frames = tap.frames();
        assert_eq!(frames.len(), 3);
        assert_eq!(frames[0], FRAME_DATA.to_vec());
        assert_eq!(frames[1], frames[0]);
        assert_eq!(frames[2], frames[0]);
    }

    #[test]
    fn escaped_payload_roundtrips_through_read() {
        // write(0xFF, [0x7E]) emits one byte more than the plain
        // 1-byte frame; feeding it back yields the original payload.
        let config = LinkConfig {
            write_timeout: Duration::ZERO,
            ..LinkConfig::default()
        };
        let tap = WireTap::default();
        let session = Session::with_config(ScriptRead::new(&[]), tap.clone(), config);
        session.write(BROADCAST, &[0x7E]).unwrap();

        let frames = tap.frames();
        assert_eq!(frames[0].len(), FRAME_DATA.len() + 1);

        let (receiver, _tap) = session_with_script(&[&frames[0]]);
        let mut buf = [0u8; 16];
        let received = receiver.read(&mut buf).unwrap();
        assert_eq!(received.len, 1);
        assert_eq!(buf[0], 0x7E);
    }
}
