//! Control byte layout (bit positions LSB-first).
//!
//! | bit  | meaning                                          |
//! |------|--------------------------------------------------|
//! | 0    | 1 = supervisory frame, 0 = information frame     |
//! | 1..3 | send sequence number (information frames)        |
//! | 2..3 | supervisory type: `00` = RR (ack), `10` = REJ    |
//! | 4    | poll/final; set on information frames            |
//! | 5..7 | receive sequence number (supervisory frames)     |

/// Frame classification carried by the control byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    /// Information frame carrying a payload.
    Data,
    /// Receive-Ready supervisory frame acknowledging a data frame.
    Ack,
    /// Reject supervisory frame requesting a retransmission.
    Nack,
}

const S_FRAME_BIT: u8 = 0;
const SEND_SEQ_BIT: u8 = 1;
const S_TYPE_BIT: u8 = 2;
const POLL_BIT: u8 = 4;
const RECV_SEQ_BIT: u8 = 5;

const TYPE_RECEIVE_READY: u8 = 0b00;
const TYPE_REJECT: u8 = 0b10;

/// Build the control byte for `kind` with a 3-bit sequence number.
pub fn encode(kind: FrameKind, seq: u8) -> u8 {
    let seq = seq & 0x7;
    match kind {
        FrameKind::Data => (seq << SEND_SEQ_BIT) | (1 << POLL_BIT),
        FrameKind::Ack => (seq << RECV_SEQ_BIT) | (1 << S_FRAME_BIT),
        FrameKind::Nack => {
            (seq << RECV_SEQ_BIT) | (TYPE_REJECT << S_TYPE_BIT) | (1 << S_FRAME_BIT)
        }
    }
}

/// Split a control byte into frame kind and sequence number.
///
/// For information frames the sequence number is N(S); for supervisory
/// frames it is N(R). Unsupported supervisory types (Receive-Not-Ready,
/// Selective-Reject) decode as `Nack`.
pub fn decode(value: u8) -> (FrameKind, u8) {
    if (value >> S_FRAME_BIT) & 0x1 != 0 {
        let kind = if (value >> S_TYPE_BIT) & 0x3 == TYPE_RECEIVE_READY {
            FrameKind::Ack
        } else {
            FrameKind::Nack
        };
        (kind, (value >> RECV_SEQ_BIT) & 0x7)
    } else {
        (FrameKind::Data, (value >> SEND_SEQ_BIT) & 0x7)
    }
}
