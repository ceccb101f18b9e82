//! HDLC-subset framing: flag delimiters, transparency escaping and a
//! CRC-16/X.25 frame check sequence.
//!
//! Frames are laid out as
//!
//! ```text
//! ┌──────┬─────────┬─────────┬──────────────┬────────┬────────┬──────┐
//! │ 0x7E │ Address │ Control │ Payload      │ FCS lo │ FCS hi │ 0x7E │
//! │ flag │ (1B)    │ (1B)    │ (data only)  │        │        │ flag │
//! └──────┴─────────┴─────────┴──────────────┴────────┴────────┴──────┘
//! ```
//!
//! with every byte between the flags transparency-escaped. Encoding is
//! a pure function into a byte sink; decoding runs through a resumable
//! [`Decoder`] scanning a bounded reassembly [`Window`], so frames can
//! arrive in arbitrary transport chunks.

pub mod codec;
pub mod control;
pub mod error;
pub mod escape;
pub mod fcs;
pub mod window;

pub use codec::{encode_frame, Decoded, Decoder, Frame, BROADCAST, OVERHEAD};
pub use control::FrameKind;
pub use error::{FrameError, Result};
pub use escape::{ESCAPE, FLAG};
pub use window::Window;
