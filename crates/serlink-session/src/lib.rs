//! Stop-and-Wait ARQ over HDLC-subset framing.
//!
//! A [`Session`] couples the serlink frame codec to a byte transport
//! and gives the caller discrete, acknowledged messages: data frames
//! carry 3-bit sequence numbers, the receiver answers with
//! Receive-Ready (ack) or Reject (nack) supervisory frames, and the
//! sender holds each frame until it is acknowledged or its retries are
//! exhausted.
//!
//! One thread drives the blocking read loop; writers on any thread are
//! serialized internally and awakened by the reader when their
//! acknowledgement arrives.
//!
//! ```no_run
//! use std::os::unix::net::UnixStream;
//! use serlink_session::{Session, BROADCAST};
//! use serlink_transport::{StreamRead, StreamWrite};
//!
//! let (port, _peer) = UnixStream::pair()?;
//! let session = Session::new(
//!     StreamRead::new(port.try_clone()?),
//!     StreamWrite::new(port),
//! );
//!
//! session.write(BROADCAST, b"hello")?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod config;
pub mod error;
pub mod session;

pub use config::LinkConfig;
pub use error::{LinkError, Result};
pub use session::{Received, Session};

pub use serlink_frame::BROADCAST;
