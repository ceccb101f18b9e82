//! Byte-transport capability traits for serial links.
//!
//! This is the lowest layer of serlink. The framing and session layers
//! are written against the [`TransportRead`] and [`TransportWrite`]
//! traits and make no further assumptions about the underlying link
//! (UART, socket pair, in-memory pipe). [`ReadFn`] and [`WriteFn`]
//! lift plain callbacks into the traits; [`StreamRead`] and
//! [`StreamWrite`] adapt any [`std::io::Read`]/[`std::io::Write`]
//! stream.

pub mod error;
pub mod traits;

pub use error::{Result, TransportError};
pub use traits::{ReadFn, StreamRead, StreamWrite, TransportRead, TransportWrite, WriteFn};
