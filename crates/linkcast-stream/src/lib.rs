//! Uniform stream abstraction for the linkcast relay.
//!
//! A [`DataStream`] is one logical link to a peer over one transport:
//! - a TCP connection to a server,
//! - a Bluetooth RFCOMM channel (Linux),
//! - a radio-serial device (XBee-style),
//! - or a local feed an external producer pushes frames into.
//!
//! All variants expose the same connect/disconnect/send/recv surface, so
//! the relay layer never depends on a concrete transport.

pub mod descriptor;
pub mod error;
pub mod feed;
pub mod link;
pub mod stream;

#[cfg(target_os = "linux")]
mod rfcomm;
mod serial;
mod tcp;

pub use descriptor::{parse, BdAddr, Descriptor, StreamKind};
pub use error::{ConnectError, FeedError, ParseError, StreamError};
pub use feed::FeedHandle;
pub use link::LinkStream;
pub use stream::{DataStream, StreamStatus};
