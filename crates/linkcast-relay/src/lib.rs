//! Broadcast relay over a fixed set of [`linkcast_stream::DataStream`]s.
//!
//! A [`Dispatcher`] owns an ordered set of streams and a fixed frame
//! size. Once started, one worker thread per stream reads full frames
//! from its own stream and fans each one out to every other stream. A
//! worker ends when its own read side closes or fails; the dispatcher is
//! done when the last worker ends, or when the caller shuts it down.

pub mod dispatcher;
pub mod error;
mod gate;
mod worker;

pub use dispatcher::{ConnectFailure, Dispatcher, StartReport};
pub use error::{RelayError, Result};
