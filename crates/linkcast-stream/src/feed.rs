//! Local feed streams: the producer interface for in-process frame
//! sources (a vision pipeline, a simulator) that have no transport.
//!
//! A feed behaves like any other stream on the relay side: its read half
//! yields pushed frames and reports a clean close once every producer
//! handle is gone. Idle reads surface as timeouts so a disconnect can
//! interrupt a blocked reader, matching the serial transports.

use std::collections::VecDeque;
use std::io::{self, Read};
use std::sync::mpsc::{Receiver, RecvTimeoutError, SyncSender};
use std::sync::{mpsc, Arc, Mutex, PoisonError};
use std::time::Duration;

use bytes::Bytes;

use crate::error::FeedError;

/// How long an idle feed read blocks before surfacing as a timeout.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Frames buffered between a slow relay and a fast producer; `push`
/// blocks once the queue is full.
const QUEUE_DEPTH: usize = 32;

/// Producer-side handle for a feed stream. Dropping the last handle
/// closes the feed cleanly (its relay worker observes end-of-stream).
pub struct FeedHandle {
    tx: SyncSender<Bytes>,
    frame_size: usize,
}

impl FeedHandle {
    /// Push one fixed-length frame into the relay.
    ///
    /// Blocks while the feed queue is full. Fails if the frame length
    /// does not match the relay's frame size or the feed stream has been
    /// released.
    pub fn push(&self, frame: &[u8]) -> Result<(), FeedError> {
        if frame.len() != self.frame_size {
            return Err(FeedError::FrameSize {
                expected: self.frame_size,
                got: frame.len(),
            });
        }
        self.tx
            .send(Bytes::copy_from_slice(frame))
            .map_err(|_| FeedError::Closed)
    }

    /// The frame size this feed was created for.
    pub fn frame_size(&self) -> usize {
        self.frame_size
    }
}

/// Consumer side of a feed, owned by the stream it backs. Survives
/// disconnect/reconnect cycles; each connect takes a fresh receiver view.
pub(crate) struct FeedSource {
    rx: Arc<Mutex<Receiver<Bytes>>>,
}

impl FeedSource {
    pub(crate) fn receiver(&self) -> FeedReceiver {
        FeedReceiver {
            rx: Arc::clone(&self.rx),
            pending: VecDeque::new(),
        }
    }
}

/// `Read` adapter over the feed channel, used as a stream's read half.
pub(crate) struct FeedReceiver {
    rx: Arc<Mutex<Receiver<Bytes>>>,
    pending: VecDeque<u8>,
}

pub(crate) fn feed_pair(frame_size: usize) -> (FeedHandle, FeedSource) {
    let (tx, rx) = mpsc::sync_channel(QUEUE_DEPTH);
    (
        FeedHandle { tx, frame_size },
        FeedSource {
            rx: Arc::new(Mutex::new(rx)),
        },
    )
}

impl Read for FeedReceiver {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        if self.pending.is_empty() {
            let rx = self.rx.lock().unwrap_or_else(PoisonError::into_inner);
            match rx.recv_timeout(POLL_INTERVAL) {
                Ok(frame) => self.pending.extend(frame.iter()),
                Err(RecvTimeoutError::Timeout) => {
                    return Err(io::Error::from(io::ErrorKind::TimedOut))
                }
                // Every producer handle dropped: clean end-of-stream.
                Err(RecvTimeoutError::Disconnected) => return Ok(0),
            }
        }
        let n = buf.len().min(self.pending.len());
        for (dst, byte) in buf.iter_mut().zip(self.pending.drain(..n)) {
            *dst = byte;
        }
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pushed_frame_is_readable() {
        let (handle, source) = feed_pair(4);
        handle.push(b"ping").unwrap();

        let mut receiver = source.receiver();
        let mut buf = [0u8; 4];
        receiver.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"ping");
    }

    #[test]
    fn wrong_length_push_is_rejected() {
        let (handle, _source) = feed_pair(4);
        let err = handle.push(b"toolong").unwrap_err();
        assert!(matches!(
            err,
            FeedError::FrameSize {
                expected: 4,
                got: 7
            }
        ));
    }

    #[test]
    fn idle_read_times_out() {
        let (_handle, source) = feed_pair(4);
        let mut receiver = source.receiver();
        let mut buf = [0u8; 4];
        let err = receiver.read(&mut buf).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::TimedOut);
    }

    #[test]
    fn dropped_handle_reads_as_closed() {
        let (handle, source) = feed_pair(4);
        drop(handle);
        let mut receiver = source.receiver();
        let mut buf = [0u8; 4];
        assert_eq!(receiver.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn short_reads_drain_a_frame_across_calls() {
        let (handle, source) = feed_pair(4);
        handle.push(b"abcd").unwrap();

        let mut receiver = source.receiver();
        let mut first = [0u8; 3];
        receiver.read_exact(&mut first).unwrap();
        let mut second = [0u8; 1];
        receiver.read_exact(&mut second).unwrap();
        assert_eq!(&first, b"abc");
        assert_eq!(&second, b"d");
    }

    #[test]
    fn fresh_receiver_after_reconnect_sees_new_frames() {
        let (handle, source) = feed_pair(2);
        handle.push(b"x1").unwrap();

        let mut receiver = source.receiver();
        let mut buf = [0u8; 2];
        receiver.read_exact(&mut buf).unwrap();
        drop(receiver);

        handle.push(b"x2").unwrap();
        let mut receiver = source.receiver();
        receiver.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"x2");
    }
}
