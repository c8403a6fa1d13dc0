use std::fmt;
use std::io::{self, ErrorKind, Read, Write};
use std::sync::{Mutex, PoisonError};

use bytes::Bytes;
use tracing::{debug, warn};

use crate::descriptor::{self, StreamKind};
use crate::error::{ConnectError, ParseError, StreamError};
use crate::feed::{feed_pair, FeedHandle, FeedSource};
use crate::link::LinkStream;

/// Connection state of a [`DataStream`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamStatus {
    /// Not connected, or disconnected after use.
    Unknown,
    /// Connected and usable.
    Ready,
    /// The last operation failed; the transport has been released.
    Error(String),
}

impl StreamStatus {
    pub fn is_ready(&self) -> bool {
        matches!(self, StreamStatus::Ready)
    }
}

impl fmt::Display for StreamStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamStatus::Unknown => write!(f, "unknown"),
            StreamStatus::Ready => write!(f, "ready"),
            StreamStatus::Error(message) => write!(f, "error: {message}"),
        }
    }
}

/// One logical link to a peer over one transport.
///
/// The read half belongs to the single relay worker that owns this
/// stream; the write half is shared by every other worker, and its mutex
/// is what keeps concurrently broadcast frames from interleaving on the
/// wire.
pub struct DataStream {
    id: String,
    descriptor: String,
    kind: StreamKind,
    feed: Option<FeedSource>,
    status: Mutex<StreamStatus>,
    /// Read half; locked only by the owning relay worker.
    reader: Mutex<Option<LinkStream>>,
    /// Write half; serializes concurrent senders toward this stream.
    writer: Mutex<Option<LinkStream>>,
    /// Out-of-band close handle. No blocking I/O ever holds this lock,
    /// so `disconnect` can always force the transport shut even while a
    /// reader or sender is parked inside a blocking call.
    closer: Mutex<Option<LinkStream>>,
}

enum ReadEnd {
    Frame,
    Closed,
    /// Disconnected underneath a polling read (serial/feed timeout path).
    Stale,
}

impl DataStream {
    /// Build an unconnected stream from a textual descriptor.
    pub fn from_descriptor(text: &str) -> Result<Self, ParseError> {
        let parsed = descriptor::parse(text)?;
        Ok(Self {
            id: parsed.id,
            descriptor: text.to_string(),
            kind: parsed.kind,
            feed: None,
            status: Mutex::new(StreamStatus::Unknown),
            reader: Mutex::new(None),
            writer: Mutex::new(None),
            closer: Mutex::new(None),
        })
    }

    /// Build a local feed stream plus the producer handle that pushes
    /// frames into it.
    pub fn source(id: &str, frame_size: usize) -> (Self, FeedHandle) {
        let (handle, source) = feed_pair(frame_size);
        let stream = Self {
            id: id.to_string(),
            descriptor: format!("{id}:feed"),
            kind: StreamKind::Feed,
            feed: Some(source),
            status: Mutex::new(StreamStatus::Unknown),
            reader: Mutex::new(None),
            writer: Mutex::new(None),
            closer: Mutex::new(None),
        };
        (stream, handle)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// The descriptor text this stream was built from.
    pub fn descriptor(&self) -> &str {
        &self.descriptor
    }

    pub fn kind(&self) -> &StreamKind {
        &self.kind
    }

    pub fn status(&self) -> StreamStatus {
        self.status
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Establish the transport. An already-`Ready` stream is disconnected
    /// first, so a re-connect behaves exactly like a first connect.
    pub fn connect(&self) -> Result<(), ConnectError> {
        if self.status().is_ready() {
            self.disconnect();
        }
        match self.open_halves() {
            Ok((read, write, close)) => {
                *self
                    .reader
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner) = Some(read);
                *self
                    .writer
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner) = Some(write);
                *self
                    .closer
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner) = Some(close);
                self.set_status(StreamStatus::Ready);
                debug!(id = %self.id, kind = self.kind.name(), "stream ready");
                Ok(())
            }
            Err(err) => {
                self.set_status(StreamStatus::Error(err.to_string()));
                Err(err)
            }
        }
    }

    /// Release the transport and return to `Unknown`. Always succeeds and
    /// is safe to call at any time; a reader or sender blocked on the
    /// transport is forced out by the out-of-band shutdown (or, on
    /// timeout-driven transports, by its next status poll).
    pub fn disconnect(&self) {
        self.release_transport();
        self.set_status(StreamStatus::Unknown);
        debug!(id = %self.id, "stream disconnected");
    }

    /// Send one full frame, retrying partial writes until every byte is
    /// out. Fails fast unless the stream is `Ready`. Any transport error
    /// releases the stream and moves it to `Error`.
    pub fn send(&self, frame: &[u8]) -> Result<(), StreamError> {
        if !self.status().is_ready() {
            return Err(StreamError::NotReady {
                id: self.id.clone(),
            });
        }
        let mut guard = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(link) = guard.as_mut() else {
            return Err(StreamError::NotReady {
                id: self.id.clone(),
            });
        };

        let result = write_all(link, frame, || self.status().is_ready());
        match result {
            Ok(()) => Ok(()),
            Err(err) => {
                if let Some(link) = guard.take() {
                    link.shutdown();
                }
                drop(guard);
                self.release_transport();
                self.terminal_transition(StreamStatus::Error(format!(
                    "error sending data: {err}"
                )));
                warn!(id = %self.id, error = %err, "send failed, stream released");
                Err(StreamError::Send {
                    id: self.id.clone(),
                    source: err,
                })
            }
        }
    }

    /// Receive exactly `frame_size` bytes, retrying partial reads.
    ///
    /// `Ok(None)` means the peer closed cleanly; the stream has been
    /// released and is back in `Unknown`. Fails fast unless `Ready`. Any
    /// transport error releases the stream and moves it to `Error`.
    pub fn recv(&self, frame_size: usize) -> Result<Option<Bytes>, StreamError> {
        if !self.status().is_ready() {
            return Err(StreamError::NotReady {
                id: self.id.clone(),
            });
        }
        let mut guard = self.reader.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(link) = guard.as_mut() else {
            return Err(StreamError::NotReady {
                id: self.id.clone(),
            });
        };

        let mut buf = vec![0u8; frame_size];
        let mut filled = 0usize;
        let outcome: Result<ReadEnd, io::Error> = loop {
            if filled == frame_size {
                break Ok(ReadEnd::Frame);
            }
            match link.read(&mut buf[filled..]) {
                Ok(0) => break Ok(ReadEnd::Closed),
                Ok(n) => filled += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if matches!(err.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock) => {
                    // Timeout-driven transports poll here so an external
                    // disconnect can interrupt an idle reader.
                    if self.status().is_ready() {
                        continue;
                    }
                    break Ok(ReadEnd::Stale);
                }
                Err(err) => break Err(err),
            }
        };

        match outcome {
            Ok(ReadEnd::Frame) => Ok(Some(Bytes::from(buf))),
            Ok(ReadEnd::Closed) => {
                if let Some(link) = guard.take() {
                    link.shutdown();
                }
                drop(guard);
                self.release_transport();
                self.terminal_transition(StreamStatus::Unknown);
                debug!(id = %self.id, "stream closed by peer");
                Ok(None)
            }
            Ok(ReadEnd::Stale) => {
                if let Some(link) = guard.take() {
                    link.shutdown();
                }
                Err(StreamError::NotReady {
                    id: self.id.clone(),
                })
            }
            Err(err) => {
                if let Some(link) = guard.take() {
                    link.shutdown();
                }
                drop(guard);
                self.release_transport();
                self.terminal_transition(StreamStatus::Error(format!(
                    "error receiving data: {err}"
                )));
                warn!(id = %self.id, error = %err, "recv failed, stream released");
                Err(StreamError::Recv {
                    id: self.id.clone(),
                    source: err,
                })
            }
        }
    }

    fn open_halves(&self) -> Result<(LinkStream, LinkStream, LinkStream), ConnectError> {
        match &self.kind {
            StreamKind::Tcp { server, port } => {
                let clone_err = |source| ConnectError::Connect {
                    id: self.id.clone(),
                    target: format!("{server}:{port}"),
                    source,
                };
                let stream = crate::tcp::open(&self.id, server, *port)?;
                let write = stream.try_clone().map_err(clone_err)?;
                let close = stream.try_clone().map_err(clone_err)?;
                Ok((
                    LinkStream::tcp(stream),
                    LinkStream::tcp(write),
                    LinkStream::tcp(close),
                ))
            }
            StreamKind::Bluetooth { addr, channel } => self.open_bluetooth(*addr, *channel),
            StreamKind::Serial { device, baud } => {
                let clone_err = |source| ConnectError::Serial {
                    id: self.id.clone(),
                    device: device.clone(),
                    source,
                };
                let port = crate::serial::open(&self.id, device, *baud)?;
                let write = port.try_clone().map_err(clone_err)?;
                let close = port.try_clone().map_err(clone_err)?;
                Ok((
                    LinkStream::serial(port),
                    LinkStream::serial(write),
                    LinkStream::serial(close),
                ))
            }
            StreamKind::Feed => match &self.feed {
                Some(source) => Ok((
                    LinkStream::feed(source.receiver()),
                    LinkStream::sink(),
                    LinkStream::sink(),
                )),
                None => Err(ConnectError::Unsupported {
                    id: self.id.clone(),
                    kind: "feed",
                }),
            },
        }
    }

    #[cfg(target_os = "linux")]
    fn open_bluetooth(
        &self,
        addr: crate::descriptor::BdAddr,
        channel: u8,
    ) -> Result<(LinkStream, LinkStream, LinkStream), ConnectError> {
        let clone_err = |source| ConnectError::Connect {
            id: self.id.clone(),
            target: format!("{addr} channel {channel}"),
            source,
        };
        let stream = crate::rfcomm::RfcommStream::connect(&self.id, addr, channel)?;
        let write = stream.try_clone().map_err(clone_err)?;
        let close = stream.try_clone().map_err(clone_err)?;
        Ok((
            LinkStream::rfcomm(stream),
            LinkStream::rfcomm(write),
            LinkStream::rfcomm(close),
        ))
    }

    #[cfg(not(target_os = "linux"))]
    fn open_bluetooth(
        &self,
        _addr: crate::descriptor::BdAddr,
        _channel: u8,
    ) -> Result<(LinkStream, LinkStream, LinkStream), ConnectError> {
        Err(ConnectError::Unsupported {
            id: self.id.clone(),
            kind: "bt",
        })
    }

    /// Shut the transport down out-of-band and reap whichever handles are
    /// not currently held by a blocked operation. A holder cleans its
    /// handle up itself once the forced shutdown makes its call return.
    fn release_transport(&self) {
        if let Some(close) = self
            .closer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            close.shutdown();
        }
        if let Ok(mut guard) = self.writer.try_lock() {
            if let Some(link) = guard.take() {
                link.shutdown();
            }
        }
        if let Ok(mut guard) = self.reader.try_lock() {
            if let Some(link) = guard.take() {
                link.shutdown();
            }
        }
    }

    fn set_status(&self, status: StreamStatus) {
        *self.status.lock().unwrap_or_else(PoisonError::into_inner) = status;
    }

    /// Leave `Ready` at most once: terminal paths racing each other (a
    /// failed sender and the stream's own reader) must not overwrite the
    /// first recorded outcome.
    fn terminal_transition(&self, status: StreamStatus) {
        let mut guard = self.status.lock().unwrap_or_else(PoisonError::into_inner);
        if guard.is_ready() {
            *guard = status;
        }
    }
}

impl Drop for DataStream {
    fn drop(&mut self) {
        self.disconnect();
    }
}

impl fmt::Debug for DataStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataStream")
            .field("id", &self.id)
            .field("kind", &self.kind.name())
            .field("status", &self.status())
            .finish()
    }
}

/// Write every byte of `frame`, retrying interrupted and partial writes.
/// Timeout-kind results retry only while `still_ready` holds, mirroring
/// the polling reads on timeout-driven transports.
fn write_all(
    link: &mut LinkStream,
    frame: &[u8],
    still_ready: impl Fn() -> bool,
) -> io::Result<()> {
    let mut offset = 0usize;
    while offset < frame.len() {
        match link.write(&frame[offset..]) {
            Ok(0) => {
                return Err(io::Error::new(
                    ErrorKind::WriteZero,
                    "write returned zero bytes",
                ))
            }
            Ok(n) => offset += n,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) if matches!(err.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock) => {
                if still_ready() {
                    continue;
                }
                return Err(err);
            }
            Err(err) => return Err(err),
        }
    }
    loop {
        match link.flush() {
            Ok(()) => return Ok(()),
            Err(err) if matches!(err.kind(), ErrorKind::Interrupted | ErrorKind::WouldBlock) => {
                continue
            }
            Err(err) => return Err(err),
        }
    }
}
