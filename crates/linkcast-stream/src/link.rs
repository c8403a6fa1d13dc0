use std::io::{Read, Write};
use std::net::{Shutdown, TcpStream};

use crate::feed::FeedReceiver;

/// A connected transport handle — implements `Read` + `Write`.
///
/// This is the fundamental I/O type behind a [`crate::DataStream`]. One
/// handle wraps one half of a connection; the read and write halves of a
/// stream are two `LinkStream`s over the same underlying channel.
pub struct LinkStream {
    inner: LinkInner,
}

enum LinkInner {
    Tcp(TcpStream),
    Serial(Box<dyn serialport::SerialPort>),
    #[cfg(target_os = "linux")]
    Rfcomm(crate::rfcomm::RfcommStream),
    Feed(FeedReceiver),
    /// Write half of a feed stream: frames broadcast toward a local
    /// producer have no peer behind them and are discarded.
    Sink,
}

impl LinkStream {
    pub(crate) fn tcp(stream: TcpStream) -> Self {
        Self {
            inner: LinkInner::Tcp(stream),
        }
    }

    pub(crate) fn serial(port: Box<dyn serialport::SerialPort>) -> Self {
        Self {
            inner: LinkInner::Serial(port),
        }
    }

    #[cfg(target_os = "linux")]
    pub(crate) fn rfcomm(stream: crate::rfcomm::RfcommStream) -> Self {
        Self {
            inner: LinkInner::Rfcomm(stream),
        }
    }

    pub(crate) fn feed(receiver: FeedReceiver) -> Self {
        Self {
            inner: LinkInner::Feed(receiver),
        }
    }

    pub(crate) fn sink() -> Self {
        Self {
            inner: LinkInner::Sink,
        }
    }

    /// Force the underlying channel shut, best effort.
    ///
    /// A blocked read on the sibling half returns once this lands. The
    /// timeout-driven transports (serial, feed) have no out-of-band close;
    /// their reads poll the stream status instead.
    pub fn shutdown(&self) {
        match &self.inner {
            LinkInner::Tcp(stream) => {
                let _ = stream.shutdown(Shutdown::Both);
            }
            #[cfg(target_os = "linux")]
            LinkInner::Rfcomm(stream) => stream.shutdown(),
            LinkInner::Serial(_) | LinkInner::Feed(_) | LinkInner::Sink => {}
        }
    }

    /// Transport name for diagnostics.
    pub fn transport_name(&self) -> &'static str {
        match &self.inner {
            LinkInner::Tcp(_) => "tcp",
            LinkInner::Serial(_) => "serial",
            #[cfg(target_os = "linux")]
            LinkInner::Rfcomm(_) => "rfcomm",
            LinkInner::Feed(_) => "feed",
            LinkInner::Sink => "sink",
        }
    }
}

impl Read for LinkStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            LinkInner::Tcp(stream) => stream.read(buf),
            LinkInner::Serial(port) => port.read(buf),
            #[cfg(target_os = "linux")]
            LinkInner::Rfcomm(stream) => stream.read(buf),
            LinkInner::Feed(receiver) => receiver.read(buf),
            LinkInner::Sink => Ok(0),
        }
    }
}

impl Write for LinkStream {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            LinkInner::Tcp(stream) => stream.write(buf),
            LinkInner::Serial(port) => port.write(buf),
            #[cfg(target_os = "linux")]
            LinkInner::Rfcomm(stream) => stream.write(buf),
            LinkInner::Feed(_) | LinkInner::Sink => Ok(buf.len()),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match &mut self.inner {
            LinkInner::Tcp(stream) => stream.flush(),
            LinkInner::Serial(port) => port.flush(),
            #[cfg(target_os = "linux")]
            LinkInner::Rfcomm(stream) => stream.flush(),
            LinkInner::Feed(_) | LinkInner::Sink => Ok(()),
        }
    }
}

impl std::fmt::Debug for LinkStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinkStream")
            .field("type", &self.transport_name())
            .finish()
    }
}
