use std::io::{self, Read, Write};
use std::mem;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd};

use tracing::debug;

use crate::descriptor::BdAddr;
use crate::error::ConnectError;

/// RFCOMM protocol number for `socket(AF_BLUETOOTH, ...)`; libc does not
/// export the `BTPROTO_*` constants.
const BTPROTO_RFCOMM: libc::c_int = 3;

/// `struct sockaddr_rc` from the kernel's RFCOMM API; libc does not ship
/// it. The address octets are stored least significant first.
#[repr(C)]
struct SockaddrRc {
    rc_family: libc::sa_family_t,
    rc_bdaddr: [u8; 6],
    rc_channel: u8,
}

/// A connected Bluetooth RFCOMM stream socket.
pub(crate) struct RfcommStream {
    fd: OwnedFd,
}

impl RfcommStream {
    /// Connect to `addr` on the given RFCOMM channel.
    pub(crate) fn connect(id: &str, addr: BdAddr, channel: u8) -> Result<Self, ConnectError> {
        let connect_err = |source: io::Error| ConnectError::Connect {
            id: id.to_string(),
            target: format!("{addr} channel {channel}"),
            source,
        };

        // SAFETY: plain socket(2) call, no pointer arguments.
        let raw = unsafe {
            libc::socket(
                libc::AF_BLUETOOTH,
                libc::SOCK_STREAM | libc::SOCK_CLOEXEC,
                BTPROTO_RFCOMM,
            )
        };
        if raw < 0 {
            return Err(connect_err(io::Error::last_os_error()));
        }
        // SAFETY: `raw` is a freshly created, open descriptor owned by us.
        let fd = unsafe { OwnedFd::from_raw_fd(raw) };

        let sa = SockaddrRc {
            rc_family: libc::AF_BLUETOOTH as libc::sa_family_t,
            rc_bdaddr: addr.to_le_octets(),
            rc_channel: channel,
        };
        // SAFETY: `sa` is a valid sockaddr_rc for the duration of the call
        // and the length matches its size.
        let rc = unsafe {
            libc::connect(
                fd.as_raw_fd(),
                (&sa as *const SockaddrRc).cast::<libc::sockaddr>(),
                mem::size_of::<SockaddrRc>() as libc::socklen_t,
            )
        };
        if rc != 0 {
            return Err(connect_err(io::Error::last_os_error()));
        }

        debug!(id, %addr, channel, "rfcomm stream connected");
        Ok(Self { fd })
    }

    /// Duplicate the descriptor for a second half over the same socket.
    pub(crate) fn try_clone(&self) -> io::Result<Self> {
        Ok(Self {
            fd: self.fd.try_clone()?,
        })
    }

    /// Shut the socket down in both directions, best effort. A blocked
    /// read on any duplicate of this descriptor returns afterwards.
    pub(crate) fn shutdown(&self) {
        // SAFETY: shutdown(2) on a descriptor we own.
        unsafe {
            libc::shutdown(self.fd.as_raw_fd(), libc::SHUT_RDWR);
        }
    }
}

impl Read for RfcommStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        // SAFETY: `buf` is valid writable memory of `buf.len()` bytes and
        // the descriptor is open.
        let n = unsafe {
            libc::read(
                self.fd.as_raw_fd(),
                buf.as_mut_ptr().cast::<libc::c_void>(),
                buf.len(),
            )
        };
        if n < 0 {
            Err(io::Error::last_os_error())
        } else {
            Ok(n as usize)
        }
    }
}

impl Write for RfcommStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        // SAFETY: `buf` is valid readable memory of `buf.len()` bytes and
        // the descriptor is open.
        let n = unsafe {
            libc::write(
                self.fd.as_raw_fd(),
                buf.as_ptr().cast::<libc::c_void>(),
                buf.len(),
            )
        };
        if n < 0 {
            Err(io::Error::last_os_error())
        } else {
            Ok(n as usize)
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
