use std::io;
use std::net::{TcpStream, ToSocketAddrs};

use tracing::debug;

use crate::error::ConnectError;

/// Resolve `server:port` and connect to the first address that accepts.
pub(crate) fn open(id: &str, server: &str, port: u16) -> Result<TcpStream, ConnectError> {
    let target = format!("{server}:{port}");
    let addrs = target
        .to_socket_addrs()
        .map_err(|source| ConnectError::Resolve {
            id: id.to_string(),
            target: target.clone(),
            source,
        })?;

    let mut last_err = None;
    for addr in addrs {
        match TcpStream::connect(addr) {
            Ok(stream) => {
                debug!(id, %target, %addr, "tcp stream connected");
                return Ok(stream);
            }
            Err(err) => last_err = Some(err),
        }
    }

    Err(ConnectError::Connect {
        id: id.to_string(),
        target,
        source: last_err.unwrap_or_else(|| {
            io::Error::new(io::ErrorKind::AddrNotAvailable, "no address resolved")
        }),
    })
}
