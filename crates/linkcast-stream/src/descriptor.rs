use std::fmt;

use crate::error::ParseError;

/// A parsed stream descriptor: unique id plus transport configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Descriptor {
    pub id: String,
    pub kind: StreamKind,
}

/// Transport-specific connection parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamKind {
    /// TCP connection to a server.
    Tcp { server: String, port: u16 },
    /// Bluetooth RFCOMM connection to a device on a channel.
    Bluetooth { addr: BdAddr, channel: u8 },
    /// Radio-serial link over a local serial device.
    Serial { device: String, baud: u32 },
    /// Local in-process source fed by an external producer.
    Feed,
}

impl StreamKind {
    /// The descriptor type tag for this kind.
    pub fn name(&self) -> &'static str {
        match self {
            StreamKind::Tcp { .. } => "tcp",
            StreamKind::Bluetooth { .. } => "bt",
            StreamKind::Serial { .. } => "xbee",
            StreamKind::Feed => "feed",
        }
    }
}

/// A Bluetooth device address, most significant octet first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BdAddr(pub [u8; 6]);

impl BdAddr {
    /// Octets in transmission order (least significant first), the layout
    /// the kernel's `bdaddr_t` expects.
    pub fn to_le_octets(self) -> [u8; 6] {
        let mut le = self.0;
        le.reverse();
        le
    }
}

impl fmt::Display for BdAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02X}:{b:02X}:{c:02X}:{d:02X}:{e:02X}:{g:02X}")
    }
}

/// Parse a stream descriptor of the form `ID:TYPE:DATA...`.
///
/// Supported descriptors:
/// - `ID:tcp:SERVER:PORT`: a TCP connection to SERVER on PORT. A fifth
///   token is ignored.
/// - `ID:bt:B5:B4:B3:B2:B1:B0:CHANNEL`: an RFCOMM connection to the
///   device with the given address, on CHANNEL.
/// - `ID:xbee:DEVICE:BAUD`: a radio link over serial DEVICE at BAUD.
pub fn parse(descriptor: &str) -> Result<Descriptor, ParseError> {
    let mut tokens = descriptor.split(':');

    let id = match tokens.next() {
        Some(id) if !id.is_empty() => id.to_string(),
        _ => {
            return Err(ParseError::Malformed {
                descriptor: descriptor.to_string(),
            })
        }
    };
    let tag = match tokens.next() {
        Some(tag) if !tag.is_empty() => tag,
        _ => {
            return Err(ParseError::Malformed {
                descriptor: descriptor.to_string(),
            })
        }
    };

    let kind = match tag {
        "tcp" => parse_tcp(descriptor, &mut tokens)?,
        "bt" => parse_bt(descriptor, &mut tokens)?,
        "xbee" => parse_xbee(descriptor, &mut tokens)?,
        other => {
            return Err(ParseError::UnsupportedType {
                descriptor: descriptor.to_string(),
                expected: "tcp, bt or xbee",
                kind: other.to_string(),
            })
        }
    };

    Ok(Descriptor { id, kind })
}

fn parse_tcp<'a>(
    descriptor: &str,
    tokens: &mut impl Iterator<Item = &'a str>,
) -> Result<StreamKind, ParseError> {
    let server = required(descriptor, tokens, "server")?.to_string();
    let port = required(descriptor, tokens, "port")?;
    let port = port.parse::<u16>().map_err(|_| ParseError::InvalidField {
        descriptor: descriptor.to_string(),
        field: "port",
        value: port.to_string(),
    })?;
    Ok(StreamKind::Tcp { server, port })
}

fn parse_bt<'a>(
    descriptor: &str,
    tokens: &mut impl Iterator<Item = &'a str>,
) -> Result<StreamKind, ParseError> {
    let mut octets = [0u8; 6];
    for octet in &mut octets {
        let tok = required(descriptor, tokens, "address")?;
        if tok.is_empty() || tok.len() > 2 {
            return Err(ParseError::InvalidField {
                descriptor: descriptor.to_string(),
                field: "address",
                value: tok.to_string(),
            });
        }
        *octet = u8::from_str_radix(tok, 16).map_err(|_| ParseError::InvalidField {
            descriptor: descriptor.to_string(),
            field: "address",
            value: tok.to_string(),
        })?;
    }
    let channel = required(descriptor, tokens, "channel")?;
    let channel = channel.parse::<u8>().map_err(|_| ParseError::InvalidField {
        descriptor: descriptor.to_string(),
        field: "channel",
        value: channel.to_string(),
    })?;
    Ok(StreamKind::Bluetooth {
        addr: BdAddr(octets),
        channel,
    })
}

fn parse_xbee<'a>(
    descriptor: &str,
    tokens: &mut impl Iterator<Item = &'a str>,
) -> Result<StreamKind, ParseError> {
    let device = required(descriptor, tokens, "device")?.to_string();
    let baud = required(descriptor, tokens, "baud rate")?;
    let baud = baud.parse::<u32>().map_err(|_| ParseError::InvalidField {
        descriptor: descriptor.to_string(),
        field: "baud rate",
        value: baud.to_string(),
    })?;
    Ok(StreamKind::Serial { device, baud })
}

fn required<'a>(
    descriptor: &str,
    tokens: &mut impl Iterator<Item = &'a str>,
    field: &'static str,
) -> Result<&'a str, ParseError> {
    match tokens.next() {
        Some(tok) if !tok.is_empty() => Ok(tok),
        _ => Err(ParseError::MissingField {
            descriptor: descriptor.to_string(),
            field,
        }),
    }
}
