use std::io;

/// Errors produced while parsing a stream descriptor.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    /// The descriptor is too short to carry an id and a type tag.
    #[error("can't parse stream descriptor '{descriptor}'")]
    Malformed { descriptor: String },

    /// The type tag names no supported stream type.
    #[error("stream descriptor '{descriptor}' is not a {expected} stream (got '{kind}')")]
    UnsupportedType {
        descriptor: String,
        expected: &'static str,
        kind: String,
    },

    /// A required field is missing.
    #[error("can't parse {field} in stream descriptor '{descriptor}'")]
    MissingField {
        descriptor: String,
        field: &'static str,
    },

    /// A field is present but does not parse.
    #[error("can't parse {field} '{value}' in stream descriptor '{descriptor}'")]
    InvalidField {
        descriptor: String,
        field: &'static str,
        value: String,
    },
}

/// Errors produced while establishing a stream's transport.
#[derive(Debug, thiserror::Error)]
pub enum ConnectError {
    /// Address resolution failed.
    #[error("stream '{id}': error getting address information for {target}: {source}")]
    Resolve {
        id: String,
        target: String,
        source: io::Error,
    },

    /// The transport channel could not be established.
    #[error("stream '{id}': can't connect to {target}: {source}")]
    Connect {
        id: String,
        target: String,
        source: io::Error,
    },

    /// The serial device could not be opened.
    #[error("stream '{id}': can't open serial device {device}: {source}")]
    Serial {
        id: String,
        device: String,
        source: serialport::Error,
    },

    /// The transport is not available on this platform.
    #[error("stream '{id}': {kind} streams are not supported on this platform")]
    Unsupported { id: String, kind: &'static str },
}

/// Errors produced by send/recv on a connected stream.
///
/// Every I/O variant means the stream has already been disconnected and
/// its status set to `Error`; the caller never needs to clean up.
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    /// The stream is not in the `Ready` state.
    #[error("stream '{id}' is not ready")]
    NotReady { id: String },

    /// Sending failed.
    #[error("stream '{id}': error sending data: {source}")]
    Send { id: String, source: io::Error },

    /// Receiving failed.
    #[error("stream '{id}': error receiving data: {source}")]
    Recv { id: String, source: io::Error },
}

/// Errors produced when pushing frames into a local feed stream.
#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    /// The pushed frame does not match the configured frame size.
    #[error("feed frame is {got} bytes, expected {expected}")]
    FrameSize { expected: usize, got: usize },

    /// The feed stream has been released; no relay is consuming frames.
    #[error("feed stream is closed")]
    Closed,
}
