use linkcast_stream::ParseError;

/// Errors raised while configuring or starting a relay.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// Frame size must be a positive number of bytes.
    #[error("frame size must be greater than zero")]
    InvalidFrameSize,

    /// Two streams were registered under the same id.
    #[error("duplicate stream id '{0}'")]
    DuplicateStream(String),

    /// The stream set is frozen once the relay has started.
    #[error("relay already started")]
    AlreadyStarted,

    /// A stream descriptor did not parse.
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// A relay worker thread could not be spawned.
    #[error("can't spawn relay worker: {0}")]
    Spawn(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, RelayError>;
