use std::fmt;

use linkcast_relay::RelayError;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const CONNECT_FAILED: i32 = 3;
pub const USAGE: i32 = 64;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn relay_error(context: &str, err: RelayError) -> CliError {
    let code = match err {
        RelayError::Parse(_) | RelayError::DuplicateStream(_) | RelayError::InvalidFrameSize => {
            USAGE
        }
        RelayError::AlreadyStarted | RelayError::Spawn(_) => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configuration_errors_map_to_usage() {
        let err = relay_error("bad", RelayError::InvalidFrameSize);
        assert_eq!(err.code, USAGE);
        assert!(err.message.contains("frame size"));
    }

    #[test]
    fn duplicate_id_maps_to_usage() {
        let err = relay_error("bad", RelayError::DuplicateStream("A".to_string()));
        assert_eq!(err.code, USAGE);
        assert!(err.message.contains('A'));
    }
}
