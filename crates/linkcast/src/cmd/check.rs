use std::sync::Arc;

use linkcast_stream::DataStream;

use crate::cmd::run::collect_descriptors;
use crate::cmd::CheckArgs;
use crate::exit::{CliError, CliResult, SUCCESS, USAGE};
use crate::output::{print_streams, OutputFormat};

/// Parse the configured descriptors and print what would be relayed,
/// without connecting anything.
pub fn run(args: CheckArgs, format: OutputFormat) -> CliResult<i32> {
    let descriptors = collect_descriptors(&args.files, &args.streams)?;
    if descriptors.is_empty() {
        return Err(CliError::new(USAGE, "no stream descriptors given"));
    }

    let mut streams = Vec::new();
    for descriptor in &descriptors {
        let stream = DataStream::from_descriptor(descriptor)
            .map_err(|err| CliError::new(USAGE, err.to_string()))?;
        streams.push(Arc::new(stream));
    }

    print_streams(&streams, format);
    Ok(SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_descriptors_pass() {
        let args = CheckArgs {
            files: Vec::new(),
            streams: vec![
                "A:tcp:127.0.0.1:9999".to_string(),
                "R:xbee:/dev/ttyUSB0:57600".to_string(),
            ],
        };
        assert_eq!(run(args, OutputFormat::Pretty).unwrap(), SUCCESS);
    }

    #[test]
    fn bad_descriptor_is_a_usage_error_naming_it() {
        let args = CheckArgs {
            files: Vec::new(),
            streams: vec!["A:udp:host:1".to_string()],
        };
        let err = run(args, OutputFormat::Pretty).unwrap_err();
        assert_eq!(err.code, USAGE);
        assert!(err.message.contains("A:udp:host:1"));
    }

    #[test]
    fn no_descriptors_is_a_usage_error() {
        let args = CheckArgs {
            files: Vec::new(),
            streams: Vec::new(),
        };
        let err = run(args, OutputFormat::Pretty).unwrap_err();
        assert_eq!(err.code, USAGE);
    }
}
