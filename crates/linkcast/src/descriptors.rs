use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::exit::{CliError, CliResult, FAILURE};

/// Read stream descriptors from a file: one per line, surrounding
/// whitespace trimmed, blank lines and `#` comment lines skipped.
pub fn load_descriptor_file(path: &Path) -> CliResult<Vec<String>> {
    let file = File::open(path).map_err(|err| {
        CliError::new(
            FAILURE,
            format!("can't open file '{}': {err}", path.display()),
        )
    })?;

    let mut descriptors = Vec::new();
    for line in BufReader::new(file).lines() {
        let line = line.map_err(|err| {
            CliError::new(
                FAILURE,
                format!("can't read file '{}': {err}", path.display()),
            )
        })?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        descriptors.push(trimmed.to_string());
    }
    Ok(descriptors)
}
