use clap::{Args, Subcommand};
use std::path::PathBuf;

use crate::exit::CliResult;
use crate::output::OutputFormat;

pub mod check;
pub mod run;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Relay fixed-size frames between the configured streams.
    Run(RunArgs),
    /// Parse stream descriptors and print the resulting configuration.
    Check(CheckArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Run(args) => run::run(args, format),
        Command::Check(args) => check::run(args, format),
        Command::Version(args) => version::run(args, format),
    }
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Size in bytes of one relayed message.
    #[arg(short = 's', long = "size", value_name = "SIZE")]
    pub size: usize,

    /// File with one stream descriptor per line ('#' starts a comment).
    #[arg(short = 'f', long = "file", value_name = "FILE")]
    pub files: Vec<PathBuf>,

    /// Stream descriptors (ID:TYPE:DATA...).
    #[arg(value_name = "STREAM")]
    pub streams: Vec<String>,

    /// Abort instead of relaying when any stream fails to connect.
    #[arg(long)]
    pub strict: bool,
}

#[derive(Args, Debug)]
pub struct CheckArgs {
    /// File with one stream descriptor per line ('#' starts a comment).
    #[arg(short = 'f', long = "file", value_name = "FILE")]
    pub files: Vec<PathBuf>,

    /// Stream descriptors (ID:TYPE:DATA...).
    #[arg(value_name = "STREAM")]
    pub streams: Vec<String>,
}

#[derive(Args, Debug, Default)]
pub struct VersionArgs {}
