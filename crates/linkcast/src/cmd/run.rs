use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use linkcast_relay::Dispatcher;
use tracing::{info, warn};

use crate::cmd::RunArgs;
use crate::descriptors::load_descriptor_file;
use crate::exit::{relay_error, CliError, CliResult, CONNECT_FAILED, INTERNAL, SUCCESS, USAGE};
use crate::output::{print_streams, OutputFormat};

const POLL_INTERVAL: Duration = Duration::from_millis(100);

pub fn run(args: RunArgs, format: OutputFormat) -> CliResult<i32> {
    let descriptors = collect_descriptors(&args.files, &args.streams)?;
    if descriptors.is_empty() {
        return Err(CliError::new(USAGE, "no stream descriptors given"));
    }

    let mut dispatcher =
        Dispatcher::new(args.size).map_err(|err| relay_error("invalid configuration", err))?;
    for descriptor in &descriptors {
        dispatcher
            .add_stream(descriptor)
            .map_err(|err| relay_error("invalid stream", err))?;
    }

    let running = Arc::new(AtomicBool::new(true));
    install_signal_handler(running.clone())?;

    let report = dispatcher
        .start()
        .map_err(|err| relay_error("start failed", err))?;
    for failure in &report.failed {
        warn!(id = %failure.id, error = %failure.error, "stream not connected");
    }
    if args.strict && !report.all_connected() {
        dispatcher.shutdown();
        return Err(CliError::new(
            CONNECT_FAILED,
            format!("{} stream(s) failed to connect", report.failed.len()),
        ));
    }

    print_streams(dispatcher.streams(), format);
    info!(
        streams = dispatcher.streams().len(),
        frame_size = dispatcher.frame_size(),
        "relaying; press Ctrl+C to stop"
    );

    while running.load(Ordering::SeqCst) && !dispatcher.is_done() {
        thread::sleep(POLL_INTERVAL);
    }

    info!("shutting down");
    dispatcher.shutdown();
    Ok(SUCCESS)
}

pub(crate) fn collect_descriptors(
    files: &[std::path::PathBuf],
    streams: &[String],
) -> CliResult<Vec<String>> {
    let mut descriptors = Vec::new();
    for file in files {
        info!(file = %file.display(), "reading streams");
        descriptors.extend(load_descriptor_file(file)?);
    }
    descriptors.extend(streams.iter().cloned());
    Ok(descriptors)
}

fn install_signal_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
