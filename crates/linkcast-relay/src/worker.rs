use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use linkcast_stream::DataStream;
use tracing::{debug, info, warn};

use crate::gate::StartGate;

/// State shared between the dispatcher and its relay workers.
pub(crate) struct Shared {
    pub(crate) frame_size: usize,
    pub(crate) streams: Vec<Arc<DataStream>>,
    pub(crate) gate: StartGate,
    pub(crate) active: AtomicUsize,
    pub(crate) done: AtomicBool,
    pub(crate) cancel: AtomicBool,
}

/// The relay loop for the stream at `index`: read a full frame from the
/// owned stream, fan it out to every other stream in registration order.
///
/// A send failure toward one peer marks that peer only; it neither aborts
/// the broadcast to the remaining peers nor ends this worker. The worker
/// ends when its own read side closes or fails, or when cancellation is
/// observed between blocking calls.
pub(crate) fn relay_loop(shared: Arc<Shared>, index: usize) {
    shared.gate.wait();
    let stream = &shared.streams[index];
    debug!(id = %stream.id(), "relay worker started");

    while !shared.cancel.load(Ordering::SeqCst) {
        match stream.recv(shared.frame_size) {
            Ok(Some(frame)) => {
                for (i, peer) in shared.streams.iter().enumerate() {
                    if i == index {
                        continue;
                    }
                    if let Err(err) = peer.send(&frame) {
                        debug!(
                            from = %stream.id(),
                            to = %peer.id(),
                            error = %err,
                            "frame dropped for peer"
                        );
                    }
                }
            }
            Ok(None) => {
                info!(id = %stream.id(), "stream closed, relay worker exiting");
                break;
            }
            Err(err) => {
                if !shared.cancel.load(Ordering::SeqCst) {
                    warn!(id = %stream.id(), error = %err, "relay worker exiting");
                }
                break;
            }
        }
    }

    // The worker taking the count from 1 to 0 marks the relay done.
    if shared.active.fetch_sub(1, Ordering::SeqCst) == 1 {
        shared.done.store(true, Ordering::SeqCst);
        debug!("last relay worker finished");
    }
}
