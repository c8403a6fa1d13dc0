use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use linkcast_stream::{ConnectError, DataStream, FeedHandle};
use tracing::{debug, info, warn};

use crate::error::{RelayError, Result};
use crate::gate::StartGate;
use crate::worker::{relay_loop, Shared};

/// Coordinates a fixed set of streams and their relay workers.
///
/// Streams are registered before [`start`](Dispatcher::start); the set is
/// frozen afterwards. Dropping the dispatcher shuts the relay down.
pub struct Dispatcher {
    frame_size: usize,
    streams: Vec<Arc<DataStream>>,
    shared: Option<Arc<Shared>>,
    workers: Vec<JoinHandle<()>>,
}

/// One stream that failed to connect during [`Dispatcher::start`].
#[derive(Debug)]
pub struct ConnectFailure {
    pub id: String,
    pub error: ConnectError,
}

/// Connect outcomes collected during [`Dispatcher::start`]. The relay is
/// running either way; the caller decides whether a degraded set of
/// peers is acceptable.
#[derive(Debug)]
pub struct StartReport {
    pub failed: Vec<ConnectFailure>,
}

impl StartReport {
    pub fn all_connected(&self) -> bool {
        self.failed.is_empty()
    }
}

impl Dispatcher {
    /// Create a dispatcher for frames of exactly `frame_size` bytes.
    pub fn new(frame_size: usize) -> Result<Self> {
        if frame_size == 0 {
            return Err(RelayError::InvalidFrameSize);
        }
        Ok(Self {
            frame_size,
            streams: Vec::new(),
            shared: None,
            workers: Vec::new(),
        })
    }

    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    /// The registered streams, in registration order.
    pub fn streams(&self) -> &[Arc<DataStream>] {
        &self.streams
    }

    /// Parse a descriptor and register the resulting stream. The stream
    /// is not connected until [`start`](Dispatcher::start).
    pub fn add_stream(&mut self, descriptor: &str) -> Result<()> {
        let stream = DataStream::from_descriptor(descriptor)?;
        self.register(stream)
    }

    /// Register a local feed stream and return the producer handle that
    /// pushes frames into it.
    pub fn add_source(&mut self, id: &str) -> Result<FeedHandle> {
        let (stream, handle) = DataStream::source(id, self.frame_size);
        self.register(stream)?;
        Ok(handle)
    }

    fn register(&mut self, stream: DataStream) -> Result<()> {
        if self.shared.is_some() {
            return Err(RelayError::AlreadyStarted);
        }
        if self.streams.iter().any(|s| s.id() == stream.id()) {
            return Err(RelayError::DuplicateStream(stream.id().to_string()));
        }
        debug!(id = %stream.id(), descriptor = %stream.descriptor(), "stream registered");
        self.streams.push(Arc::new(stream));
        Ok(())
    }

    /// Connect every stream, spawn one relay worker per stream, and open
    /// the start gate so all workers begin reading together.
    ///
    /// A connect failure does not stop the remaining streams from being
    /// brought up; all failures are collected into the returned report.
    /// Workers are spawned for failed streams too; they exit at once
    /// through the fail-fast read path, which keeps the worker count
    /// bookkeeping uniform.
    pub fn start(&mut self) -> Result<StartReport> {
        if self.shared.is_some() {
            return Err(RelayError::AlreadyStarted);
        }

        let mut failed = Vec::new();
        for stream in &self.streams {
            if let Err(error) = stream.connect() {
                warn!(id = %stream.id(), %error, "stream connect failed");
                failed.push(ConnectFailure {
                    id: stream.id().to_string(),
                    error,
                });
            }
        }

        let shared = Arc::new(Shared {
            frame_size: self.frame_size,
            streams: self.streams.clone(),
            gate: StartGate::new(),
            active: AtomicUsize::new(self.streams.len()),
            done: AtomicBool::new(self.streams.is_empty()),
            cancel: AtomicBool::new(false),
        });
        self.shared = Some(Arc::clone(&shared));

        let streams = self.streams.clone();
        for (index, stream) in streams.iter().enumerate() {
            let worker_shared = Arc::clone(&shared);
            let spawned = thread::Builder::new()
                .name(format!("relay-{}", stream.id()))
                .spawn(move || relay_loop(worker_shared, index));
            match spawned {
                Ok(handle) => self.workers.push(handle),
                Err(err) => {
                    self.shutdown();
                    return Err(RelayError::Spawn(err));
                }
            }
        }

        shared.gate.open();
        info!(
            streams = self.streams.len(),
            frame_size = self.frame_size,
            "relay started"
        );
        Ok(StartReport { failed })
    }

    /// Number of relay workers that have not reached their terminal
    /// condition yet. Zero before start.
    pub fn active(&self) -> usize {
        self.shared
            .as_ref()
            .map_or(0, |s| s.active.load(Ordering::SeqCst))
    }

    /// True once every relay worker has finished on its own.
    pub fn is_done(&self) -> bool {
        self.shared
            .as_ref()
            .is_some_and(|s| s.done.load(Ordering::SeqCst))
    }

    /// Cancel every worker, join them, and release every stream.
    ///
    /// Safe to call at any time and idempotent: workers that already
    /// exited on their own are simply joined, and a dispatcher that never
    /// started only releases its streams.
    pub fn shutdown(&mut self) {
        let Some(shared) = self.shared.as_ref() else {
            for stream in &self.streams {
                stream.disconnect();
            }
            return;
        };

        shared.cancel.store(true, Ordering::SeqCst);
        // Release workers still parked at the gate, then force blocked
        // reads out by closing every transport out-of-band.
        shared.gate.open();
        for stream in &self.streams {
            stream.disconnect();
        }
        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                warn!("relay worker panicked");
            }
        }
        // Read halves still held by workers at the first pass are
        // reapable now that every worker is joined.
        for stream in &self.streams {
            stream.disconnect();
        }
        debug!("relay shut down");
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_frame_size_is_rejected() {
        assert!(matches!(
            Dispatcher::new(0),
            Err(RelayError::InvalidFrameSize)
        ));
    }

    #[test]
    fn duplicate_stream_id_is_rejected() {
        let mut dispatcher = Dispatcher::new(4).unwrap();
        dispatcher.add_stream("A:tcp:127.0.0.1:1").unwrap();
        let err = dispatcher.add_stream("A:tcp:127.0.0.1:2").unwrap_err();
        match err {
            RelayError::DuplicateStream(id) => assert_eq!(id, "A"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn duplicate_source_id_is_rejected() {
        let mut dispatcher = Dispatcher::new(4).unwrap();
        dispatcher.add_source("cam").unwrap();
        assert!(matches!(
            dispatcher.add_source("cam"),
            Err(RelayError::DuplicateStream(_))
        ));
    }

    #[test]
    fn parse_error_propagates_from_add_stream() {
        let mut dispatcher = Dispatcher::new(4).unwrap();
        assert!(matches!(
            dispatcher.add_stream("A:udp:host:1"),
            Err(RelayError::Parse(_))
        ));
        assert!(dispatcher.streams().is_empty());
    }

    #[test]
    fn streams_keep_registration_order() {
        let mut dispatcher = Dispatcher::new(4).unwrap();
        dispatcher.add_stream("B:tcp:127.0.0.1:1").unwrap();
        dispatcher.add_stream("A:tcp:127.0.0.1:2").unwrap();
        dispatcher.add_source("cam").unwrap();
        let ids: Vec<_> = dispatcher.streams().iter().map(|s| s.id()).collect();
        assert_eq!(ids, ["B", "A", "cam"]);
    }

    #[test]
    fn empty_dispatcher_completes_immediately() {
        let mut dispatcher = Dispatcher::new(4).unwrap();
        assert!(!dispatcher.is_done());
        let report = dispatcher.start().unwrap();
        assert!(report.all_connected());
        assert!(dispatcher.is_done());
        dispatcher.shutdown();
    }

    #[test]
    fn add_after_start_is_rejected() {
        let mut dispatcher = Dispatcher::new(4).unwrap();
        dispatcher.start().unwrap();
        assert!(matches!(
            dispatcher.add_stream("A:tcp:127.0.0.1:1"),
            Err(RelayError::AlreadyStarted)
        ));
        assert!(matches!(
            dispatcher.add_source("cam"),
            Err(RelayError::AlreadyStarted)
        ));
        assert!(matches!(
            dispatcher.start(),
            Err(RelayError::AlreadyStarted)
        ));
    }

    #[test]
    fn start_reports_connect_failures_and_continues() {
        // Nothing listens on this port: bind, note the port, drop.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let mut dispatcher = Dispatcher::new(4).unwrap();
        dispatcher
            .add_stream(&format!("dead:tcp:127.0.0.1:{port}"))
            .unwrap();
        let _feed = dispatcher.add_source("cam").unwrap();

        let report = dispatcher.start().unwrap();
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].id, "dead");
        assert!(!report.all_connected());

        dispatcher.shutdown();
    }

    #[test]
    fn shutdown_without_start_is_safe() {
        let mut dispatcher = Dispatcher::new(4).unwrap();
        dispatcher.add_stream("A:tcp:127.0.0.1:1").unwrap();
        dispatcher.shutdown();
        dispatcher.shutdown();
    }
}
