//! End-to-end relay behavior over loopback TCP peers.

use std::io::{ErrorKind, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::thread;
use std::time::{Duration, Instant};

use linkcast_relay::Dispatcher;
use linkcast_stream::StreamStatus;

/// Bind one loopback listener per id, register matching tcp streams,
/// start the relay, and hand back the accepted peer sockets in order.
fn relay_fixture(ids: &[&str], frame_size: usize) -> (Dispatcher, Vec<TcpStream>) {
    let mut listeners = Vec::new();
    let mut dispatcher = Dispatcher::new(frame_size).expect("frame size should be valid");
    for id in ids {
        let listener = TcpListener::bind("127.0.0.1:0").expect("loopback bind should succeed");
        let port = listener.local_addr().expect("local addr").port();
        dispatcher
            .add_stream(&format!("{id}:tcp:127.0.0.1:{port}"))
            .expect("descriptor should parse");
        listeners.push(listener);
    }

    let report = dispatcher.start().expect("start should succeed");
    assert!(report.all_connected(), "fixture streams should all connect");

    let peers = listeners
        .iter()
        .map(|listener| {
            let (stream, _) = listener.accept().expect("accept should succeed");
            stream
                .set_read_timeout(Some(Duration::from_secs(2)))
                .expect("read timeout should apply");
            stream
        })
        .collect();
    (dispatcher, peers)
}

fn wait_until(deadline: Duration, cond: impl Fn() -> bool) -> bool {
    let start = Instant::now();
    while start.elapsed() < deadline {
        if cond() {
            return true;
        }
        thread::sleep(Duration::from_millis(10));
    }
    cond()
}

fn read_frame(peer: &mut TcpStream, len: usize) -> Vec<u8> {
    let mut buf = vec![0u8; len];
    peer.read_exact(&mut buf).expect("peer should receive a frame");
    buf
}

#[test]
fn frame_reaches_every_other_peer_but_not_its_source() {
    let (mut dispatcher, mut peers) = relay_fixture(&["S1", "S2", "S3"], 4);

    peers[0].write_all(b"\x41\x41\x41\x41").unwrap();

    assert_eq!(read_frame(&mut peers[1], 4), b"AAAA");
    assert_eq!(read_frame(&mut peers[2], 4), b"AAAA");

    // The source must never get its own frame back.
    peers[0]
        .set_read_timeout(Some(Duration::from_millis(150)))
        .unwrap();
    let mut buf = [0u8; 1];
    let err = peers[0].read(&mut buf).unwrap_err();
    assert!(matches!(
        err.kind(),
        ErrorKind::WouldBlock | ErrorKind::TimedOut
    ));

    dispatcher.shutdown();
}

#[test]
fn frames_from_one_source_keep_their_order() {
    let (mut dispatcher, mut peers) = relay_fixture(&["S1", "S2"], 4);

    peers[0].write_all(b"AAAA").unwrap();
    peers[0].write_all(b"BBBB").unwrap();

    assert_eq!(read_frame(&mut peers[1], 8), b"AAAABBBB");

    dispatcher.shutdown();
}

#[test]
fn closed_peer_leaves_the_rest_of_the_relay_running() {
    let (mut dispatcher, mut peers) = relay_fixture(&["S1", "S2", "S3"], 4);
    assert_eq!(dispatcher.active(), 3);

    // S2's peer goes away; its worker must end without touching the rest.
    let s2 = peers.remove(1);
    drop(s2);
    assert!(
        wait_until(Duration::from_secs(2), || dispatcher.active() == 2),
        "S2's worker should reach its terminal condition"
    );
    assert_eq!(dispatcher.streams()[1].status(), StreamStatus::Unknown);
    assert!(!dispatcher.is_done());

    // Later frames from S1 still reach S3.
    peers[0].write_all(b"CCCC").unwrap();
    assert_eq!(read_frame(&mut peers[1], 4), b"CCCC");

    dispatcher.shutdown();
}

#[test]
fn done_flag_flips_when_the_last_worker_ends() {
    let (mut dispatcher, peers) = relay_fixture(&["S1", "S2"], 4);
    assert!(!dispatcher.is_done());

    drop(peers);
    assert!(
        wait_until(Duration::from_secs(2), || dispatcher.is_done()),
        "relay should be done once every peer closed"
    );
    assert_eq!(dispatcher.active(), 0);

    // Shutdown after natural completion is a no-op join.
    dispatcher.shutdown();
}

#[test]
fn feed_frames_broadcast_like_network_frames() {
    let mut listeners = Vec::new();
    let mut dispatcher = Dispatcher::new(4).unwrap();

    let feed = dispatcher.add_source("cam").unwrap();
    for id in ["S1", "S2"] {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        dispatcher
            .add_stream(&format!("{id}:tcp:127.0.0.1:{port}"))
            .unwrap();
        listeners.push(listener);
    }

    let report = dispatcher.start().unwrap();
    assert!(report.all_connected());
    let mut peers: Vec<TcpStream> = listeners
        .iter()
        .map(|listener| {
            let (stream, _) = listener.accept().unwrap();
            stream
                .set_read_timeout(Some(Duration::from_secs(2)))
                .unwrap();
            stream
        })
        .collect();

    feed.push(b"pose").unwrap();
    assert_eq!(read_frame(&mut peers[0], 4), b"pose");
    assert_eq!(read_frame(&mut peers[1], 4), b"pose");

    // Dropping the producer ends only the feed's worker.
    drop(feed);
    assert!(wait_until(Duration::from_secs(2), || dispatcher.active() == 2));
    assert!(!dispatcher.is_done());

    dispatcher.shutdown();
}

#[test]
fn shutdown_interrupts_idle_workers_and_is_idempotent() {
    let (mut dispatcher, peers) = relay_fixture(&["S1", "S2", "S3"], 4);

    // Every worker is parked in a blocking read when shutdown hits.
    dispatcher.shutdown();
    for stream in dispatcher.streams() {
        assert_eq!(stream.status(), StreamStatus::Unknown);
    }
    dispatcher.shutdown();

    drop(peers);
}

#[test]
fn stream_that_failed_to_connect_does_not_stall_the_relay() {
    let dead = TcpListener::bind("127.0.0.1:0").unwrap();
    let dead_port = dead.local_addr().unwrap().port();
    drop(dead);

    let live = TcpListener::bind("127.0.0.1:0").unwrap();
    let live_port = live.local_addr().unwrap().port();

    let mut dispatcher = Dispatcher::new(4).unwrap();
    let feed = dispatcher.add_source("cam").unwrap();
    dispatcher
        .add_stream(&format!("dead:tcp:127.0.0.1:{dead_port}"))
        .unwrap();
    dispatcher
        .add_stream(&format!("live:tcp:127.0.0.1:{live_port}"))
        .unwrap();

    let report = dispatcher.start().unwrap();
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].id, "dead");

    let (mut peer, _) = live.accept().unwrap();
    peer.set_read_timeout(Some(Duration::from_secs(2))).unwrap();

    // The dead stream's worker exits through the fail-fast read path.
    assert!(wait_until(Duration::from_secs(2), || dispatcher.active() == 2));

    feed.push(b"pose").unwrap();
    assert_eq!(read_frame(&mut peer, 4), b"pose");

    dispatcher.shutdown();
}
