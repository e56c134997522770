//! Integration tests for keepwire.
//!
//! These tests drive whole sessions over in-memory pipes and loopback TCP.

use std::collections::HashSet;
use std::time::Duration;

use keepwire::protocol::{build_frame, Command, FrameBuffer, HEADER_SIZE};
use keepwire::{KeepwireError, Session, Termination, TransportAddr};
use tokio::io::{duplex, AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::Instant;

async fn tcp_pair() -> (Session, Session) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let (client, accepted) = tokio::join!(TcpStream::connect(addr), listener.accept());
    let (server, _) = accepted.unwrap();

    (Session::client(client.unwrap()), Session::server(server))
}

/// Test the exact bytes of a data frame and a short read on the other side.
#[tokio::test]
async fn test_ping_over_tcp() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let (client, accepted) = tokio::join!(TcpStream::connect(addr), listener.accept());
    let (mut raw_peer, _) = accepted.unwrap();
    let session = Session::client(client.unwrap());

    assert_eq!(session.write(b"ping").await.unwrap(), 4);

    let mut wire = [0u8; 8];
    raw_peer.read_exact(&mut wire).await.unwrap();
    assert_eq!(wire, [2, 1, 0, 4, b'p', b'i', b'n', b'g']);
}

/// Test a session-to-session round trip and a 4-byte read of "ping".
#[tokio::test]
async fn test_session_round_trip() {
    let (client, server) = tcp_pair().await;

    client.write(b"ping").await.unwrap();

    let mut buf = [0u8; 4];
    let n = server.read(&mut buf).await.unwrap();
    assert_eq!((n, &buf), (4, b"ping"));

    server.write(b"pong").await.unwrap();
    let n = client.read(&mut buf).await.unwrap();
    assert_eq!(&buf[..n], b"pong");
}

/// Test concurrent writers: every write arrives as exactly one whole frame.
#[tokio::test]
async fn test_concurrent_writes_arrive_as_whole_frames() {
    const TASKS: usize = 8;
    const PER_TASK: usize = 50;

    let (local, mut peer) = duplex(1024);
    let session = Session::client(local);

    let mut writers = Vec::new();
    for t in 0..TASKS {
        let session = session.clone();
        writers.push(tokio::spawn(async move {
            for i in 0..PER_TASK {
                let msg = format!("task{}-msg{}", t, i);
                session.write(msg.as_bytes()).await.unwrap();
            }
        }));
    }

    let reader = tokio::spawn(async move {
        let mut buffer = FrameBuffer::new(1);
        let mut seen = HashSet::new();
        let mut chunk = [0u8; 512];
        while seen.len() < TASKS * PER_TASK {
            let n = peer.read(&mut chunk).await.unwrap();
            assert!(n > 0, "stream ended early");
            for frame in buffer.push(&chunk[..n]).unwrap() {
                if frame.is_data() {
                    let text = String::from_utf8(frame.payload.to_vec()).unwrap();
                    assert!(seen.insert(text), "duplicate frame");
                }
            }
        }
        assert!(!buffer.has_partial_frame());
        seen
    });

    for writer in writers {
        writer.await.unwrap();
    }
    let seen = reader.await.unwrap();
    assert_eq!(seen.len(), TASKS * PER_TASK);
    assert!(seen.contains("task3-msg49"));
}

/// Test per-writer ordering survives concurrent submission.
#[tokio::test]
async fn test_per_writer_order_preserved() {
    let (client, server) = tcp_pair().await;

    let writers: Vec<_> = (0..4u8)
        .map(|t| {
            let client = client.clone();
            tokio::spawn(async move {
                for i in 0..100u8 {
                    client.write(&[t, i]).await.unwrap();
                }
            })
        })
        .collect();
    for writer in writers {
        writer.await.unwrap();
    }

    let mut next = [0u8; 4];
    for _ in 0..400 {
        let body = server.recv().await.unwrap().unwrap();
        let (t, i) = (body[0] as usize, body[1]);
        assert_eq!(i, next[t]);
        next[t] += 1;
    }
}

/// Test heartbeats interleaved with data never reach readers.
#[tokio::test]
async fn test_heartbeats_filtered_from_reads() {
    let (local, mut peer) = duplex(4096);
    let session = Session::server(local);

    let heartbeat = build_frame(Command::Heartbeat, 1, &[]).unwrap();
    let mut wire = Vec::new();
    for word in ["alpha", "beta", "gamma"] {
        wire.extend_from_slice(&heartbeat);
        wire.extend(build_frame(Command::Data, 1, word.as_bytes()).unwrap());
    }
    wire.extend_from_slice(&heartbeat);
    peer.write_all(&wire).await.unwrap();
    drop(peer);

    let mut received = Vec::new();
    while let Some(body) = session.recv().await.unwrap() {
        received.push(body);
    }
    assert_eq!(received, vec![&b"alpha"[..], b"beta", b"gamma"]);
}

/// Test a frame split across many tiny transport writes.
#[tokio::test]
async fn test_fragmented_frame_reassembled() {
    let (local, mut peer) = duplex(4096);
    let session = Session::server(local);

    let wire = build_frame(Command::Data, 1, b"fragmented body").unwrap();
    for byte in &wire {
        peer.write_all(std::slice::from_ref(byte)).await.unwrap();
        tokio::task::yield_now().await;
    }

    let body = session.recv().await.unwrap().unwrap();
    assert_eq!(body, &b"fragmented body"[..]);
}

/// Test close: a blocked reader wakes and later writes fail without blocking.
#[tokio::test]
async fn test_close_unblocks_pending_read() {
    let (client, server) = tcp_pair().await;

    let pending = {
        let client = client.clone();
        tokio::spawn(async move {
            let mut buf = [0u8; 32];
            client.read(&mut buf).await
        })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;

    client.close().await;
    assert!(pending.await.unwrap().is_err());
    assert!(matches!(
        client.write(b"after close").await,
        Err(KeepwireError::SessionClosed)
    ));

    // The peer sees a clean end-of-stream.
    assert!(matches!(server.closed().await, Termination::Eof));
    let mut buf = [0u8; 8];
    assert_eq!(server.read(&mut buf).await.unwrap(), 0);
}

/// Test a version mismatch ends the session for every later read.
#[tokio::test]
async fn test_version_mismatch_is_permanent() {
    let (a, b) = duplex(4096);
    let v1 = Session::client(a);
    let v2 = Session::builder().version(2).server(b);

    v2.write(b"from v2").await.unwrap();

    let mut buf = [0u8; 16];
    for _ in 0..3 {
        match v1.read(&mut buf).await {
            Err(KeepwireError::VersionMismatch { expected, actual }) => {
                assert_eq!((expected, actual), (1, 2));
            }
            other => panic!("expected version mismatch, got {:?}", other),
        }
    }
    assert!(v1.is_closed());
    assert!(v1.write(b"x").await.is_err());
}

/// Test read deadline expiry leaves the session usable.
#[tokio::test]
async fn test_read_deadline_then_recover() {
    let (client, server) = tcp_pair().await;

    server.set_read_deadline(Some(Instant::now() + Duration::from_millis(50)));
    let mut buf = [0u8; 8];
    let err = server.read(&mut buf).await.unwrap_err();
    assert!(err.is_timeout());
    assert!(!err.is_fatal());

    server.set_deadline(None);
    client.write(b"ok").await.unwrap();
    let n = server.read(&mut buf).await.unwrap();
    assert_eq!(&buf[..n], b"ok");
}

/// Test a deadline set while a read is already blocked applies to it.
#[tokio::test]
async fn test_deadline_set_during_blocked_read() {
    let (_client, server) = tcp_pair().await;

    let pending = {
        let server = server.clone();
        tokio::spawn(async move {
            let mut buf = [0u8; 8];
            server.read(&mut buf).await
        })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;

    server.set_read_deadline(Some(Instant::now() + Duration::from_millis(20)));
    let joined = tokio::time::timeout(Duration::from_secs(5), pending)
        .await
        .expect("blocked read ignored the new deadline");
    assert!(matches!(joined.unwrap(), Err(KeepwireError::Timeout)));
    assert!(!server.is_closed());
}

/// Test peer end-of-stream after queued data.
#[tokio::test]
async fn test_eof_after_queued_data() {
    let (local, mut peer) = duplex(4096);
    let session = Session::server(local);

    peer.write_all(&build_frame(Command::Data, 1, b"last words").unwrap())
        .await
        .unwrap();
    peer.shutdown().await.unwrap();

    let mut buf = [0u8; 4];
    let mut got = Vec::new();
    loop {
        let n = session.read(&mut buf).await.unwrap();
        if n == 0 {
            break;
        }
        got.extend_from_slice(&buf[..n]);
    }
    assert_eq!(got, b"last words");
    assert!(matches!(session.termination(), Some(Termination::Eof)));
}

/// Test a peer hanging up mid-frame is reported as an I/O error.
#[tokio::test]
async fn test_truncated_frame_is_an_error() {
    let (local, mut peer) = duplex(4096);
    let session = Session::server(local);

    let wire = build_frame(Command::Data, 1, b"cut short").unwrap();
    peer.write_all(&wire[..HEADER_SIZE + 3]).await.unwrap();
    drop(peer);

    let mut buf = [0u8; 16];
    let err = session.read(&mut buf).await.unwrap_err();
    assert_eq!(err.io_kind(), Some(std::io::ErrorKind::UnexpectedEof));
}

/// Test structured messages over a real socket.
#[tokio::test]
async fn test_msgpack_messages_over_tcp() {
    #[derive(serde::Serialize, serde::Deserialize, PartialEq, Debug)]
    struct Job {
        id: u64,
        args: Vec<String>,
    }

    let (client, server) = tcp_pair().await;

    for id in 0..3 {
        let job = Job {
            id,
            args: vec!["--fast".to_string(), id.to_string()],
        };
        client.send_msg(&job).await.unwrap();
    }

    for id in 0..3 {
        let job: Job = server.recv_msg().await.unwrap().unwrap();
        assert_eq!(job.id, id);
        assert_eq!(job.args[1], id.to_string());
    }
}

/// Test TCP sessions expose both endpoint addresses.
#[tokio::test]
async fn test_tcp_addresses_passthrough() {
    let (client, server) = tcp_pair().await;

    let client_local = client.local_addr().unwrap();
    let server_peer = server.peer_addr().unwrap();
    assert_eq!(client_local, server_peer);
    assert!(matches!(client.peer_addr(), Some(TransportAddr::Inet(_))));
}

/// Test an idle timeout fires against a peer that never speaks.
#[tokio::test(start_paused = true)]
async fn test_idle_timeout_against_silent_peer() {
    let (local, _silent_peer) = duplex(64 * 1024);
    let session = Session::builder()
        .heartbeat_interval(Duration::from_secs(1))
        .idle_timeout(Duration::from_secs(5))
        .client(local);

    match session.closed().await {
        Termination::Failed(KeepwireError::PeerUnresponsive(idle)) => {
            assert!(idle > Duration::from_secs(5));
        }
        other => panic!("unexpected termination {:?}", other),
    }
}

/// Test heartbeats keep an otherwise idle pair of sessions alive.
#[tokio::test(start_paused = true)]
async fn test_heartbeats_keep_idle_sessions_alive() {
    let (a, b) = duplex(64 * 1024);
    let builder = Session::builder()
        .heartbeat_interval(Duration::from_secs(1))
        .idle_timeout(Duration::from_secs(3));
    let client = builder.clone().client(a);
    let server = builder.server(b);

    tokio::time::sleep(Duration::from_secs(30)).await;

    assert!(!client.is_closed());
    assert!(!server.is_closed());
    assert!(server.last_seen().elapsed() <= Duration::from_secs(1));
}
