//! Loopback tests of the TCP server transport.

use std::net::{SocketAddr, TcpStream};
use std::time::{Duration, Instant};

use crossbeam_channel::Receiver;
use tarmac_networking::protocol::read_frame;
use tarmac_networking::{ConnectionId, NetworkCommand, NetworkEvent, TcpServerTransport};

const WAIT: Duration = Duration::from_secs(5);

/// Connects a raw socket and returns it with the id the transport gave it.
fn dial(addr: SocketAddr, events: &Receiver<NetworkEvent>) -> (TcpStream, ConnectionId) {
    let stream = TcpStream::connect(addr).unwrap();
    let deadline = Instant::now() + WAIT;
    while Instant::now() < deadline {
        if let Ok(NetworkEvent::ClientConnected(id, _)) = events.recv_timeout(WAIT) {
            return (stream, id);
        }
    }
    panic!("no ClientConnected for {addr}");
}

#[test]
fn test_stalled_peer_does_not_block_others() {
    let (transport, events, commands) = TcpServerTransport::bind("127.0.0.1:0", 4).unwrap();
    let (_stalled, slow) = dial(transport.local_addr(), &events);
    let (mut healthy, fast) = dial(transport.local_addr(), &events);

    // far more than the socket buffers and the outbox can hold
    let bulk = vec![7u8; 60 * 1024];
    for _ in 0..400 {
        commands
            .send(NetworkCommand::Send {
                to: slow,
                data: bulk.clone(),
            })
            .unwrap();
    }
    commands
        .send(NetworkCommand::Send {
            to: fast,
            data: b"hello".to_vec(),
        })
        .unwrap();

    healthy.set_read_timeout(Some(WAIT)).unwrap();
    assert_eq!(read_frame(&mut healthy).unwrap(), Some(b"hello".to_vec()));

    // the stalled peer is cut loose
    let deadline = Instant::now() + WAIT;
    let mut dropped = false;
    while !dropped && Instant::now() < deadline {
        if let Ok(event) = events.recv_timeout(Duration::from_millis(100)) {
            dropped = event == NetworkEvent::ClientDisconnected(slow);
        }
    }
    assert!(dropped);
    assert_eq!(transport.connection_count(), 1);

    transport.shutdown();
}

#[test]
fn test_disconnect_command_closes_socket() {
    let (transport, events, commands) = TcpServerTransport::bind("127.0.0.1:0", 4).unwrap();
    let (mut client, id) = dial(transport.local_addr(), &events);

    commands.send(NetworkCommand::Disconnect(id)).unwrap();

    client.set_read_timeout(Some(WAIT)).unwrap();
    assert!(matches!(read_frame(&mut client), Ok(None) | Err(_)));
    assert_eq!(events.recv_timeout(WAIT), Ok(NetworkEvent::ClientDisconnected(id)));

    transport.shutdown();
}

#[cfg(feature = "stats")]
#[test]
fn test_stats_count_frames_both_ways() {
    use std::io::Write;
    use tarmac_networking::protocol::write_frame;

    let (transport, events, commands) = TcpServerTransport::bind("127.0.0.1:0", 4).unwrap();
    let (mut client, id) = dial(transport.local_addr(), &events);

    write_frame(&mut client, b"ping!").unwrap();
    client.flush().unwrap();
    let received = events.recv_timeout(WAIT).unwrap();
    assert_eq!(
        received,
        NetworkEvent::PacketReceived {
            from: id,
            data: b"ping!".to_vec()
        }
    );

    commands
        .send(NetworkCommand::Send {
            to: id,
            data: b"pong".to_vec(),
        })
        .unwrap();
    client.set_read_timeout(Some(WAIT)).unwrap();
    assert_eq!(read_frame(&mut client).unwrap(), Some(b"pong".to_vec()));

    // the writer bumps its counter after the frame is out
    let deadline = Instant::now() + WAIT;
    while transport.stats().frames_sent == 0 && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(5));
    }

    let stats = transport.stats();
    assert_eq!(stats.frames_received, 1);
    assert_eq!(stats.bytes_received, 5);
    assert_eq!(stats.frames_sent, 1);
    assert_eq!(stats.bytes_sent, 4);
    assert_eq!(stats.send_errors, 0);

    transport.shutdown();
}
