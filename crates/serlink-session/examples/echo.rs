//! Two sessions exchanging acknowledged messages over a socket pair.
//!
//! Each side runs one reader-loop thread that delivers payloads to a
//! channel; writes happen off the reader thread, because a write is
//! only acknowledged while its session's reader loop is running.
//!
//! Run with:
//!   cargo run -p serlink-session --example echo

use std::net::Shutdown;
use std::os::unix::net::UnixStream;
use std::sync::{mpsc, Arc};
use std::thread;

use serlink_session::{Session, BROADCAST};
use serlink_transport::{StreamRead, StreamWrite};

type SocketSession = Session<StreamRead<UnixStream>, StreamWrite<UnixStream>>;

fn session(port: UnixStream) -> std::io::Result<SocketSession> {
    let reader = port.try_clone()?;
    Ok(Session::new(StreamRead::new(reader), StreamWrite::new(port)))
}

fn spawn_reader(
    session: Arc<SocketSession>,
    inbox: mpsc::Sender<Vec<u8>>,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let mut buf = [0u8; 256];
        while let Ok(received) = session.read(&mut buf) {
            if inbox.send(buf[..received.len].to_vec()).is_err() {
                break;
            }
        }
    })
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let (left, right) = UnixStream::pair()?;
    let left_shutdown = left.try_clone()?;
    let right_shutdown = right.try_clone()?;

    let alice = Arc::new(session(left)?);
    let bob = Arc::new(session(right)?);

    let (alice_inbox_tx, alice_inbox) = mpsc::channel();
    let (bob_inbox_tx, bob_inbox) = mpsc::channel();
    let alice_reader = spawn_reader(Arc::clone(&alice), alice_inbox_tx);
    let bob_reader = spawn_reader(Arc::clone(&bob), bob_inbox_tx);

    let sent = alice.write(BROADCAST, b"hello serlink")?;
    eprintln!("alice sent {sent} bytes, acknowledged");

    let message = bob_inbox.recv()?;
    eprintln!("bob echoing {:?}", String::from_utf8_lossy(&message));
    bob.write(BROADCAST, &message)?;

    let echoed = alice_inbox.recv()?;
    eprintln!("alice got back {:?}", String::from_utf8_lossy(&echoed));

    alice.close();
    bob.close();
    left_shutdown.shutdown(Shutdown::Both)?;
    right_shutdown.shutdown(Shutdown::Both)?;
    alice_reader.join().expect("alice reader panicked");
    bob_reader.join().expect("bob reader panicked");

    Ok(())
}
