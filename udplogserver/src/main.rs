//! udplogserver: receive OSReport-style log datagrams from a console on
//! the local network and relay them to stdout.

use std::io::{self, ErrorKind, Write};
use std::net::UdpSocket;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;

const SERVER_PORT: u16 = 4405;

#[derive(Parser, Debug)]
#[command(name = "udplogserver", version, about = "UDP log relay for console output")]
struct Args {
    /// UDP port to listen on
    #[arg(value_name = "PORT", default_value_t = SERVER_PORT)]
    port: u16,
}

/// Forward datagrams until `interrupted` is set. The socket's receive
/// timeout bounds how long an interrupt waits behind an idle recv.
fn relay(socket: &UdpSocket, interrupted: &AtomicBool, out: &mut impl Write) -> Result<()> {
    let mut buffer = [0u8; 2048];

    while !interrupted.load(Ordering::SeqCst) {
        match socket.recv_from(&mut buffer) {
            Ok((received, _)) => {
                out.write_all(&buffer[..received])?;
                out.flush()?;
            }
            Err(err) if matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {}
            Err(err) => return Err(err).context("recv failed"),
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();

    let socket = UdpSocket::bind(("0.0.0.0", args.port))
        .with_context(|| format!("Failed to bind socket on port {}", args.port))?;
    socket.set_read_timeout(Some(Duration::from_millis(250)))?;

    let interrupted = Arc::new(AtomicBool::new(false));
    {
        let interrupted = Arc::clone(&interrupted);
        ctrlc::set_handler(move || interrupted.store(true, Ordering::SeqCst))
            .context("Failed to install interrupt handler")?;
    }

    let mut stdout = io::stdout().lock();
    relay(&socket, &interrupted, &mut stdout)?;

    eprintln!("\nInterrupted.");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn relay_returns_at_once_when_already_interrupted() {
        let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
        socket
            .set_read_timeout(Some(Duration::from_millis(10)))
            .unwrap();
        let interrupted = AtomicBool::new(true);

        let mut out = Vec::new();
        relay(&socket, &interrupted, &mut out).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn relay_forwards_datagrams_until_interrupted() {
        let receiver = UdpSocket::bind("127.0.0.1:0").unwrap();
        receiver
            .set_read_timeout(Some(Duration::from_millis(50)))
            .unwrap();

        let sender = UdpSocket::bind("127.0.0.1:0").unwrap();
        sender
            .send_to(b"OSReport says hi\n", receiver.local_addr().unwrap())
            .unwrap();

        let interrupted = Arc::new(AtomicBool::new(false));
        let stopper = Arc::clone(&interrupted);
        let stop = thread::spawn(move || {
            thread::sleep(Duration::from_millis(200));
            stopper.store(true, Ordering::SeqCst);
        });

        let mut out = Vec::new();
        relay(&receiver, &interrupted, &mut out).unwrap();
        stop.join().unwrap();

        assert_eq!(out, b"OSReport says hi\n");
    }
}
