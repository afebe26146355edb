// Copyright (C) 2025 Ryan Daum <ryan.daum@gmail.com> This program is free
// software: you can redistribute it and/or modify it under the terms of the GNU
// General Public License as published by the Free Software Foundation, version
// 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

//! The line-oriented stream transport: CRLF-delimited lines up to 8 KiB,
//! telnet IAC sequences stripped, other control bytes dropped. One tokio
//! task reads, one pumps output; everything that touches the world goes
//! through the scheduler client.

use eyre::Context;
use marsh_common::events::WorldEvent;
use marsh_kernel::bus::EventBus;
use marsh_kernel::login::LoginOutcome;
use marsh_kernel::sessions::{Connections, Session, SessionError, TransportKind};
use marsh_kernel::tasks::SchedulerClient;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, warn};

/// Incoming lines longer than this are truncated.
const MAX_LINE_LEN: usize = 8192;

const WELCOME: &str = "\
Welcome to marsh.\r\n\
Use \"connect <name> <password>\" to connect, \"create <name> <password>\"\r\n\
to make a new character, WHO to see who is on, or QUIT to leave.\r\n";

enum OutMsg {
    Line(String),
    Close,
}

/// The per-descriptor session sink: the game loop pushes here, the writer
/// task drains to the socket.
struct TelnetSession {
    tx: flume::Sender<OutMsg>,
}

impl Session for TelnetSession {
    fn send_event(&self, ev: &WorldEvent) -> Result<(), SessionError> {
        self.tx
            .send(OutMsg::Line(ev.text.clone()))
            .map_err(|_| SessionError::Closed)
    }

    fn send_line(&self, line: &str) -> Result<(), SessionError> {
        self.tx
            .send(OutMsg::Line(line.to_string()))
            .map_err(|_| SessionError::Closed)
    }

    fn disconnect(&self) -> Result<(), SessionError> {
        self.tx.send(OutMsg::Close).map_err(|_| SessionError::Closed)
    }
}

/// Accept loop. Runs until the kill switch trips.
pub async fn run_listener(
    addr: SocketAddr,
    conns: Arc<Connections>,
    bus: Arc<EventBus>,
    client: SchedulerClient,
    kill_switch: Arc<AtomicBool>,
) -> Result<(), eyre::Error> {
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Unable to bind listener on {addr}"))?;
    info!(%addr, "Telnet listener started");

    let mut poll = tokio::time::interval(Duration::from_millis(250));
    loop {
        tokio::select! {
            _ = poll.tick() => {
                if kill_switch.load(Ordering::SeqCst) {
                    info!("Telnet listener stopping");
                    break;
                }
            }
            accepted = listener.accept() => {
                let (stream, peer) = match accepted {
                    Ok(a) => a,
                    Err(e) => {
                        warn!(?e, "accept failed");
                        continue;
                    }
                };
                debug!(%peer, "new connection");
                let conns = conns.clone();
                let bus = bus.clone();
                let client = client.clone();
                let kill_switch = kill_switch.clone();
                tokio::spawn(async move {
                    if let Err(e) =
                        connection_loop(stream, peer, conns, bus, client, kill_switch).await
                    {
                        debug!(%peer, ?e, "connection closed with error");
                    }
                });
            }
        }
    }
    Ok(())
}

async fn connection_loop(
    stream: TcpStream,
    peer: SocketAddr,
    conns: Arc<Connections>,
    bus: Arc<EventBus>,
    client: SchedulerClient,
    kill_switch: Arc<AtomicBool>,
) -> Result<(), eyre::Error> {
    let (read_half, mut write_half) = stream.into_split();
    let (out_tx, out_rx) = flume::unbounded();
    let session = Arc::new(TelnetSession { tx: out_tx });

    let descriptor = conns.new_connection(TransportKind::StreamLine, peer.to_string(), session.clone());
    bus.attach(descriptor, session.clone());

    // Writer task: everything leaving this descriptor funnels through one
    // buffered channel, flushed here.
    let writer = tokio::spawn(async move {
        while let Ok(msg) = out_rx.recv_async().await {
            match msg {
                OutMsg::Line(line) => {
                    if write_half.write_all(line.as_bytes()).await.is_err() {
                        break;
                    }
                    if write_half.write_all(b"\r\n").await.is_err() {
                        break;
                    }
                    let _ = write_half.flush().await;
                }
                OutMsg::Close => break,
            }
        }
        let _ = write_half.shutdown().await;
    });

    let _ = session.send_line(WELCOME.trim_end());

    let mut reader = BufReader::new(read_half);
    let mut buf: Vec<u8> = Vec::with_capacity(512);
    let mut logged_in = false;
    let mut at_eof = false;

    loop {
        if kill_switch.load(Ordering::SeqCst) {
            let _ = session.send_line("*** Server shutting down ***");
            break;
        }
        if at_eof {
            break;
        }
        // The timeout exists so the kill switch is observed; a partial line
        // stays in `buf` and the next pass keeps appending to it.
        let read = tokio::time::timeout(
            Duration::from_millis(500),
            reader.read_until(b'\n', &mut buf),
        )
        .await;
        match read {
            Err(_elapsed) => {
                if buf.len() <= MAX_LINE_LEN {
                    continue;
                }
                // Oversized un-terminated input: force it through as a line.
            }
            Ok(Ok(0)) => {
                if buf.is_empty() {
                    break;
                }
                // EOF with a dangling final line: process it, then stop.
                at_eof = true;
            }
            Ok(Ok(_n)) => {}
            Ok(Err(e)) => {
                debug!(?e, "read error");
                break;
            }
        }
        buf.truncate(MAX_LINE_LEN);
        let line = sanitize_line(&buf);
        buf.clear();

        if !logged_in {
            match client.login_line(descriptor, line).await {
                Ok(LoginOutcome::Pending) => {}
                Ok(LoginOutcome::Connected(_)) => logged_in = true,
                Ok(LoginOutcome::Close) | Err(_) => break,
            }
            continue;
        }

        if line.eq_ignore_ascii_case("quit") {
            let _ = session.send_line("Logged out.");
            break;
        }
        if client.submit_input(descriptor, line).is_err() {
            break;
        }
    }

    let _ = client.disconnected(descriptor);
    let _ = session.disconnect();
    let _ = writer.await;
    Ok(())
}

const IAC: u8 = 0xFF;

/// Strip telnet IAC sequences and control bytes, then decode what remains.
/// WILL/WONT/DO/DONT carry an option byte; other commands do not.
fn sanitize_line(raw: &[u8]) -> String {
    let mut cleaned: Vec<u8> = Vec::with_capacity(raw.len());
    let mut i = 0;
    while i < raw.len() {
        let b = raw[i];
        if b == IAC {
            let cmd = raw.get(i + 1).copied();
            i += match cmd {
                // WILL, WONT, DO, DONT take one option byte.
                Some(251..=254) => 3,
                Some(_) => 2,
                None => 1,
            };
            continue;
        }
        if b < 0x20 && b != b'\t' {
            // CR/LF are delimiters; everything else sub-0x20 is dropped.
            i += 1;
            continue;
        }
        cleaned.push(b);
        i += 1;
    }
    String::from_utf8_lossy(&cleaned).trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_sanitize_plain() {
        assert_eq!(sanitize_line(b"connect wizard pw\r\n"), "connect wizard pw");
    }

    #[test]
    fn test_sanitize_strips_iac_negotiation() {
        // IAC WILL ECHO, then a command.
        let mut raw = vec![0xFF, 251, 1];
        raw.extend_from_slice(b"look\r\n");
        assert_eq!(sanitize_line(&raw), "look");
        // IAC NOP (no option byte).
        let mut raw = vec![0xFF, 241];
        raw.extend_from_slice(b"look\r\n");
        assert_eq!(sanitize_line(&raw), "look");
        // Trailing IAC at end of buffer must not panic.
        assert_eq!(sanitize_line(&[0xFF]), "");
    }

    #[test]
    fn test_sanitize_drops_control_keeps_tab() {
        assert_eq!(sanitize_line(b"a\x01b\tc\r\n"), "ab\tc");
    }
}
