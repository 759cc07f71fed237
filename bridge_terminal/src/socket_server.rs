//! Socket pair side of the paper terminal.
//!
//! The terminal listens on two ports: commands arrive on the push port, one
//! per line, and every reply goes out on the pull port as one JSON line. One
//! bot session is served at a time; when the bot disconnects the terminal
//! goes back to accepting.
use std::io::{ErrorKind, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::thread;
use std::time::Duration;

use bridge_common::net::addr;
use bridge_common::{BridgeError, Dialect, Reply, Result};
use crossbeam_channel::Receiver;
use log::{debug, error, info, warn};

use crate::book::SharedBook;
use crate::request::Request;

/// How often blocked accepts and reads look at the stop channel.
const STOP_POLL: Duration = Duration::from_millis(50);

/// Terminal answering over a push/pull socket pair.
pub struct SocketTerminal {
    push: TcpListener,
    pull: TcpListener,
    book: SharedBook,
}

/// Why a session ended.
enum SessionEnd {
    Disconnected,
    Stopped,
}

impl SocketTerminal {
    /// Binds both listeners. Port 0 picks a free port, see [`Self::local_ports`].
    pub fn bind(host: &str, push_port: u16, pull_port: u16, book: SharedBook) -> Result<Self> {
        let push = TcpListener::bind(addr(host, push_port))?;
        let pull = TcpListener::bind(addr(host, pull_port))?;
        push.set_nonblocking(true)?;
        pull.set_nonblocking(true)?;
        info!(
            "Socket terminal listening: push {}, pull {}",
            push.local_addr()?,
            pull.local_addr()?
        );
        Ok(SocketTerminal { push, pull, book })
    }

    /// Actual `(push, pull)` ports.
    pub fn local_ports(&self) -> Result<(u16, u16)> {
        Ok((self.push.local_addr()?.port(), self.pull.local_addr()?.port()))
    }

    /// Serves bot sessions until `stop` fires or its sender goes away.
    pub fn serve(&self, stop: &Receiver<()>) -> Result<()> {
        loop {
            let Some(commands) = accept(&self.push, stop)? else { break };
            let Some(replies) = accept(&self.pull, stop)? else { break };
            info!("Bot connected from {}", commands.peer_addr()?);
            match self.session(commands, replies, stop) {
                Ok(SessionEnd::Stopped) => break,
                Ok(SessionEnd::Disconnected) => info!("Bot disconnected"),
                Err(e) => warn!("Session dropped: {}", e),
            }
        }
        info!("Socket terminal stopped");
        Ok(())
    }

    fn session(&self, mut commands: TcpStream, mut replies: TcpStream, stop: &Receiver<()>) -> Result<SessionEnd> {
        commands.set_read_timeout(Some(STOP_POLL))?;
        replies.set_nodelay(true)?;
        let mut pending: Vec<u8> = Vec::new();
        let mut buf = [0u8; 1024];
        loop {
            while let Some(end) = pending.iter().position(|b| *b == b'\n') {
                let line: Vec<u8> = pending.drain(..=end).collect();
                let line = String::from_utf8_lossy(&line).trim().to_string();
                if line.is_empty() {
                    continue;
                }
                let reply = self.answer(&line)?;
                replies.write_all(format!("{}\n", reply).as_bytes())?;
                replies.flush()?;
            }

            if stopped(stop) {
                return Ok(SessionEnd::Stopped);
            }
            match commands.read(&mut buf) {
                Ok(0) => return Ok(SessionEnd::Disconnected),
                Ok(n) => pending.extend_from_slice(&buf[..n]),
                Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut | ErrorKind::Interrupted) => {}
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn answer(&self, line: &str) -> Result<String> {
        debug!("<- {}", line);
        let reply = match Request::parse(line, Dialect::Socket) {
            Ok(request) => self.book.lock()?.handle(request),
            Err(e) => {
                warn!("{}", e);
                Reply::Rejected(format!("unknown command: {}", line))
            }
        };
        let payload = reply.encode(Dialect::Socket)?;
        debug!("-> {}", payload);
        Ok(payload)
    }
}

/// Waits for one connection on a nonblocking listener; `None` once stopped.
fn accept(listener: &TcpListener, stop: &Receiver<()>) -> Result<Option<TcpStream>> {
    loop {
        match listener.accept() {
            Ok((stream, _)) => {
                stream.set_nonblocking(false)?;
                return Ok(Some(stream));
            }
            Err(e) if e.kind() == ErrorKind::WouldBlock => {
                if stopped(stop) {
                    return Ok(None);
                }
                thread::sleep(STOP_POLL);
            }
            Err(e) if e.kind() == ErrorKind::Interrupted => {}
            Err(e) => {
                error!("Accept failed: {}", e);
                return Err(BridgeError::Io(e));
            }
        }
    }
}

fn stopped(stop: &Receiver<()>) -> bool {
    match stop.try_recv() {
        Ok(()) => true,
        Err(e) => e.is_disconnected(),
    }
}
