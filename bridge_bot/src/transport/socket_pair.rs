//! Socket pair bridge: commands go out on a push channel, replies come back
//! on a pull channel.
//!
//! Both channels are TCP connections to the terminal carrying one message per
//! line. The pull channel is read with a deadline; a reply that arrives after
//! its deadline is drained and discarded before the next command is sent, so
//! a timeout never shifts later replies onto the wrong command.
use std::io::{ErrorKind, Read, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::time::{Duration, Instant};

use bridge_common::net::addr;
use bridge_common::{BridgeError, Dialect, Result};
use log::{debug, info, warn};

use crate::transport::Transport;

/// Where the terminal listens.
#[derive(Debug, Clone)]
pub struct SocketPairEndpoint {
    /// Terminal host name or IP.
    pub host: String,
    /// Port accepting commands.
    pub push_port: u16,
    /// Port publishing replies.
    pub pull_port: u16,
    /// Upper bound for establishing each connection.
    pub connect_timeout: Duration,
}

struct Channels {
    push: TcpStream,
    pull: TcpStream,
    /// Bytes read from the pull channel that do not yet form a full line.
    pending: Vec<u8>,
    /// Set when part of a stale reply was thrown away: the next line read is
    /// its tail.
    skip_tail: bool,
}

/// Transport over a push/pull socket pair.
pub struct SocketPair {
    endpoint: SocketPairEndpoint,
    channels: Option<Channels>,
    closed: bool,
}

impl SocketPair {
    /// Connects both channels. Fails with `BridgeError::Unreachable` instead
    /// of retrying when the terminal is not listening.
    pub fn connect(endpoint: SocketPairEndpoint) -> Result<Self> {
        let channels = Channels::open(&endpoint)?;
        info!(
            "Socket bridge connected: push {}, pull {}",
            addr(&endpoint.host, endpoint.push_port),
            addr(&endpoint.host, endpoint.pull_port)
        );
        Ok(SocketPair {
            endpoint,
            channels: Some(channels),
            closed: false,
        })
    }
}

impl Transport for SocketPair {
    fn dialect(&self) -> Dialect {
        Dialect::Socket
    }

    fn exchange(&mut self, command: &str, timeout: Duration) -> Result<String> {
        if self.closed {
            return Err(BridgeError::Unreachable("socket bridge is shut down".to_string()));
        }
        if self.channels.is_none() {
            info!("Reconnecting socket bridge");
            self.channels = Some(Channels::open(&self.endpoint)?);
        }
        let result = match self.channels.as_mut() {
            Some(channels) => channels.round_trip(command, timeout),
            None => Err(BridgeError::Unreachable("socket bridge not connected".to_string())),
        };
        if let Err(e @ (BridgeError::Unreachable(_) | BridgeError::Io(_))) = &result {
            warn!("Dropping socket bridge connection: {}", e);
            self.drop_channels();
        }
        result
    }

    fn shutdown(&mut self) {
        if !self.closed {
            self.closed = true;
            self.drop_channels();
            info!("Socket bridge closed");
        }
    }
}

impl SocketPair {
    fn drop_channels(&mut self) {
        if let Some(channels) = self.channels.take() {
            let _ = channels.push.shutdown(Shutdown::Both);
            let _ = channels.pull.shutdown(Shutdown::Both);
        }
    }
}

impl Drop for SocketPair {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl Channels {
    fn open(endpoint: &SocketPairEndpoint) -> Result<Self> {
        let push = connect_to(&endpoint.host, endpoint.push_port, endpoint.connect_timeout)?;
        let pull = connect_to(&endpoint.host, endpoint.pull_port, endpoint.connect_timeout)?;
        push.set_nodelay(true)?;
        Ok(Channels {
            push,
            pull,
            pending: Vec::new(),
            skip_tail: false,
        })
    }

    fn round_trip(&mut self, command: &str, timeout: Duration) -> Result<String> {
        self.drain_stale()?;
        self.push
            .write_all(format!("{}\n", command).as_bytes())
            .and_then(|_| self.push.flush())
            .map_err(|e| BridgeError::Unreachable(format!("push channel: {}", e)))?;
        debug!("-> {}", command);
        let reply = self.read_line(timeout)?;
        debug!("<- {}", reply);
        Ok(reply)
    }

    /// Discards whatever already sits on the pull channel: replies to
    /// commands that timed out earlier.
    fn drain_stale(&mut self) -> Result<()> {
        let mut buf = [0u8; 1024];
        self.pull.set_nonblocking(true)?;
        let outcome = loop {
            match self.pull.read(&mut buf) {
                Ok(0) => {
                    break Err(BridgeError::Unreachable(
                        "pull channel closed by the terminal".to_string(),
                    ));
                }
                Ok(n) => self.pending.extend_from_slice(&buf[..n]),
                Err(e) if e.kind() == ErrorKind::WouldBlock => break Ok(()),
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => break Err(e.into()),
            }
        };
        self.pull.set_nonblocking(false)?;
        if !self.pending.is_empty() {
            // a stale reply cut short still owes its tail
            self.skip_tail = self.pending.last() != Some(&b'\n');
            warn!("Discarded {} stale bytes from the pull channel", self.pending.len());
            self.pending.clear();
        }
        outcome
    }

    /// Forgets the partial line of an abandoned reply, remembering that its
    /// tail is still to come.
    fn abandon_partial(&mut self) {
        if !self.pending.is_empty() {
            self.skip_tail = true;
            self.pending.clear();
        }
    }

    fn read_line(&mut self, timeout: Duration) -> Result<String> {
        let deadline = Instant::now() + timeout;
        let mut buf = [0u8; 4096];
        loop {
            if let Some(end) = self.pending.iter().position(|b| *b == b'\n') {
                let line: Vec<u8> = self.pending.drain(..=end).collect();
                let text = String::from_utf8_lossy(&line).trim().to_string();
                if self.skip_tail {
                    self.skip_tail = false;
                    warn!("Discarded the tail of a stale reply: {:?}", text);
                    continue;
                }
                if text.is_empty() {
                    continue;
                }
                return Ok(text);
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                self.abandon_partial();
                return Err(BridgeError::Timeout(timeout));
            }
            self.pull.set_read_timeout(Some(remaining))?;
            match self.pull.read(&mut buf) {
                Ok(0) => {
                    return Err(BridgeError::Unreachable(
                        "pull channel closed by the terminal".to_string(),
                    ));
                }
                Ok(n) => self.pending.extend_from_slice(&buf[..n]),
                Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                    self.abandon_partial();
                    return Err(BridgeError::Timeout(timeout));
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }
}

fn connect_to(host: &str, port: u16, timeout: Duration) -> Result<TcpStream> {
    let target = addr(host, port);
    let candidates = (host, port)
        .to_socket_addrs()
        .map_err(|e| BridgeError::Unreachable(format!("cannot resolve {}: {}", target, e)))?;
    let mut last_error = None;
    for candidate in candidates {
        match TcpStream::connect_timeout(&candidate, timeout) {
            Ok(stream) => return Ok(stream),
            Err(e) => last_error = Some(e),
        }
    }
    Err(BridgeError::Unreachable(match last_error {
        Some(e) => format!("{}: {}", target, e),
        None => format!("{}: no address", target),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufRead, BufReader};
    use std::net::TcpListener;
    use std::thread;

    struct FakeTerminal {
        push: TcpListener,
        pull: TcpListener,
    }

    impl FakeTerminal {
        fn bind() -> Self {
            FakeTerminal {
                push: TcpListener::bind("127.0.0.1:0").unwrap(),
                pull: TcpListener::bind("127.0.0.1:0").unwrap(),
            }
        }

        fn endpoint(&self) -> SocketPairEndpoint {
            SocketPairEndpoint {
                host: "127.0.0.1".to_string(),
                push_port: self.push.local_addr().unwrap().port(),
                pull_port: self.pull.local_addr().unwrap().port(),
                connect_timeout: Duration::from_secs(1),
            }
        }

        /// Serves one session: answers each command through `respond`,
        /// staying silent when it returns `None`.
        fn serve(
            self,
            respond: impl Fn(&str) -> Option<String> + Send + 'static,
        ) -> thread::JoinHandle<Vec<String>> {
            thread::spawn(move || {
                let (commands, _) = self.push.accept().unwrap();
                let (mut replies, _) = self.pull.accept().unwrap();
                let mut seen = Vec::new();
                for line in BufReader::new(commands).lines() {
                    let Ok(line) = line else { break };
                    if let Some(reply) = respond(&line) {
                        replies.write_all(format!("{}\n", reply).as_bytes()).unwrap();
                    }
                    seen.push(line);
                }
                seen
            })
        }
    }

    #[test]
    fn connect_fails_when_nobody_listens() {
        let probe = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = probe.local_addr().unwrap().port();
        drop(probe);
        let endpoint = SocketPairEndpoint {
            host: "127.0.0.1".to_string(),
            push_port: port,
            pull_port: port,
            connect_timeout: Duration::from_millis(200),
        };
        assert!(matches!(
            SocketPair::connect(endpoint),
            Err(BridgeError::Unreachable(_))
        ));
    }

    #[test]
    fn exchange_pairs_each_command_with_its_reply() {
        let terminal = FakeTerminal::bind();
        let endpoint = terminal.endpoint();
        let server = terminal.serve(|line| Some(format!("{{\"echo\":\"{}\"}}", line)));

        let mut bridge = SocketPair::connect(endpoint).unwrap();
        let first = bridge.exchange("RATES|ETHUSD", Duration::from_secs(2)).unwrap();
        let second = bridge.exchange("TRADE|GET_OPEN_ORDERS", Duration::from_secs(2)).unwrap();
        assert_eq!(first, r#"{"echo":"RATES|ETHUSD"}"#);
        assert_eq!(second, r#"{"echo":"TRADE|GET_OPEN_ORDERS"}"#);

        bridge.shutdown();
        assert_eq!(server.join().unwrap().len(), 2);
    }

    #[test]
    fn late_reply_is_not_taken_for_the_next_command() {
        let terminal = FakeTerminal::bind();
        let endpoint = terminal.endpoint();
        let server = terminal.serve(|line| {
            if line == "TRADE|GET_OPEN_ORDERS" {
                // answers only after the bot gave up
                thread::sleep(Duration::from_millis(300));
                Some("{\"orders\":[]}".to_string())
            } else {
                Some("{\"bid\":2101,\"ask\":2103}".to_string())
            }
        });

        let mut bridge = SocketPair::connect(endpoint).unwrap();
        let result = bridge.exchange("TRADE|GET_OPEN_ORDERS", Duration::from_millis(100));
        assert!(matches!(result, Err(BridgeError::Timeout(_))));

        thread::sleep(Duration::from_millis(400));
        let reply = bridge.exchange("RATES|ETHUSD", Duration::from_secs(2)).unwrap();
        assert_eq!(reply, "{\"bid\":2101,\"ask\":2103}");

        bridge.shutdown();
        server.join().unwrap();
    }

    #[test]
    fn tail_of_a_cut_reply_is_not_taken_for_the_next_command() {
        let terminal = FakeTerminal::bind();
        let endpoint = terminal.endpoint();
        let server = thread::spawn(move || {
            let (commands, _) = terminal.push.accept().unwrap();
            let (mut replies, _) = terminal.pull.accept().unwrap();
            let mut lines = BufReader::new(commands).lines();

            assert_eq!(lines.next().unwrap().unwrap(), "TRADE|GET_OPEN_ORDERS");
            replies.write_all(b"{\"orders\":").unwrap();
            replies.flush().unwrap();
            assert_eq!(lines.next().unwrap().unwrap(), "RATES|ETHUSD");
            replies.write_all(b"[]}\n").unwrap();
            replies.write_all(b"{\"bid\":2101,\"ask\":2103}\n").unwrap();
        });

        let mut bridge = SocketPair::connect(endpoint).unwrap();
        let result = bridge.exchange("TRADE|GET_OPEN_ORDERS", Duration::from_millis(150));
        assert!(matches!(result, Err(BridgeError::Timeout(_))));

        let reply = bridge.exchange("RATES|ETHUSD", Duration::from_secs(2)).unwrap();
        assert_eq!(reply, "{\"bid\":2101,\"ask\":2103}");

        server.join().unwrap();
        bridge.shutdown();
    }

    #[test]
    fn silent_terminal_times_out_without_breaking_the_bridge() {
        let terminal = FakeTerminal::bind();
        let endpoint = terminal.endpoint();
        let server = terminal.serve(|line| {
            (line != "TRADE|CLOSE|555|0.01").then(|| "{\"ticket\":555,\"price\":2101}".to_string())
        });

        let mut bridge = SocketPair::connect(endpoint).unwrap();
        let result = bridge.exchange("TRADE|CLOSE|555|0.01", Duration::from_millis(100));
        assert!(matches!(result, Err(BridgeError::Timeout(_))));

        let reply = bridge
            .exchange("TRADE|CLOSE|555|0.010", Duration::from_secs(2))
            .unwrap();
        assert_eq!(reply, "{\"ticket\":555,\"price\":2101}");

        bridge.shutdown();
        bridge.shutdown();
        assert!(matches!(
            bridge.exchange("RATES|ETHUSD", Duration::from_millis(10)),
            Err(BridgeError::Unreachable(_))
        ));
        server.join().unwrap();
    }
}
