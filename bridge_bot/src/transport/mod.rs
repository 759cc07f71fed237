//! Request/response channels to the external terminal.
//!
//! A `Transport` moves opaque command strings to the terminal and brings the
//! correlated reply back. Exchanges are strictly one at a time (`&mut self`);
//! a timed-out exchange leaves the transport usable for the next one.
//!
//! Implementations:
//! - `file_handoff`: command/reply files in a directory shared with the terminal.
//! - `socket_pair`: a push channel for commands and a pull channel for replies.
use std::time::Duration;

use bridge_common::{BridgeError, Dialect, Result};

pub mod file_handoff;
pub mod socket_pair;

pub use file_handoff::{FileHandoff, HandoffTiming};
pub use socket_pair::{SocketPair, SocketPairEndpoint};

/// Capability shared by every bridge transport.
pub trait Transport {
    /// Encoding spoken by the terminal on the other side.
    fn dialect(&self) -> Dialect;

    /// Sends `command` and waits at most `timeout` for its reply.
    ///
    /// `BridgeError::Timeout` means the command's effect is unknown, as
    /// opposed to a failure to deliver it at all.
    fn exchange(&mut self, command: &str, timeout: Duration) -> Result<String>;

    /// Latest snapshot of a side-channel price feed.
    fn price_feed(&mut self) -> Result<String> {
        Err(BridgeError::Unsupported(format!(
            "{} transport has no price feed",
            self.dialect()
        )))
    }

    /// Releases held resources. Calling it twice is harmless.
    fn shutdown(&mut self);
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn dialect(&self) -> Dialect {
        (**self).dialect()
    }

    fn exchange(&mut self, command: &str, timeout: Duration) -> Result<String> {
        (**self).exchange(command, timeout)
    }

    fn price_feed(&mut self) -> Result<String> {
        (**self).price_feed()
    }

    fn shutdown(&mut self) {
        (**self).shutdown()
    }
}
