//! Domain operations on top of a [`Transport`].
//!
//! The client is the fault boundary of the bridge: timeouts, unreachable
//! terminals and unreadable payloads are logged here and surface as absent
//! results. Nothing below this layer can stop the poll loop.
use std::time::Duration;

use bridge_common::reply::{decode_order, decode_positions, decode_quote};
use bridge_common::{BridgeError, Command, Fill, Position, Quote, Result, Side, Tag, Ticket};
use log::{debug, error, warn};
use rust_decimal::Decimal;

use crate::transport::Transport;

/// Answer to an open or close request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderOutcome {
    /// The terminal executed the order.
    Filled(Fill),
    /// The terminal refused the order; nothing changed on its side.
    Rejected(String),
    /// No usable answer (timeout, unreachable, unreadable); the order may or
    /// may not have been executed.
    NoResponse,
}

/// Answer to an open-orders request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpenPositions {
    /// The terminal reported no matching position.
    Empty,
    /// The terminal could not be asked or its answer could not be read.
    Faulted,
    /// At least one matching position.
    Positions(Vec<Position>),
}

impl OpenPositions {
    /// Matching positions; empty for both `Empty` and `Faulted`.
    pub fn positions(&self) -> &[Position] {
        match self {
            OpenPositions::Positions(positions) => positions,
            OpenPositions::Empty | OpenPositions::Faulted => &[],
        }
    }
}

/// Bridge client speaking the transport's dialect.
pub struct BridgeClient<T: Transport> {
    transport: T,
    timeout: Duration,
}

impl<T: Transport> BridgeClient<T> {
    /// Wraps `transport`; every exchange waits at most `timeout`.
    pub fn new(transport: T, timeout: Duration) -> Self {
        BridgeClient { transport, timeout }
    }

    /// Current bid/ask, or `None` when no usable quote is available.
    pub fn get_quote(&mut self, symbol: &str) -> Option<Quote> {
        let command = Command::Quote {
            symbol: symbol.to_string(),
        };
        let dialect = self.transport.dialect();
        let payload = match command.encode(dialect) {
            Ok(line) => self.transport.exchange(&line, self.timeout),
            Err(BridgeError::Unsupported(_)) => self.transport.price_feed(),
            Err(e) => Err(e),
        };
        payload
            .and_then(|payload| decode_quote(&payload, dialect))
            .map_err(|e| report("QUOTE", &e))
            .ok()
    }

    /// Opens a market position tagged with `tag`.
    pub fn open_position(
        &mut self,
        side: Side,
        symbol: &str,
        lots: Decimal,
        tag: Tag,
        comment: &str,
    ) -> OrderOutcome {
        self.order(Command::Open {
            side,
            symbol: symbol.to_string(),
            lots,
            tag,
            comment: comment.to_string(),
        })
    }

    /// Closes `lots` of the position `ticket`.
    pub fn close_position(&mut self, ticket: Ticket, lots: Decimal) -> OrderOutcome {
        self.order(Command::Close { ticket, lots })
    }

    /// Open positions, keeping only those matching `tag_filter`.
    pub fn list_open_positions(&mut self, tag_filter: Option<Tag>) -> OpenPositions {
        let dialect = self.transport.dialect();
        let result = self
            .send(&Command::ListOpen { tag_filter })
            .and_then(|payload| decode_positions(&payload, dialect));
        match result {
            Ok(positions) => {
                let matching: Vec<Position> = positions
                    .into_iter()
                    .filter(|p| tag_filter.is_none_or(|tag| p.matches_tag(tag)))
                    .collect();
                if matching.is_empty() {
                    OpenPositions::Empty
                } else {
                    OpenPositions::Positions(matching)
                }
            }
            Err(e) => {
                report("LIST_OPEN", &e);
                OpenPositions::Faulted
            }
        }
    }

    /// Releases the transport.
    pub fn shutdown(&mut self) {
        self.transport.shutdown();
    }

    fn order(&mut self, command: Command) -> OrderOutcome {
        let dialect = self.transport.dialect();
        let result = self
            .send(&command)
            .and_then(|payload| decode_order(&payload, dialect));
        match result {
            Ok(fill) => OrderOutcome::Filled(fill),
            Err(BridgeError::Rejected(message)) => {
                warn!("{} rejected by the terminal: {}", command.name(), message);
                OrderOutcome::Rejected(message)
            }
            Err(e) => {
                report(command.name(), &e);
                OrderOutcome::NoResponse
            }
        }
    }

    fn send(&mut self, command: &Command) -> Result<String> {
        let line = command.encode(self.transport.dialect())?;
        debug!("{} -> {}", command.name(), line);
        self.transport.exchange(&line, self.timeout)
    }
}

fn report(operation: &str, e: &BridgeError) {
    match e {
        BridgeError::Timeout(_) => warn!("{}: {} (terminal state unknown)", operation, e),
        BridgeError::Malformed(_) | BridgeError::Rejected(_) => warn!("{}: {}", operation, e),
        _ => error!("{}: {}", operation, e),
    }
}
