//! Outbound commands and their wire encodings.
//!
//! A `Command` is the bot's request to the terminal. How it is spelled depends
//! on the `Dialect` spoken by the transport:
//! - `file`: terse pipe-delimited text (`BUY|0.01`, `CLOSE|555|0.01`, `ORDERS`);
//!   quotes are not requested but read from a side-channel price file.
//! - `socket`: `RATES|…` and `TRADE|…` commands answered by JSON replies.
use clap::ValueEnum;
use rust_decimal::Decimal;
use strum_macros::Display;

use crate::error::BridgeError;
use crate::market::{Side, Tag, Ticket};
use crate::result::Result;

/// Field separator shared by every command encoding.
pub const DELIMITER: char = '|';

/// Wire dialect of a transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Display)]
#[strum(serialize_all = "lowercase")]
pub enum Dialect {
    /// Shared-directory handoff with pipe-delimited replies.
    File,
    /// Push/pull socket pair with JSON replies.
    Socket,
}

/// Request sent to the terminal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Current bid/ask for `symbol`.
    Quote {
        /// Instrument name as known by the terminal.
        symbol: String,
    },
    /// Market order opening a new position.
    Open {
        /// Order direction.
        side: Side,
        /// Instrument name as known by the terminal.
        symbol: String,
        /// Volume in lots.
        lots: Decimal,
        /// Magic number identifying the bot's orders.
        tag: Tag,
        /// Free-text order comment.
        comment: String,
    },
    /// Market order closing `lots` of `ticket`.
    Close {
        /// Position to close.
        ticket: Ticket,
        /// Volume in lots.
        lots: Decimal,
    },
    /// All open orders. The filter is applied by the caller: neither dialect
    /// transmits it.
    ListOpen {
        /// Magic number to keep, if any.
        tag_filter: Option<Tag>,
    },
}

impl Command {
    /// Short operation name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            Command::Quote { .. } => "QUOTE",
            Command::Open { .. } => "OPEN",
            Command::Close { .. } => "CLOSE",
            Command::ListOpen { .. } => "LIST_OPEN",
        }
    }

    /// Spells the command for `dialect`.
    ///
    /// Returns `BridgeError::Unsupported` when the dialect has no such
    /// command: the file dialect serves quotes through its price file and can
    /// only open BUY orders.
    pub fn encode(&self, dialect: Dialect) -> Result<String> {
        match (dialect, self) {
            (Dialect::File, Command::Quote { .. }) => Err(BridgeError::Unsupported(
                "file dialect publishes quotes through the price file".to_string(),
            )),
            (Dialect::File, Command::Open { side: Side::Sell, .. }) => Err(
                BridgeError::Unsupported("file dialect only opens BUY orders".to_string()),
            ),
            (Dialect::File, Command::Open { lots, .. }) => Ok(join(&["BUY", &lots_text(*lots)])),
            (Dialect::File, Command::Close { ticket, lots }) => {
                Ok(join(&["CLOSE", &ticket.to_string(), &lots_text(*lots)]))
            }
            (Dialect::File, Command::ListOpen { .. }) => Ok("ORDERS".to_string()),

            (Dialect::Socket, Command::Quote { symbol }) => Ok(join(&["RATES", symbol])),
            (
                Dialect::Socket,
                Command::Open {
                    side,
                    symbol,
                    lots,
                    tag,
                    comment,
                },
            ) => Ok(join(&[
                "TRADE",
                "OPEN",
                &side.code().to_string(),
                symbol,
                &lots_text(*lots),
                // price, stop-loss, take-profit: market order without protection
                "0",
                "0",
                "0",
                &tag.to_string(),
                comment,
            ])),
            (Dialect::Socket, Command::Close { ticket, lots }) => Ok(join(&[
                "TRADE",
                "CLOSE",
                &ticket.to_string(),
                &lots_text(*lots),
            ])),
            (Dialect::Socket, Command::ListOpen { .. }) => Ok("TRADE|GET_OPEN_ORDERS".to_string()),
        }
    }
}

fn join(fields: &[&str]) -> String {
    fields.join(DELIMITER.to_string().as_str())
}

fn lots_text(lots: Decimal) -> String {
    lots.normalize().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn open(side: Side) -> Command {
        Command::Open {
            side,
            symbol: "ETHUSD".to_string(),
            lots: dec!(0.010),
            tag: 777,
            comment: "threshold-bot".to_string(),
        }
    }

    #[test]
    fn file_dialect_spelling() {
        assert_eq!(open(Side::Buy).encode(Dialect::File).unwrap(), "BUY|0.01");
        let close = Command::Close {
            ticket: 555,
            lots: dec!(0.01),
        };
        assert_eq!(close.encode(Dialect::File).unwrap(), "CLOSE|555|0.01");
        let orders = Command::ListOpen {
            tag_filter: Some(777),
        };
        assert_eq!(orders.encode(Dialect::File).unwrap(), "ORDERS");
    }

    #[test]
    fn file_dialect_refuses_quotes_and_sells() {
        let quote = Command::Quote {
            symbol: "ETHUSD".to_string(),
        };
        assert!(matches!(
            quote.encode(Dialect::File),
            Err(BridgeError::Unsupported(_))
        ));
        assert!(matches!(
            open(Side::Sell).encode(Dialect::File),
            Err(BridgeError::Unsupported(_))
        ));
    }

    #[test]
    fn socket_dialect_spelling() {
        let quote = Command::Quote {
            symbol: "ETHUSD".to_string(),
        };
        assert_eq!(quote.encode(Dialect::Socket).unwrap(), "RATES|ETHUSD");
        assert_eq!(
            open(Side::Buy).encode(Dialect::Socket).unwrap(),
            "TRADE|OPEN|0|ETHUSD|0.01|0|0|0|777|threshold-bot"
        );
        let close = Command::Close {
            ticket: 555,
            lots: dec!(0.01),
        };
        assert_eq!(close.encode(Dialect::Socket).unwrap(), "TRADE|CLOSE|555|0.01");
        let orders = Command::ListOpen { tag_filter: None };
        assert_eq!(
            orders.encode(Dialect::Socket).unwrap(),
            "TRADE|GET_OPEN_ORDERS"
        );
    }
}
