//! Parsing of the commands a terminal receives.
//!
//! The file dialect is terse: it names neither symbol nor tag, so those are
//! left for the book to fill in with its own defaults.
use bridge_common::command::DELIMITER;
use bridge_common::market::parse_decimal;
use bridge_common::{BridgeError, Dialect, Result, Side, Tag, Ticket};
use rust_decimal::Decimal;

/// Command as understood by the paper terminal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// Bid/ask for a symbol.
    Rates {
        /// Requested symbol.
        symbol: String,
    },
    /// Market order.
    Open {
        /// Order direction.
        side: Side,
        /// Requested symbol, `None` for the book's own.
        symbol: Option<String>,
        /// Volume in lots.
        lots: Decimal,
        /// Magic number, `None` for the book's default.
        tag: Option<Tag>,
        /// Order comment.
        comment: String,
    },
    /// Close (part of) a position.
    Close {
        /// Position to close.
        ticket: Ticket,
        /// Volume in lots.
        lots: Decimal,
    },
    /// List open positions.
    Orders,
}

impl Request {
    /// Reads one command line written in `dialect`.
    pub fn parse(line: &str, dialect: Dialect) -> Result<Request> {
        let fields: Vec<&str> = line.trim().split(DELIMITER).map(str::trim).collect();
        let request = match (dialect, fields.as_slice()) {
            (Dialect::File, ["BUY", lots]) => Request::Open {
                side: Side::Buy,
                symbol: None,
                lots: lots_field(lots)?,
                tag: None,
                comment: String::new(),
            },
            (Dialect::File, ["CLOSE", ticket, lots]) => Request::Close {
                ticket: ticket_field(ticket)?,
                lots: lots_field(lots)?,
            },
            (Dialect::File, ["ORDERS"]) => Request::Orders,

            (Dialect::Socket, ["RATES", symbol]) if !symbol.is_empty() => Request::Rates {
                symbol: symbol.to_string(),
            },
            (Dialect::Socket, ["TRADE", "OPEN", side, symbol, lots, _price, _sl, _tp, tag, rest @ ..]) => {
                Request::Open {
                    side: side
                        .parse::<i64>()
                        .ok()
                        .and_then(Side::from_code)
                        .ok_or_else(|| invalid("order type", side))?,
                    symbol: Some(symbol.to_string()),
                    lots: lots_field(lots)?,
                    tag: Some(tag.parse().map_err(|_| invalid("magic", tag))?),
                    comment: rest.join(DELIMITER.to_string().as_str()),
                }
            }
            (Dialect::Socket, ["TRADE", "CLOSE", ticket, lots]) => Request::Close {
                ticket: ticket_field(ticket)?,
                lots: lots_field(lots)?,
            },
            (Dialect::Socket, ["TRADE", "GET_OPEN_ORDERS"]) => Request::Orders,
            _ => return Err(invalid("command", line.trim())),
        };
        Ok(request)
    }
}

fn lots_field(raw: &str) -> Result<Decimal> {
    parse_decimal(raw)
        .filter(|lots| *lots > Decimal::ZERO)
        .ok_or_else(|| invalid("lot size", raw))
}

fn ticket_field(raw: &str) -> Result<Ticket> {
    raw.parse().map_err(|_| invalid("ticket", raw))
}

fn invalid(what: &str, raw: &str) -> BridgeError {
    BridgeError::Malformed(format!("invalid {}: {:?}", what, raw))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_common::Command;
    use rust_decimal_macros::dec;

    #[test]
    fn reads_what_the_bot_writes() {
        let open = Command::Open {
            side: Side::Buy,
            symbol: "ETHUSD".to_string(),
            lots: dec!(0.01),
            tag: 777,
            comment: "threshold-bot".to_string(),
        };
        assert_eq!(
            Request::parse(&open.encode(Dialect::Socket).unwrap(), Dialect::Socket).unwrap(),
            Request::Open {
                side: Side::Buy,
                symbol: Some("ETHUSD".to_string()),
                lots: dec!(0.01),
                tag: Some(777),
                comment: "threshold-bot".to_string(),
            }
        );
        assert_eq!(
            Request::parse(&open.encode(Dialect::File).unwrap(), Dialect::File).unwrap(),
            Request::Open {
                side: Side::Buy,
                symbol: None,
                lots: dec!(0.01),
                tag: None,
                comment: String::new(),
            }
        );
        assert_eq!(
            Request::parse("CLOSE|555|0.01", Dialect::File).unwrap(),
            Request::Close {
                ticket: 555,
                lots: dec!(0.01)
            }
        );
        assert_eq!(Request::parse("TRADE|GET_OPEN_ORDERS\n", Dialect::Socket).unwrap(), Request::Orders);
    }

    #[test]
    fn refuses_foreign_or_broken_commands() {
        for (line, dialect) in [
            ("RATES|ETHUSD", Dialect::File),
            ("ORDERS", Dialect::Socket),
            ("BUY|zero", Dialect::File),
            ("BUY|-1", Dialect::File),
            ("TRADE|OPEN|7|ETHUSD|0.01|0|0|0|777|c", Dialect::Socket),
            ("TRADE|CLOSE|abc|0.01", Dialect::Socket),
            ("", Dialect::File),
        ] {
            assert!(Request::parse(line, dialect).is_err(), "accepted {:?}", line);
        }
    }
}
