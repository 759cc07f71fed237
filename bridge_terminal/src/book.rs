//! In-memory order book of the paper terminal.
//!
//! One symbol, one quote, market orders only. Orders fill immediately at the
//! current quote (BUY at the ask, SELL at the bid) and positions are marked to
//! market on every listing. The book is shared between the price feed and the
//! serving thread as a [`SharedBook`].
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use bridge_common::{Fill, Position, Quote, Reply, Side, Tag, Ticket};
use chrono::{DateTime, Utc};
use log::info;
use rust_decimal::Decimal;

use crate::request::Request;

/// Book shared between the feed thread and a server.
pub type SharedBook = Arc<Mutex<PaperBook>>;

/// Error text for a close naming no open position.
pub const INVALID_TICKET: &str = "ERROR|4108|invalid ticket";

/// First ticket handed out by a fresh book.
const FIRST_TICKET: Ticket = 1000;

#[derive(Debug, Clone)]
struct OpenOrder {
    side: Side,
    lots: Decimal,
    open_price: Decimal,
    tag: Tag,
    comment: String,
    opened_at: DateTime<Utc>,
}

/// Paper book for a single symbol.
#[derive(Debug)]
pub struct PaperBook {
    symbol: String,
    quote: Quote,
    positions: BTreeMap<Ticket, OpenOrder>,
    next_ticket: Ticket,
    default_tag: Tag,
    contract_multiplier: Decimal,
}

impl PaperBook {
    /// Empty book quoting `symbol` at `quote`.
    ///
    /// `default_tag` marks orders whose command carries no magic number (the
    /// file dialect); `contract_multiplier` converts price moves per lot into
    /// account currency.
    pub fn new(symbol: &str, quote: Quote, default_tag: Tag, contract_multiplier: Decimal) -> Self {
        PaperBook {
            symbol: symbol.to_string(),
            quote,
            positions: BTreeMap::new(),
            next_ticket: FIRST_TICKET,
            default_tag,
            contract_multiplier,
        }
    }

    /// Wraps the book for sharing across threads.
    pub fn shared(self) -> SharedBook {
        Arc::new(Mutex::new(self))
    }

    /// Traded symbol.
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Current quote.
    pub fn quote(&self) -> Quote {
        self.quote
    }

    /// Replaces the current quote.
    pub fn set_quote(&mut self, quote: Quote) {
        self.quote = quote;
    }

    /// Executes one request and builds the reply.
    pub fn handle(&mut self, request: Request) -> Reply {
        match request {
            Request::Rates { symbol } => match self.check_symbol(&symbol) {
                Ok(()) => Reply::Quote(self.quote),
                Err(reply) => reply,
            },
            Request::Open {
                side,
                symbol,
                lots,
                tag,
                comment,
            } => {
                if let Some(Err(reply)) = symbol.map(|symbol| self.check_symbol(&symbol)) {
                    return reply;
                }
                self.open(side, lots, tag.unwrap_or(self.default_tag), comment)
            }
            Request::Close { ticket, lots } => self.close(ticket, lots),
            Request::Orders => Reply::Positions(self.positions()),
        }
    }

    /// Fills a market order at the current quote.
    pub fn open(&mut self, side: Side, lots: Decimal, tag: Tag, comment: String) -> Reply {
        let price = match side {
            Side::Buy => self.quote.ask,
            Side::Sell => self.quote.bid,
        };
        let ticket = self.next_ticket;
        self.next_ticket += 1;
        info!(
            "Opened #{} {} {} {} @ {} (magic {}, {:?})",
            ticket, side, lots, self.symbol, price, tag, comment
        );
        self.positions.insert(
            ticket,
            OpenOrder {
                side,
                lots,
                open_price: price,
                tag,
                comment,
                opened_at: Utc::now(),
            },
        );
        Reply::Filled(Fill {
            ticket: Some(ticket),
            price: Some(price),
        })
    }

    /// Closes `lots` of position `ticket` at the current quote. Closing the
    /// full size or more removes the position.
    pub fn close(&mut self, ticket: Ticket, lots: Decimal) -> Reply {
        let Some(order) = self.positions.get_mut(&ticket) else {
            return Reply::Rejected(INVALID_TICKET.to_string());
        };
        let price = match order.side {
            Side::Buy => self.quote.bid,
            Side::Sell => self.quote.ask,
        };
        if lots < order.lots {
            order.lots -= lots;
            info!("Partially closed #{} {} @ {}, {} left", ticket, lots, price, order.lots);
        } else if let Some(order) = self.positions.remove(&ticket) {
            let held = Utc::now().signed_duration_since(order.opened_at);
            info!(
                "Closed #{} {} @ {} after {}s ({:?})",
                ticket,
                order.lots,
                price,
                held.num_seconds(),
                order.comment
            );
        }
        Reply::Filled(Fill {
            ticket: Some(ticket),
            price: Some(price),
        })
    }

    /// Open positions, marked to market.
    pub fn positions(&self) -> Vec<Position> {
        self.positions
            .iter()
            .map(|(ticket, order)| Position {
                ticket: *ticket,
                side: order.side,
                lots: order.lots,
                open_price: order.open_price,
                profit: self.profit(order),
                tag: Some(order.tag),
                symbol: Some(self.symbol.clone()),
            })
            .collect()
    }

    fn profit(&self, order: &OpenOrder) -> Decimal {
        let moved = match order.side {
            Side::Buy => self.quote.bid - order.open_price,
            Side::Sell => order.open_price - self.quote.ask,
        };
        (moved * order.lots * self.contract_multiplier)
            .round_dp(2)
            .normalize()
    }

    fn check_symbol(&self, symbol: &str) -> Result<(), Reply> {
        if symbol.eq_ignore_ascii_case(&self.symbol) {
            Ok(())
        } else {
            Err(Reply::Rejected(format!("ERROR|4106|unknown symbol {}", symbol)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn book() -> PaperBook {
        let quote = Quote::new(dec!(1979), dec!(1979.5)).unwrap();
        PaperBook::new("ETHUSD", quote, 777, dec!(100))
    }

    fn filled(reply: Reply) -> Fill {
        match reply {
            Reply::Filled(fill) => fill,
            other => panic!("expected a fill, got {other:?}"),
        }
    }

    #[test]
    fn buy_fills_at_ask_and_is_listed_with_its_tag() {
        let mut book = book();
        let fill = filled(book.handle(Request::Open {
            side: Side::Buy,
            symbol: None,
            lots: dec!(0.01),
            tag: None,
            comment: String::new(),
        }));
        assert_eq!(fill.ticket, Some(FIRST_TICKET));
        assert_eq!(fill.price, Some(dec!(1979.5)));

        book.set_quote(Quote::new(dec!(2101), dec!(2103)).unwrap());
        let positions = book.positions();
        assert_eq!(positions.len(), 1);
        assert_eq!(positions[0].tag, Some(777));
        assert_eq!(positions[0].profit, dec!(121.50));
    }

    #[test]
    fn close_fills_at_bid_and_handles_partial_volume() {
        let mut book = book();
        let ticket = filled(book.open(Side::Buy, dec!(0.03), 1, String::new()))
            .ticket
            .unwrap();

        filled(book.close(ticket, dec!(0.01)));
        assert_eq!(book.positions()[0].lots, dec!(0.02));

        let fill = filled(book.close(ticket, dec!(0.02)));
        assert_eq!(fill.price, Some(dec!(1979)));
        assert!(book.positions().is_empty());
        assert_eq!(book.close(ticket, dec!(0.01)), Reply::Rejected(INVALID_TICKET.to_string()));
    }

    #[test]
    fn foreign_symbols_are_rejected() {
        let mut book = book();
        assert!(matches!(
            book.handle(Request::Rates {
                symbol: "ethusd".to_string()
            }),
            Reply::Quote(_)
        ));
        assert!(matches!(
            book.handle(Request::Rates {
                symbol: "BTCUSD".to_string()
            }),
            Reply::Rejected(_)
        ));
        let reply = book.handle(Request::Open {
            side: Side::Sell,
            symbol: Some("BTCUSD".to_string()),
            lots: dec!(1),
            tag: Some(1),
            comment: String::new(),
        });
        assert!(matches!(reply, Reply::Rejected(_)));
        assert!(book.positions().is_empty());
    }
}
