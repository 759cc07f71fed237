//! Market-side domain types observed through the bridge.
//!
//! Everything here is owned by the external terminal; the bot only reads
//! snapshots of it:
//! - `Quote`: bid/ask for one symbol at one instant.
//! - `Position`: an open order as reported by the terminal.
//! - `Fill`: the terminal's answer to a successful open or close.
use std::str::FromStr;

use rust_decimal::Decimal;
use strum_macros::{Display, EnumString};

/// Terminal identifier of one open position.
pub type Ticket = u64;

/// Magic number attached to the orders a bot opens.
pub type Tag = u32;

/// Order direction. The wire code follows the terminal: `0 = BUY`, `1 = SELL`.
#[allow(missing_docs)]
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString,
)]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    /// Numeric order type used on the wire.
    pub fn code(self) -> u8 {
        match self {
            Side::Buy => 0,
            Side::Sell => 1,
        }
    }

    /// Maps a wire order type back to a market side. Pending order types
    /// (limit/stop codes 2..=5) are not positions and yield `None`.
    pub fn from_code(code: i64) -> Option<Side> {
        match code {
            0 => Some(Side::Buy),
            1 => Some(Side::Sell),
            _ => None,
        }
    }
}

/// Bid/ask snapshot for one symbol.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quote {
    pub bid: Decimal,
    pub ask: Decimal,
}

impl Quote {
    /// Builds a quote, refusing non-positive prices.
    ///
    /// A crossed book (`bid > ask`) is accepted as reported; the terminal is
    /// the authority on its own prices.
    pub fn new(bid: Decimal, ask: Decimal) -> Option<Quote> {
        if bid <= Decimal::ZERO || ask <= Decimal::ZERO {
            return None;
        }
        Some(Quote { bid, ask })
    }
}

/// An open position as reported by the terminal.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Position {
    pub ticket: Ticket,
    pub side: Side,
    pub lots: Decimal,
    pub open_price: Decimal,
    pub profit: Decimal,
    /// `None` when the terminal listed the order without a tag field.
    pub tag: Option<Tag>,
    /// `None` when the listing carries no symbol (file dialect).
    pub symbol: Option<String>,
}

impl Position {
    /// Whether this position belongs to the bot identified by `tag`.
    ///
    /// Untagged entries pass: terminals that omit the tag only list the
    /// caller's own orders.
    pub fn matches_tag(&self, tag: Tag) -> bool {
        self.tag.is_none_or(|own| own == tag)
    }

    /// Whether this position is on `symbol`. Entries listed without a symbol
    /// pass, like untagged ones.
    pub fn matches_symbol(&self, symbol: &str) -> bool {
        self.symbol
            .as_deref()
            .is_none_or(|own| own.eq_ignore_ascii_case(symbol))
    }
}

/// Result of a successful open or close.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Fill {
    /// Missing when the terminal acknowledged without echoing a ticket.
    pub ticket: Option<Ticket>,
    /// Execution price, when reported.
    pub price: Option<Decimal>,
}

/// Lenient decimal parsing used by every decoder: surrounding whitespace is
/// ignored and scientific notation is accepted.
pub fn parse_decimal(raw: &str) -> Option<Decimal> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    Decimal::from_str(raw)
        .or_else(|_| Decimal::from_scientific(raw))
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn parses_plain_and_scientific_decimals() {
        assert_eq!(parse_decimal(" 1979.5 "), Some(dec!(1979.5)));
        assert_eq!(parse_decimal("1.2e3"), Some(dec!(1200)));
        assert_eq!(parse_decimal(""), None);
        assert_eq!(parse_decimal("abc"), None);
    }

    #[test]
    fn side_codes_cover_market_orders_only() {
        assert_eq!(Side::from_code(0), Some(Side::Buy));
        assert_eq!(Side::from_code(1), Some(Side::Sell));
        assert_eq!(Side::from_code(4), None);
        assert_eq!(Side::Sell.code(), 1);
        assert_eq!("buy".parse::<Side>().ok(), Some(Side::Buy));
        assert_eq!(Side::Buy.to_string(), "BUY");
    }

    #[test]
    fn quote_rejects_non_positive_prices() {
        assert!(Quote::new(dec!(0), dec!(1)).is_none());
        assert!(Quote::new(dec!(1), dec!(-1)).is_none());
        assert!(Quote::new(dec!(1985), dec!(1982)).is_some());
    }

    #[test]
    fn unlabelled_positions_match_any_tag_or_symbol() {
        let mut position = Position {
            ticket: 1,
            side: Side::Buy,
            lots: dec!(0.01),
            open_price: dec!(1975),
            profit: dec!(0),
            tag: None,
            symbol: None,
        };
        assert!(position.matches_tag(777));
        assert!(position.matches_symbol("ETHUSD"));
        position.tag = Some(778);
        assert!(!position.matches_tag(777));
        position.symbol = Some("ethusd".to_string());
        assert!(position.matches_symbol("ETHUSD"));
        position.symbol = Some("BTCUSD".to_string());
        assert!(!position.matches_symbol("ETHUSD"));
    }
}
