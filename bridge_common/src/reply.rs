//! Terminal replies: encoding on the terminal side, defensive decoding on the
//! bot side.
//!
//! Replies are untrusted text written by another process. Every decoder
//! returns an explicit `Result`: `BridgeError::Rejected` for a well-formed
//! error answer, `BridgeError::Malformed` for anything that cannot be read.
//! Missing fields, extra fields and non-numeric values never panic.
//!
//! File dialect:
//! - quote (price file): `<bid>|<ask>`
//! - order: `OK|<ticket>|<price>`, any other text is the terminal's error
//! - orders: `NONE`, or `<ticket>|<type>|<lots>|<open_price>|<profit>[|<tag>]`
//!   entries joined by `;`
//!
//! Socket dialect: one JSON object per reply, see [`Reply::encode`].
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::command::{DELIMITER, Dialect};
use crate::error::BridgeError;
use crate::market::{Fill, Position, Quote, Side, Tag, Ticket, parse_decimal};
use crate::result::Result;

/// Success token of the file dialect.
pub const OK: &str = "OK";
/// File dialect answer to `ORDERS` when nothing is open.
pub const NO_ORDERS: &str = "NONE";
/// Separator between order entries.
pub const ORDER_SEPARATOR: char = ';';

/// Typed reply produced by a terminal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Answer to a quote request.
    Quote(Quote),
    /// Successful open or close.
    Filled(Fill),
    /// Well-formed refusal with the terminal's message.
    Rejected(String),
    /// Answer to an open-orders request.
    Positions(Vec<Position>),
}

/// JSON shape of one order in the socket dialect.
#[derive(Debug, Serialize)]
struct WireOrder {
    ticket: Ticket,
    #[serde(rename = "type")]
    kind: u8,
    lots: Decimal,
    open_price: Decimal,
    profit: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    magic: Option<Tag>,
    #[serde(skip_serializing_if = "Option::is_none")]
    symbol: Option<String>,
}

impl From<&Position> for WireOrder {
    fn from(position: &Position) -> Self {
        WireOrder {
            ticket: position.ticket,
            kind: position.side.code(),
            lots: position.lots,
            open_price: position.open_price,
            profit: position.profit,
            magic: position.tag,
            symbol: position.symbol.clone(),
        }
    }
}

impl Reply {
    /// Spells the reply for `dialect`.
    ///
    /// Socket replies are single-line JSON objects: `{"bid","ask"}`,
    /// `{"ticket","price"}`, `{"error"}` or `{"orders":[…]}`.
    pub fn encode(&self, dialect: Dialect) -> Result<String> {
        match dialect {
            Dialect::File => Ok(self.encode_pipe()),
            Dialect::Socket => Ok(serde_json::to_string(&self.to_json()?)?),
        }
    }

    fn encode_pipe(&self) -> String {
        let sep = DELIMITER.to_string();
        match self {
            Reply::Quote(quote) => format!("{}{sep}{}", quote.bid, quote.ask),
            Reply::Filled(fill) => {
                let mut fields = vec![OK.to_string()];
                if let Some(ticket) = fill.ticket {
                    fields.push(ticket.to_string());
                    if let Some(price) = fill.price {
                        fields.push(price.to_string());
                    }
                }
                fields.join(sep.as_str())
            }
            Reply::Rejected(message) => message.clone(),
            Reply::Positions(positions) if positions.is_empty() => NO_ORDERS.to_string(),
            Reply::Positions(positions) => positions
                .iter()
                .map(|p| {
                    let mut fields = vec![
                        p.ticket.to_string(),
                        p.side.code().to_string(),
                        p.lots.to_string(),
                        p.open_price.to_string(),
                        p.profit.to_string(),
                    ];
                    if let Some(tag) = p.tag {
                        fields.push(tag.to_string());
                    }
                    fields.join(sep.as_str())
                })
                .collect::<Vec<_>>()
                .join(ORDER_SEPARATOR.to_string().as_str()),
        }
    }

    fn to_json(&self) -> Result<Value> {
        let mut object = Map::new();
        match self {
            Reply::Quote(quote) => {
                object.insert("bid".into(), serde_json::to_value(quote.bid)?);
                object.insert("ask".into(), serde_json::to_value(quote.ask)?);
            }
            Reply::Filled(fill) => {
                if let Some(ticket) = fill.ticket {
                    object.insert("ticket".into(), Value::from(ticket));
                }
                if let Some(price) = fill.price {
                    object.insert("price".into(), serde_json::to_value(price)?);
                }
            }
            Reply::Rejected(message) => {
                object.insert("error".into(), Value::from(message.as_str()));
            }
            Reply::Positions(positions) => {
                let orders: Vec<WireOrder> = positions.iter().map(WireOrder::from).collect();
                object.insert("orders".into(), serde_json::to_value(orders)?);
            }
        }
        Ok(Value::Object(object))
    }
}

/// Decodes a bid/ask reply (or price file snapshot).
pub fn decode_quote(payload: &str, dialect: Dialect) -> Result<Quote> {
    let (bid, ask) = match dialect {
        Dialect::File => {
            let mut fields = payload.trim().split(DELIMITER);
            (
                fields.next().and_then(parse_decimal),
                fields.next().and_then(parse_decimal),
            )
        }
        Dialect::Socket => {
            let object = json_object(payload)?;
            rejection(&object)?;
            (decimal_field(&object, "bid"), decimal_field(&object, "ask"))
        }
    };
    match (bid, ask) {
        (Some(bid), Some(ask)) => Quote::new(bid, ask)
            .ok_or_else(|| malformed("non-positive price in quote", payload)),
        _ => Err(malformed("quote needs numeric bid and ask", payload)),
    }
}

/// Decodes the answer to an open or close command.
pub fn decode_order(payload: &str, dialect: Dialect) -> Result<Fill> {
    let trimmed = payload.trim();
    if trimmed.is_empty() {
        return Err(malformed("empty order reply", payload));
    }
    match dialect {
        Dialect::File => {
            let mut fields = trimmed.split(DELIMITER).map(str::trim);
            if fields.next() != Some(OK) {
                return Err(BridgeError::Rejected(trimmed.to_string()));
            }
            Ok(Fill {
                ticket: fields.next().and_then(|t| t.parse().ok()),
                price: fields.next().and_then(parse_decimal),
            })
        }
        Dialect::Socket => {
            let object = json_object(trimmed)?;
            rejection(&object)?;
            let fill = Fill {
                ticket: ticket_field(&object, "ticket"),
                price: decimal_field(&object, "price"),
            };
            if fill == Fill::default() {
                return Err(malformed("order reply has neither ticket nor price", payload));
            }
            Ok(fill)
        }
    }
}

/// Decodes the answer to an open-orders request.
///
/// Entries that cannot be read are skipped; pending (non-market) orders are
/// ignored. The whole reply is malformed only when it has entries and none of
/// them is readable.
pub fn decode_positions(payload: &str, dialect: Dialect) -> Result<Vec<Position>> {
    let trimmed = payload.trim();
    match dialect {
        Dialect::File => decode_pipe_orders(trimmed),
        Dialect::Socket => {
            let object = json_object(trimmed)?;
            rejection(&object)?;
            match object.get("orders") {
                Some(Value::Array(entries)) => collect_entries(
                    entries.iter().map(|entry| match entry {
                        Value::Object(order) => json_order(order),
                        _ => Err(()),
                    }),
                    trimmed,
                ),
                Some(Value::String(text)) => decode_pipe_orders(text.trim()),
                Some(Value::Null) => Ok(Vec::new()),
                _ => Err(malformed("missing orders field", payload)),
            }
        }
    }
}

fn decode_pipe_orders(text: &str) -> Result<Vec<Position>> {
    if text == NO_ORDERS {
        return Ok(Vec::new());
    }
    if text.is_empty() {
        return Err(malformed("empty orders reply", text));
    }
    collect_entries(
        text.split(ORDER_SEPARATOR)
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .map(pipe_order),
        text,
    )
}

/// Per-entry outcome: `Ok(None)` for a readable non-market order.
type EntryResult = std::result::Result<Option<Position>, ()>;

fn collect_entries(entries: impl Iterator<Item = EntryResult>, payload: &str) -> Result<Vec<Position>> {
    let mut positions = Vec::new();
    let mut readable = 0usize;
    let mut unreadable = 0usize;
    for entry in entries {
        match entry {
            Ok(position) => {
                readable += 1;
                positions.extend(position);
            }
            Err(()) => unreadable += 1,
        }
    }
    if unreadable > 0 && readable == 0 {
        return Err(malformed("no readable order entry", payload));
    }
    Ok(positions)
}

fn pipe_order(entry: &str) -> EntryResult {
    let fields: Vec<&str> = entry.split(DELIMITER).map(str::trim).collect();
    if fields.len() < 5 {
        return Err(());
    }
    let ticket: Ticket = fields[0].parse().map_err(|_| ())?;
    let kind: i64 = fields[1].parse().map_err(|_| ())?;
    let lots = parse_decimal(fields[2]).ok_or(())?;
    let open_price = parse_decimal(fields[3]).ok_or(())?;
    let profit = parse_decimal(fields[4]).ok_or(())?;
    let tag = match fields.get(5) {
        Some(raw) if !raw.is_empty() => Some(raw.parse::<Tag>().map_err(|_| ())?),
        _ => None,
    };
    Ok(Side::from_code(kind).map(|side| Position {
        ticket,
        side,
        lots,
        open_price,
        profit,
        tag,
        symbol: None,
    }))
}

fn json_order(order: &Map<String, Value>) -> EntryResult {
    let ticket = ticket_field(order, "ticket").ok_or(())?;
    let kind = integer_field(order, "type").ok_or(())?;
    let lots = decimal_field(order, "lots").ok_or(())?;
    let open_price = decimal_field(order, "open_price").ok_or(())?;
    let profit = decimal_field(order, "profit").unwrap_or(Decimal::ZERO);
    let tag = match order.get("magic") {
        None | Some(Value::Null) => None,
        Some(_) => Some(
            integer_field(order, "magic")
                .and_then(|m| Tag::try_from(m).ok())
                .ok_or(())?,
        ),
    };
    let symbol = match order.get("symbol") {
        None | Some(Value::Null) => None,
        Some(Value::String(symbol)) => Some(symbol.trim().to_string()),
        Some(_) => return Err(()),
    };
    Ok(Side::from_code(kind).map(|side| Position {
        ticket,
        side,
        lots,
        open_price,
        profit,
        tag,
        symbol,
    }))
}

fn json_object(payload: &str) -> Result<Map<String, Value>> {
    match serde_json::from_str::<Value>(payload.trim()) {
        Ok(Value::Object(object)) => Ok(object),
        Ok(_) => Err(malformed("expected a JSON object", payload)),
        Err(e) => Err(malformed(&format!("invalid JSON ({e})"), payload)),
    }
}

fn rejection(object: &Map<String, Value>) -> Result<()> {
    match object.get("error") {
        None | Some(Value::Null) => Ok(()),
        Some(Value::String(message)) => Err(BridgeError::Rejected(message.clone())),
        Some(other) => Err(BridgeError::Rejected(other.to_string())),
    }
}

fn decimal_field(object: &Map<String, Value>, name: &str) -> Option<Decimal> {
    match object.get(name)? {
        Value::Number(number) => parse_decimal(&number.to_string()),
        Value::String(text) => parse_decimal(text),
        _ => None,
    }
}

fn integer_field(object: &Map<String, Value>, name: &str) -> Option<i64> {
    match object.get(name)? {
        Value::Number(number) => number.as_i64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

fn ticket_field(object: &Map<String, Value>, name: &str) -> Option<Ticket> {
    integer_field(object, name).and_then(|t| Ticket::try_from(t).ok())
}

fn malformed(reason: &str, payload: &str) -> BridgeError {
    BridgeError::Malformed(format!("{reason}: {payload:?}"))
}
