//! Threshold bot trading one symbol through a bridge to an external terminal.
//!
//! Layers, leaves first:
//! - `transport`: file-handoff and socket-pair request/response channels.
//! - `client`: quote, open, close and list operations; absorbs bridge faults.
//! - `trader`: the Flat/Long state machine and its poll loop.
//! - `args` / `settings`: command line and its validation.
#![warn(missing_docs)]
pub mod args;
pub mod client;
pub mod settings;
pub mod trader;
pub mod transport;

pub use client::{BridgeClient, OpenPositions, OrderOutcome};
pub use trader::{Strategy, TickOutcome, Trader, TradingState};
