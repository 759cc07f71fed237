//! Protocol types shared by the threshold bot and the paper terminal.
//!
//! This crate aggregates:
//! - `error`: unified error type `BridgeError` used across the workspace.
//! - `result`: handy `Result<T, BridgeError>` alias.
//! - `market`: quotes, positions, fills and order sides.
//! - `command`: outbound commands and their per-dialect spelling.
//! - `reply`: terminal replies, their encoding and defensive decoding.
//! - `net`: endpoint constants and handoff file helpers.
#![warn(missing_docs)]
pub mod error;
pub mod result;
pub mod market;
pub mod command;
pub mod reply;
pub mod net;

pub use error::BridgeError;
pub use result::Result;
pub use command::{Command, Dialect};
pub use market::{Fill, Position, Quote, Side, Tag, Ticket};
pub use reply::Reply;
