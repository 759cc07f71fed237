//! Paper terminal: an in-memory stand-in for the trading terminal behind the
//! bridge.
//!
//! It quotes one symbol with a random-walk feed, fills market orders instantly
//! at the current quote and serves either bridge dialect. It exists for dry
//! runs of the bot and as the counterpart of the bot's integration tests.
#![warn(missing_docs)]
pub mod args;
pub mod book;
pub mod feed;
pub mod file_server;
pub mod request;
pub mod socket_server;

pub use book::{PaperBook, SharedBook};
pub use feed::PriceFeed;
pub use file_server::FileTerminal;
pub use socket_server::SocketTerminal;
