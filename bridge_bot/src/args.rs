//! Command-line arguments for the threshold bot.
//!
//! This module defines the CLI interface using `clap`. Values are checked by
//! `settings::Settings::from_args` before anything connects.
use std::path::PathBuf;

use bridge_common::net::{DEFAULT_HOST, PULL_PORT, PUSH_PORT};
use bridge_common::{Dialect, Tag};
use clap::Parser;
use rust_decimal::Decimal;

/// Parsed command-line arguments.
#[derive(Debug, Clone, Parser)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Bridge to the terminal: shared directory (`file`) or socket pair (`socket`).
    #[arg(long, value_enum, default_value_t = Dialect::File)]
    pub transport: Dialect,

    /// Directory shared with the terminal (file bridge).
    /// Defaults to the MT4 common files directory under Wine.
    #[arg(long)]
    pub bridge_dir: Option<PathBuf>,

    /// Terminal host (socket bridge).
    #[arg(long, default_value = DEFAULT_HOST)]
    pub host: String,

    /// Terminal port receiving commands (socket bridge).
    #[arg(long, default_value_t = PUSH_PORT)]
    pub push_port: u16,

    /// Terminal port publishing replies (socket bridge).
    #[arg(long, default_value_t = PULL_PORT)]
    pub pull_port: u16,

    /// Symbol name in the terminal.
    #[arg(long, default_value = "ETHUSD")]
    pub symbol: String,

    /// Lot size of every order.
    #[arg(long, default_value = "0.01")]
    pub lots: Decimal,

    /// Buy when the ask drops to this price.
    #[arg(long, default_value = "1980")]
    pub buy_price: Decimal,

    /// Sell when the bid rises to this price.
    #[arg(long, default_value = "2100")]
    pub sell_price: Decimal,

    /// Magic number identifying the bot's orders.
    #[arg(long, default_value_t = 777)]
    pub magic: Tag,

    /// Comment attached to entry orders.
    #[arg(long, default_value = "threshold-bot")]
    pub comment: String,

    /// Seconds between two polls.
    #[arg(long, default_value_t = 5)]
    pub interval_secs: u64,

    /// Reply deadline in milliseconds (default: 10000 for file, 5000 for socket).
    #[arg(long)]
    pub timeout_ms: Option<u64>,

    /// Reply file polling period in milliseconds (file bridge).
    #[arg(long, default_value_t = 200)]
    pub poll_ms: u64,

    /// Delay before reading a detected reply file, in milliseconds (file bridge).
    #[arg(long, default_value_t = 100)]
    pub settle_ms: u64,

    /// Connection deadline in milliseconds (socket bridge).
    #[arg(long, default_value_t = 2000)]
    pub connect_timeout_ms: u64,

    /// Units per lot, used for the profit estimate.
    #[arg(long, default_value = "100")]
    pub contract_multiplier: Decimal,
}
