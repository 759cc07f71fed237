//! Command-line arguments for the paper terminal.
use std::path::PathBuf;

use bridge_common::net::{PULL_PORT, PUSH_PORT};
use bridge_common::{Dialect, Tag};
use clap::Parser;
use rust_decimal::Decimal;

/// Parsed command-line arguments.
#[derive(Debug, Clone, Parser)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Dialect to serve: shared directory (`file`) or socket pair (`socket`).
    #[arg(long, value_enum, default_value_t = Dialect::Socket)]
    pub mode: Dialect,

    /// Directory shared with the bot (file mode).
    #[arg(long, default_value = "bridge")]
    pub bridge_dir: PathBuf,

    /// Address to listen on (socket mode).
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,

    /// Port receiving commands (socket mode).
    #[arg(long, default_value_t = PUSH_PORT)]
    pub push_port: u16,

    /// Port publishing replies (socket mode).
    #[arg(long, default_value_t = PULL_PORT)]
    pub pull_port: u16,

    /// Quoted symbol.
    #[arg(long, default_value = "ETHUSD")]
    pub symbol: String,

    /// Initial mid price.
    #[arg(long, default_value = "2000")]
    pub start_price: Decimal,

    /// Distance between bid and ask.
    #[arg(long, default_value = "0.5")]
    pub spread: Decimal,

    /// Magic number given to orders that carry none (file mode).
    #[arg(long, default_value_t = 777)]
    pub magic: Tag,

    /// Units per lot, used to mark positions to market.
    #[arg(long, default_value = "100")]
    pub contract_multiplier: Decimal,

    /// Milliseconds between two price moves.
    #[arg(long, default_value_t = 500)]
    pub tick_ms: u64,

    /// Milliseconds between two looks at the command file (file mode).
    #[arg(long, default_value_t = 50)]
    pub poll_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn defaults_serve_the_socket_pair() {
        let args = Args::try_parse_from(["bridge_terminal"]).unwrap();
        assert_eq!(args.mode, Dialect::Socket);
        assert_eq!(args.push_port, PUSH_PORT);
        assert_eq!(args.spread, dec!(0.5));
    }

    #[test]
    fn file_mode_takes_a_directory() {
        let args =
            Args::try_parse_from(["bridge_terminal", "--mode", "file", "--bridge-dir", "/tmp/bridge"]).unwrap();
        assert_eq!(args.mode, Dialect::File);
        assert_eq!(args.bridge_dir, PathBuf::from("/tmp/bridge"));
    }
}
