//! Paper terminal for dry runs of the threshold bot.
//!
//! Usage example (CLI):
//! ```bash
//! bridge_terminal --mode socket --start-price 1990 --spread 0.5
//! bridge_terminal --mode file --bridge-dir /tmp/bridge --tick-ms 250
//! ```
//!
//! Runs until Ctrl+C or SIGTERM.
use std::time::Duration;

use bridge_common::{BridgeError, Dialect, Result};
use bridge_terminal::args::Args;
use bridge_terminal::feed::{PriceFeed, quote_around};
use bridge_terminal::{FileTerminal, PaperBook, SocketTerminal};
use clap::Parser;
use log::info;

fn main() -> Result<(), BridgeError> {
    init_logger();
    let args = Args::parse();

    let quote = quote_around(args.start_price, args.spread).ok_or_else(|| {
        BridgeError::Config(format!(
            "start price {} leaves no positive bid with spread {}",
            args.start_price, args.spread
        ))
    })?;
    let book = PaperBook::new(&args.symbol, quote, args.magic, args.contract_multiplier).shared();
    info!("Quoting {} at {}|{}", args.symbol, quote.bid, quote.ask);

    let (stop_tx, stop_rx) = crossbeam_channel::unbounded::<()>();
    ctrlc::set_handler(move || {
        info!("Shutting down...");
        let _ = stop_tx.send(());
    })
    .map_err(|e| BridgeError::Config(format!("cannot install the Ctrl+C handler: {}", e)))?;

    let feed = PriceFeed::start(book.clone(), args.spread, Duration::from_millis(args.tick_ms));
    match args.mode {
        Dialect::File => {
            FileTerminal::new(&args.bridge_dir, book)?.serve(&stop_rx, Duration::from_millis(args.poll_ms))
        }
        Dialect::Socket => {
            SocketTerminal::bind(&args.host, args.push_port, args.pull_port, book)?.serve(&stop_rx)?
        }
    }
    feed.stop();

    info!("Terminal stopped.");
    Ok(())
}

fn init_logger() {
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();
}
