//! Threshold bot: buys when the ask touches the entry price and sells when the
//! bid touches the exit price, one position at a time.
//!
//! Usage example (CLI):
//! ```bash
//! bridge_bot --transport socket --host 192.168.0.10 --buy-price 1980 --sell-price 2100
//! bridge_bot --transport file --bridge-dir "/path/to/Common/Files"
//! ```
//!
//! Startup reconciles with the terminal, then the bot polls until Ctrl+C or
//! SIGTERM. No state is written to disk.
use bridge_bot::args::Args;
use bridge_bot::client::BridgeClient;
use bridge_bot::settings::Settings;
use bridge_bot::trader::Trader;
use bridge_common::BridgeError;
use bridge_common::Result;
use clap::Parser;
use log::info;

fn main() -> Result<(), BridgeError> {
    init_logger();
    let args = Args::parse();
    let settings = Settings::from_args(args)?;
    settings.log_summary();

    let transport = settings.transport.connect()?;

    let (stop_tx, stop_rx) = crossbeam_channel::unbounded::<()>();
    ctrlc::set_handler(move || {
        info!("Shutting down...");
        let _ = stop_tx.send(());
    })
    .map_err(|e| BridgeError::Config(format!("cannot install the Ctrl+C handler: {}", e)))?;

    let client = BridgeClient::new(transport, settings.timeout);
    let mut trader = Trader::new(client, settings.strategy);
    trader.run(&stop_rx, settings.interval);
    trader.shutdown();

    info!("Bot stopped.");
    Ok(())
}

fn init_logger() {
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();
}
