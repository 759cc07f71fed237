//! Validated runtime settings derived from [`Args`].
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use bridge_common::net::default_bridge_dir;
use bridge_common::{BridgeError, Dialect, Result};
use log::info;
use rust_decimal::Decimal;

use crate::args::Args;
use crate::trader::Strategy;
use crate::transport::{FileHandoff, HandoffTiming, SocketPair, SocketPairEndpoint, Transport};

/// Reply deadline of the file bridge unless overridden.
pub const FILE_TIMEOUT: Duration = Duration::from_secs(10);
/// Reply deadline of the socket bridge unless overridden.
pub const SOCKET_TIMEOUT: Duration = Duration::from_secs(5);

/// How to reach the terminal.
#[derive(Debug, Clone)]
pub enum TransportSettings {
    /// Shared directory handoff.
    File {
        /// Directory shared with the terminal.
        dir: PathBuf,
        /// Reply polling cadence.
        timing: HandoffTiming,
    },
    /// Push/pull socket pair.
    Socket(SocketPairEndpoint),
}

impl TransportSettings {
    /// Establishes the bridge; an unreachable terminal is an error, not a retry.
    pub fn connect(&self) -> Result<Box<dyn Transport>> {
        Ok(match self {
            TransportSettings::File { dir, timing } => Box::new(FileHandoff::connect(dir, *timing)?),
            TransportSettings::Socket(endpoint) => Box::new(SocketPair::connect(endpoint.clone())?),
        })
    }
}

/// Everything the bot needs to run.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Bridge selection and endpoint.
    pub transport: TransportSettings,
    /// Threshold rule.
    pub strategy: Strategy,
    /// Pause between two ticks.
    pub interval: Duration,
    /// Reply deadline of every exchange.
    pub timeout: Duration,
}

impl Settings {
    /// Checks `args` and resolves defaults.
    pub fn from_args(args: Args) -> Result<Settings> {
        let symbol = args.symbol.trim().to_string();
        if symbol.is_empty() || symbol.contains(['|', ' ', '\n']) {
            return Err(config(format!("invalid symbol {:?}", args.symbol)));
        }
        if args.comment.contains(['|', '\n', '\r']) {
            return Err(config(format!("comment {:?} may not contain '|' or line breaks", args.comment)));
        }
        if args.lots <= Decimal::ZERO {
            return Err(config(format!("lot size must be positive, got {}", args.lots)));
        }
        if args.buy_price <= Decimal::ZERO || args.buy_price >= args.sell_price {
            return Err(config(format!(
                "need 0 < buy price < sell price, got buy {} sell {}",
                args.buy_price, args.sell_price
            )));
        }
        if args.contract_multiplier <= Decimal::ZERO {
            return Err(config("contract multiplier must be positive".to_string()));
        }
        if args.interval_secs == 0 {
            return Err(config("poll interval must be at least one second".to_string()));
        }

        let timeout = match (args.timeout_ms, args.transport) {
            (Some(0), _) => return Err(config("reply timeout must be positive".to_string())),
            (Some(ms), _) => Duration::from_millis(ms),
            (None, Dialect::File) => FILE_TIMEOUT,
            (None, Dialect::Socket) => SOCKET_TIMEOUT,
        };

        let transport = match args.transport {
            Dialect::File => {
                if args.poll_ms == 0 {
                    return Err(config("reply polling period must be positive".to_string()));
                }
                let dir = match args.bridge_dir {
                    Some(dir) => dir,
                    None => wine_common_dir()?,
                };
                TransportSettings::File {
                    dir,
                    timing: HandoffTiming {
                        poll_interval: Duration::from_millis(args.poll_ms),
                        settle_delay: Duration::from_millis(args.settle_ms),
                    },
                }
            }
            Dialect::Socket => {
                if args.push_port == args.pull_port {
                    return Err(config(format!(
                        "push and pull ports must differ, both are {}",
                        args.push_port
                    )));
                }
                TransportSettings::Socket(SocketPairEndpoint {
                    host: args.host.trim().to_string(),
                    push_port: args.push_port,
                    pull_port: args.pull_port,
                    connect_timeout: Duration::from_millis(args.connect_timeout_ms.max(1)),
                })
            }
        };

        Ok(Settings {
            transport,
            strategy: Strategy {
                symbol,
                lots: args.lots,
                buy_price: args.buy_price,
                sell_price: args.sell_price,
                tag: args.magic,
                comment: args.comment,
                contract_multiplier: args.contract_multiplier,
            },
            interval: Duration::from_secs(args.interval_secs),
            timeout,
        })
    }

    /// Logs the effective configuration.
    pub fn log_summary(&self) {
        match &self.transport {
            TransportSettings::File { dir, .. } => info!("Transport: file bridge in {}", dir.display()),
            TransportSettings::Socket(endpoint) => info!(
                "Transport: socket bridge {} (push {}, pull {})",
                endpoint.host, endpoint.push_port, endpoint.pull_port
            ),
        }
        info!(
            "Poll every {:?}, reply timeout {:?}",
            self.interval, self.timeout
        );
    }
}

fn wine_common_dir() -> Result<PathBuf> {
    let home = env::var_os("HOME")
        .ok_or_else(|| config("HOME is not set; pass --bridge-dir".to_string()))?;
    let user = env::var("USER").unwrap_or_else(|_| "root".to_string());
    Ok(default_bridge_dir(Path::new(&home), &user))
}

fn config(message: String) -> BridgeError {
    BridgeError::Config(message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use rust_decimal_macros::dec;

    fn parse(extra: &[&str]) -> Result<Settings> {
        let mut argv = vec!["bridge_bot", "--bridge-dir", "/tmp/bridge"];
        argv.extend_from_slice(extra);
        Settings::from_args(Args::try_parse_from(argv).unwrap())
    }

    #[test]
    fn defaults_match_the_reference_setup() {
        let settings = parse(&[]).unwrap();
        assert_eq!(settings.strategy.symbol, "ETHUSD");
        assert_eq!(settings.strategy.lots, dec!(0.01));
        assert_eq!(settings.strategy.buy_price, dec!(1980));
        assert_eq!(settings.strategy.sell_price, dec!(2100));
        assert_eq!(settings.strategy.tag, 777);
        assert_eq!(settings.interval, Duration::from_secs(5));
        assert_eq!(settings.timeout, FILE_TIMEOUT);
        assert!(matches!(settings.transport, TransportSettings::File { .. }));
    }

    #[test]
    fn socket_transport_uses_its_own_deadline() {
        let settings = parse(&["--transport", "socket"]).unwrap();
        assert_eq!(settings.timeout, SOCKET_TIMEOUT);
        let TransportSettings::Socket(endpoint) = settings.transport else {
            panic!("expected socket settings");
        };
        assert_eq!((endpoint.push_port, endpoint.pull_port), (32768, 32769));
    }

    #[test]
    fn rejects_inverted_thresholds() {
        let result = parse(&["--buy-price", "2100", "--sell-price", "1980"]);
        assert!(matches!(result, Err(BridgeError::Config(_))));
    }

    #[test]
    fn rejects_unusable_values() {
        for bad in [
            &["--lots", "0"][..],
            &["--interval-secs", "0"],
            &["--timeout-ms", "0"],
            &["--comment", "a|b"],
            &["--symbol", " "],
            &["--transport", "socket", "--pull-port", "32768"],
        ] {
            assert!(
                matches!(parse(bad), Err(BridgeError::Config(_))),
                "accepted {:?}",
                bad
            );
        }
    }
}
