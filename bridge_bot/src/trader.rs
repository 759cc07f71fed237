//! Threshold strategy driven by a fixed-interval poll loop.
//!
//! The trader is either `Flat` or `Long` one ticket. Each tick fetches one
//! quote and acts at most once:
//!
//! | state | condition        | action      |
//! |-------|------------------|-------------|
//! | Flat  | ask <= buy price | open BUY    |
//! | Long  | bid >= sell price| close ticket|
//!
//! The state is never trusted across restarts: it is rebuilt from the orders
//! the terminal reports under the bot's tag. The same reconciliation runs
//! whenever the terminal contradicts the local view (an acknowledged BUY
//! without ticket, a rejected close, an open that went unanswered).
use std::time::Duration;

use bridge_common::{Position, Side, Tag, Ticket};
use crossbeam_channel::{Receiver, RecvTimeoutError, TryRecvError};
use log::{debug, info, warn};
use rust_decimal::Decimal;

use crate::client::{BridgeClient, OpenPositions, OrderOutcome};
use crate::transport::Transport;

/// Fixed parameters of the threshold rule.
#[derive(Debug, Clone)]
pub struct Strategy {
    /// Instrument traded.
    pub symbol: String,
    /// Volume of every order.
    pub lots: Decimal,
    /// Entry when the ask touches this price.
    pub buy_price: Decimal,
    /// Exit when the bid touches this price.
    pub sell_price: Decimal,
    /// Magic number scoping the bot's own orders.
    pub tag: Tag,
    /// Comment attached to entry orders.
    pub comment: String,
    /// Units of the instrument per lot.
    pub contract_multiplier: Decimal,
}

impl Strategy {
    /// Profit of one round trip at the configured thresholds, `None` on
    /// arithmetic overflow.
    pub fn estimated_profit(&self) -> Option<Decimal> {
        self.sell_price
            .checked_sub(self.buy_price)?
            .checked_mul(self.lots)?
            .checked_mul(self.contract_multiplier)
    }
}

/// Local view of the bot's exposure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradingState {
    /// No position.
    Flat,
    /// One BUY position held.
    Long {
        /// Terminal ticket of the held position.
        ticket: Ticket,
    },
}

impl TradingState {
    /// Whether a position is held.
    pub fn holding(&self) -> bool {
        matches!(self, TradingState::Long { .. })
    }

    /// Ticket of the held position.
    pub fn ticket(&self) -> Option<Ticket> {
        match self {
            TradingState::Flat => None,
            TradingState::Long { ticket } => Some(*ticket),
        }
    }
}

/// What a single tick did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// No usable quote; nothing happened.
    NoQuote,
    /// Flat and the ask is above the entry price.
    Waiting {
        /// Ask seen this tick.
        ask: Decimal,
    },
    /// Long and the bid is below the exit price.
    Holding {
        /// Bid seen this tick.
        bid: Decimal,
    },
    /// Entry filled.
    Opened {
        /// Ticket of the new position.
        ticket: Ticket,
    },
    /// Entry acknowledged but its ticket could not be recovered yet.
    OpenUnconfirmed,
    /// Entry rejected or unanswered.
    OpenFailed,
    /// Exit filled.
    Closed {
        /// Ticket that was closed.
        ticket: Ticket,
        /// Estimated profit of the round trip.
        profit: Option<Decimal>,
    },
    /// Exit rejected or unanswered; still long.
    CloseFailed,
    /// The tick ended by re-deriving the state from the terminal.
    Reconciled(TradingState),
}

/// Poll-loop owner of the trading state.
pub struct Trader<T: Transport> {
    client: BridgeClient<T>,
    strategy: Strategy,
    state: TradingState,
    /// Set while the local state may disagree with the terminal.
    reconcile_pending: bool,
}

impl<T: Transport> Trader<T> {
    /// Creates a trader that starts flat and reconciles before its first entry.
    pub fn new(client: BridgeClient<T>, strategy: Strategy) -> Self {
        Trader {
            client,
            strategy,
            state: TradingState::Flat,
            reconcile_pending: true,
        }
    }

    /// Current state.
    pub fn state(&self) -> TradingState {
        self.state
    }

    /// Rebuilds the state from the open orders carrying the bot's tag.
    ///
    /// Only BUY positions on the strategy's symbol count. One of them means
    /// `Long`; with several, the lowest ticket is tracked so no further entry
    /// is made while they are open. None means `Flat`. When the terminal
    /// cannot be asked the current state is kept and the reconciliation stays
    /// pending.
    pub fn reconcile(&mut self) -> TradingState {
        let report = self.client.list_open_positions(Some(self.strategy.tag));
        let derived = match report {
            OpenPositions::Faulted => {
                warn!(
                    "Could not list open orders; keeping {:?} until the terminal answers",
                    self.state
                );
                self.reconcile_pending = true;
                return self.state;
            }
            OpenPositions::Empty => TradingState::Flat,
            OpenPositions::Positions(positions) => self.derive_state(&positions),
        };
        if derived != self.state {
            info!("Reconciled state: {:?} -> {:?}", self.state, derived);
        }
        self.state = derived;
        self.reconcile_pending = false;
        self.state
    }

    fn derive_state(&self, positions: &[Position]) -> TradingState {
        let symbol = &self.strategy.symbol;
        let mut buys: Vec<&Position> = positions
            .iter()
            .filter(|p| p.side == Side::Buy)
            .filter(|p| {
                let mine = p.matches_symbol(symbol);
                if !mine {
                    debug!("Ignoring ticket {} on {:?}", p.ticket, p.symbol);
                }
                mine
            })
            .collect();
        buys.sort_by_key(|p| p.ticket);
        let Some(position) = buys.first() else {
            return TradingState::Flat;
        };
        if buys.len() > 1 {
            warn!(
                "{} BUY positions on {} carry tag {}; tracking ticket {} only",
                buys.len(),
                symbol,
                self.strategy.tag,
                position.ticket
            );
        }
        info!(
            "Found existing BUY position: ticket={} lots={} open={} profit={}",
            position.ticket, position.lots, position.open_price, position.profit
        );
        TradingState::Long {
            ticket: position.ticket,
        }
    }

    /// Runs one poll: quote, decision, at most one order.
    ///
    /// Bridge faults are absorbed by the client, so a tick always completes.
    pub fn tick(&mut self) -> TickOutcome {
        let Some(quote) = self.client.get_quote(&self.strategy.symbol) else {
            warn!("Failed to get prices for {}, retrying next tick", self.strategy.symbol);
            return TickOutcome::NoQuote;
        };
        debug!("{} bid={} ask={}", self.strategy.symbol, quote.bid, quote.ask);
        match self.state {
            TradingState::Flat => self.tick_flat(quote.ask),
            TradingState::Long { ticket } => self.tick_long(ticket, quote.bid),
        }
    }

    fn tick_flat(&mut self, ask: Decimal) -> TickOutcome {
        let buy_price = self.strategy.buy_price;
        if ask > buy_price {
            info!("Waiting to BUY... Ask={} (target <= {})", ask, buy_price);
            return TickOutcome::Waiting { ask };
        }
        info!("BUY SIGNAL! Ask={} <= {}", ask, buy_price);

        if self.reconcile_pending {
            let state = self.reconcile();
            if self.reconcile_pending || state.holding() {
                return TickOutcome::Reconciled(state);
            }
        }

        let outcome = self.client.open_position(
            Side::Buy,
            &self.strategy.symbol,
            self.strategy.lots,
            self.strategy.tag,
            &self.strategy.comment,
        );
        match outcome {
            OrderOutcome::Filled(fill) => match fill.ticket {
                Some(ticket) => {
                    info!("BUY filled: ticket={} price={:?}", ticket, fill.price);
                    self.state = TradingState::Long { ticket };
                    TickOutcome::Opened { ticket }
                }
                None => {
                    info!("BUY acknowledged without ticket, looking it up in open orders");
                    match self.reconcile() {
                        TradingState::Long { ticket } => TickOutcome::Opened { ticket },
                        TradingState::Flat => {
                            warn!("Ticket of the new BUY not found; re-checking before any new entry");
                            self.reconcile_pending = true;
                            TickOutcome::OpenUnconfirmed
                        }
                    }
                }
            },
            OrderOutcome::Rejected(_) => {
                warn!("BUY order FAILED");
                TickOutcome::OpenFailed
            }
            OrderOutcome::NoResponse => {
                warn!("BUY order FAILED; it may still have executed, re-checking before retrying");
                self.reconcile_pending = true;
                TickOutcome::OpenFailed
            }
        }
    }

    fn tick_long(&mut self, ticket: Ticket, bid: Decimal) -> TickOutcome {
        let sell_price = self.strategy.sell_price;
        if bid < sell_price {
            info!("Holding position... Bid={} (target >= {})", bid, sell_price);
            return TickOutcome::Holding { bid };
        }
        info!("SELL SIGNAL! Bid={} >= {}", bid, sell_price);

        match self.client.close_position(ticket, self.strategy.lots) {
            OrderOutcome::Filled(fill) => {
                info!("Position closed: ticket={} price={:?}", ticket, fill.price);
                let profit = self.strategy.estimated_profit();
                match profit {
                    Some(profit) => info!("Estimated profit: ~${:.2}", profit),
                    None => warn!("Estimated profit overflowed"),
                }
                self.state = TradingState::Flat;
                TickOutcome::Closed { ticket, profit }
            }
            OrderOutcome::Rejected(_) => {
                warn!("CLOSE order FAILED, checking whether ticket {} still exists", ticket);
                match self.reconcile() {
                    TradingState::Long { ticket: held } if held == ticket => TickOutcome::CloseFailed,
                    other => TickOutcome::Reconciled(other),
                }
            }
            OrderOutcome::NoResponse => {
                warn!("CLOSE order FAILED");
                TickOutcome::CloseFailed
            }
        }
    }

    /// Reconciles, then ticks every `interval` until `stop` fires or its
    /// sender goes away. An in-flight exchange always completes first.
    pub fn run(&mut self, stop: &Receiver<()>, interval: Duration) {
        info!(
            "Bot started: BUY at {}, SELL at {}",
            self.strategy.buy_price, self.strategy.sell_price
        );
        info!(
            "Symbol: {}, Lot: {}, Magic: {}",
            self.strategy.symbol, self.strategy.lots, self.strategy.tag
        );
        self.reconcile();

        loop {
            match stop.try_recv() {
                Ok(()) | Err(TryRecvError::Disconnected) => break,
                Err(TryRecvError::Empty) => {}
            }
            let outcome = self.tick();
            debug!("Tick: {:?}, state {:?}", outcome, self.state);
            match stop.recv_timeout(interval) {
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                Err(RecvTimeoutError::Timeout) => {}
            }
        }
        info!("Stop requested, leaving the poll loop");
    }

    /// Releases the bridge.
    pub fn shutdown(&mut self) {
        self.client.shutdown();
    }
}
