//! Random-walk price feed.
//!
//! A background thread moves the mid price of the shared book by a small
//! random step on every tick and rebuilds the quote around it with a fixed
//! spread. The thread stops when [`PriceFeed::stop`] is called or the handle
//! is dropped.
use std::thread::{self, JoinHandle};
use std::time::Duration;

use bridge_common::{Quote, Result};
use crossbeam_channel::{Sender, select, unbounded};
use log::{debug, error, info};
use rand::Rng;
use rust_decimal::Decimal;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};

use crate::book::SharedBook;

/// Largest relative move of the mid price in one tick.
const MAX_STEP: f64 = 0.001;
/// Lowest mid price the walk may reach.
const FLOOR: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

/// Handle of the running feed thread.
pub struct PriceFeed {
    stop_tx: Sender<()>,
    handle: Option<JoinHandle<()>>,
}

impl PriceFeed {
    /// Starts moving the quote of `book` every `tick`, keeping `spread`
    /// between bid and ask.
    pub fn start(book: SharedBook, spread: Decimal, tick: Duration) -> PriceFeed {
        let (stop_tx, stop_rx) = unbounded::<()>();
        let handle = thread::spawn(move || {
            info!("Price feed started (thread {:?})", thread::current().id());
            loop {
                select! {
                    recv(stop_rx) -> _ => break,
                    default(tick) => {
                        if let Err(e) = step(&book, spread) {
                            error!("Price feed stopped: {}", e);
                            break;
                        }
                    }
                }
            }
            info!("Price feed stopped");
        });
        PriceFeed {
            stop_tx,
            handle: Some(handle),
        }
    }

    /// Stops the thread and waits for it.
    pub fn stop(mut self) {
        self.halt();
    }

    fn halt(&mut self) {
        let _ = self.stop_tx.send(());
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for PriceFeed {
    fn drop(&mut self) {
        self.halt();
    }
}

fn step(book: &SharedBook, spread: Decimal) -> Result<()> {
    let mut book = book.lock()?;
    let current = book.quote();
    let mid = (current.bid + current.ask) / Decimal::TWO;
    if let Some(quote) = quote_around(next_mid(mid), spread) {
        debug!("{} {}|{}", book.symbol(), quote.bid, quote.ask);
        book.set_quote(quote);
    }
    Ok(())
}

/// Next mid price: a uniform move of at most `MAX_STEP` either way, kept
/// above a small positive floor.
pub fn next_mid(mid: Decimal) -> Decimal {
    let change: f64 = rand::rng().random_range(-MAX_STEP..MAX_STEP);
    let moved = mid
        .to_f64()
        .and_then(|mid| Decimal::from_f64(mid * (1.0 + change)))
        .map(|price| price.round_dp(2))
        .unwrap_or(mid);
    moved.max(FLOOR)
}

/// Quote centred on `mid` with `spread` between bid and ask; `None` when the
/// bid would not be positive.
pub fn quote_around(mid: Decimal, spread: Decimal) -> Option<Quote> {
    let half = spread / Decimal::TWO;
    Quote::new(mid - half, mid + half)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::book::PaperBook;
    use rust_decimal_macros::dec;

    #[test]
    fn walk_stays_close_and_positive() {
        let mut mid = dec!(2000);
        for _ in 0..1000 {
            let next = next_mid(mid);
            assert!((next - mid).abs() <= mid * dec!(0.0011), "{mid} -> {next}");
            mid = next;
        }
        assert!(next_mid(dec!(0.01)) >= FLOOR);
    }

    #[test]
    fn quote_keeps_the_spread() {
        let quote = quote_around(dec!(2000), dec!(0.5)).unwrap();
        assert_eq!(quote.bid, dec!(1999.75));
        assert_eq!(quote.ask, dec!(2000.25));
        assert!(quote_around(dec!(0.1), dec!(1)).is_none());
    }

    #[test]
    fn feed_moves_the_book_until_stopped() {
        let start = Quote::new(dec!(1999.75), dec!(2000.25)).unwrap();
        let book = PaperBook::new("ETHUSD", start, 777, dec!(100)).shared();
        let feed = PriceFeed::start(book.clone(), dec!(0.5), Duration::from_millis(5));
        thread::sleep(Duration::from_millis(100));
        feed.stop();

        let after_stop = book.lock().unwrap().quote();
        assert_eq!(after_stop.ask - after_stop.bid, dec!(0.5));
        thread::sleep(Duration::from_millis(30));
        assert_eq!(book.lock().unwrap().quote(), after_stop);
    }
}
