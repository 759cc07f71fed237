//! Bot against the paper terminal, over both bridges.
use std::fs;
use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};

use bridge_bot::transport::{FileHandoff, HandoffTiming, SocketPair, SocketPairEndpoint, Transport};
use bridge_bot::{BridgeClient, OpenPositions, Strategy, TickOutcome, Trader, TradingState};
use bridge_common::net::HandoffFiles;
use bridge_common::{Quote, Side};
use bridge_terminal::{FileTerminal, PaperBook, SharedBook, SocketTerminal};
use crossbeam_channel::{Sender, unbounded};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tempfile::tempdir;

const MAGIC: u32 = 777;

fn strategy() -> Strategy {
    Strategy {
        symbol: "ETHUSD".to_string(),
        lots: dec!(0.01),
        buy_price: dec!(1980),
        sell_price: dec!(2100),
        tag: MAGIC,
        comment: "threshold-bot".to_string(),
        contract_multiplier: dec!(100),
    }
}

fn quote(bid: Decimal, ask: Decimal) -> Quote {
    Quote::new(bid, ask).unwrap()
}

fn book() -> SharedBook {
    PaperBook::new("ETHUSD", quote(dec!(1985), dec!(1982)), MAGIC, dec!(100)).shared()
}

fn fast() -> HandoffTiming {
    HandoffTiming {
        poll_interval: Duration::from_millis(5),
        settle_delay: Duration::ZERO,
    }
}

struct Running {
    stop_tx: Sender<()>,
    handle: thread::JoinHandle<()>,
}

impl Running {
    fn stop(self) {
        self.stop_tx.send(()).unwrap();
        self.handle.join().unwrap();
    }
}

fn serve_files(dir: &Path, book: SharedBook) -> Running {
    let terminal = FileTerminal::new(dir, book).unwrap();
    let (stop_tx, stop_rx) = unbounded();
    let handle = thread::spawn(move || terminal.serve(&stop_rx, Duration::from_millis(5)));
    Running { stop_tx, handle }
}

fn serve_socket(book: SharedBook) -> (Running, SocketPairEndpoint) {
    let terminal = SocketTerminal::bind("127.0.0.1", 0, 0, book).unwrap();
    let (push_port, pull_port) = terminal.local_ports().unwrap();
    let (stop_tx, stop_rx) = unbounded();
    let handle = thread::spawn(move || terminal.serve(&stop_rx).unwrap());
    let endpoint = SocketPairEndpoint {
        host: "127.0.0.1".to_string(),
        push_port,
        pull_port,
        connect_timeout: Duration::from_secs(1),
    };
    (Running { stop_tx, handle }, endpoint)
}

/// Moves the book and, for the file bridge, waits until the price file shows it.
fn set_quote(book: &SharedBook, quote: Quote, prices: Option<&Path>) {
    book.lock().unwrap().set_quote(quote);
    let Some(prices) = prices else { return };
    let expected = format!("{}|{}", quote.bid, quote.ask);
    let deadline = Instant::now() + Duration::from_secs(5);
    while fs::read_to_string(prices).unwrap_or_default() != expected {
        assert!(Instant::now() < deadline, "price file never showed {expected}");
        thread::sleep(Duration::from_millis(5));
    }
}

/// Wait, enter, exit: the whole threshold round trip.
fn round_trip<T: Transport>(trader: &mut Trader<T>, book: &SharedBook, prices: Option<&Path>) {
    assert_eq!(trader.reconcile(), TradingState::Flat);

    set_quote(book, quote(dec!(1985), dec!(1982)), prices);
    assert_eq!(trader.tick(), TickOutcome::Waiting { ask: dec!(1982) });

    set_quote(book, quote(dec!(1979), dec!(1979.5)), prices);
    let TickOutcome::Opened { ticket } = trader.tick() else {
        panic!("expected an entry");
    };
    assert_eq!(trader.state(), TradingState::Long { ticket });
    assert_eq!(book.lock().unwrap().positions()[0].open_price, dec!(1979.5));

    set_quote(book, quote(dec!(2050), dec!(2051)), prices);
    assert_eq!(trader.tick(), TickOutcome::Holding { bid: dec!(2050) });

    set_quote(book, quote(dec!(2101), dec!(2103)), prices);
    assert_eq!(
        trader.tick(),
        TickOutcome::Closed {
            ticket,
            profit: Some(dec!(120.00)),
        }
    );
    assert_eq!(trader.state(), TradingState::Flat);
    assert!(book.lock().unwrap().positions().is_empty());
}

#[test]
fn file_bridge_round_trip() {
    let root = tempdir().unwrap();
    let book = book();
    let terminal = serve_files(root.path(), book.clone());
    let prices = HandoffFiles::in_dir(root.path()).prices;

    let transport = FileHandoff::connect(root.path(), fast()).unwrap();
    let mut trader = Trader::new(BridgeClient::new(transport, Duration::from_secs(5)), strategy());
    round_trip(&mut trader, &book, Some(&prices));

    trader.shutdown();
    terminal.stop();
}

#[test]
fn socket_bridge_round_trip() {
    let book = book();
    let (terminal, endpoint) = serve_socket(book.clone());

    let transport = SocketPair::connect(endpoint).unwrap();
    let mut trader = Trader::new(BridgeClient::new(transport, Duration::from_secs(5)), strategy());
    round_trip(&mut trader, &book, None);

    trader.shutdown();
    terminal.stop();
}

#[test]
fn restart_adopts_the_tagged_position_only() {
    let book = book();
    book.lock().unwrap().set_quote(quote(dec!(1974.5), dec!(1975)));
    book.lock().unwrap().open(Side::Buy, dec!(0.05), 12, "someone else".to_string());
    let (terminal, endpoint) = serve_socket(book.clone());

    let transport = SocketPair::connect(endpoint.clone()).unwrap();
    let mut trader = Trader::new(BridgeClient::new(transport, Duration::from_secs(5)), strategy());
    assert_eq!(trader.reconcile(), TradingState::Flat);
    trader.shutdown();

    let ticket = match book.lock().unwrap().open(Side::Buy, dec!(0.01), MAGIC, "threshold-bot".to_string()) {
        bridge_common::Reply::Filled(fill) => fill.ticket.unwrap(),
        other => panic!("unexpected {other:?}"),
    };
    let transport = SocketPair::connect(endpoint).unwrap();
    let mut trader = Trader::new(BridgeClient::new(transport, Duration::from_secs(5)), strategy());
    assert_eq!(trader.reconcile(), TradingState::Long { ticket });

    set_quote(&book, quote(dec!(2100), dec!(2100.5)), None);
    assert!(matches!(trader.tick(), TickOutcome::Closed { ticket: closed, .. } if closed == ticket));
    let left = book.lock().unwrap().positions();
    assert_eq!(left.len(), 1);
    assert_eq!(left[0].tag, Some(12));

    trader.shutdown();
    terminal.stop();
}

#[test]
fn file_bridge_waits_out_a_missing_terminal() {
    let root = tempdir().unwrap();
    let transport = FileHandoff::connect(root.path(), fast()).unwrap();
    let mut trader = Trader::new(
        BridgeClient::new(transport, Duration::from_millis(100)),
        strategy(),
    );

    assert_eq!(trader.tick(), TickOutcome::NoQuote);
    assert_eq!(trader.reconcile(), TradingState::Flat);

    let book = book();
    book.lock().unwrap().set_quote(quote(dec!(1979), dec!(1979.5)));
    let terminal = serve_files(root.path(), book.clone());
    // first entry signal reconciles before buying
    assert_eq!(trader.tick(), TickOutcome::Opened { ticket: 1000 });
    assert_eq!(book.lock().unwrap().positions().len(), 1);

    trader.shutdown();
    terminal.stop();
}

#[test]
fn socket_bridge_recovers_from_a_stalled_terminal() {
    let book = book();
    let (terminal, endpoint) = serve_socket(book.clone());
    let transport = SocketPair::connect(endpoint).unwrap();
    let mut client = BridgeClient::new(transport, Duration::from_millis(100));

    let stall = {
        let book = book.clone();
        thread::spawn(move || {
            let _guard = book.lock().unwrap();
            thread::sleep(Duration::from_millis(400));
        })
    };
    thread::sleep(Duration::from_millis(20));
    assert_eq!(client.get_quote("ETHUSD"), None);
    stall.join().unwrap();
    // let the late quote land on the pull channel
    thread::sleep(Duration::from_millis(100));

    assert_eq!(client.list_open_positions(Some(MAGIC)), OpenPositions::Empty);
    assert_eq!(client.get_quote("ETHUSD"), Some(quote(dec!(1985), dec!(1982))));

    client.shutdown();
    terminal.stop();
}
