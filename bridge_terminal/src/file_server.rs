//! File handoff side of the paper terminal.
//!
//! Every poll republishes the price file from the book and serves at most one
//! pending command. Replies and prices are published with a rename, so the bot
//! never reads a half-written file.
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use std::time::Duration;

use bridge_common::net::{HandoffFiles, publish};
use bridge_common::{Dialect, Reply, Result};
use crossbeam_channel::{Receiver, RecvTimeoutError};
use log::{debug, error, info, warn};

use crate::book::SharedBook;
use crate::request::Request;

/// Terminal answering through a shared directory.
pub struct FileTerminal {
    files: HandoffFiles,
    book: SharedBook,
}

impl FileTerminal {
    /// Creates `dir` if needed and publishes the first price snapshot.
    pub fn new(dir: &Path, book: SharedBook) -> Result<Self> {
        fs::create_dir_all(dir)?;
        let terminal = FileTerminal {
            files: HandoffFiles::in_dir(dir),
            book,
        };
        terminal.publish_prices()?;
        info!("File terminal serving {}", dir.display());
        Ok(terminal)
    }

    /// Publishes prices and serves the pending command, if any. Returns
    /// whether a command was served.
    pub fn step(&self) -> Result<bool> {
        self.publish_prices()?;
        let line = match fs::read_to_string(&self.files.command) {
            Ok(line) => line,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(e.into()),
        };
        fs::remove_file(&self.files.command)?;
        debug!("<- {}", line.trim());

        let reply = match Request::parse(&line, Dialect::File) {
            Ok(request) => self.book.lock()?.handle(request),
            Err(e) => {
                warn!("{}", e);
                Reply::Rejected("ERROR|unknown command".to_string())
            }
        };
        let payload = reply.encode(Dialect::File)?;
        publish(&self.files.response, &payload)?;
        debug!("-> {}", payload);
        Ok(true)
    }

    /// Polls every `poll` until `stop` fires or its sender goes away.
    pub fn serve(&self, stop: &Receiver<()>, poll: Duration) {
        loop {
            if let Err(e) = self.step() {
                error!("File terminal step failed: {}", e);
            }
            match stop.recv_timeout(poll) {
                Err(RecvTimeoutError::Timeout) => continue,
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        info!("File terminal stopped");
    }

    fn publish_prices(&self) -> Result<()> {
        let quote = self.book.lock()?.quote();
        publish(&self.files.prices, &Reply::Quote(quote).encode(Dialect::File)?)?;
        Ok(())
    }
}
