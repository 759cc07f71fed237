//! File-based bridge to a terminal sharing a directory with the bot.
//!
//! The bot publishes `bridge_cmd.txt`; the terminal consumes it and answers
//! in `bridge_resp.txt`. Quotes are not requested: the terminal keeps
//! rewriting `bridge_prices.txt` with `<bid>|<ask>`.
//!
//! Commands are published with a rename so the terminal never reads half a
//! command. Replies are read after a short settle delay because the terminal
//! may write them in place; terminals that publish with a rename can run with
//! a zero delay.
use std::fs;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use bridge_common::net::{HandoffFiles, publish};
use bridge_common::{BridgeError, Dialect, Result};
use log::{debug, info, warn};

use crate::transport::Transport;

/// Polling cadence of the reply file.
#[derive(Debug, Clone, Copy)]
pub struct HandoffTiming {
    /// Pause between two checks for the reply file.
    pub poll_interval: Duration,
    /// Pause between spotting the reply file and reading it.
    pub settle_delay: Duration,
}

impl Default for HandoffTiming {
    fn default() -> Self {
        HandoffTiming {
            poll_interval: Duration::from_millis(200),
            settle_delay: Duration::from_millis(100),
        }
    }
}

/// Transport over a shared directory.
pub struct FileHandoff {
    dir: PathBuf,
    files: HandoffFiles,
    timing: HandoffTiming,
    open: bool,
}

impl FileHandoff {
    /// Prepares the shared directory and removes leftovers of a previous run.
    ///
    /// Fails with `BridgeError::Unreachable` when the directory cannot be
    /// created or cleaned.
    pub fn connect(dir: &Path, timing: HandoffTiming) -> Result<Self> {
        let unreachable =
            |e: io::Error| BridgeError::Unreachable(format!("bridge directory {}: {}", dir.display(), e));

        fs::create_dir_all(dir).map_err(unreachable)?;
        let files = HandoffFiles::in_dir(dir);
        for stale in [&files.command, &files.response] {
            if remove_if_present(stale).map_err(unreachable)? {
                debug!("Removed stale {}", stale.display());
            }
        }
        if !files.prices.exists() {
            warn!(
                "Price file {} does not exist yet; quotes stay unavailable until the terminal writes it",
                files.prices.display()
            );
        }
        info!("File bridge ready, common dir: {}", dir.display());

        Ok(FileHandoff {
            dir: dir.to_path_buf(),
            files,
            timing,
            open: true,
        })
    }

    /// Directory shared with the terminal.
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl Transport for FileHandoff {
    fn dialect(&self) -> Dialect {
        Dialect::File
    }

    fn exchange(&mut self, command: &str, timeout: Duration) -> Result<String> {
        if !self.open {
            return Err(BridgeError::Unreachable("file bridge is shut down".to_string()));
        }
        if remove_if_present(&self.files.response)? {
            warn!("Discarded a late reply left by an earlier exchange");
        }

        publish(&self.files.command, command)?;
        debug!("-> {}", command);

        let deadline = Instant::now() + timeout;
        loop {
            if self.files.response.exists() {
                thread::sleep(self.timing.settle_delay);
                let reply = fs::read_to_string(&self.files.response)?;
                remove_if_present(&self.files.response)?;
                let reply = reply.trim().to_string();
                debug!("<- {}", reply);
                return Ok(reply);
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            thread::sleep(self.timing.poll_interval.min(remaining));
        }

        if remove_if_present(&self.files.command)? {
            warn!("No reply to {:?} within {:?}; command withdrawn unread", command, timeout);
        } else {
            warn!(
                "No reply to {:?} within {:?}; the terminal took the command, outcome unknown",
                command, timeout
            );
        }
        Err(BridgeError::Timeout(timeout))
    }

    fn price_feed(&mut self) -> Result<String> {
        if !self.open {
            return Err(BridgeError::Unreachable("file bridge is shut down".to_string()));
        }
        match fs::read_to_string(&self.files.prices) {
            Ok(snapshot) => Ok(snapshot.trim().to_string()),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(BridgeError::Unreachable(format!(
                "price file {} not found",
                self.files.prices.display()
            ))),
            Err(e) => Err(e.into()),
        }
    }

    fn shutdown(&mut self) {
        if self.open {
            self.open = false;
            info!("File bridge closed");
        }
    }
}

/// Deletes `path`, reporting whether there was anything to delete.
fn remove_if_present(path: &Path) -> io::Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}
