//! Shared endpoint constants and helpers used by the bot and the terminal.
use std::path::{Path, PathBuf};

/// Default terminal host for the socket pair.
pub const DEFAULT_HOST: &str = "localhost";
/// Socket carrying commands (bot -> terminal).
pub const PUSH_PORT: u16 = 32768;
/// Socket carrying replies (terminal -> bot).
pub const PULL_PORT: u16 = 32769;

/// Command file written by the bot in the shared directory.
pub const COMMAND_FILE: &str = "bridge_cmd.txt";
/// Reply file written by the terminal in the shared directory.
pub const RESPONSE_FILE: &str = "bridge_resp.txt";
/// Price file continuously rewritten by the terminal.
pub const PRICES_FILE: &str = "bridge_prices.txt";

/// Helper to format a host and port like "host:port".
pub fn addr(host: &str, port: u16) -> String {
    format!("{}:{}", host, port)
}

/// Paths of the three handoff files inside a shared directory.
#[derive(Debug, Clone)]
pub struct HandoffFiles {
    /// Command file, written by the bot.
    pub command: PathBuf,
    /// Reply file, written by the terminal.
    pub response: PathBuf,
    /// Price side-channel, written by the terminal.
    pub prices: PathBuf,
}

impl HandoffFiles {
    /// Locates the handoff files under `dir`.
    pub fn in_dir(dir: &Path) -> Self {
        HandoffFiles {
            command: dir.join(COMMAND_FILE),
            response: dir.join(RESPONSE_FILE),
            prices: dir.join(PRICES_FILE),
        }
    }
}

/// Temporary sibling used to publish `path` with a single rename, so the
/// reader never observes a partially written file.
pub fn staging_path(path: &Path) -> PathBuf {
    let mut staged = path.as_os_str().to_owned();
    staged.push(".tmp");
    PathBuf::from(staged)
}

/// Writes `contents` to `path` atomically (write a sibling, then rename).
pub fn publish(path: &Path, contents: &str) -> std::io::Result<()> {
    let staged = staging_path(path);
    std::fs::write(&staged, contents)?;
    std::fs::rename(&staged, path)
}

/// MT4 "Common/Files" directory of a terminal running under Wine.
pub fn default_bridge_dir(home: &Path, user: &str) -> PathBuf {
    home.join(".wine/drive_c/users")
        .join(user)
        .join("Application Data/MetaQuotes/Terminal/Common/Files")
}
