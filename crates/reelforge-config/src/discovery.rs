//! Config file discovery.
//!
//! Walks upward from the current directory looking for
//! `.reelforge/config.toml`, stopping at the filesystem root. The home
//! directory is checked last so a user-level file can supply defaults for
//! projects without their own.

use std::path::PathBuf;

use tracing::debug;

/// Location of the config file relative to a project root.
pub const CONFIG_RELATIVE_PATH: &str = ".reelforge/config.toml";

/// Find the nearest config file, if any.
#[must_use]
pub fn discover_config_file() -> Option<PathBuf> {
    let mut dir = std::env::current_dir().ok()?;

    loop {
        let candidate = dir.join(CONFIG_RELATIVE_PATH);
        if candidate.is_file() {
            debug!(path = %candidate.display(), "discovered config file");
            return Some(candidate);
        }
        if !dir.pop() {
            break;
        }
    }

    let home_candidate = dirs::home_dir()?.join(CONFIG_RELATIVE_PATH);
    if home_candidate.is_file() {
        debug!(path = %home_candidate.display(), "using home config file");
        return Some(home_candidate);
    }
    None
}
