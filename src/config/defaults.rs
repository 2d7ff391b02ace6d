//! Default value functions for configuration.

use std::net::SocketAddr;
use std::path::PathBuf;

/// Returns `true` (for serde defaults).
pub fn default_true() -> bool {
    true
}

// =============================================================================
// Store Defaults
// =============================================================================

pub fn default_settings_path() -> PathBuf {
    PathBuf::from("settings.json")
}

pub fn default_users_path() -> PathBuf {
    PathBuf::from("users.json")
}

pub fn default_language_path() -> PathBuf {
    PathBuf::from("lang.json")
}

// =============================================================================
// Chat Gateway Defaults
// =============================================================================

pub fn default_chat_listen() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 5522))
}

pub fn default_max_line_len() -> usize {
    4096
}
