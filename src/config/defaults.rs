//! Default value functions for configuration.

/// Returns `true` (for serde defaults).
pub fn default_true() -> bool {
    true
}

// =============================================================================
// Server Defaults
// =============================================================================

pub fn default_host() -> String {
    "irc.chat.twitch.tv".to_string()
}

pub fn default_port() -> u16 {
    6667
}

// =============================================================================
// Client Defaults
// =============================================================================

pub fn default_command_prefix() -> String {
    "!".to_string()
}

pub fn default_queue_capacity() -> usize {
    50
}

pub fn default_announce() -> String {
    "Bot running...".to_string()
}

pub fn default_drain_grace_ms() -> u64 {
    100
}

pub fn default_connect_timeout_secs() -> u64 {
    10
}

pub fn default_handshake_timeout_secs() -> u64 {
    30
}

// =============================================================================
// Moderator Defaults
// =============================================================================

pub fn default_moderators_path() -> String {
    "moderators.json".to_string()
}
