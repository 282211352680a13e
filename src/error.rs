//! Unified error handling for nuclearbot.
//!
//! One error enum per concern, with static codes for log labeling.
//! Listener and executor failures are not represented here: they are
//! `anyhow::Error`s owned by plugin code and are contained at the dispatch
//! boundary (see [`crate::client::listener`]).

use std::io;
use thiserror::Error;
use tmi_proto::ProtocolError;

// ============================================================================
// Outbound queue errors
// ============================================================================

/// Reasons a line was not accepted by the outbound queue.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueueError {
    /// The queue is at capacity; the line was dropped.
    #[error("outbound queue is full ({capacity} lines pending)")]
    Full { capacity: usize },

    /// No session is running, or its writer has shut down.
    #[error("outbound queue is closed")]
    Closed,
}

impl QueueError {
    /// Get a static error code string for log labeling.
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Full { .. } => "queue_full",
            Self::Closed => "queue_closed",
        }
    }
}

// ============================================================================
// Registry errors
// ============================================================================

/// Command registration errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("command already registered: {0}")]
    DuplicateCommand(String),

    #[error("command not registered: {0}")]
    UnknownCommand(String),

    #[error("invalid command label: {0:?}")]
    InvalidLabel(String),
}

impl RegistryError {
    /// Get a static error code string for log labeling.
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::DuplicateCommand(_) => "duplicate_command",
            Self::UnknownCommand(_) => "unknown_command",
            Self::InvalidLabel(_) => "invalid_label",
        }
    }
}

/// Observer registration errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HubError {
    #[error("state listener already registered")]
    AlreadyRegistered,

    #[error("state listener not registered")]
    NotRegistered,
}

// ============================================================================
// Connection errors
// ============================================================================

/// Reasons the server refused or abandoned the login.
///
/// None of these are retried: the attempt ends in `Closed` and
/// [`ChatClient::connect`](crate::ChatClient::connect) returns the error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HandshakeError {
    #[error("nickname in use: {0}")]
    NicknameInUse(String),

    #[error("login rejected: {0}")]
    LoginRejected(String),

    #[error("connection closed during handshake")]
    ConnectionClosed,

    #[error("handshake timed out")]
    Timeout,
}

/// Errors that end [`ChatClient::connect`](crate::ChatClient::connect).
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("timed out connecting to {addr}")]
    ConnectTimeout { addr: String },

    #[error("handshake failed: {0}")]
    Handshake(#[from] HandshakeError),

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("client is already connected")]
    AlreadyRunning,
}

impl ClientError {
    /// Get a static error code string for log labeling.
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Connect { .. } => "connect_failed",
            Self::ConnectTimeout { .. } => "connect_timeout",
            Self::Handshake(HandshakeError::NicknameInUse(_)) => "nickname_in_use",
            Self::Handshake(HandshakeError::LoginRejected(_)) => "login_rejected",
            Self::Handshake(HandshakeError::ConnectionClosed) => "handshake_closed",
            Self::Handshake(HandshakeError::Timeout) => "handshake_timeout",
            Self::Protocol(e) => e.error_code(),
            Self::AlreadyRunning => "already_running",
        }
    }
}
