//! Error types for the peripheral session core.

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by session operations.
///
/// Every error reaches the caller through the operation's returned
/// future; nothing is swallowed internally. `Clone` is required so a
/// single completion outcome can fan out to coalesced waiters.
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// `connect()` was called while the session is already connected.
    /// Synthesized locally; no transport request is issued.
    #[error("peripheral already connected")]
    AlreadyConnected,

    /// A write payload does not fit in a GATT attribute value.
    /// Checked locally before anything reaches the transport.
    #[error("write payload of {0} bytes exceeds the attribute value limit")]
    InvalidPayload(usize),

    /// The transport reported that the connect attempt failed.
    #[error("connect failed: {0}")]
    ConnectFailed(String),

    /// Request issuance failed at the transport.
    #[error("transport error: {0}")]
    Transport(String),

    /// A completion carried a payload that does not match its
    /// operation. Indicates a defect in the transport backend.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The event loop shut down before the completion event arrived.
    #[error("event channel closed before completion")]
    ChannelClosed,

    /// The configured operation timeout expired with no completion.
    #[error("operation timed out")]
    Timeout,
}

impl Error {
    /// Returns true for the timeout error produced by the hardened
    /// operation-timeout path.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout)
    }
}
