//! Transport collaborator: request issuance and completion events.
//!
//! The [`Central`] trait is the radio-facing side of a session. Requests
//! are fire-and-forget: the returned `Result` covers issuance only, and
//! the outcome arrives later as a [`PeripheralEvent`] on the session's
//! event channel, never synchronously within the call. Events are
//! tagged by purpose and, for attribute operations, by handle, so the
//! session can fire the matching one-shot waiter.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use crate::gatt::Service;
use crate::types::PeripheralId;

/// Identity-addressed request issuance toward the radio/link layer.
#[async_trait]
pub trait Central: Send + Sync {
    async fn connect(&self, id: &PeripheralId) -> Result<()>;

    async fn disconnect(&self, id: &PeripheralId) -> Result<()>;

    async fn update_rssi(&self, id: &PeripheralId) -> Result<()>;

    /// An empty `filter` requests all services.
    async fn discover_services(&self, id: &PeripheralId, filter: &[Uuid]) -> Result<()>;

    async fn read_handle(&self, id: &PeripheralId, handle: u16) -> Result<()>;

    async fn write_handle(
        &self,
        id: &PeripheralId,
        handle: u16,
        data: &[u8],
        without_response: bool,
    ) -> Result<()>;
}

/// Completion events emitted by the transport for one session.
///
/// A multi-threaded transport must funnel these through the session's
/// single event channel; [`Peripheral::run`] restores the one logical
/// sequencing point the session's handlers rely on.
///
/// [`Peripheral::run`]: crate::peripheral::Peripheral::run
#[derive(Debug, Clone)]
pub enum PeripheralEvent {
    /// Outcome of a connect request: `None` on success, otherwise the
    /// transport's failure message.
    ConnectComplete { error: Option<String> },
    DisconnectComplete,
    /// A fresh signal-strength sample, in dBm.
    RssiUpdate(i16),
    ServicesDiscovered(Vec<Service>),
    HandleRead { handle: u16, data: Vec<u8> },
    HandleWrite { handle: u16 },
}
