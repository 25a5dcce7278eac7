//! Remote peripheral session: connection lifecycle, RSSI sampling,
//! discovery orchestration, and raw attribute-handle I/O.
//!
//! Every operation follows the same shape:
//!
//! 1. A one-shot waiter is registered under the operation's key.
//! 2. The identity-addressed request is issued to the [`Central`].
//! 3. The caller suspends until [`handle_event`] dispatches the
//!    matching completion event and fires the waiter.
//!
//! No operation polls and none returns a result synchronously; the
//! awaited waiter is the only way an operation completes. Session
//! fields (`state`, `rssi`, `services`) are mutated exclusively by the
//! event dispatch path, which runs on the single [`run`] loop.
//!
//! [`handle_event`]: Peripheral::handle_event
//! [`run`]: Peripheral::run

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::json;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, trace};
use uuid::Uuid;

use crate::bridge::{Completion, OpKey, PendingOps};
use crate::error::{Error, Result};
use crate::gatt::{Characteristic, Service};
use crate::transport::{Central, PeripheralEvent};
use crate::types::{Address, AddressType, Advertisement, PeripheralId, PeripheralState};

/// One remote BLE device as seen by this process.
///
/// Created once per discovered device by the scanning layer and reused
/// across connect/disconnect cycles; disconnection returns the session
/// to `disconnected`, eligible for reconnection. Cheap to clone (shared
/// inner state).
#[derive(Clone)]
pub struct Peripheral {
    inner: Arc<Inner>,
}

struct Inner {
    id: PeripheralId,
    address: Address,
    address_type: AddressType,
    connectable: bool,
    advertisement: Advertisement,
    central: Arc<dyn Central>,
    state: Mutex<PeripheralState>,
    rssi: Mutex<Option<i16>>,
    services: Mutex<Option<Vec<Service>>>,
    pending: PendingOps,
    op_timeout: Mutex<Option<Duration>>,
}

impl Peripheral {
    pub fn new(
        central: Arc<dyn Central>,
        id: impl Into<PeripheralId>,
        address: impl Into<Address>,
        address_type: AddressType,
        connectable: bool,
        advertisement: Advertisement,
        rssi: Option<i16>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                id: id.into(),
                address: address.into(),
                address_type,
                connectable,
                advertisement,
                central,
                state: Mutex::new(PeripheralState::Disconnected),
                rssi: Mutex::new(rssi),
                services: Mutex::new(None),
                pending: PendingOps::default(),
                op_timeout: Mutex::new(None),
            }),
        }
    }

    /// Bound every operation's wait for its completion event.
    ///
    /// On expiry the operation fails with [`Error::Timeout`] and its
    /// abandoned waiter is pruned from the pending registry. Without a
    /// timeout an unanswered request pends forever.
    pub fn with_operation_timeout(self, timeout: Duration) -> Self {
        *self.inner.op_timeout.lock() = Some(timeout);
        self
    }

    pub fn id(&self) -> &PeripheralId {
        &self.inner.id
    }

    pub fn address(&self) -> &Address {
        &self.inner.address
    }

    pub fn address_type(&self) -> AddressType {
        self.inner.address_type
    }

    pub fn connectable(&self) -> bool {
        self.inner.connectable
    }

    pub fn advertisement(&self) -> &Advertisement {
        &self.inner.advertisement
    }

    /// Most recent signal-strength sample, if any was ever observed.
    /// May be stale until an [`update_rssi`](Self::update_rssi) completes.
    pub fn rssi(&self) -> Option<i16> {
        *self.inner.rssi.lock()
    }

    pub fn state(&self) -> PeripheralState {
        *self.inner.state.lock()
    }

    /// Services from the last completed discovery; `None` until one has
    /// completed. Each discovery replaces the whole collection.
    pub fn services(&self) -> Option<Vec<Service>> {
        self.inner.services.lock().clone()
    }

    /// Record an RSSI sample observed outside an explicit update, e.g.
    /// from a fresh advertisement seen by the scanning layer.
    pub fn note_rssi(&self, rssi: i16) {
        *self.inner.rssi.lock() = Some(rssi);
    }

    /// Establish a link to the peripheral.
    ///
    /// Fails immediately with [`Error::AlreadyConnected`] when a link is
    /// already up, without touching the transport. A failed attempt
    /// resets the state to `disconnected`; reconnecting takes another
    /// explicit `connect` call.
    pub async fn connect(&self) -> Result<()> {
        {
            let mut state = self.inner.state.lock();
            if *state == PeripheralState::Connected {
                return Err(Error::AlreadyConnected);
            }
            *state = PeripheralState::Connecting;
        }
        debug!(id = %self.inner.id, "issuing connect");
        if let Err(error) = self
            .issue_and_wait(OpKey::Connect, self.inner.central.connect(&self.inner.id))
            .await
        {
            // Issuance failures and timeouts leave no link either.
            *self.inner.state.lock() = PeripheralState::Disconnected;
            return Err(error);
        }
        Ok(())
    }

    /// Tear the link down.
    ///
    /// Valid in any state; resolves once the transport reports the
    /// disconnect complete and never fails from the remote side.
    pub async fn disconnect(&self) -> Result<()> {
        *self.inner.state.lock() = PeripheralState::Disconnecting;
        debug!(id = %self.inner.id, "issuing disconnect");
        self.issue_and_wait(OpKey::Disconnect, self.inner.central.disconnect(&self.inner.id))
            .await?;
        Ok(())
    }

    /// Request a fresh signal-strength sample.
    ///
    /// Resolves with the sample and refreshes the cached value.
    pub async fn update_rssi(&self) -> Result<i16> {
        trace!(id = %self.inner.id, "issuing rssi update");
        match self
            .issue_and_wait(OpKey::UpdateRssi, self.inner.central.update_rssi(&self.inner.id))
            .await?
        {
            Completion::Rssi(rssi) => Ok(rssi),
            other => Err(Error::Protocol(format!("rssi completion carried {other:?}"))),
        }
    }

    /// Discover services, restricted to `filter` when non-empty.
    ///
    /// The discovered collection replaces any previous result on the
    /// session (last discovery wins).
    pub async fn discover_services(&self, filter: &[Uuid]) -> Result<Vec<Service>> {
        debug!(id = %self.inner.id, filter = filter.len(), "issuing service discovery");
        match self
            .issue_and_wait(
                OpKey::DiscoverServices,
                self.inner.central.discover_services(&self.inner.id, filter),
            )
            .await?
        {
            Completion::Services(services) => Ok(services),
            other => Err(Error::Protocol(format!(
                "service discovery completion carried {other:?}"
            ))),
        }
    }

    /// Discover services matching `service_filter`, then each service's
    /// characteristics matching `characteristic_filter`.
    ///
    /// Per-service discovery is awaited strictly sequentially in the
    /// order discovery returned the services; the first failure aborts
    /// the whole operation with that error and no partial result.
    /// Characteristics are flattened preserving per-service grouping
    /// and within-service order.
    pub async fn discover_some_services_and_characteristics(
        &self,
        service_filter: &[Uuid],
        characteristic_filter: &[Uuid],
    ) -> Result<(Vec<Service>, Vec<Characteristic>)> {
        let services = self.discover_services(service_filter).await?;
        let mut characteristics = Vec::new();
        for service in &services {
            let mut found = service.discover_characteristics(characteristic_filter).await?;
            characteristics.append(&mut found);
        }
        debug!(
            id = %self.inner.id,
            services = services.len(),
            characteristics = characteristics.len(),
            "aggregate discovery complete"
        );
        Ok((services, characteristics))
    }

    /// Discover every service and every characteristic.
    pub async fn discover_all_services_and_characteristics(
        &self,
    ) -> Result<(Vec<Service>, Vec<Characteristic>)> {
        self.discover_some_services_and_characteristics(&[], &[]).await
    }

    /// Read the raw value behind an attribute handle.
    pub async fn read_handle(&self, handle: u16) -> Result<Vec<u8>> {
        trace!(id = %self.inner.id, handle, "issuing handle read");
        match self
            .issue_and_wait(
                OpKey::HandleRead(handle),
                self.inner.central.read_handle(&self.inner.id, handle),
            )
            .await?
        {
            Completion::Bytes(data) => Ok(data),
            other => Err(Error::Protocol(format!(
                "handle read completion carried {other:?}"
            ))),
        }
    }

    /// Write a raw value to an attribute handle.
    ///
    /// `data` must fit in a GATT attribute value
    /// ([`MAX_ATTRIBUTE_VALUE_LEN`](crate::MAX_ATTRIBUTE_VALUE_LEN));
    /// oversized payloads fail before anything reaches the transport.
    /// Both write forms resolve through the same handle-scoped
    /// completion event.
    pub async fn write_handle(
        &self,
        handle: u16,
        data: &[u8],
        without_response: bool,
    ) -> Result<()> {
        if data.len() > crate::MAX_ATTRIBUTE_VALUE_LEN {
            return Err(Error::InvalidPayload(data.len()));
        }
        trace!(
            id = %self.inner.id,
            handle,
            len = data.len(),
            without_response,
            "issuing handle write"
        );
        self.issue_and_wait(
            OpKey::HandleWrite(handle),
            self.inner
                .central
                .write_handle(&self.inner.id, handle, data, without_response),
        )
        .await?;
        Ok(())
    }

    /// Drive the session's event dispatch loop until the transport side
    /// drops the channel.
    ///
    /// Spawn this once per session. All mutation of session state in
    /// response to completions happens here, giving a single logical
    /// sequencing point even when the transport is multi-threaded.
    pub async fn run(&self, mut events: mpsc::UnboundedReceiver<PeripheralEvent>) {
        while let Some(event) = events.recv().await {
            self.handle_event(event);
        }
        debug!(id = %self.inner.id, "event channel closed");
    }

    /// Apply one completion event: update session state and fire the
    /// matching pending waiters.
    ///
    /// Events with no pending waiter are logged and dropped; cache
    /// updates (rssi, services, state) still apply, so an unsolicited
    /// sample is not lost.
    pub fn handle_event(&self, event: PeripheralEvent) {
        trace!(id = %self.inner.id, ?event, "dispatching event");
        match event {
            PeripheralEvent::ConnectComplete { error } => {
                let outcome = match error {
                    None => {
                        *self.inner.state.lock() = PeripheralState::Connected;
                        Ok(Completion::Unit)
                    }
                    Some(message) => {
                        // A failed attempt leaves no link.
                        *self.inner.state.lock() = PeripheralState::Disconnected;
                        Err(Error::ConnectFailed(message))
                    }
                };
                self.finish(OpKey::Connect, outcome);
            }
            PeripheralEvent::DisconnectComplete => {
                *self.inner.state.lock() = PeripheralState::Disconnected;
                self.finish(OpKey::Disconnect, Ok(Completion::Unit));
            }
            PeripheralEvent::RssiUpdate(rssi) => {
                *self.inner.rssi.lock() = Some(rssi);
                self.finish(OpKey::UpdateRssi, Ok(Completion::Rssi(rssi)));
            }
            PeripheralEvent::ServicesDiscovered(services) => {
                *self.inner.services.lock() = Some(services.clone());
                self.finish(OpKey::DiscoverServices, Ok(Completion::Services(services)));
            }
            PeripheralEvent::HandleRead { handle, data } => {
                self.finish(OpKey::HandleRead(handle), Ok(Completion::Bytes(data)));
            }
            PeripheralEvent::HandleWrite { handle } => {
                self.finish(OpKey::HandleWrite(handle), Ok(Completion::Unit));
            }
        }
    }

    fn finish(&self, key: OpKey, outcome: Result<Completion>) {
        if self.inner.pending.complete(key, outcome) == 0 {
            debug!(id = %self.inner.id, ?key, "completion event had no pending waiter");
        }
    }

    /// Register under `key`, issue the request, await the completion.
    ///
    /// Registration precedes issuance so a completion arriving between
    /// the two cannot be missed. An issuance failure removes the waiter
    /// again and surfaces immediately.
    async fn issue_and_wait(
        &self,
        key: OpKey,
        issue: impl Future<Output = Result<()>>,
    ) -> Result<Completion> {
        let rx = self.inner.pending.register(key);
        if let Err(error) = issue.await {
            drop(rx);
            self.inner.pending.prune();
            return Err(error);
        }
        self.await_completion(rx).await
    }

    async fn await_completion(
        &self,
        rx: oneshot::Receiver<Result<Completion>>,
    ) -> Result<Completion> {
        let op_timeout = *self.inner.op_timeout.lock();
        match op_timeout {
            None => rx.await.map_err(|_| Error::ChannelClosed)?,
            Some(limit) => match tokio::time::timeout(limit, rx).await {
                Ok(outcome) => outcome.map_err(|_| Error::ChannelClosed)?,
                Err(_) => {
                    // The receiver was just dropped by the timeout;
                    // clear the dead waiter before reporting.
                    self.inner.pending.prune();
                    Err(Error::Timeout)
                }
            },
        }
    }
}

impl fmt::Display for Peripheral {
    /// JSON summary of identity, advertisement and current state.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let summary = json!({
            "id": self.inner.id.as_str(),
            "address": self.inner.address,
            "addressType": self.inner.address_type,
            "connectable": self.inner.connectable,
            "advertisement": self.inner.advertisement,
            "rssi": *self.inner.rssi.lock(),
            "state": *self.inner.state.lock(),
        });
        write!(f, "{summary}")
    }
}

impl fmt::Debug for Peripheral {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Peripheral")
            .field("id", &self.inner.id)
            .field("address", &self.inner.address)
            .field("state", &*self.inner.state.lock())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::FakeCentralBuilder;

    fn offline_peripheral() -> Peripheral {
        let (parts, _controller) = FakeCentralBuilder::new().build();
        Peripheral::new(
            parts.central,
            "adapter0:device:17",
            "aa:bb:cc:dd:ee:ff",
            AddressType::Random,
            true,
            Advertisement {
                local_name: Some("Thermometer".to_string()),
                ..Default::default()
            },
            Some(-71),
        )
    }

    #[test]
    fn events_mutate_state_even_without_waiters() {
        let peripheral = offline_peripheral();
        assert_eq!(peripheral.state(), PeripheralState::Disconnected);

        peripheral.handle_event(PeripheralEvent::ConnectComplete { error: None });
        assert_eq!(peripheral.state(), PeripheralState::Connected);

        peripheral.handle_event(PeripheralEvent::DisconnectComplete);
        assert_eq!(peripheral.state(), PeripheralState::Disconnected);
    }

    #[test]
    fn failed_connect_event_resets_to_disconnected() {
        let peripheral = offline_peripheral();
        peripheral.handle_event(PeripheralEvent::ConnectComplete {
            error: Some("connection timed out".to_string()),
        });
        assert_eq!(peripheral.state(), PeripheralState::Disconnected);
    }

    #[test]
    fn unsolicited_rssi_sample_refreshes_the_cache() {
        let peripheral = offline_peripheral();
        assert_eq!(peripheral.rssi(), Some(-71));
        peripheral.handle_event(PeripheralEvent::RssiUpdate(-48));
        assert_eq!(peripheral.rssi(), Some(-48));
        peripheral.note_rssi(-52);
        assert_eq!(peripheral.rssi(), Some(-52));
    }

    #[test]
    fn display_renders_the_json_summary() {
        let peripheral = offline_peripheral();
        let value: serde_json::Value = serde_json::from_str(&peripheral.to_string()).unwrap();
        assert_eq!(value["id"], "adapter0:device:17");
        assert_eq!(value["address"], "aa:bb:cc:dd:ee:ff");
        assert_eq!(value["addressType"], "random");
        assert_eq!(value["connectable"], true);
        assert_eq!(value["advertisement"]["localName"], "Thermometer");
        assert_eq!(value["rssi"], -71);
        assert_eq!(value["state"], "disconnected");
    }
}
