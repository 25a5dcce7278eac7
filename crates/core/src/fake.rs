//! Fake central for unit testing request issuance and event dispatch.
//!
//! In-memory stand-in for the radio-facing transport: records every
//! request a session issues and lets tests inject completion events.
//! Nothing completes by itself, so tests control exactly when and in
//! what order outcomes arrive.
//!
//! # Example
//!
//! ```ignore
//! let (parts, controller) = FakeCentralBuilder::new().build();
//! let peripheral = Peripheral::new(parts.central, "dev-1", "aa:bb:cc:dd:ee:ff", ...);
//!
//! tokio::spawn({
//!     let p = peripheral.clone();
//!     async move { p.run(parts.events).await }
//! });
//!
//! let fut = peripheral.connect();
//! controller.inject_connect_success();
//! fut.await?;
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::{Mutex, mpsc};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::gatt::{Characteristic, DiscoverCharacteristics, Service};
use crate::transport::{Central, PeripheralEvent};
use crate::types::PeripheralId;

/// Builder for fake central instances.
pub struct FakeCentralBuilder {
    // Nothing configurable yet, but keeps call sites stable.
}

impl FakeCentralBuilder {
    pub fn new() -> Self {
        Self {}
    }

    /// Build the fake and return both parts and a controller.
    ///
    /// [`FakeCentralParts`] feeds a [`Peripheral`]; the
    /// [`FakeCentralController`] injects completion events and inspects
    /// captured requests.
    ///
    /// [`Peripheral`]: crate::peripheral::Peripheral
    pub fn build(self) -> (FakeCentralParts, FakeCentralController) {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let sent = Arc::new(Mutex::new(Vec::new()));

        let central = Arc::new(FakeCentral {
            sent: Arc::clone(&sent),
        });

        let parts = FakeCentralParts {
            central,
            events: event_rx,
        };
        let controller = FakeCentralController { event_tx, sent };

        (parts, controller)
    }
}

impl Default for FakeCentralBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// The pieces a session needs: the transport half and its event channel.
pub struct FakeCentralParts {
    pub central: Arc<FakeCentral>,
    pub events: mpsc::UnboundedReceiver<PeripheralEvent>,
}

/// A request captured by the fake central.
#[derive(Debug, Clone, PartialEq)]
pub enum SentRequest {
    Connect {
        id: PeripheralId,
    },
    Disconnect {
        id: PeripheralId,
    },
    UpdateRssi {
        id: PeripheralId,
    },
    DiscoverServices {
        id: PeripheralId,
        filter: Vec<Uuid>,
    },
    ReadHandle {
        id: PeripheralId,
        handle: u16,
    },
    WriteHandle {
        id: PeripheralId,
        handle: u16,
        data: Vec<u8>,
        without_response: bool,
    },
}

/// Controller for injecting completion events and inspecting requests.
pub struct FakeCentralController {
    event_tx: mpsc::UnboundedSender<PeripheralEvent>,
    sent: Arc<Mutex<Vec<SentRequest>>>,
}

impl FakeCentralController {
    /// Inject a raw completion event into the session's channel.
    pub fn inject(&self, event: PeripheralEvent) {
        let _ = self.event_tx.send(event);
    }

    pub fn inject_connect_success(&self) {
        self.inject(PeripheralEvent::ConnectComplete { error: None });
    }

    pub fn inject_connect_failure(&self, message: &str) {
        self.inject(PeripheralEvent::ConnectComplete {
            error: Some(message.to_string()),
        });
    }

    pub fn inject_disconnect(&self) {
        self.inject(PeripheralEvent::DisconnectComplete);
    }

    pub fn inject_rssi(&self, rssi: i16) {
        self.inject(PeripheralEvent::RssiUpdate(rssi));
    }

    pub fn inject_services(&self, services: Vec<Service>) {
        self.inject(PeripheralEvent::ServicesDiscovered(services));
    }

    pub fn inject_handle_read(&self, handle: u16, data: Vec<u8>) {
        self.inject(PeripheralEvent::HandleRead { handle, data });
    }

    pub fn inject_handle_write(&self, handle: u16) {
        self.inject(PeripheralEvent::HandleWrite { handle });
    }

    /// Take all captured requests, clearing the buffer.
    pub async fn take_sent(&self) -> Vec<SentRequest> {
        std::mem::take(&mut *self.sent.lock().await)
    }
}

/// In-memory central: records requests, never completes them.
pub struct FakeCentral {
    sent: Arc<Mutex<Vec<SentRequest>>>,
}

#[async_trait]
impl Central for FakeCentral {
    async fn connect(&self, id: &PeripheralId) -> Result<()> {
        self.sent.lock().await.push(SentRequest::Connect { id: id.clone() });
        Ok(())
    }

    async fn disconnect(&self, id: &PeripheralId) -> Result<()> {
        self.sent.lock().await.push(SentRequest::Disconnect { id: id.clone() });
        Ok(())
    }

    async fn update_rssi(&self, id: &PeripheralId) -> Result<()> {
        self.sent.lock().await.push(SentRequest::UpdateRssi { id: id.clone() });
        Ok(())
    }

    async fn discover_services(&self, id: &PeripheralId, filter: &[Uuid]) -> Result<()> {
        self.sent.lock().await.push(SentRequest::DiscoverServices {
            id: id.clone(),
            filter: filter.to_vec(),
        });
        Ok(())
    }

    async fn read_handle(&self, id: &PeripheralId, handle: u16) -> Result<()> {
        self.sent.lock().await.push(SentRequest::ReadHandle {
            id: id.clone(),
            handle,
        });
        Ok(())
    }

    async fn write_handle(
        &self,
        id: &PeripheralId,
        handle: u16,
        data: &[u8],
        without_response: bool,
    ) -> Result<()> {
        self.sent.lock().await.push(SentRequest::WriteHandle {
            id: id.clone(),
            handle,
            data: data.to_vec(),
            without_response,
        });
        Ok(())
    }
}

/// Scriptable per-service characteristic discovery.
///
/// Applies a non-empty filter to the scripted collection the way a real
/// helper would, and counts calls so tests can assert fail-fast
/// behavior in aggregate discovery.
pub struct FakeServiceDiscovery {
    characteristics: Vec<Characteristic>,
    fail_with: Option<String>,
    calls: AtomicUsize,
}

impl FakeServiceDiscovery {
    pub fn returning(characteristics: Vec<Characteristic>) -> Arc<Self> {
        Arc::new(Self {
            characteristics,
            fail_with: None,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn failing(message: &str) -> Arc<Self> {
        Arc::new(Self {
            characteristics: Vec::new(),
            fail_with: Some(message.to_string()),
            calls: AtomicUsize::new(0),
        })
    }

    /// How many times discovery was invoked on this service.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DiscoverCharacteristics for FakeServiceDiscovery {
    async fn discover_characteristics(&self, filter: &[Uuid]) -> Result<Vec<Characteristic>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = &self.fail_with {
            return Err(Error::Transport(message.clone()));
        }
        if filter.is_empty() {
            Ok(self.characteristics.clone())
        } else {
            Ok(self
                .characteristics
                .iter()
                .filter(|c| filter.contains(&c.uuid))
                .cloned()
                .collect())
        }
    }
}
