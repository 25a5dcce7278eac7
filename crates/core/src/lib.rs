// ble-core: BLE central peripheral session core.
//
// Bridges an event-driven radio transport to an async request/response
// API: each operation registers a one-shot waiter, issues an
// identity-addressed request, and resolves when the matching completion
// event is dispatched.

mod bridge;
pub mod error;
pub mod fake;
pub mod gatt;
pub mod peripheral;
pub mod transport;
pub mod types;

/// Largest value a GATT attribute can hold, per the ATT protocol.
///
/// Write payloads are validated against this bound locally, before any
/// request reaches the transport.
pub const MAX_ATTRIBUTE_VALUE_LEN: usize = 512;

pub use error::{Error, Result};
pub use gatt::{Characteristic, CharacteristicProperties, DiscoverCharacteristics, Service};
pub use peripheral::Peripheral;
pub use transport::{Central, PeripheralEvent};
pub use types::{Address, AddressType, Advertisement, PeripheralId, PeripheralState, ServiceData};
