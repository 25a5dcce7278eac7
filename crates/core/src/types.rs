//! Data model for discovered peripherals.
//!
//! Pure data types with no behavior beyond construction, accessors and
//! serialization: identity, link-layer addressing, connection state,
//! and the advertised payload captured at scan time.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque session identifier, stable for the device's lifetime in this
/// process. Assigned by the scanning layer.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PeripheralId(Arc<str>);

impl PeripheralId {
    pub fn new(id: impl Into<Arc<str>>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PeripheralId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PeripheralId {
    fn from(id: &str) -> Self {
        Self(Arc::from(id))
    }
}

impl From<String> for PeripheralId {
    fn from(id: String) -> Self {
        Self(Arc::from(id))
    }
}

/// Link-layer device address, colon-separated hex form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(String);

impl Address {
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Address {
    fn from(address: &str) -> Self {
        Self(address.to_string())
    }
}

/// Whether the link-layer address is public or randomly generated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddressType {
    Public,
    Random,
}

/// Connection state of a peripheral session.
///
/// Mutated only by the session itself, in response to requests it
/// issues and completion events it receives.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PeripheralState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Disconnecting,
}

impl PeripheralState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PeripheralState::Disconnected => "disconnected",
            PeripheralState::Connecting => "connecting",
            PeripheralState::Connected => "connected",
            PeripheralState::Disconnecting => "disconnecting",
        }
    }
}

impl fmt::Display for PeripheralState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Advertised payload captured at scan time.
///
/// Parsed upstream by the scanning layer and carried here opaquely for
/// callers; the session core never inspects it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Advertisement {
    pub local_name: Option<String>,
    #[serde(default)]
    pub service_uuids: Vec<Uuid>,
    pub manufacturer_data: Option<Vec<u8>>,
    pub tx_power_level: Option<i8>,
    #[serde(default)]
    pub service_data: Vec<ServiceData>,
}

/// One advertised service-data entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceData {
    pub uuid: Uuid,
    pub data: Vec<u8>,
}
