//! GATT entities surfaced by discovery.
//!
//! [`Service`] and [`Characteristic`] are constructed by the layer that
//! decodes discovery responses; this core only sequences discovery
//! calls and aggregates their results. Each service carries its own
//! characteristic-discovery collaborator as a trait object, the way a
//! discovered sub-entity exposes its own discovery operation.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Result;

/// Per-service characteristic discovery collaborator.
///
/// Implemented by the transport-facing layer; an empty `filter` means
/// "all characteristics".
#[async_trait]
pub trait DiscoverCharacteristics: Send + Sync {
    async fn discover_characteristics(&self, filter: &[Uuid]) -> Result<Vec<Characteristic>>;
}

/// A discovered GATT service.
#[derive(Clone)]
pub struct Service {
    uuid: Uuid,
    start_handle: u16,
    end_handle: u16,
    discovery: Arc<dyn DiscoverCharacteristics>,
}

impl Service {
    pub fn new(
        uuid: Uuid,
        start_handle: u16,
        end_handle: u16,
        discovery: Arc<dyn DiscoverCharacteristics>,
    ) -> Self {
        Self {
            uuid,
            start_handle,
            end_handle,
            discovery,
        }
    }

    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    /// First attribute handle of the service's declaration range.
    pub fn start_handle(&self) -> u16 {
        self.start_handle
    }

    /// Last attribute handle of the service's declaration range.
    pub fn end_handle(&self) -> u16 {
        self.end_handle
    }

    /// Discover this service's characteristics, restricted to `filter`
    /// when non-empty.
    pub async fn discover_characteristics(&self, filter: &[Uuid]) -> Result<Vec<Characteristic>> {
        self.discovery.discover_characteristics(filter).await
    }
}

impl fmt::Debug for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Service")
            .field("uuid", &self.uuid)
            .field("start_handle", &self.start_handle)
            .field("end_handle", &self.end_handle)
            .finish_non_exhaustive()
    }
}

/// A discovered GATT characteristic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Characteristic {
    pub uuid: Uuid,
    /// Handle of the characteristic declaration attribute.
    pub declaration_handle: u16,
    /// Handle of the attribute holding the characteristic value; this
    /// is the handle raw read/write operations target.
    pub value_handle: u16,
    pub properties: CharacteristicProperties,
}

/// Property bits from the characteristic declaration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacteristicProperties {
    pub broadcast: bool,
    pub read: bool,
    pub write_without_response: bool,
    pub write: bool,
    pub notify: bool,
    pub indicate: bool,
}
