//! Cart commands.

use serde::{Deserialize, Serialize};

use crate::value_objects::{ChargingTypeId, ServiceId};

/// Command to put a service into the caller's cart.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddCartItem {
    /// The service to add.
    pub service_id: ServiceId,

    /// The charging option the client picked, if any.
    #[serde(default)]
    pub charging_type_id: Option<ChargingTypeId>,

    /// Requested quantity; clamped into range, never rejected.
    #[serde(default = "default_quantity")]
    pub quantity: i64,

    #[serde(default)]
    pub notes: Option<String>,
}

fn default_quantity() -> i64 {
    1
}

impl AddCartItem {
    pub fn new(service_id: ServiceId) -> Self {
        Self {
            service_id,
            charging_type_id: None,
            quantity: default_quantity(),
            notes: None,
        }
    }

    pub fn with_charging_type(mut self, charging_type_id: ChargingTypeId) -> Self {
        self.charging_type_id = Some(charging_type_id);
        self
    }

    pub fn with_quantity(mut self, quantity: i64) -> Self {
        self.quantity = quantity;
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }
}
