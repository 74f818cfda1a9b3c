//! Shared fixtures for unit tests.

use common::UserId;

use crate::catalog::{CatalogService, ChargingKind, ChargingOption};
use crate::value_objects::{ChargingTypeId, ServiceId};

/// "Desentupimento de Pia" with a single per-visit option at 80,00.
pub(crate) fn desentupimento(provider_id: UserId) -> CatalogService {
    CatalogService {
        id: ServiceId::new(),
        name: "Desentupimento de Pia".to_string(),
        description: "Desentupimento de pia de cozinha ou banheiro".to_string(),
        category: "Hidráulica".to_string(),
        provider_id,
        charging_options: vec![ChargingOption::new(
            ChargingTypeId::new(),
            ChargingKind::PerVisit,
            Some("80,00"),
        )],
        flat_price: None,
        is_active: true,
    }
}

/// A service that can only be quoted.
pub(crate) fn reforma(provider_id: UserId) -> CatalogService {
    CatalogService {
        id: ServiceId::new(),
        name: "Reforma de Banheiro".to_string(),
        description: String::new(),
        category: "Reformas".to_string(),
        provider_id,
        charging_options: vec![ChargingOption::new(
            ChargingTypeId::new(),
            ChargingKind::QuoteOnly,
            None,
        )],
        flat_price: None,
        is_active: true,
    }
}
