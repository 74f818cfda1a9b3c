//! Catalog collaborator: services, their charging options and charging types.
//!
//! The engine only reads the catalog to price and snapshot items. Removal and
//! deactivation are invoked solely by the dependency guard's delete path.

mod memory;

pub use memory::InMemoryCatalog;

use async_trait::async_trait;
use common::UserId;
use event_store::Tag;
use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::value_objects::{ChargingTypeId, Money, ServiceId};

/// How a charging option bills the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChargingKind {
    Hourly,
    PerVisit,
    Fixed,
    /// Never priced; the client must request a quote.
    QuoteOnly,
    /// Deliberately zero-priced, as opposed to a missing price.
    Free,
}

/// A price as the catalog stores it: text like `"80,00"` or a bare number.
///
/// Catalog prices are not validated upstream, so the engine reads them
/// leniently; see [`Money::parse_lenient`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawPrice {
    Number(serde_json::Number),
    Text(String),
}

impl RawPrice {
    pub fn amount(&self) -> Money {
        match self {
            RawPrice::Number(n) => Money::parse_lenient(&n.to_string()),
            RawPrice::Text(s) => Money::parse_lenient(s),
        }
    }
}

impl From<&str> for RawPrice {
    fn from(s: &str) -> Self {
        RawPrice::Text(s.to_string())
    }
}

/// A pricing mode configured on a service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChargingOption {
    pub charging_type_id: ChargingTypeId,
    pub kind: ChargingKind,
    #[serde(default)]
    pub price: Option<RawPrice>,
}

impl ChargingOption {
    pub fn new(charging_type_id: ChargingTypeId, kind: ChargingKind, price: Option<&str>) -> Self {
        Self {
            charging_type_id,
            kind,
            price: price.map(RawPrice::from),
        }
    }

    /// The configured price, zero when missing or malformed.
    pub fn amount(&self) -> Money {
        self.price.as_ref().map(RawPrice::amount).unwrap_or_default()
    }
}

/// The charging option a line item was priced with, as recorded on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChargingSelection {
    pub charging_type_id: ChargingTypeId,
    pub kind: ChargingKind,
}

impl From<&ChargingOption> for ChargingSelection {
    fn from(option: &ChargingOption) -> Self {
        Self {
            charging_type_id: option.charging_type_id,
            kind: option.kind,
        }
    }
}

/// A named charging type shared across services (e.g. "Visita técnica").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChargingType {
    pub id: ChargingTypeId,
    pub name: String,
    pub kind: ChargingKind,
}

/// A service offered by a provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogService {
    pub id: ServiceId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: String,
    pub provider_id: UserId,
    #[serde(default)]
    pub charging_options: Vec<ChargingOption>,
    #[serde(default)]
    pub flat_price: Option<RawPrice>,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

/// A catalog record that other records may reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum CatalogEntity {
    Service(ServiceId),
    ChargingType(ChargingTypeId),
}

impl CatalogEntity {
    /// Tag carried by every event that references this entity.
    pub fn tag(&self) -> Tag {
        match self {
            CatalogEntity::Service(id) => Tag::new("service", id),
            CatalogEntity::ChargingType(id) => Tag::new("charging_type", id),
        }
    }

    /// Tag carried only by the entity's deletion record.
    pub fn deletion_tag(&self) -> Tag {
        Tag::new("deleted", self.tag())
    }

    pub fn uuid(&self) -> uuid::Uuid {
        match self {
            CatalogEntity::Service(id) => id.as_uuid(),
            CatalogEntity::ChargingType(id) => id.as_uuid(),
        }
    }

    /// Singular noun used in user-facing warnings.
    pub fn noun(&self) -> &'static str {
        match self {
            CatalogEntity::Service(_) => "service",
            CatalogEntity::ChargingType(_) => "charging type",
        }
    }
}

impl std::fmt::Display for CatalogEntity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.tag())
    }
}

/// Read access to the catalog, plus the two mutations the guard may perform.
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Looks up a service, active or not.
    async fn get_service(&self, id: ServiceId) -> Result<Option<CatalogService>, DomainError>;

    /// Returns true if the entity exists in the catalog.
    async fn exists(&self, entity: CatalogEntity) -> Result<bool, DomainError>;

    /// Charging-type configurations hanging off the entity: a service's
    /// charging options, or the services configured with a charging type.
    async fn charging_configurations(&self, entity: CatalogEntity) -> Result<u64, DomainError>;

    /// Hard-deletes the entity.
    async fn remove(&self, entity: CatalogEntity) -> Result<(), DomainError>;

    /// Soft-deactivates a service; it stays readable but cannot be added to carts.
    async fn deactivate(&self, id: ServiceId) -> Result<(), DomainError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_price_accepts_text_and_numbers() {
        let text: RawPrice = serde_json::from_str(r#""80,00""#).unwrap();
        let number: RawPrice = serde_json::from_str("80.5").unwrap();
        let garbage: RawPrice = serde_json::from_str(r#""a combinar""#).unwrap();

        assert_eq!(text.amount(), Money::from_cents(8000));
        assert_eq!(number.amount(), Money::from_cents(8050));
        assert!(garbage.amount().is_zero());
    }

    #[test]
    fn missing_price_is_zero() {
        let option = ChargingOption::new(ChargingTypeId::new(), ChargingKind::Hourly, None);
        assert!(option.amount().is_zero());
    }

    #[test]
    fn entity_tags_are_namespaced() {
        let id = ServiceId::new();
        assert_eq!(
            CatalogEntity::Service(id).tag().as_str(),
            format!("service:{id}")
        );
    }

    #[test]
    fn service_defaults_to_active() {
        let json = serde_json::json!({
            "id": ServiceId::new(),
            "name": "Desentupimento de Pia",
            "provider_id": UserId::new(),
        });
        let service: CatalogService = serde_json::from_value(json).unwrap();
        assert!(service.is_active);
        assert!(service.charging_options.is_empty());
    }
}
