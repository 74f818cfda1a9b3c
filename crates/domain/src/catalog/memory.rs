use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::RwLock;

use super::{CatalogEntity, CatalogService, ChargingType, Catalog};
use crate::error::DomainError;
use crate::value_objects::{ChargingTypeId, ServiceId};

#[derive(Default)]
struct CatalogState {
    services: HashMap<ServiceId, CatalogService>,
    charging_types: HashMap<ChargingTypeId, ChargingType>,
}

/// Seed file layout for [`InMemoryCatalog::load_seed`].
#[derive(Debug, Default, Deserialize)]
pub struct CatalogSeed {
    #[serde(default)]
    pub charging_types: Vec<ChargingType>,
    #[serde(default)]
    pub services: Vec<CatalogService>,
}

/// In-memory catalog, used by tests and when no external catalog is wired in.
#[derive(Clone, Default)]
pub struct InMemoryCatalog {
    state: Arc<RwLock<CatalogState>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a catalog from a parsed seed.
    pub fn from_seed(seed: CatalogSeed) -> Self {
        let state = CatalogState {
            services: seed.services.into_iter().map(|s| (s.id, s)).collect(),
            charging_types: seed.charging_types.into_iter().map(|c| (c.id, c)).collect(),
        };
        Self {
            state: Arc::new(RwLock::new(state)),
        }
    }

    /// Reads a JSON seed file.
    pub async fn load_seed(path: impl AsRef<Path>) -> Result<Self, DomainError> {
        let path = path.as_ref();
        let contents = tokio::fs::read_to_string(path).await.map_err(|e| {
            DomainError::Collaborator(format!("reading catalog seed {}: {e}", path.display()))
        })?;
        let seed: CatalogSeed = serde_json::from_str(&contents)?;
        tracing::info!(
            services = seed.services.len(),
            charging_types = seed.charging_types.len(),
            "Loaded catalog seed"
        );
        Ok(Self::from_seed(seed))
    }

    pub async fn insert_service(&self, service: CatalogService) {
        self.state.write().await.services.insert(service.id, service);
    }

    pub async fn insert_charging_type(&self, charging_type: ChargingType) {
        self.state
            .write()
            .await
            .charging_types
            .insert(charging_type.id, charging_type);
    }
}

#[async_trait]
impl Catalog for InMemoryCatalog {
    async fn get_service(&self, id: ServiceId) -> Result<Option<CatalogService>, DomainError> {
        Ok(self.state.read().await.services.get(&id).cloned())
    }

    async fn exists(&self, entity: CatalogEntity) -> Result<bool, DomainError> {
        let state = self.state.read().await;
        Ok(match entity {
            CatalogEntity::Service(id) => state.services.contains_key(&id),
            CatalogEntity::ChargingType(id) => state.charging_types.contains_key(&id),
        })
    }

    async fn charging_configurations(&self, entity: CatalogEntity) -> Result<u64, DomainError> {
        let state = self.state.read().await;
        let count = match entity {
            CatalogEntity::Service(id) => state
                .services
                .get(&id)
                .map(|s| s.charging_options.len())
                .unwrap_or(0),
            CatalogEntity::ChargingType(id) => state
                .services
                .values()
                .filter(|s| s.charging_options.iter().any(|o| o.charging_type_id == id))
                .count(),
        };
        Ok(count as u64)
    }

    async fn remove(&self, entity: CatalogEntity) -> Result<(), DomainError> {
        let mut state = self.state.write().await;
        match entity {
            CatalogEntity::Service(id) => {
                state.services.remove(&id);
            }
            CatalogEntity::ChargingType(id) => {
                state.charging_types.remove(&id);
                for service in state.services.values_mut() {
                    service.charging_options.retain(|o| o.charging_type_id != id);
                }
            }
        }
        Ok(())
    }

    async fn deactivate(&self, id: ServiceId) -> Result<(), DomainError> {
        let mut state = self.state.write().await;
        let service = state
            .services
            .get_mut(&id)
            .ok_or_else(|| DomainError::not_found("service", id))?;
        service.is_active = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{ChargingKind, ChargingOption};
    use common::UserId;

    fn service_with(options: Vec<ChargingOption>) -> CatalogService {
        CatalogService {
            id: ServiceId::new(),
            name: "Instalação de Chuveiro".to_string(),
            description: String::new(),
            category: "Elétrica".to_string(),
            provider_id: UserId::new(),
            charging_options: options,
            flat_price: None,
            is_active: true,
        }
    }

    #[tokio::test]
    async fn counts_configurations_both_ways() {
        let catalog = InMemoryCatalog::new();
        let hourly = ChargingTypeId::new();
        let visit = ChargingTypeId::new();

        let a = service_with(vec![
            ChargingOption::new(hourly, ChargingKind::Hourly, Some("50.00")),
            ChargingOption::new(visit, ChargingKind::PerVisit, Some("80.00")),
        ]);
        let b = service_with(vec![ChargingOption::new(
            hourly,
            ChargingKind::Hourly,
            Some("60.00"),
        )]);
        let a_id = a.id;
        catalog.insert_service(a).await;
        catalog.insert_service(b).await;

        assert_eq!(
            catalog
                .charging_configurations(CatalogEntity::Service(a_id))
                .await
                .unwrap(),
            2
        );
        assert_eq!(
            catalog
                .charging_configurations(CatalogEntity::ChargingType(hourly))
                .await
                .unwrap(),
            2
        );
    }

    #[tokio::test]
    async fn removing_a_charging_type_detaches_it_from_services() {
        let catalog = InMemoryCatalog::new();
        let hourly = ChargingTypeId::new();
        catalog
            .insert_charging_type(ChargingType {
                id: hourly,
                name: "Hora".to_string(),
                kind: ChargingKind::Hourly,
            })
            .await;
        let service = service_with(vec![ChargingOption::new(
            hourly,
            ChargingKind::Hourly,
            Some("50"),
        )]);
        let service_id = service.id;
        catalog.insert_service(service).await;

        catalog
            .remove(CatalogEntity::ChargingType(hourly))
            .await
            .unwrap();

        assert!(
            !catalog
                .exists(CatalogEntity::ChargingType(hourly))
                .await
                .unwrap()
        );
        let service = catalog.get_service(service_id).await.unwrap().unwrap();
        assert!(service.charging_options.is_empty());
    }

    #[tokio::test]
    async fn deactivate_keeps_service_readable() {
        let catalog = InMemoryCatalog::new();
        let service = service_with(vec![]);
        let id = service.id;
        catalog.insert_service(service).await;

        catalog.deactivate(id).await.unwrap();

        let service = catalog.get_service(id).await.unwrap().unwrap();
        assert!(!service.is_active);
    }

    #[test]
    fn seed_parses_mixed_price_formats() {
        let json = serde_json::json!({
            "services": [{
                "id": ServiceId::new(),
                "name": "Desentupimento de Pia",
                "provider_id": UserId::new(),
                "charging_options": [
                    {"charging_type_id": ChargingTypeId::new(), "kind": "per_visit", "price": "80,00"},
                    {"charging_type_id": ChargingTypeId::new(), "kind": "hourly", "price": 45}
                ]
            }]
        });
        let seed: CatalogSeed = serde_json::from_value(json).unwrap();
        let options = &seed.services[0].charging_options;
        assert_eq!(options[0].amount().cents(), 8000);
        assert_eq!(options[1].amount().cents(), 4500);
    }
}
