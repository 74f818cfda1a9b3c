//! Dependency counts and the deletability verdict built from them.

use serde::{Deserialize, Serialize};

use crate::catalog::CatalogEntity;

/// Records referencing a catalog entity, counted per kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyCounts {
    /// Bookings created with the entity in their snapshot.
    pub order_items: u64,
    /// Charging-type configurations hanging off the entity.
    pub charging_types: u64,
    /// Quote requests still pending or quoted.
    pub service_requests: u64,
    /// Earnings recorded for completed bookings.
    pub provider_earnings: u64,
}

impl DependencyCounts {
    /// Historical records that must never be orphaned.
    pub fn has_transactional(&self) -> bool {
        self.order_items > 0 || self.provider_earnings > 0
    }

    pub fn is_empty(&self) -> bool {
        *self == DependencyCounts::default()
    }

    /// One display-ready warning per non-zero kind, in a fixed order.
    pub fn warnings(&self, entity: &CatalogEntity) -> Vec<String> {
        let noun = entity.noun();
        let mut warnings = Vec::new();

        if self.order_items > 0 {
            warnings.push(format!(
                "this {noun} has {} linked {}",
                self.order_items,
                plural(self.order_items, "order", "orders")
            ));
        }
        if self.charging_types > 0 {
            warnings.push(match entity {
                CatalogEntity::Service(_) => format!(
                    "this service has {} charging type {}",
                    self.charging_types,
                    plural(self.charging_types, "configuration", "configurations")
                ),
                CatalogEntity::ChargingType(_) => format!(
                    "this charging type is configured on {} {}",
                    self.charging_types,
                    plural(self.charging_types, "service", "services")
                ),
            });
        }
        if self.service_requests > 0 {
            warnings.push(format!(
                "this {noun} has {} pending service {}",
                self.service_requests,
                plural(self.service_requests, "request", "requests")
            ));
        }
        if self.provider_earnings > 0 {
            warnings.push(format!(
                "this {noun} has {} provider earnings {}",
                self.provider_earnings,
                plural(self.provider_earnings, "record", "records")
            ));
        }
        warnings
    }
}

fn plural(n: u64, one: &'static str, many: &'static str) -> &'static str {
    if n == 1 { one } else { many }
}

/// Outcome of a dependency check. Taking it never changes anything.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyCheckResult {
    pub entity: CatalogEntity,
    pub can_delete: bool,
    pub warnings: Vec<String>,
    pub counts: DependencyCounts,

    /// Stored events referencing the entity when the check was taken. A
    /// delete only commits if this is still the count.
    pub tagged_events: u64,
}

impl DependencyCheckResult {
    pub fn new(entity: CatalogEntity, counts: DependencyCounts, tagged_events: u64) -> Self {
        Self {
            entity,
            can_delete: !counts.has_transactional(),
            warnings: counts.warnings(&entity),
            counts,
            tagged_events,
        }
    }
}
