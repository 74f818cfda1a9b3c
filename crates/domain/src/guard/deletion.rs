//! The record left behind when a catalog entity is deleted.

use chrono::{DateTime, Utc};
use common::{Actor, AggregateId};
use event_store::{Tag, Version};
use serde::{Deserialize, Serialize};

use crate::aggregate::{Aggregate, DomainEvent};
use crate::catalog::CatalogEntity;
use crate::error::DomainError;

use super::DependencyCounts;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum DeletionEvent {
    CatalogEntityDeleted(CatalogEntityDeletedData),
}

impl DomainEvent for DeletionEvent {
    fn event_type(&self) -> &'static str {
        match self {
            DeletionEvent::CatalogEntityDeleted(_) => "CatalogEntityDeleted",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogEntityDeletedData {
    pub entity: CatalogEntity,
    pub actor: Actor,
    /// True when an admin overrode a blocking check.
    pub forced: bool,
    pub overridden_warnings: Vec<String>,
    pub counts: DependencyCounts,
    pub deleted_at: DateTime<Utc>,
}

/// Stream keyed by the entity's own uuid, so an entity can be deleted once.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogDeletion {
    id: Option<AggregateId>,
    #[serde(default)]
    version: Version,
    record: Option<CatalogEntityDeletedData>,
}

impl Aggregate for CatalogDeletion {
    type Event = DeletionEvent;
    type Error = DomainError;

    fn aggregate_type() -> &'static str {
        "CatalogEntity"
    }

    fn id(&self) -> Option<AggregateId> {
        self.id
    }

    fn version(&self) -> Version {
        self.version
    }

    fn set_version(&mut self, version: Version) {
        self.version = version;
    }

    fn apply(&mut self, event: Self::Event) {
        match event {
            DeletionEvent::CatalogEntityDeleted(data) => {
                self.id = Some(Self::stream_id(&data.entity));
                self.record = Some(data);
            }
        }
    }

    fn tags(&self) -> Vec<Tag> {
        self.record
            .iter()
            .flat_map(|record| [record.entity.tag(), record.entity.deletion_tag()])
            .collect()
    }
}

impl CatalogDeletion {
    pub fn stream_id(entity: &CatalogEntity) -> AggregateId {
        AggregateId::from_uuid(entity.uuid())
    }

    pub fn record(&self) -> Option<&CatalogEntityDeletedData> {
        self.record.as_ref()
    }

    pub fn delete(
        &self,
        data: CatalogEntityDeletedData,
    ) -> Result<Vec<DeletionEvent>, DomainError> {
        if self.record.is_some() {
            return Err(DomainError::not_found(data.entity.noun(), data.entity.uuid()));
        }
        Ok(vec![DeletionEvent::CatalogEntityDeleted(data)])
    }
}
