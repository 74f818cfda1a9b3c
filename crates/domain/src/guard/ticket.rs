//! Single-use override tickets for forced deletions.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use common::UserId;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::catalog::CatalogEntity;
use crate::error::DomainError;

use super::{DependencyCheckResult, DependencyCounts};

/// Permission, issued to one admin, to delete an entity despite the warnings
/// shown to them. Valid until `expires_at` and only while the counts it was
/// issued against still hold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverrideTicket {
    pub ticket_id: Uuid,
    pub entity: CatalogEntity,
    pub issued_to: UserId,
    pub warnings: Vec<String>,
    pub counts: DependencyCounts,
    pub tagged_events: u64,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl OverrideTicket {
    pub fn issue(check: DependencyCheckResult, admin: UserId, ttl: Duration) -> Self {
        let issued_at = Utc::now();
        Self {
            ticket_id: Uuid::new_v4(),
            entity: check.entity,
            issued_to: admin,
            warnings: check.warnings,
            counts: check.counts,
            tagged_events: check.tagged_events,
            issued_at,
            expires_at: issued_at + ttl,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Returns true if `check` saw exactly what this ticket was issued against.
    pub fn matches(&self, check: &DependencyCheckResult) -> bool {
        self.entity == check.entity
            && self.counts == check.counts
            && self.tagged_events == check.tagged_events
    }
}

/// Outstanding tickets. Expired ones are dropped whenever a ticket is issued.
#[derive(Debug, Default)]
pub(crate) struct TicketBook {
    tickets: Mutex<HashMap<Uuid, OverrideTicket>>,
}

impl TicketBook {
    pub(crate) async fn insert(&self, ticket: OverrideTicket) {
        let now = Utc::now();
        let mut tickets = self.tickets.lock().await;
        tickets.retain(|_, t| !t.is_expired(now));
        tickets.insert(ticket.ticket_id, ticket);
    }

    /// Takes the ticket out for `admin`.
    ///
    /// A ticket presented by someone else stays in place; an expired one is
    /// discarded.
    pub(crate) async fn redeem(
        &self,
        ticket_id: Uuid,
        admin: UserId,
    ) -> Result<OverrideTicket, DomainError> {
        let mut tickets = self.tickets.lock().await;
        let ticket = tickets
            .get(&ticket_id)
            .ok_or_else(|| DomainError::not_found("override ticket", ticket_id))?;

        if ticket.is_expired(Utc::now()) {
            tickets.remove(&ticket_id);
            return Err(DomainError::Validation(format!(
                "override ticket {ticket_id} has expired"
            )));
        }
        if ticket.issued_to != admin {
            return Err(DomainError::unauthorized(
                "override tickets can only be confirmed by the admin they were issued to",
            ));
        }

        tickets
            .remove(&ticket_id)
            .ok_or_else(|| DomainError::not_found("override ticket", ticket_id))
    }

    #[cfg(test)]
    pub(crate) async fn len(&self) -> usize {
        self.tickets.lock().await.len()
    }
}
