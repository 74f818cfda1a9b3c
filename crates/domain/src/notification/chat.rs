//! Chat collaborator: only the unread counter is consumed here.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::UserId;
use tokio::sync::RwLock;

use crate::error::DomainError;

/// Source of per-user unread chat message counts.
#[async_trait]
pub trait ChatService: Send + Sync {
    async fn unread_messages(&self, user: UserId) -> Result<u64, DomainError>;
}

/// In-memory chat counter, used by tests and when no chat backend is wired in.
#[derive(Debug, Clone, Default)]
pub struct InMemoryChatService {
    unread: Arc<RwLock<HashMap<UserId, u64>>>,
}

impl InMemoryChatService {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_unread(&self, user: UserId, count: u64) {
        self.unread.write().await.insert(user, count);
    }
}

#[async_trait]
impl ChatService for InMemoryChatService {
    async fn unread_messages(&self, user: UserId) -> Result<u64, DomainError> {
        Ok(self.unread.read().await.get(&user).copied().unwrap_or(0))
    }
}
