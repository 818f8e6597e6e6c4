use std::collections::HashSet;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{StoreError, UserStore};
use crate::domain::UserId;

/// Non-durable store with the same contract as the SQLite one.
#[derive(Debug, Default)]
pub struct MemoryUserStore {
    users: RwLock<HashSet<UserId>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.users.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.users.read().await.is_empty()
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn contains(&self, id: UserId) -> Result<bool, StoreError> {
        Ok(self.users.read().await.contains(&id))
    }

    async fn add(&self, id: UserId) -> Result<(), StoreError> {
        if !self.users.write().await.insert(id) {
            return Err(StoreError::AlreadyRegistered(id));
        }
        Ok(())
    }

    async fn remove(&self, id: UserId) -> Result<bool, StoreError> {
        Ok(self.users.write().await.remove(&id))
    }
}
