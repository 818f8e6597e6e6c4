//! Durable registry of registered users.
//!
//! The store only knows identities: a row exists or it doesn't. Every call is a
//! single atomic statement, so concurrent handlers never observe a half-applied
//! mutation.

use async_trait::async_trait;

use crate::domain::UserId;

mod memory;
mod sqlite;

pub use memory::MemoryUserStore;
pub use sqlite::SqliteUserStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Informational: `add` found an existing record and changed nothing.
    #[error("user {0} is already registered")]
    AlreadyRegistered(UserId),

    #[error("database error: {0}")]
    Database(String),
}

impl StoreError {
    pub fn is_already_registered(&self) -> bool {
        matches!(self, StoreError::AlreadyRegistered(_))
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        StoreError::Database(e.to_string())
    }
}

/// Persistence port for user registration.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// True iff a record with that identity currently exists.
    async fn contains(&self, id: UserId) -> Result<bool, StoreError>;

    /// Inserts a record if absent. Returns `AlreadyRegistered` without mutating
    /// anything when the record exists.
    async fn add(&self, id: UserId) -> Result<(), StoreError>;

    /// Deletes the record if present and reports whether a row was removed.
    async fn remove(&self, id: UserId) -> Result<bool, StoreError>;

    /// Releases backing resources. Safe to call more than once.
    async fn close(&self) {}
}
