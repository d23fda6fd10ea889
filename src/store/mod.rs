pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::models::token::{TokenDraft, TokenRecord};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("token store unavailable: {0}")]
    Unavailable(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Abstraction over token persistence.
/// Implementations: MemoryStore (DashMap, process-local), PgStore (Postgres).
///
/// Stores apply no business rules: no validation, no ordering, no
/// language fallback. Those live in `resolver` and `service`.
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Every stored record, in no particular order.
    async fn list_all(&self) -> Result<Vec<TokenRecord>, StoreError>;

    /// Records whose name matches case-insensitively.
    async fn find_by_name(&self, name: &str) -> Result<Vec<TokenRecord>, StoreError> {
        Ok(self
            .list_all()
            .await?
            .into_iter()
            .filter(|r| r.matches_name(name))
            .collect())
    }

    async fn get(&self, id: Uuid) -> Result<Option<TokenRecord>, StoreError>;

    /// Insert or update. A draft without an id gets a fresh one; a draft
    /// with an id keeps it and keeps the stored `created_at` if present.
    async fn save(&self, draft: TokenDraft) -> Result<TokenRecord, StoreError>;

    /// Save a batch with the same per-draft semantics as `save`.
    ///
    /// All or nothing: on error no draft of the batch is persisted. The
    /// default suits stores whose `save` cannot fail; fallible backends
    /// must override it.
    async fn save_all(&self, drafts: Vec<TokenDraft>) -> Result<Vec<TokenRecord>, StoreError> {
        let mut saved = Vec::with_capacity(drafts.len());
        for draft in drafts {
            saved.push(self.save(draft).await?);
        }
        Ok(saved)
    }

    /// Idempotent: deleting an unknown id is not an error.
    async fn delete_by_id(&self, id: Uuid) -> Result<(), StoreError>;

    /// Cheap reachability probe for readiness checks.
    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
