use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use uuid::Uuid;

use super::{StoreError, TokenStore};
use crate::models::token::{TokenDraft, TokenRecord};

/// In-process token store.
///
/// DashMap shards lock per entry, so a concurrent reader always sees a
/// whole record, never a half-applied save.
#[derive(Clone, Default)]
pub struct MemoryStore {
    records: Arc<DashMap<Uuid, TokenRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl TokenStore for MemoryStore {
    async fn list_all(&self) -> Result<Vec<TokenRecord>, StoreError> {
        Ok(self.records.iter().map(|e| e.value().clone()).collect())
    }

    async fn get(&self, id: Uuid) -> Result<Option<TokenRecord>, StoreError> {
        Ok(self.records.get(&id).map(|e| e.value().clone()))
    }

    async fn save(&self, draft: TokenDraft) -> Result<TokenRecord, StoreError> {
        let now = Utc::now();
        let id = draft.id.unwrap_or_else(Uuid::new_v4);

        // entry() holds the shard lock across read-modify-write
        let record = match self.records.entry(id) {
            dashmap::mapref::entry::Entry::Occupied(mut slot) => {
                let created = slot.get().created_at;
                let record = draft.into_record(id, Some(created), now);
                slot.insert(record.clone());
                record
            }
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                let record = draft.into_record(id, None, now);
                slot.insert(record.clone());
                record
            }
        };

        Ok(record)
    }

    async fn delete_by_id(&self, id: Uuid) -> Result<(), StoreError> {
        self.records.remove(&id);
        Ok(())
    }
}
