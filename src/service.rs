//! Token administration: the CRUD + preview surface used by the HTTP API,
//! the CLI and any embedding host.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::document::{ImportResult, TokenDocument};
use crate::models::token::{normalize_language, TokenDraft, TokenRecord};
use crate::resolver::{self, Resolver};
use crate::store::{StoreError, TokenStore};
use crate::substitute::{self, Substitution};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preview {
    pub original: String,
    pub replaced: String,
    /// Marker names that stayed in the output because nothing matched.
    #[serde(default)]
    pub unresolved: Vec<String>,
}

#[derive(Clone)]
pub struct TokenService {
    resolver: Resolver,
}

impl TokenService {
    pub fn new(store: Arc<dyn TokenStore>) -> Self {
        Self {
            resolver: Resolver::new(store),
        }
    }

    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    fn store(&self) -> &Arc<dyn TokenStore> {
        self.resolver.store()
    }

    pub async fn list_tokens(&self, language: Option<&str>) -> Result<Vec<TokenRecord>, StoreError> {
        self.resolver.list(language).await
    }

    pub async fn get_token(
        &self,
        name: &str,
        language: Option<&str>,
    ) -> Result<Option<TokenRecord>, StoreError> {
        self.resolver.resolve(name, language).await
    }

    /// Create or update. Blank names are rejected before the store is touched.
    pub async fn save_token(&self, draft: TokenDraft) -> Result<TokenRecord, AppError> {
        let draft = validate(draft)?;
        let saved = self.store().save(draft).await?;
        tracing::info!(
            id = %saved.id,
            name = %saved.name,
            language = saved.language_code.as_deref().unwrap_or(""),
            "token saved"
        );
        Ok(saved)
    }

    /// Delete by id. Ids that do not parse cannot exist, so they are a
    /// no-op just like unknown ids.
    pub async fn delete_token(&self, id: &str) -> Result<(), StoreError> {
        let Ok(id) = Uuid::parse_str(id.trim()) else {
            tracing::debug!(id, "delete: not a token id, nothing to do");
            return Ok(());
        };
        self.store().delete_by_id(id).await?;
        tracing::info!(%id, "token deleted");
        Ok(())
    }

    pub async fn replace_tokens(
        &self,
        text: &str,
        language: Option<&str>,
    ) -> Result<Substitution, StoreError> {
        let language = normalize_language(language);
        substitute::substitute(&self.resolver, text, language.as_deref()).await
    }

    pub async fn preview(&self, text: &str, language: Option<&str>) -> Result<Preview, StoreError> {
        let result = self.replace_tokens(text, language).await?;
        Ok(Preview {
            original: text.to_string(),
            replaced: result.text,
            unresolved: result.unresolved,
        })
    }

    pub async fn export(&self) -> Result<TokenDocument, StoreError> {
        let records = self.resolver.list(None).await?;
        Ok(TokenDocument::from_records(records))
    }

    /// Upsert every entry of `doc`.
    ///
    /// Entries carrying an id update that record. Entries without one
    /// update the winning record for their (name, language) pair if there
    /// is one, so re-importing an export does not create duplicates.
    /// Every entry is validated before anything is written, and the writes
    /// go to the store as one batch: an import lands whole or not at all.
    pub async fn import(&self, doc: TokenDocument) -> Result<ImportResult, AppError> {
        let drafts = doc
            .tokens
            .into_iter()
            .map(validate)
            .collect::<Result<Vec<_>, _>>()?;

        let mut existing = self.store().list_all().await?;
        let mut result = ImportResult::default();
        let mut batch = Vec::with_capacity(drafts.len());
        let now = Utc::now();

        for mut draft in drafts {
            let target = match draft.id {
                Some(id) => existing.iter().find(|r| r.id == id),
                None => exact_match(&existing, &draft),
            }
            .map(|r| r.id);

            let id = match target {
                Some(id) => {
                    result.tokens_updated += 1;
                    id
                }
                None => {
                    result.tokens_created += 1;
                    draft.id.unwrap_or_else(Uuid::new_v4)
                }
            };
            draft.id = Some(id);

            // Later entries for the same pair must see this one as the
            // current winner.
            existing.retain(|r| r.id != id);
            existing.push(draft.clone().into_record(id, None, now));
            batch.push(draft);
        }

        self.store().save_all(batch).await?;

        tracing::info!(
            created = result.tokens_created,
            updated = result.tokens_updated,
            "token import complete"
        );
        Ok(result)
    }
}

fn validate(draft: TokenDraft) -> Result<TokenDraft, AppError> {
    let draft = draft.normalized();
    if draft.name.is_empty() {
        return Err(AppError::Validation("Token name is required".to_string()));
    }
    Ok(draft)
}

/// The record an id-less draft would overwrite: same name, same language
/// tier, no fallback to neutral.
fn exact_match<'a>(existing: &'a [TokenRecord], draft: &TokenDraft) -> Option<&'a TokenRecord> {
    let winner = resolver::select(existing, &draft.name, draft.language_code.as_deref())?;
    (winner.language_code == draft.language_code).then_some(winner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;

    fn service() -> (TokenService, MemoryStore) {
        let store = MemoryStore::new();
        (TokenService::new(Arc::new(store.clone())), store)
    }

    #[tokio::test]
    async fn test_blank_name_is_rejected_before_store() {
        let (svc, store) = service();
        for name in ["", "   ", "\t"] {
            let err = svc.save_token(TokenDraft::new(name, "v")).await.unwrap_err();
            assert!(matches!(err, AppError::Validation(_)));
        }
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_save_normalizes_blank_language() {
        let (svc, _) = service();
        let saved = svc
            .save_token(TokenDraft::new("A", "x").with_language(""))
            .await
            .unwrap();
        assert!(saved.is_neutral());
    }

    #[tokio::test]
    async fn test_delete_accepts_garbage_ids() {
        let (svc, _) = service();
        svc.delete_token("not-a-uuid").await.unwrap();
        svc.delete_token("").await.unwrap();
    }

    #[tokio::test]
    async fn test_preview_reports_unresolved() {
        let (svc, _) = service();
        svc.save_token(TokenDraft::new("CompanyName", "Acme Corporation"))
            .await
            .unwrap();

        let preview = svc
            .preview("{{CompanyName}} / {{Missing}}", None)
            .await
            .unwrap();
        assert_eq!(preview.original, "{{CompanyName}} / {{Missing}}");
        assert_eq!(preview.replaced, "Acme Corporation / {{Missing}}");
        assert_eq!(preview.unresolved, vec!["Missing"]);
    }

    #[tokio::test]
    async fn test_import_twice_does_not_duplicate() {
        let (svc, store) = service();
        let doc = TokenDocument {
            version: "1".into(),
            tokens: vec![
                TokenDraft::new("Greeting", "Hi"),
                TokenDraft::new("Greeting", "Hej").with_language("sv"),
            ],
        };

        let first = svc.import(doc.clone()).await.unwrap();
        assert_eq!(first.tokens_created, 2);

        let second = svc.import(doc).await.unwrap();
        assert_eq!(second.tokens_created, 0);
        assert_eq!(second.tokens_updated, 2);
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn test_import_validates_everything_first() {
        let (svc, store) = service();
        let doc = TokenDocument {
            version: "1".into(),
            tokens: vec![TokenDraft::new("Ok", "x"), TokenDraft::new(" ", "y")],
        };
        assert!(svc.import(doc).await.is_err());
        assert!(store.is_empty());
    }

    /// Accepts one batch write and rejects everything else, like a store
    /// whose connection drops after the first statement.
    struct BatchOnlyStore {
        inner: MemoryStore,
    }

    #[async_trait::async_trait]
    impl TokenStore for BatchOnlyStore {
        async fn list_all(&self) -> Result<Vec<TokenRecord>, StoreError> {
            self.inner.list_all().await
        }
        async fn get(&self, id: Uuid) -> Result<Option<TokenRecord>, StoreError> {
            self.inner.get(id).await
        }
        async fn save(&self, _draft: TokenDraft) -> Result<TokenRecord, StoreError> {
            Err(StoreError::Unavailable("single writes disabled".into()))
        }
        async fn save_all(&self, drafts: Vec<TokenDraft>) -> Result<Vec<TokenRecord>, StoreError> {
            self.inner.save_all(drafts).await
        }
        async fn delete_by_id(&self, id: Uuid) -> Result<(), StoreError> {
            self.inner.delete_by_id(id).await
        }
    }

    #[tokio::test]
    async fn test_import_writes_one_batch() {
        let inner = MemoryStore::new();
        let svc = TokenService::new(Arc::new(BatchOnlyStore { inner: inner.clone() }));
        let doc = TokenDocument {
            version: "1".into(),
            tokens: vec![
                TokenDraft::new("CompanyName", "Acme"),
                TokenDraft::new("Greeting", "Hej").with_language("sv"),
                // Same pair again: updates the entry above, no duplicate.
                TokenDraft::new("greeting", "Hejsan").with_language("sv"),
            ],
        };

        let result = svc.import(doc).await.unwrap();
        assert_eq!(result.tokens_created, 2);
        assert_eq!(result.tokens_updated, 1);
        assert_eq!(inner.len(), 2);

        let greeting = svc.get_token("Greeting", Some("sv")).await.unwrap().unwrap();
        assert_eq!(greeting.value, "Hejsan");
    }

    #[tokio::test]
    async fn test_import_surfaces_batch_failure() {
        struct DownStore;

        #[async_trait::async_trait]
        impl TokenStore for DownStore {
            async fn list_all(&self) -> Result<Vec<TokenRecord>, StoreError> {
                Ok(Vec::new())
            }
            async fn get(&self, _id: Uuid) -> Result<Option<TokenRecord>, StoreError> {
                Ok(None)
            }
            async fn save(&self, _draft: TokenDraft) -> Result<TokenRecord, StoreError> {
                Err(StoreError::Unavailable("connection reset".into()))
            }
            async fn save_all(&self, _drafts: Vec<TokenDraft>) -> Result<Vec<TokenRecord>, StoreError> {
                Err(StoreError::Unavailable("connection reset".into()))
            }
            async fn delete_by_id(&self, _id: Uuid) -> Result<(), StoreError> {
                Ok(())
            }
        }

        let svc = TokenService::new(Arc::new(DownStore));
        let doc = TokenDocument {
            version: "1".into(),
            tokens: vec![TokenDraft::new("A", "1"), TokenDraft::new("B", "2")],
        };
        let err = svc.import(doc).await.unwrap_err();
        assert!(matches!(err, AppError::Store(StoreError::Unavailable(_))));
    }

    #[tokio::test]
    async fn test_export_round_trips_through_import() {
        let (svc, _) = service();
        svc.save_token(TokenDraft::new("A", "1")).await.unwrap();
        svc.save_token(TokenDraft::new("B", "2").with_language("en"))
            .await
            .unwrap();

        let doc = svc.export().await.unwrap();
        let yaml = doc.to_yaml().unwrap();

        let (other, other_store) = service();
        let parsed = TokenDocument::parse(yaml.as_bytes(), "application/yaml").unwrap();
        let result = other.import(parsed).await.unwrap();
        assert_eq!(result.tokens_created, 2);
        assert_eq!(other_store.len(), 2);
    }
}
