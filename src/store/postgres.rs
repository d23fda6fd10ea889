use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgArguments, PgPoolOptions};
use sqlx::query::QueryAs;
use sqlx::{PgPool, Postgres};
use uuid::Uuid;

use super::{StoreError, TokenStore};
use crate::models::token::{TokenDraft, TokenRecord};

const TOKEN_COLUMNS: &str = "id, name, value, language_code, description, created_at, modified_at";

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
    timeout: Duration,
}

impl PgStore {
    pub async fn connect(database_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .acquire_timeout(timeout)
            .connect(database_url)
            .await?;
        Ok(Self { pool, timeout })
    }

    /// Run pending migrations from the migrations/ directory.
    pub async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    /// Every query goes through here so a stalled database surfaces as
    /// `Unavailable` instead of hanging the request.
    async fn bounded<T, F>(&self, op: &'static str, fut: F) -> Result<T, StoreError>
    where
        T: Send,
        F: Future<Output = Result<T, sqlx::Error>> + Send,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(Ok(v)) => Ok(v),
            Ok(Err(e)) => {
                tracing::error!(op, error = %e, "token store query failed");
                Err(StoreError::Database(e))
            }
            Err(_) => {
                tracing::error!(op, timeout_ms = self.timeout.as_millis() as u64, "token store query timed out");
                Err(StoreError::Unavailable(format!("{} timed out", op)))
            }
        }
    }
}

#[async_trait]
impl TokenStore for PgStore {
    async fn list_all(&self) -> Result<Vec<TokenRecord>, StoreError> {
        let sql = format!("SELECT {} FROM content_tokens", TOKEN_COLUMNS);
        let rows = self
            .bounded(
                "list_all",
                sqlx::query_as::<_, TokenRow>(&sql).fetch_all(&self.pool),
            )
            .await?;
        Ok(rows.into_iter().map(TokenRecord::from).collect())
    }

    async fn find_by_name(&self, name: &str) -> Result<Vec<TokenRecord>, StoreError> {
        let sql = format!(
            "SELECT {} FROM content_tokens WHERE lower(name) = lower($1)",
            TOKEN_COLUMNS
        );
        let rows = self
            .bounded(
                "find_by_name",
                sqlx::query_as::<_, TokenRow>(&sql)
                    .bind(name)
                    .fetch_all(&self.pool),
            )
            .await?;
        Ok(rows.into_iter().map(TokenRecord::from).collect())
    }

    async fn get(&self, id: Uuid) -> Result<Option<TokenRecord>, StoreError> {
        let sql = format!("SELECT {} FROM content_tokens WHERE id = $1", TOKEN_COLUMNS);
        let row = self
            .bounded(
                "get",
                sqlx::query_as::<_, TokenRow>(&sql)
                    .bind(id)
                    .fetch_optional(&self.pool),
            )
            .await?;
        Ok(row.map(TokenRecord::from))
    }

    async fn save(&self, draft: TokenDraft) -> Result<TokenRecord, StoreError> {
        let id = draft.id.unwrap_or_else(Uuid::new_v4);
        let record = draft.into_record(id, None, Utc::now());

        let sql = upsert_sql();
        let row = self
            .bounded("save", upsert(&sql, record).fetch_one(&self.pool))
            .await?;
        Ok(row.into())
    }

    async fn save_all(&self, drafts: Vec<TokenDraft>) -> Result<Vec<TokenRecord>, StoreError> {
        let sql = upsert_sql();
        let pool = &self.pool;
        let now = Utc::now();

        // Dropping an uncommitted transaction rolls it back, so a failed
        // or timed-out batch leaves the table untouched.
        let rows = self
            .bounded("save_all", async move {
                let mut tx = pool.begin().await?;
                let mut rows = Vec::with_capacity(drafts.len());
                for draft in drafts {
                    let id = draft.id.unwrap_or_else(Uuid::new_v4);
                    let record = draft.into_record(id, None, now);
                    rows.push(upsert(&sql, record).fetch_one(&mut *tx).await?);
                }
                tx.commit().await?;
                Ok::<_, sqlx::Error>(rows)
            })
            .await?;
        Ok(rows.into_iter().map(TokenRecord::from).collect())
    }

    async fn delete_by_id(&self, id: Uuid) -> Result<(), StoreError> {
        let result = self
            .bounded(
                "delete_by_id",
                sqlx::query("DELETE FROM content_tokens WHERE id = $1")
                    .bind(id)
                    .execute(&self.pool),
            )
            .await?;

        if result.rows_affected() == 0 {
            tracing::debug!(%id, "delete: token already absent");
        }
        Ok(())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.bounded("ping", sqlx::query("SELECT 1").execute(&self.pool))
            .await
            .map(|_| ())
    }
}

// created_at is left out of the UPDATE arm so the first save's timestamp
// survives every later upsert.
fn upsert_sql() -> String {
    format!(
        r#"INSERT INTO content_tokens ({cols})
           VALUES ($1, $2, $3, $4, $5, $6, $7)
           ON CONFLICT (id) DO UPDATE SET
               name = EXCLUDED.name,
               value = EXCLUDED.value,
               language_code = EXCLUDED.language_code,
               description = EXCLUDED.description,
               modified_at = EXCLUDED.modified_at
           RETURNING {cols}"#,
        cols = TOKEN_COLUMNS
    )
}

fn upsert(sql: &str, record: TokenRecord) -> QueryAs<'_, Postgres, TokenRow, PgArguments> {
    sqlx::query_as::<_, TokenRow>(sql)
        .bind(record.id)
        .bind(record.name)
        .bind(record.value)
        .bind(record.language_code)
        .bind(record.description)
        .bind(record.created_at)
        .bind(record.modified_at)
}

#[derive(Debug, sqlx::FromRow)]
pub struct TokenRow {
    pub id: Uuid,
    pub name: String,
    pub value: String,
    pub language_code: Option<String>,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

impl From<TokenRow> for TokenRecord {
    fn from(row: TokenRow) -> Self {
        TokenRecord {
            id: row.id,
            name: row.name,
            value: row.value,
            language_code: row.language_code.filter(|c| !c.is_empty()),
            description: row.description,
            created_at: row.created_at,
            modified_at: row.modified_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_with_empty_language_is_neutral() {
        let now = Utc::now();
        let row = TokenRow {
            id: Uuid::new_v4(),
            name: "Legacy".into(),
            value: "v".into(),
            language_code: Some(String::new()),
            description: None,
            created_at: now,
            modified_at: now,
        };
        assert!(TokenRecord::from(row).is_neutral());
    }
}
