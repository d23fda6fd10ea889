use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;

use crate::errors::AppError;
use crate::models::token::{TokenDraft, TokenRecord};
use crate::service::Preview;
use crate::AppState;

// ── Request DTOs ─────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LanguageQuery {
    pub language_code: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewRequest {
    #[serde(default)]
    pub text: String,
    pub language_code: Option<String>,
}

// ── Handlers ─────────────────────────────────────────────────

/// GET /api/contenttokens: all tokens, optionally filtered by language
pub async fn list_tokens(
    State(state): State<Arc<AppState>>,
    Query(params): Query<LanguageQuery>,
) -> Result<Json<Vec<TokenRecord>>, AppError> {
    let tokens = state
        .tokens
        .list_tokens(params.language_code.as_deref())
        .await?;
    Ok(Json(tokens))
}

/// GET /api/contenttokens/:name: the effective token for a name and language
pub async fn get_token(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    Query(params): Query<LanguageQuery>,
) -> Result<Json<TokenRecord>, AppError> {
    state
        .tokens
        .get_token(&name, params.language_code.as_deref())
        .await?
        .map(Json)
        .ok_or(AppError::TokenNotFound)
}

/// POST|PUT /api/contenttokens: create or update a token
pub async fn save_token(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<TokenDraft>,
) -> Result<Json<TokenRecord>, AppError> {
    let saved = state.tokens.save_token(payload).await.map_err(|e| {
        if let AppError::Validation(reason) = &e {
            tracing::warn!("save_token rejected: {}", reason);
        }
        e
    })?;
    Ok(Json(saved))
}

/// DELETE /api/contenttokens/:id: idempotent
pub async fn delete_token(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    state.tokens.delete_token(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/contenttokens/-/preview: run substitution on ad-hoc text
pub async fn preview(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<PreviewRequest>,
) -> Result<Json<Preview>, AppError> {
    let result = state
        .tokens
        .preview(&payload.text, payload.language_code.as_deref())
        .await?;
    Ok(Json(result))
}
