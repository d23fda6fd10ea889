//! Tokens-as-code: YAML/JSON export and import.
//!
//! Endpoints:
//!   GET  /api/contenttokens/-/export :  every token as YAML (or `?format=json`)
//!   POST /api/contenttokens/-/import :  upsert tokens from a YAML/JSON body

use std::sync::Arc;

use axum::{
    body::{Body, Bytes},
    extract::{Query, State},
    http::{header, HeaderMap, StatusCode},
    response::Response,
    Json,
};
use serde::Deserialize;

use crate::errors::AppError;
use crate::models::document::{ImportResult, TokenDocument};
use crate::AppState;

#[derive(Deserialize)]
pub struct ExportQuery {
    /// Output format: "yaml" (default) or "json"
    #[serde(default = "default_format")]
    pub format: String,
}

fn default_format() -> String {
    "yaml".to_string()
}

/// GET /api/contenttokens/-/export
pub async fn export_tokens(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ExportQuery>,
) -> Result<Response, AppError> {
    let doc = state.tokens.export().await?;
    serialize_and_respond(doc, &params.format)
}

/// POST /api/contenttokens/-/import
///
/// Content-Type detection:
///   - anything containing `json` → parse as JSON
///   - anything else              → parse as YAML (JSON is valid YAML too)
pub async fn import_tokens(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<ImportResult>, AppError> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_lowercase();

    let doc = TokenDocument::parse(&body, &content_type).map_err(|e| {
        tracing::warn!("token import: {}", e);
        AppError::InvalidDocument(e)
    })?;

    let result = state.tokens.import(doc).await?;
    Ok(Json(result))
}

fn serialize_and_respond(doc: TokenDocument, format: &str) -> Result<Response, AppError> {
    let (body, content_type, filename) = if format.eq_ignore_ascii_case("json") {
        let body = doc.to_json().map_err(|e| AppError::Internal(e.into()))?;
        (body, "application/json; charset=utf-8", "content_tokens.json")
    } else {
        let body = doc.to_yaml().map_err(|e| AppError::Internal(e.into()))?;
        (body.into_bytes(), "application/yaml; charset=utf-8", "content_tokens.yaml")
    };

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type)
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", filename),
        )
        .body(Body::from(body))
        .map_err(|e| AppError::Internal(anyhow::anyhow!("response build failed: {}", e)))
}
