//! Content Tokens: `{{Token}}` substitution for served content.
//!
//! Library crate: the binary in `main.rs` and the integration tests in
//! `tests/` both build the application from here.

use std::sync::Arc;

use axum::extract::{DefaultBodyLimit, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{any, get};
use tower_http::cors::CorsLayer;

pub mod api;
pub mod config;
pub mod errors;
pub mod middleware;
pub mod models;
pub mod proxy;
pub mod resolver;
pub mod service;
pub mod store;
pub mod substitute;

use config::Config;
use service::TokenService;
use store::memory::MemoryStore;
use store::postgres::PgStore;
use store::TokenStore;

/// Shared application state passed to handlers and middleware.
pub struct AppState {
    pub tokens: TokenService,
    pub config: Config,
    pub upstream: Option<proxy::upstream::UpstreamClient>,
}

impl AppState {
    pub fn new(store: Arc<dyn TokenStore>, config: Config) -> anyhow::Result<Self> {
        let upstream = match &config.upstream_url {
            Some(url) => Some(proxy::upstream::UpstreamClient::new(url)?),
            None => None,
        };
        Ok(Self {
            tokens: TokenService::new(store),
            config,
            upstream,
        })
    }
}

/// Open the configured store: Postgres when `DATABASE_URL` is set
/// (migrations applied), otherwise a fresh in-memory store.
pub async fn open_store(cfg: &Config) -> anyhow::Result<Arc<dyn TokenStore>> {
    match &cfg.database_url {
        Some(url) => {
            tracing::info!("Connecting to database...");
            let db = PgStore::connect(url, cfg.store_timeout).await?;
            tracing::info!("Running migrations...");
            db.migrate().await?;
            Ok(Arc::new(db))
        }
        None => {
            tracing::info!("DATABASE_URL not set, using in-memory token store");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}

/// Import the seed document, if one is configured.
pub async fn apply_seed(tokens: &TokenService, cfg: &Config) -> anyhow::Result<()> {
    let Some(path) = &cfg.seed_file else {
        return Ok(());
    };
    let bytes = tokio::fs::read(path).await?;
    let hint = if path.ends_with(".json") { "application/json" } else { "application/yaml" };
    let doc = models::document::TokenDocument::parse(&bytes, hint)
        .map_err(|e| anyhow::anyhow!("seed file {}: {}", path, e))?;
    let result = tokens.import(doc).await?;
    tracing::info!(
        path = %path,
        created = result.tokens_created,
        updated = result.tokens_updated,
        "Seed tokens loaded"
    );
    Ok(())
}

/// Assemble the full router: admin API, operational endpoints, and the
/// origin proxy fallback, with the token rewrite layer over all of it.
///
/// The rewrite layer sits outside the routes it rewrites, so any
/// compression layer a host adds must sit outside it in turn.
pub fn build_app(state: Arc<AppState>) -> axum::Router {
    axum::Router::new()
        // Health endpoints
        .route("/healthz", get(|| async { "ok" }))
        .route("/readyz", get(readiness_check))
        .route("/metrics", get(metrics_handler))
        // Admin API
        .nest("/api/contenttokens", api::api_router())
        // Origin proxy: catch everything else
        .fallback(any(proxy::handler::proxy_handler))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::rewrite::rewrite_tokens,
        ))
        .with_state(state.clone())
        // Enforce 25 MB body size limit on all routes
        .layer(DefaultBodyLimit::max(25 * 1024 * 1024))
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .layer(cors_layer(&state.config))
        .layer(axum::middleware::from_fn(middleware::headers::request_id))
}

fn cors_layer(cfg: &Config) -> CorsLayer {
    use axum::http::{HeaderName, Method};
    use tower_http::cors::AllowOrigin;

    let admin_origin = cfg.admin_origin.clone();
    CorsLayer::new()
        .allow_origin(AllowOrigin::predicate(move |origin, _| {
            let origin_str = origin.to_str().unwrap_or("");
            admin_origin.as_deref() == Some(origin_str)
                || origin_str.starts_with("http://localhost:")
                || origin_str.starts_with("http://127.0.0.1:")
        }))
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([
            HeaderName::from_static("content-type"),
            HeaderName::from_static("authorization"),
            HeaderName::from_static("x-request-id"),
        ])
}

async fn readiness_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.tokens.resolver().store().ping().await {
        Ok(()) => (StatusCode::OK, "ok"),
        Err(e) => {
            tracing::warn!(error = %e, "readiness: token store unreachable");
            (StatusCode::SERVICE_UNAVAILABLE, "store unavailable")
        }
    }
}

async fn metrics_handler() -> impl IntoResponse {
    (
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        middleware::metrics::encode_metrics(),
    )
}
