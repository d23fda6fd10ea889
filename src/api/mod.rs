use std::sync::Arc;

use axum::{
    http::StatusCode,
    middleware,
    routing::{get, post},
    Router,
};

use crate::AppState;

pub mod documents;
pub mod handlers;

/// Build the token administration router.
/// All routes are relative; the caller mounts this under `/api/contenttokens`.
///
/// Authentication is the host's concern: put this behind whatever guards
/// the rest of the host's admin surface.
pub fn api_router() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/",
            get(handlers::list_tokens)
                .post(handlers::save_token)
                .put(handlers::save_token),
        )
        // Collection actions live under `/-/`: `-` is not a valid marker
        // character, so no token name can shadow them.
        .route("/-/preview", post(handlers::preview))
        .route("/-/export", get(documents::export_tokens))
        .route("/-/import", post(documents::import_tokens))
        // GET takes a token name, DELETE a token id
        .route(
            "/:key",
            get(handlers::get_token).delete(handlers::delete_token),
        )
        .layer(middleware::from_fn(crate::middleware::headers::admin_headers))
        .fallback(fallback_404)
}

async fn fallback_404() -> StatusCode {
    StatusCode::NOT_FOUND
}
