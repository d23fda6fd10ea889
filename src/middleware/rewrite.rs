//! Response rewrite layer: substitutes `{{Token}}` markers in outgoing
//! HTML responses.
//!
//! Per response:
//!   1. the request runs downstream untouched
//!   2. the response head decides: only status 200 with a rewritable
//!      content type and no content encoding qualifies; anything else is
//!      returned as-is and its body is never read
//!   3. qualifying bodies are buffered (bounded), decoded as UTF-8,
//!      substituted with the request language, re-encoded, and
//!      `Content-Length` is reset to the new size
//!
//! Every failure after step 2 emits the original bytes. The client always
//! gets a response.

use std::sync::Arc;
use std::time::Instant;

use axum::body::{Body, Bytes};
use axum::extract::{Request, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::Response;
use bytes::BytesMut;
use futures::StreamExt;
use http_body_util::BodyExt;

use crate::config::RewriteConfig;
use crate::middleware::language::preferred_language;
use crate::middleware::metrics::{self, Outcome};
use crate::service::TokenService;
use crate::AppState;

/// Middleware entry point, for `axum::middleware::from_fn_with_state`.
pub async fn rewrite_tokens(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Response {
    let language = preferred_language(&req, &state.config.rewrite.language_query);
    let response = next.run(req).await;
    rewrite_response(&state.tokens, &state.config.rewrite, language.as_deref(), response).await
}

/// The decide/buffer/rewrite step on its own, usable by hosts that drive
/// responses outside an axum router.
pub async fn rewrite_response(
    tokens: &TokenService,
    config: &RewriteConfig,
    language: Option<&str>,
    response: Response,
) -> Response {
    if !is_rewritable(response.status(), response.headers(), config) {
        metrics::record_outcome(Outcome::Passthrough);
        return response;
    }

    if declared_length(response.headers()).is_some_and(|len| len > config.max_body_bytes) {
        tracing::debug!(
            limit = config.max_body_bytes,
            "rewrite: declared body exceeds limit, passing through"
        );
        metrics::record_outcome(Outcome::Oversize);
        return response;
    }

    let start = Instant::now();
    let (mut parts, body) = response.into_parts();

    let original = match buffer_body(body, config.max_body_bytes).await {
        Buffered::Complete(bytes) => bytes,
        Buffered::Oversize(body) => {
            tracing::debug!(
                limit = config.max_body_bytes,
                "rewrite: streamed body exceeds limit, passing through"
            );
            metrics::record_outcome(Outcome::Oversize);
            return Response::from_parts(parts, body);
        }
        Buffered::Interrupted(body) => {
            // Downstream body failed mid-stream. Forward what we have plus
            // the error, same as if this layer were not here.
            tracing::warn!("rewrite: downstream body errored while buffering");
            metrics::record_outcome(Outcome::Fallback);
            return Response::from_parts(parts, body);
        }
    };

    let outcome = match rewrite_bytes(tokens, &original, language).await {
        Ok(Some(rewritten)) => {
            parts
                .headers
                .insert(header::CONTENT_LENGTH, HeaderValue::from(rewritten.len()));
            metrics::observe_rewrite_seconds(start.elapsed().as_secs_f64());
            metrics::record_outcome(Outcome::Rewritten);
            return Response::from_parts(parts, Body::from(rewritten));
        }
        Ok(None) => Outcome::Passthrough,
        Err(e) => {
            tracing::warn!(error = %e, "rewrite failed, sending original body");
            Outcome::Fallback
        }
    };

    metrics::record_outcome(outcome);
    Response::from_parts(parts, Body::from(original))
}

/// Status exactly 200, a configured content type, and no content coding.
pub fn is_rewritable(status: StatusCode, headers: &HeaderMap, config: &RewriteConfig) -> bool {
    if status != StatusCode::OK {
        return false;
    }

    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_lowercase();
    if !config
        .content_types
        .iter()
        .any(|t| content_type.contains(t.as_str()))
    {
        return false;
    }

    // Compressed bytes are not text; rewriting them would corrupt the payload.
    match headers.get(header::CONTENT_ENCODING) {
        None => true,
        Some(v) => v
            .to_str()
            .map(|s| s.trim().eq_ignore_ascii_case("identity"))
            .unwrap_or(false),
    }
}

fn declared_length(headers: &HeaderMap) -> Option<usize> {
    headers
        .get(header::CONTENT_LENGTH)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()
}

#[derive(Debug, thiserror::Error)]
enum RewriteError {
    #[error("body is not valid UTF-8: {0}")]
    Encoding(#[from] std::str::Utf8Error),

    #[error(transparent)]
    Store(#[from] crate::store::StoreError),
}

/// `Ok(None)` when the body had nothing to replace.
async fn rewrite_bytes(
    tokens: &TokenService,
    body: &Bytes,
    language: Option<&str>,
) -> Result<Option<Vec<u8>>, RewriteError> {
    let text = std::str::from_utf8(body)?;
    let result = tokens.replace_tokens(text, language).await?;
    metrics::record_markers(result.resolved.len(), result.unresolved.len());

    if result.resolved.is_empty() {
        return Ok(None);
    }
    Ok(Some(result.text.into_bytes()))
}

enum Buffered {
    Complete(Bytes),
    /// Limit exceeded: the buffered prefix re-chained ahead of the rest.
    Oversize(Body),
    /// Downstream error: the buffered prefix followed by that error.
    Interrupted(Body),
}

async fn buffer_body(mut body: Body, limit: usize) -> Buffered {
    let mut buf = BytesMut::new();

    while let Some(frame) = body.frame().await {
        match frame {
            Ok(frame) => {
                // Trailers are dropped; HTML responses do not carry them.
                let Ok(data) = frame.into_data() else { continue };
                buf.extend_from_slice(&data);
                if buf.len() > limit {
                    let prefix = buf.freeze();
                    let rest = body.into_data_stream();
                    let stream = futures::stream::once(async move { Ok::<_, axum::Error>(prefix) })
                        .chain(rest);
                    return Buffered::Oversize(Body::from_stream(stream));
                }
            }
            Err(e) => {
                let prefix = buf.freeze();
                let stream = futures::stream::iter(vec![Ok(prefix), Err(e)]);
                return Buffered::Interrupted(Body::from_stream(stream));
            }
        }
    }

    Buffered::Complete(buf.freeze())
}
