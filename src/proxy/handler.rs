use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::{header, HeaderMap, HeaderName, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};

use crate::errors::AppError;
use crate::AppState;

/// Connection-scoped headers that must not be forwarded in either direction.
const HOP_BY_HOP: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Fallback handler: forwards anything the router did not match to the
/// origin, streaming the origin's response back. The rewrite layer wraps
/// this handler like any other route.
#[tracing::instrument(skip_all, fields(method = %method, path = %uri.path()))]
pub async fn proxy_handler(
    State(state): State<Arc<AppState>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, AppError> {
    let Some(upstream) = &state.upstream else {
        return Ok(StatusCode::NOT_FOUND.into_response());
    };

    let path_and_query = uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");

    let resp = upstream
        .forward(method, path_and_query, request_headers(&headers), body)
        .await?;

    let status = resp.status();
    let mut response = Response::builder().status(status);
    for (name, value) in resp.headers() {
        if !is_hop_by_hop(name) {
            response = response.header(name, value);
        }
    }

    tracing::debug!(status = status.as_u16(), "origin responded");

    response
        .body(Body::from_stream(resp.bytes_stream()))
        .map_err(|e| AppError::Internal(anyhow::anyhow!("response build failed: {}", e)))
}

/// Headers sent to the origin.
///
/// `Accept-Encoding` is dropped so the origin answers with identity-coded
/// HTML; compressed bodies would bypass token rewriting.
fn request_headers(incoming: &HeaderMap) -> HeaderMap {
    let mut out = HeaderMap::with_capacity(incoming.len());
    for (name, value) in incoming {
        if is_hop_by_hop(name) || name == header::HOST || name == header::ACCEPT_ENCODING {
            continue;
        }
        out.append(name.clone(), value.clone());
    }
    if let Some(host) = incoming.get(header::HOST) {
        out.insert(HeaderName::from_static("x-forwarded-host"), host.clone());
    }
    out
}

fn is_hop_by_hop(name: &HeaderName) -> bool {
    HOP_BY_HOP.contains(&name.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_request_headers_strip_host_encoding_and_hop_by_hop() {
        let mut h = HeaderMap::new();
        h.insert(header::HOST, HeaderValue::from_static("site.test"));
        h.insert(header::ACCEPT_ENCODING, HeaderValue::from_static("gzip, br"));
        h.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
        h.insert(header::ACCEPT_LANGUAGE, HeaderValue::from_static("sv"));

        let out = request_headers(&h);
        assert!(out.get(header::HOST).is_none());
        assert!(out.get(header::ACCEPT_ENCODING).is_none());
        assert!(out.get(header::CONNECTION).is_none());
        assert_eq!(out.get(header::ACCEPT_LANGUAGE).unwrap(), "sv");
        assert_eq!(out.get("x-forwarded-host").unwrap(), "site.test");
    }
}
