use axum::extract::Request;
use axum::http::HeaderValue;
use axum::middleware::Next;
use axum::response::Response;

/// Middleware: injects a unique X-Request-Id into every response.
/// Lets admin clients correlate errors with server logs.
pub async fn request_id(req: Request, next: Next) -> Response {
    let req_id = uuid::Uuid::new_v4().to_string();
    let mut resp = next.run(req).await;
    if let Ok(val) = HeaderValue::from_str(&req_id) {
        resp.headers_mut().insert("x-request-id", val);
    }
    resp
}

/// Middleware for the admin API only: token values must not be cached or
/// sniffed. Page responses are left to the origin's own policy.
pub async fn admin_headers(req: Request, next: Next) -> Response {
    let mut resp = next.run(req).await;
    let headers = resp.headers_mut();

    // Prevent MIME-type sniffing (e.g., interpreting a .txt as HTML)
    headers.insert("x-content-type-options", HeaderValue::from_static("nosniff"));

    // Prevent the browser from caching admin API responses
    headers.insert("cache-control", HeaderValue::from_static("no-store"));

    resp
}
