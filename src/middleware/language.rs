//! The "current request language" signal consumed by the rewrite layer.
//!
//! Sources, first hit wins:
//!   1. a `PreferredLanguage` request extension set by an earlier host layer
//!      (authoritative even when it carries `None`)
//!   2. the configured query parameter, e.g. `?lang=sv`
//!   3. the first tag of `Accept-Language`

use std::collections::HashMap;

use axum::extract::{Query, Request};
use axum::http::{header, HeaderMap};

use crate::models::token::normalize_language;

/// Request extension a host inserts to pin the language for a request.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PreferredLanguage(pub Option<String>);

pub fn preferred_language(req: &Request, query_param: &str) -> Option<String> {
    if let Some(PreferredLanguage(lang)) = req.extensions().get::<PreferredLanguage>() {
        return normalize_language(lang.as_deref());
    }

    if !query_param.is_empty() {
        if let Ok(Query(params)) = Query::<HashMap<String, String>>::try_from_uri(req.uri()) {
            if let Some(lang) = normalize_language(params.get(query_param).map(String::as_str)) {
                return Some(lang);
            }
        }
    }

    accept_language(req.headers())
}

/// First language tag of `Accept-Language`, quality values ignored.
pub fn accept_language(headers: &HeaderMap) -> Option<String> {
    let raw = headers.get(header::ACCEPT_LANGUAGE)?.to_str().ok()?;
    raw.split(',')
        .map(|part| part.split(';').next().unwrap_or("").trim())
        .find(|tag| !tag.is_empty() && *tag != "*")
        .map(String::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    fn request(uri: &str, accept: Option<&str>) -> Request {
        let mut builder = axum::http::Request::builder().uri(uri);
        if let Some(v) = accept {
            builder = builder.header(header::ACCEPT_LANGUAGE, v);
        }
        builder.body(Body::empty()).unwrap()
    }

    #[test]
    fn test_accept_language_first_tag() {
        let req = request("/", Some("sv-SE;q=0.9, en;q=0.8"));
        assert_eq!(preferred_language(&req, "lang").as_deref(), Some("sv-SE"));
    }

    #[test]
    fn test_accept_language_wildcard_ignored() {
        let req = request("/", Some("*"));
        assert_eq!(preferred_language(&req, "lang"), None);
    }

    #[test]
    fn test_query_beats_header() {
        let req = request("/page?lang=sv", Some("en"));
        assert_eq!(preferred_language(&req, "lang").as_deref(), Some("sv"));
    }

    #[test]
    fn test_empty_query_value_falls_through() {
        let req = request("/page?lang=", Some("en"));
        assert_eq!(preferred_language(&req, "lang").as_deref(), Some("en"));
    }

    #[test]
    fn test_extension_is_authoritative() {
        let mut req = request("/page?lang=sv", Some("en"));
        req.extensions_mut().insert(PreferredLanguage(None));
        assert_eq!(preferred_language(&req, "lang"), None);

        req.extensions_mut()
            .insert(PreferredLanguage(Some("de".to_string())));
        assert_eq!(preferred_language(&req, "lang").as_deref(), Some("de"));
    }

    #[test]
    fn test_no_signal() {
        assert_eq!(preferred_language(&request("/", None), "lang"), None);
    }
}
