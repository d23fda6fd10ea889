use std::time::Duration;

use serde::Deserialize;

/// Default rewrite buffer ceiling: 8 MiB.
pub const DEFAULT_MAX_REWRITE_BYTES: usize = 8 * 1024 * 1024;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub port: u16,
    /// Postgres connection string. Unset means the in-memory store.
    pub database_url: Option<String>,
    /// Upper bound on any single store call.
    pub store_timeout: Duration,
    /// YAML/JSON token document imported at startup.
    pub seed_file: Option<String>,
    /// Origin that unmatched requests are proxied to.
    pub upstream_url: Option<String>,
    /// Allowed origin for browser-based admin clients.
    pub admin_origin: Option<String>,
    pub log_json: bool,
    pub rewrite: RewriteConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RewriteConfig {
    /// Content types (substring match, lowercase) whose bodies get rewritten.
    pub content_types: Vec<String>,
    pub max_body_bytes: usize,
    /// Query parameter consulted for the request language. Empty disables it.
    pub language_query: String,
}

impl Default for RewriteConfig {
    fn default() -> Self {
        Self {
            content_types: vec!["text/html".to_string()],
            max_body_bytes: DEFAULT_MAX_REWRITE_BYTES,
            language_query: "lang".to_string(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8080,
            database_url: None,
            store_timeout: Duration::from_millis(2000),
            seed_file: None,
            upstream_url: None,
            admin_origin: None,
            log_json: false,
            rewrite: RewriteConfig::default(),
        }
    }
}

pub fn load() -> anyhow::Result<Config> {
    dotenvy::dotenv().ok();

    let defaults = Config::default();
    let rewrite_defaults = RewriteConfig::default();

    let content_types: Vec<String> = std::env::var("CONTENT_TOKENS_REWRITE_TYPES")
        .unwrap_or_default()
        .split(',')
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect();

    let upstream_url = non_empty_var("CONTENT_TOKENS_UPSTREAM_URL");
    if let Some(url) = &upstream_url {
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            anyhow::bail!(
                "CONTENT_TOKENS_UPSTREAM_URL must be an http(s) URL, got '{}'",
                url
            );
        }
    }

    Ok(Config {
        port: std::env::var("CONTENT_TOKENS_PORT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.port),
        database_url: non_empty_var("DATABASE_URL"),
        store_timeout: std::env::var("CONTENT_TOKENS_STORE_TIMEOUT_MS")
            .ok()
            .and_then(|v| v.parse().ok())
            .map(Duration::from_millis)
            .unwrap_or(defaults.store_timeout),
        seed_file: non_empty_var("CONTENT_TOKENS_SEED_FILE"),
        upstream_url: upstream_url.map(|u| u.trim_end_matches('/').to_string()),
        admin_origin: non_empty_var("CONTENT_TOKENS_ADMIN_ORIGIN"),
        log_json: matches!(
            std::env::var("CONTENT_TOKENS_LOG_JSON").as_deref(),
            Ok("1") | Ok("true")
        ),
        rewrite: RewriteConfig {
            content_types: if content_types.is_empty() {
                rewrite_defaults.content_types
            } else {
                content_types
            },
            max_body_bytes: std::env::var("CONTENT_TOKENS_MAX_REWRITE_BYTES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(rewrite_defaults.max_body_bytes),
            language_query: std::env::var("CONTENT_TOKENS_LANGUAGE_QUERY")
                .unwrap_or(rewrite_defaults.language_query),
        },
    })
}

fn non_empty_var(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
