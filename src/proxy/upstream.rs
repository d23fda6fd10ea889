/// HTTP client for forwarding page requests to the origin site.
use std::time::Duration;

use axum::body::Bytes;
use axum::http::{HeaderMap, Method};

use crate::errors::AppError;

pub struct UpstreamClient {
    client: reqwest::Client,
    base_url: String,
}

impl UpstreamClient {
    pub fn new(base_url: &str) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .use_rustls_tls()
            .pool_max_idle_per_host(32)
            .timeout(Duration::from_secs(60))
            .connect_timeout(Duration::from_secs(5))
            // Redirects go back to the client untouched
            .redirect(reqwest::redirect::Policy::none())
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// `path_and_query` must start with `/`.
    pub fn url_for(&self, path_and_query: &str) -> String {
        format!("{}{}", self.base_url, path_and_query)
    }

    pub async fn forward(
        &self,
        method: Method,
        path_and_query: &str,
        headers: HeaderMap,
        body: Bytes,
    ) -> Result<reqwest::Response, AppError> {
        let url = self.url_for(path_and_query);
        self.client
            .request(method, &url)
            .headers(headers)
            .body(body)
            .send()
            .await
            .map_err(|e| {
                tracing::warn!(url = %url, "Upstream request failed: {}", e);
                AppError::Upstream(e.to_string())
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_for_joins_without_double_slash() {
        let client = UpstreamClient::new("http://origin.test/").unwrap();
        assert_eq!(client.url_for("/about?lang=sv"), "http://origin.test/about?lang=sv");
    }
}
