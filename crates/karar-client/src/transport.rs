use std::time::Duration;

use karar_core::error::AppError;
use karar_core::traits::{RawResponse, Transport};
use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderMap, HeaderValue};
use reqwest::{Client, RequestBuilder};
use url::Url;

use crate::config::ClientConfig;

const ACCEPT_VALUE: &str = "application/json, text/plain, */*";

/// HTTP transport using reqwest.
///
/// Holds one long-lived session: a connection pool plus the browser-like
/// default headers the upstream expects on every call.
#[derive(Clone)]
pub struct ReqwestTransport {
    client: Client,
    base_url: String,
    timeout_secs: u64,
}

impl ReqwestTransport {
    pub fn from_config(config: &ClientConfig) -> Result<Self, AppError> {
        Self::build(&config.base_url, &config.user_agent, config.request_timeout)
    }

    fn build(base_url: &str, user_agent: &str, timeout: Duration) -> Result<Self, AppError> {
        Url::parse(base_url)
            .map_err(|e| AppError::ConfigError(format!("Invalid base URL '{base_url}': {e}")))?;

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_VALUE));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .user_agent(user_agent)
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::TransportError(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout_secs: timeout.as_secs(),
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, AppError> {
        let raw = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        Url::parse(&raw).map_err(|e| AppError::TransportError(format!("Invalid URL {raw}: {e}")))
    }

    async fn send(&self, request: RequestBuilder) -> Result<RawResponse, AppError> {
        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                AppError::TransportError(format!(
                    "Request timed out after {} seconds",
                    self.timeout_secs
                ))
            } else if e.is_connect() {
                AppError::TransportError(format!("Connection failed: {e}"))
            } else {
                AppError::TransportError(e.to_string())
            }
        })?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| AppError::TransportError(format!("Failed to read response body: {e}")))?;

        Ok(RawResponse::new(status, body))
    }
}

impl Transport for ReqwestTransport {
    async fn post_json(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<RawResponse, AppError> {
        let url = self.endpoint(path)?;
        tracing::debug!(%url, "POST");
        self.send(self.client.post(url).json(body)).await
    }

    async fn get(&self, path: &str, query: &[(&str, &str)]) -> Result<RawResponse, AppError> {
        let mut url = self.endpoint(path)?;
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query.iter().copied());
        }
        tracing::debug!(%url, "GET");
        self.send(self.client.get(url)).await
    }
}
