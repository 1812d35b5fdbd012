use std::future::Future;

use crate::error::AppError;

/// Status and body of an upstream response, before any interpretation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

impl RawResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Sends requests to the upstream API.
///
/// Implementations return `Ok` for every response that arrived, whatever its
/// status, and [`AppError::TransportError`] when no response arrived.
pub trait Transport: Send + Sync + Clone {
    /// POST a JSON body to `path`, relative to the upstream base URL.
    fn post_json(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> impl Future<Output = Result<RawResponse, AppError>> + Send;

    /// GET `path` with the given query parameters.
    fn get(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> impl Future<Output = Result<RawResponse, AppError>> + Send;
}
