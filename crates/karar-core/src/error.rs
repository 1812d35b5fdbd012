use thiserror::Error;

/// Error taxonomy for the karar client.
///
/// Only [`InvalidArgument`](AppError::InvalidArgument),
/// [`RateLimitExhausted`](AppError::RateLimitExhausted) and
/// [`Timeout`](AppError::Timeout) ever reach a caller. Every other kind is
/// reported through a [`ClientReporter`](crate::reporter::ClientReporter) and
/// degraded into an empty result.
#[derive(Error, Debug)]
pub enum AppError {
    /// Bad caller input. Never retried.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The upstream signalled throttling. Always retried through the governor.
    #[error("Rate limited by upstream (HTTP {status_code})")]
    RateLimited { status_code: u16 },

    /// Consecutive rate-limit hits exceeded the configured retry cap.
    #[error("Rate limit retries exhausted after {attempts} attempts")]
    RateLimitExhausted { attempts: u32 },

    /// Structured error envelope returned by the upstream.
    #[error("Upstream error ({status}): {message}")]
    UpstreamError { status: String, message: String },

    /// Response body matched none of the recognised envelopes.
    #[error("Unexpected response shape: {0}")]
    UnexpectedResponseShape(String),

    /// Connection failure, timeout, non-success status, or unreadable body.
    #[error("Transport error: {0}")]
    TransportError(String),

    /// Caller-supplied deadline elapsed.
    #[error("Operation timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// Invalid configuration value.
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl AppError {
    /// Returns true if the client turns this error into an empty result
    /// instead of failing the call.
    pub fn degrades_to_empty(&self) -> bool {
        matches!(
            self,
            AppError::UpstreamError { .. }
                | AppError::UnexpectedResponseShape(_)
                | AppError::TransportError(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_degrading_errors() {
        assert!(
            AppError::UpstreamError {
                status: "ERROR".into(),
                message: "boom".into(),
            }
            .degrades_to_empty()
        );
        assert!(AppError::UnexpectedResponseShape("{}".into()).degrades_to_empty());
        assert!(AppError::TransportError("timeout".into()).degrades_to_empty());
        assert!(!AppError::InvalidArgument("empty".into()).degrades_to_empty());
        assert!(!AppError::Timeout(std::time::Duration::from_secs(1)).degrades_to_empty());
        assert!(!AppError::RateLimited { status_code: 429 }.degrades_to_empty());
    }

    #[test]
    fn test_display_includes_upstream_message() {
        let err = AppError::UpstreamError {
            status: "ERROR".into(),
            message: "Arama yapılamadı".into(),
        };
        assert_eq!(err.to_string(), "Upstream error (ERROR): Arama yapılamadı");
    }
}
