//! Observations the client reports while serving a call.
//!
//! Degraded outcomes (upstream errors, unknown shapes, transport failures)
//! never fail a call; they are handed to a [`ClientReporter`] instead.

use std::time::Duration;

/// Events emitted by the [`DecisionClient`](crate::client::DecisionClient).
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    /// The pacing gate delayed a dispatch.
    Throttled {
        operation: &'static str,
        slept: Duration,
    },
    /// A rate-limited response was backed off; the call will be retried.
    RateLimited {
        operation: &'static str,
        status_code: u16,
        attempt: u32,
        slept: Duration,
        next_delay: Duration,
    },
    SearchCompleted {
        keyword: String,
        returned: usize,
        total_records: u64,
    },
    ContentFetched {
        decision_id: String,
        length: usize,
    },
    /// The upstream answered with a structured error envelope.
    UpstreamError {
        operation: &'static str,
        status: String,
        message: String,
    },
    UnexpectedResponseShape {
        operation: &'static str,
        raw_body: String,
    },
    TransportError {
        operation: &'static str,
        error: String,
    },
}

/// Receives client events (decoupled logging).
pub trait ClientReporter: Send + Sync {
    fn report(&self, event: ClientEvent) {
        let _ = event;
    }
}

/// Reporter that uses the `tracing` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingClientReporter;

impl ClientReporter for TracingClientReporter {
    fn report(&self, event: ClientEvent) {
        match event {
            ClientEvent::Throttled { operation, slept } => {
                tracing::debug!(%operation, sleep_ms = %slept.as_millis(), "Request paced");
            }
            ClientEvent::RateLimited {
                operation,
                status_code,
                attempt,
                slept,
                next_delay,
            } => {
                tracing::warn!(
                    %operation,
                    %status_code,
                    %attempt,
                    slept_secs = slept.as_secs_f64(),
                    next_delay_secs = next_delay.as_secs_f64(),
                    "Rate limited, retrying"
                );
            }
            ClientEvent::SearchCompleted {
                keyword,
                returned,
                total_records,
            } => {
                tracing::info!(%keyword, %returned, %total_records, "Found decisions");
            }
            ClientEvent::ContentFetched {
                decision_id,
                length,
            } => {
                tracing::info!(%decision_id, %length, "Content fetched");
            }
            ClientEvent::UpstreamError {
                operation,
                status,
                message,
            } => {
                tracing::warn!(%operation, %status, %message, "Upstream returned an error");
            }
            ClientEvent::UnexpectedResponseShape {
                operation,
                raw_body,
            } => {
                tracing::error!(%operation, %raw_body, "Unexpected response format");
            }
            ClientEvent::TransportError { operation, error } => {
                tracing::error!(%operation, %error, "Request failed");
            }
        }
    }
}

impl<R: ClientReporter + ?Sized> ClientReporter for std::sync::Arc<R> {
    fn report(&self, event: ClientEvent) {
        (**self).report(event);
    }
}
