//! Test utilities: handwritten mocks for the client's seams.
//!
//! Mocks use `Arc<Mutex<_>>` for interior mutability so tests can script
//! responses and assert on recorded calls.

use std::sync::{Arc, Mutex};

use tokio::time::Instant;

use crate::error::AppError;
use crate::reporter::{ClientEvent, ClientReporter};
use crate::traits::{RawResponse, Transport};

// ---------------------------------------------------------------------------
// MockTransport
// ---------------------------------------------------------------------------

/// A request the mock transport received.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub method: &'static str,
    pub path: String,
    pub body: Option<serde_json::Value>,
    pub query: Vec<(String, String)>,
    /// When the request was dispatched (tokio clock, so paused time works).
    pub at: Instant,
}

impl RecordedCall {
    pub fn query_value(&self, key: &str) -> Option<String> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
    }
}

/// Transport that replays scripted responses in order and records every call.
///
/// Once the script runs out every call fails with a transport error.
#[derive(Clone, Default)]
pub struct MockTransport {
    responses: Arc<Mutex<Vec<Result<RawResponse, AppError>>>>,
    calls: Arc<Mutex<Vec<RecordedCall>>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_responses(responses: Vec<Result<RawResponse, AppError>>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses)),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    fn next_response(&self, call: RecordedCall) -> Result<RawResponse, AppError> {
        self.calls.lock().unwrap().push(call);
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            Err(AppError::TransportError("no scripted response".into()))
        } else {
            responses.remove(0)
        }
    }
}

impl Transport for MockTransport {
    async fn post_json(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<RawResponse, AppError> {
        self.next_response(RecordedCall {
            method: "POST",
            path: path.to_string(),
            body: Some(body.clone()),
            query: Vec::new(),
            at: Instant::now(),
        })
    }

    async fn get(&self, path: &str, query: &[(&str, &str)]) -> Result<RawResponse, AppError> {
        self.next_response(RecordedCall {
            method: "GET",
            path: path.to_string(),
            body: None,
            query: query
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            at: Instant::now(),
        })
    }
}

// ---------------------------------------------------------------------------
// RecordingReporter
// ---------------------------------------------------------------------------

/// Reporter that keeps every event for later assertions.
#[derive(Default)]
pub struct RecordingReporter {
    events: Mutex<Vec<ClientEvent>>,
}

impl RecordingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ClientEvent> {
        self.events.lock().unwrap().clone()
    }

    /// Events other than [`ClientEvent::Throttled`].
    pub fn events_without_pacing(&self) -> Vec<ClientEvent> {
        self.events()
            .into_iter()
            .filter(|e| !matches!(e, ClientEvent::Throttled { .. }))
            .collect()
    }
}

impl ClientReporter for RecordingReporter {
    fn report(&self, event: ClientEvent) {
        self.events.lock().unwrap().push(event);
    }
}
