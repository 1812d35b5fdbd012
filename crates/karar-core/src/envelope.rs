//! Decoding of the upstream's response envelopes.
//!
//! The upstream wraps both endpoints in loosely specified JSON:
//!
//! ```text
//! search success   {"data": {"data": [...], "recordsTotal": n, "recordsFiltered": n}}
//! content success  {"metadata": {"FMTY": "SUCCESS"}, "data": "<content>"}
//! error            {"metadata": {"FMTY": "ERROR", "FMTE": "<message>"}}
//! ```
//!
//! Each body is decoded once into a tagged [`Envelope`] so that call sites
//! match on variants instead of probing fields.

use serde_json::Value;

use crate::error::AppError;
use crate::models::{Decision, SearchResult};

const SUCCESS_STATUS: &str = "SUCCESS";
const UNKNOWN_ERROR: &str = "Unknown error";

/// A decoded upstream response.
#[derive(Debug, Clone, PartialEq)]
pub enum Envelope<T> {
    Success(T),
    UpstreamError { status: String, message: String },
    Unrecognized { raw_body: String },
}

impl<T> Envelope<T> {
    /// Convert a failure variant into the matching [`AppError`].
    pub fn into_result(self) -> Result<T, AppError> {
        match self {
            Envelope::Success(value) => Ok(value),
            Envelope::UpstreamError { status, message } => {
                Err(AppError::UpstreamError { status, message })
            }
            Envelope::Unrecognized { raw_body } => {
                Err(AppError::UnexpectedResponseShape(raw_body))
            }
        }
    }
}

/// The two top-level members of an envelope, kept untyped.
///
/// `metadata` is read leniently: a stray numeric `FMTE` must not hide a
/// perfectly good `data.data` array.
#[derive(Debug)]
struct RawEnvelope {
    data: Value,
    metadata: Value,
}

impl RawEnvelope {
    fn parse(body: &str) -> Result<Self, AppError> {
        let value: Value = serde_json::from_str(body)
            .map_err(|e| AppError::TransportError(format!("Malformed JSON body: {e}")))?;
        let Value::Object(mut object) = value else {
            return Err(AppError::UnexpectedResponseShape(truncate(body)));
        };
        Ok(Self {
            data: object.remove("data").unwrap_or(Value::Null),
            metadata: object.remove("metadata").unwrap_or(Value::Null),
        })
    }

    /// `FMTY`, rendered as text when it is not a string. `None` when absent or null.
    fn status(&self) -> Option<String> {
        match self.metadata.get("FMTY")? {
            Value::Null => None,
            Value::String(status) => Some(status.clone()),
            other => Some(other.to_string()),
        }
    }

    /// The error variant for any non-null `FMTY`, if present.
    fn upstream_error<T>(&self) -> Option<Envelope<T>> {
        let status = self.status()?;
        let message = self
            .metadata
            .get("FMTE")
            .and_then(Value::as_str)
            .unwrap_or(UNKNOWN_ERROR)
            .to_string();
        Some(Envelope::UpstreamError { status, message })
    }
}

/// Decode a search (`aramalist`) response body.
///
/// Fails only when the body is not JSON; every JSON body maps to a variant.
pub fn decode_search(body: &str) -> Result<Envelope<SearchResult>, AppError> {
    let raw = match RawEnvelope::parse(body) {
        Ok(raw) => raw,
        Err(AppError::UnexpectedResponseShape(raw_body)) => {
            return Ok(Envelope::Unrecognized { raw_body });
        }
        Err(e) => return Err(e),
    };

    if let Some(Value::Array(items)) = raw.data.get("data") {
        let decisions: Vec<Decision> = items
            .iter()
            .filter_map(|item| match item {
                Value::Object(map) => Some(map.clone()),
                other => {
                    tracing::debug!(item = %other, "Skipping non-object decision record");
                    None
                }
            })
            .collect();

        let count = decisions.len() as u64;
        let total_records = read_count(raw.data.get("recordsTotal")).unwrap_or(count);
        // A missing filtered count means no filter narrowed the total.
        let filtered_records =
            read_count(raw.data.get("recordsFiltered")).unwrap_or(total_records);

        return Ok(Envelope::Success(SearchResult {
            decisions,
            total_records,
            filtered_records,
        }));
    }

    Ok(raw
        .upstream_error()
        .unwrap_or_else(|| Envelope::Unrecognized {
            raw_body: truncate(body),
        }))
}

/// Decode a content (`getDokuman`) response body.
pub fn decode_content(body: &str) -> Result<Envelope<String>, AppError> {
    let raw = match RawEnvelope::parse(body) {
        Ok(raw) => raw,
        Err(AppError::UnexpectedResponseShape(raw_body)) => {
            return Ok(Envelope::Unrecognized { raw_body });
        }
        Err(e) => return Err(e),
    };

    if raw.status().as_deref() == Some(SUCCESS_STATUS) {
        return Ok(match raw.data {
            Value::String(content) => Envelope::Success(content),
            Value::Null => Envelope::Success(String::new()),
            _ => Envelope::Unrecognized {
                raw_body: truncate(body),
            },
        });
    }

    Ok(raw
        .upstream_error()
        .unwrap_or_else(|| Envelope::Unrecognized {
            raw_body: truncate(body),
        }))
}

/// Record counts arrive as numbers, occasionally as numeric strings.
fn read_count(value: Option<&Value>) -> Option<u64> {
    match value? {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Keep logged bodies bounded.
fn truncate(body: &str) -> String {
    const LIMIT: usize = 512;
    match body.char_indices().nth(LIMIT) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}
