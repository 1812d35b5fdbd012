pub mod client;
pub mod envelope;
pub mod error;
pub mod governor;
pub mod models;
pub mod reporter;
pub mod traits;

#[cfg(any(test, feature = "testutil"))]
pub mod testutil;

pub use client::DecisionClient;
pub use error::AppError;
pub use governor::{GovernorConfig, RateGovernor};
pub use models::{ContentFetchResult, Decision, SearchRequest, SearchResult};
pub use reporter::{ClientEvent, ClientReporter, TracingClientReporter};
pub use traits::{RawResponse, Transport};
