use std::future::Future;
use std::time::Duration;

use serde_json::json;

use crate::envelope::{self, Envelope};
use crate::error::AppError;
use crate::governor::RateGovernor;
use crate::models::{
    ContentFetchResult, DOCUMENT_CONTENT_KEY, SearchRequest, SearchResult, decision_id,
};
use crate::reporter::{ClientEvent, ClientReporter, TracingClientReporter};
use crate::traits::{RawResponse, Transport};

/// Upstream path of the keyword search endpoint.
pub const SEARCH_PATH: &str = "aramalist";
/// Upstream path of the content-by-id endpoint.
pub const CONTENT_PATH: &str = "getDokuman";

const SEARCH_OP: &str = "search";
const CONTENT_OP: &str = "fetch_content";

/// Search and content client for the court-decision API.
///
/// Every dispatch goes through the shared [`RateGovernor`]: paced before it is
/// sent, and backed off and resent while the upstream signals rate limiting.
/// Anything else that goes wrong degrades to an empty result and is reported
/// to the [`ClientReporter`]. Only bad input, exhausted rate-limit retries and
/// caller deadlines fail a call.
#[derive(Clone)]
pub struct DecisionClient<T, R = TracingClientReporter>
where
    T: Transport,
    R: ClientReporter,
{
    transport: T,
    governor: RateGovernor,
    reporter: R,
}

impl<T: Transport> DecisionClient<T> {
    /// Create a client that reports through `tracing`.
    pub fn new(transport: T, governor: RateGovernor) -> Self {
        Self::with_reporter(transport, governor, TracingClientReporter)
    }
}

impl<T, R> DecisionClient<T, R>
where
    T: Transport,
    R: ClientReporter,
{
    pub fn with_reporter(transport: T, governor: RateGovernor, reporter: R) -> Self {
        Self {
            transport,
            governor,
            reporter,
        }
    }

    pub fn governor(&self) -> &RateGovernor {
        &self.governor
    }

    /// Search decisions by keyword.
    ///
    /// The page number is clamped to 1 and the page size coerced to the
    /// nearest size the upstream accepts.
    pub async fn search(
        &self,
        keyword: &str,
        page_number: i64,
        page_size: i64,
    ) -> Result<SearchResult, AppError> {
        let request = SearchRequest::new(keyword, page_number, page_size)?;
        self.search_request(&request).await
    }

    /// Search with an already normalized request.
    pub async fn search_request(&self, request: &SearchRequest) -> Result<SearchResult, AppError> {
        let payload = search_payload(request);
        tracing::info!(
            keyword = %request.keyword(),
            page = request.page_number(),
            page_size = request.page_size(),
            "Searching decisions"
        );
        tracing::debug!(%payload, "Search payload");

        let outcome = self
            .dispatch(SEARCH_OP, || self.transport.post_json(SEARCH_PATH, &payload))
            .await
            .and_then(|response| interpret(&response, envelope::decode_search));

        match outcome {
            Ok(result) => {
                self.reporter.report(ClientEvent::SearchCompleted {
                    keyword: request.keyword().to_string(),
                    returned: result.decisions.len(),
                    total_records: result.total_records,
                });
                Ok(result)
            }
            Err(e) if e.degrades_to_empty() => {
                self.report_degraded(SEARCH_OP, e);
                Ok(SearchResult::empty())
            }
            Err(e) => Err(e),
        }
    }

    /// Fetch the document content of one decision.
    pub async fn fetch_content(&self, decision_id: &str) -> Result<ContentFetchResult, AppError> {
        let decision_id = decision_id.trim();
        if decision_id.is_empty() {
            return Err(AppError::InvalidArgument("decision id is required".into()));
        }
        tracing::info!(%decision_id, "Fetching content for decision");

        let query = [("id", decision_id)];
        let outcome = self
            .dispatch(CONTENT_OP, || self.transport.get(CONTENT_PATH, &query))
            .await
            .and_then(|response| interpret(&response, envelope::decode_content));

        match outcome {
            Ok(content) => {
                self.reporter.report(ClientEvent::ContentFetched {
                    decision_id: decision_id.to_string(),
                    length: content.chars().count(),
                });
                Ok(ContentFetchResult::found(decision_id, content))
            }
            Err(e) if e.degrades_to_empty() => {
                self.report_degraded(CONTENT_OP, e);
                Ok(ContentFetchResult::not_found(decision_id))
            }
            Err(e) => Err(e),
        }
    }

    /// Search, then fetch the content of every returned decision.
    ///
    /// Content is fetched one decision at a time through the same pacing gate
    /// and stored under `document_content`. Decisions without an id, or whose
    /// content came back empty or missing, are left untouched.
    pub async fn search_with_content(
        &self,
        keyword: &str,
        page_number: i64,
        page_size: i64,
    ) -> Result<SearchResult, AppError> {
        let request = SearchRequest::new(keyword, page_number, page_size)?;
        self.search_with_content_request(&request).await
    }

    /// [`search_with_content`](Self::search_with_content) with an already
    /// normalized request.
    pub async fn search_with_content_request(
        &self,
        request: &SearchRequest,
    ) -> Result<SearchResult, AppError> {
        let mut result = self.search_request(request).await?;

        for decision in result.decisions.iter_mut() {
            let Some(id) = decision_id(decision) else {
                tracing::debug!("Decision without id, skipping content fetch");
                continue;
            };
            let fetched = self.fetch_content(&id).await?;
            if fetched.found && !fetched.content.is_empty() {
                decision.insert(
                    DOCUMENT_CONTENT_KEY.to_string(),
                    serde_json::Value::String(fetched.content),
                );
            }
        }

        Ok(result)
    }

    /// [`search`](Self::search) bounded by a caller deadline.
    pub async fn search_within(
        &self,
        deadline: Duration,
        keyword: &str,
        page_number: i64,
        page_size: i64,
    ) -> Result<SearchResult, AppError> {
        within(deadline, self.search(keyword, page_number, page_size)).await
    }

    /// [`search_with_content`](Self::search_with_content) bounded by a caller deadline.
    pub async fn search_with_content_within(
        &self,
        deadline: Duration,
        keyword: &str,
        page_number: i64,
        page_size: i64,
    ) -> Result<SearchResult, AppError> {
        within(
            deadline,
            self.search_with_content(keyword, page_number, page_size),
        )
        .await
    }

    /// [`fetch_content`](Self::fetch_content) bounded by a caller deadline.
    pub async fn fetch_content_within(
        &self,
        deadline: Duration,
        decision_id: &str,
    ) -> Result<ContentFetchResult, AppError> {
        within(deadline, self.fetch_content(decision_id)).await
    }

    /// Pace, send, and resend while the upstream signals rate limiting.
    ///
    /// Transport failures are returned as-is and never retried here.
    async fn dispatch<F, Fut>(&self, operation: &'static str, send: F) -> Result<RawResponse, AppError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<RawResponse, AppError>>,
    {
        loop {
            let slept = self.governor.throttle().await;
            if !slept.is_zero() {
                self.reporter
                    .report(ClientEvent::Throttled { operation, slept });
            }

            match send().await.and_then(reject_rate_limited) {
                Ok(response) => {
                    self.governor.on_success().await;
                    return Ok(response);
                }
                Err(AppError::RateLimited { status_code }) => {
                    let backoff = self.governor.on_rate_limited().await?;
                    self.reporter.report(ClientEvent::RateLimited {
                        operation,
                        status_code,
                        attempt: backoff.attempt,
                        slept: backoff.slept,
                        next_delay: backoff.next_delay,
                    });
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn report_degraded(&self, operation: &'static str, error: AppError) {
        let event = match error {
            AppError::UpstreamError { status, message } => ClientEvent::UpstreamError {
                operation,
                status,
                message,
            },
            AppError::UnexpectedResponseShape(raw_body) => {
                ClientEvent::UnexpectedResponseShape {
                    operation,
                    raw_body,
                }
            }
            other => ClientEvent::TransportError {
                operation,
                error: other.to_string(),
            },
        };
        self.reporter.report(event);
    }
}

/// Wire body of a search request.
pub fn search_payload(request: &SearchRequest) -> serde_json::Value {
    json!({
        "data": {
            "aranan": request.keyword(),
            "arananKelime": request.keyword(),
            "pageSize": request.page_size(),
            "pageNumber": request.page_number(),
        }
    })
}

/// Turn a throttling response into [`AppError::RateLimited`].
fn reject_rate_limited(response: RawResponse) -> Result<RawResponse, AppError> {
    if RateGovernor::is_rate_limited(response.status, &response.body) {
        Err(AppError::RateLimited {
            status_code: response.status,
        })
    } else {
        Ok(response)
    }
}

/// Classify a response that was not rate limited.
///
/// Non-success statuses carrying an error envelope stay upstream errors;
/// any other non-success status is a transport failure.
fn interpret<V>(
    response: &RawResponse,
    decode: fn(&str) -> Result<Envelope<V>, AppError>,
) -> Result<V, AppError> {
    if response.is_success() {
        return decode(&response.body)?.into_result();
    }

    match decode(&response.body) {
        Ok(Envelope::UpstreamError { status, message }) => {
            Err(AppError::UpstreamError { status, message })
        }
        _ => Err(AppError::TransportError(format!(
            "HTTP {} from upstream",
            response.status
        ))),
    }
}

/// Run `operation` under a deadline. On expiry the operation is dropped, which
/// releases the pacing gate if it was holding it.
pub async fn within<V, F>(deadline: Duration, operation: F) -> Result<V, AppError>
where
    F: Future<Output = Result<V, AppError>>,
{
    tokio::time::timeout(deadline, operation)
        .await
        .map_err(|_| AppError::Timeout(deadline))?
}
