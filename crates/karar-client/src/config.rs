use std::str::FromStr;
use std::time::Duration;

use karar_core::error::AppError;
use karar_core::governor::GovernorConfig;
use karar_core::{DecisionClient, RateGovernor};

use crate::transport::ReqwestTransport;

pub const DEFAULT_BASE_URL: &str = "https://karararama.yargitay.gov.tr";
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36";
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Configuration for a [`DecisionClient`] talking to the real upstream.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub user_agent: String,
    /// Per-request transport timeout.
    pub request_timeout: Duration,
    pub governor: GovernorConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            governor: GovernorConfig::default(),
        }
    }
}

impl ClientConfig {
    /// Read configuration from environment variables.
    ///
    /// All optional, falling back to the defaults:
    /// - `KARAR_BASE_URL`, `KARAR_USER_AGENT`
    /// - `KARAR_TIMEOUT_SECS`
    /// - `KARAR_MIN_DELAY_MS`, `KARAR_MAX_DELAY_MS`, `KARAR_JITTER_MS`
    /// - `KARAR_BASE_RETRY_DELAY_SECS`, `KARAR_MAX_RETRY_DELAY_SECS`
    /// - `KARAR_MAX_RATE_LIMIT_RETRIES` (`none` retries forever)
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`from_env`](Self::from_env) with a custom variable source.
    pub fn from_lookup<L>(lookup: L) -> Result<Self, AppError>
    where
        L: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(url) = lookup("KARAR_BASE_URL") {
            config.base_url = url;
        }
        if let Some(agent) = lookup("KARAR_USER_AGENT") {
            config.user_agent = agent;
        }
        if let Some(secs) = parse_var::<u64>(&lookup, "KARAR_TIMEOUT_SECS")? {
            if secs == 0 {
                return Err(AppError::ConfigError(
                    "KARAR_TIMEOUT_SECS must be at least 1".into(),
                ));
            }
            config.request_timeout = Duration::from_secs(secs);
        }

        let governor = &mut config.governor;
        if let Some(ms) = parse_var::<u64>(&lookup, "KARAR_MIN_DELAY_MS")? {
            governor.min_delay = Duration::from_millis(ms);
        }
        if let Some(ms) = parse_var::<u64>(&lookup, "KARAR_MAX_DELAY_MS")? {
            governor.max_delay = Duration::from_millis(ms);
        }
        if let Some(ms) = parse_var::<u64>(&lookup, "KARAR_JITTER_MS")? {
            governor.jitter = Duration::from_millis(ms);
        }
        if let Some(secs) = parse_var::<u64>(&lookup, "KARAR_BASE_RETRY_DELAY_SECS")? {
            governor.base_retry_delay = Duration::from_secs(secs);
        }
        if let Some(secs) = parse_var::<u64>(&lookup, "KARAR_MAX_RETRY_DELAY_SECS")? {
            governor.max_retry_delay = Some(Duration::from_secs(secs));
        }
        if let Some(raw) = lookup("KARAR_MAX_RATE_LIMIT_RETRIES") {
            governor.max_rate_limit_retries = parse_retry_cap(&raw)?;
        }

        Ok(config)
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_governor(mut self, governor: GovernorConfig) -> Self {
        self.governor = governor;
        self
    }

    /// Build a client with its own session and pacing gate.
    pub fn build_client(&self) -> Result<DecisionClient<ReqwestTransport>, AppError> {
        let transport = ReqwestTransport::from_config(self)?;
        Ok(DecisionClient::new(
            transport,
            RateGovernor::new(self.governor.clone()),
        ))
    }
}

/// Parse a retry cap: a count, or `none`/`unlimited` for no cap.
pub fn parse_retry_cap(raw: &str) -> Result<Option<u32>, AppError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "none" | "unlimited" => Ok(None),
        value => value.parse().map(Some).map_err(|_| {
            AppError::ConfigError(format!(
                "Invalid KARAR_MAX_RATE_LIMIT_RETRIES '{raw}': must be a count or 'none'"
            ))
        }),
    }
}

fn parse_var<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
) -> Result<Option<T>, AppError> {
    match lookup(name) {
        None => Ok(None),
        Some(raw) => raw.trim().parse().map(Some).map_err(|_| {
            AppError::ConfigError(format!(
                "Invalid {name} '{raw}': must be a non-negative integer"
            ))
        }),
    }
}
