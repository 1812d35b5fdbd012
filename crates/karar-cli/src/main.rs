use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use karar_client::{ClientConfig, ReqwestTransport};
use karar_core::client::within;
use karar_core::{AppError, Decision, DecisionClient, SearchRequest};

#[derive(Parser)]
#[command(name = "karar", version, about = "Rate-limited court decision search client")]
struct Cli {
    /// Upstream API base URL
    #[arg(long, global = true, env = "KARAR_BASE_URL")]
    base_url: Option<String>,

    /// Abort the whole command after this many seconds
    #[arg(long, global = true, env = "KARAR_DEADLINE_SECS")]
    deadline_secs: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Search decisions by keyword
    Search {
        /// Search keyword
        #[arg(short, long)]
        keyword: String,

        /// Page number (values below 1 are treated as 1)
        #[arg(short, long, default_value_t = 1, allow_negative_numbers = true)]
        page: i64,

        /// Results per page (coerced to 10, 25, 50 or 100)
        #[arg(short = 's', long, default_value_t = 10, allow_negative_numbers = true)]
        page_size: i64,

        /// Also fetch the document content of every decision
        #[arg(long, default_value_t = false)]
        fetch_content: bool,
    },

    /// Fetch the document content of one decision
    Content {
        /// Decision id
        #[arg(short, long)]
        id: String,
    },
}

/// JSON report printed for `search`.
#[derive(Serialize)]
struct SearchReport<'a> {
    keyword: &'a str,
    page_number: u32,
    page_size: u32,
    total_results: usize,
    total_records: u64,
    filtered_records: u64,
    decisions: &'a [Decision],
}

/// JSON report printed for `content`.
#[derive(Serialize)]
struct ContentReport<'a> {
    decision_id: &'a str,
    found: bool,
    content_length: usize,
    content: &'a str,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("karar=info".parse()?))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = ClientConfig::from_env().map_err(|e| anyhow::anyhow!(e))?;
    if let Some(base_url) = cli.base_url {
        config = config.with_base_url(base_url);
    }
    let client = config
        .build_client()
        .map_err(|e| anyhow::anyhow!(e))
        .context("Failed to create HTTP client")?;
    let deadline = cli.deadline_secs.map(Duration::from_secs);
    tracing::debug!(base_url = %config.base_url, ?deadline, "Client ready");

    match cli.command {
        Commands::Search {
            keyword,
            page,
            page_size,
            fetch_content,
        } => {
            cmd_search(&client, deadline, &keyword, page, page_size, fetch_content).await?;
        }
        Commands::Content { id } => {
            cmd_content(&client, deadline, &id).await?;
        }
    }

    Ok(())
}

async fn cmd_search(
    client: &DecisionClient<ReqwestTransport>,
    deadline: Option<Duration>,
    keyword: &str,
    page: i64,
    page_size: i64,
    fetch_content: bool,
) -> Result<()> {
    let request = SearchRequest::new(keyword, page, page_size).map_err(|e| anyhow::anyhow!(e))?;

    let result = match (deadline, fetch_content) {
        (Some(d), true) => within(d, client.search_with_content_request(&request)).await,
        (Some(d), false) => within(d, client.search_request(&request)).await,
        (None, true) => client.search_with_content_request(&request).await,
        (None, false) => client.search_request(&request).await,
    }
    .map_err(describe)?;

    let report = SearchReport {
        keyword: request.keyword(),
        page_number: request.page_number(),
        page_size: request.page_size(),
        total_results: result.decisions.len(),
        total_records: result.total_records,
        filtered_records: result.filtered_records,
        decisions: &result.decisions,
    };
    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(())
}

async fn cmd_content(
    client: &DecisionClient<ReqwestTransport>,
    deadline: Option<Duration>,
    id: &str,
) -> Result<()> {
    let result = match deadline {
        Some(d) => client.fetch_content_within(d, id).await,
        None => client.fetch_content(id).await,
    }
    .map_err(describe)?;

    let report = ContentReport {
        decision_id: &result.decision_id,
        found: result.found,
        content_length: result.content.chars().count(),
        content: &result.content,
    };
    println!("{}", serde_json::to_string_pretty(&report)?);

    if !result.found {
        anyhow::bail!("Failed to fetch document content for decision {id}");
    }

    Ok(())
}

fn describe(err: AppError) -> anyhow::Error {
    match err {
        AppError::RateLimitExhausted { .. } => {
            anyhow::anyhow!(err).context("Upstream kept rate limiting; try again later")
        }
        other => anyhow::anyhow!(other),
    }
}
