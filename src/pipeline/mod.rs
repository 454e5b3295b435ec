//! Ingestion orchestrator: fans out one task per year, and one task per
//! source type within a year. Every task runs to completion; failures are
//! collected and reported together once all siblings have settled.

pub mod resource;
pub mod schema;
pub mod table;

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::task::JoinSet;
use tracing::{error, warn};

use crate::common::error::{Result, ScraperError};
use crate::config::Config;
use crate::sources::{self, SkipPolicy, SourceType};

/// Shared, read-only state handed to every ingestion task.
pub struct IngestContext {
    pub client: reqwest::Client,
    pub config: Config,
    pub policy: SkipPolicy,
    /// Manually curated year -> official race start instant.
    pub starts: HashMap<i32, DateTime<Utc>>,
}

impl IngestContext {
    pub fn new(config: Config, policy: SkipPolicy) -> Result<Self> {
        let starts = load_official_starts(&config.starts_file)?;
        Ok(Self {
            client: reqwest::Client::new(),
            config,
            policy,
            starts,
        })
    }

    pub fn official_start(&self, year: i32) -> Result<DateTime<Utc>> {
        self.starts
            .get(&year)
            .copied()
            .ok_or(ScraperError::MissingStart(year))
    }
}

pub fn load_official_starts(path: &Path) -> Result<HashMap<i32, DateTime<Utc>>> {
    let raw = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

/// Ingests every year in `from..=to`. Years run concurrently; no failure
/// short-circuits its siblings.
pub async fn ingest(ctx: Arc<IngestContext>, from: i32, to: i32, force: bool) -> Result<()> {
    let mut tasks: JoinSet<std::result::Result<i32, (i32, ScraperError)>> = JoinSet::new();

    for year in from..=to {
        let ctx = Arc::clone(&ctx);
        tasks.spawn(async move {
            fetch_sources_for_year(ctx, year, force)
                .await
                .map(|_| year)
                .map_err(|e| (year, e))
        });
    }

    let mut failures = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(Ok(_)) => {}
            Ok(Err((year, e))) => failures.push(format!("{year}: {e}")),
            Err(e) => failures.push(format!("task panicked: {e}")),
        }
    }

    if failures.is_empty() {
        return Ok(());
    }
    for failure in &failures {
        error!("🔺 {failure}");
    }
    Err(ScraperError::Aggregate {
        scope: format!("years {from}..={to}"),
        failures,
    })
}

/// Fetches every non-skipped source type for one year concurrently. The
/// best-effort live lottery fetch runs first and only ever logs a warning.
pub async fn fetch_sources_for_year(
    ctx: Arc<IngestContext>,
    year: i32,
    force: bool,
) -> Result<()> {
    if !ctx.policy.is_skipped(year, SourceType::Live) {
        if let Err(e) = sources::live::fetch_latest(&ctx, year, force).await {
            warn!("⚠️ {e}");
        }
    }

    let mut tasks: JoinSet<Result<()>> = JoinSet::new();

    if !ctx.policy.is_skipped(year, SourceType::Applicant) {
        let ctx = Arc::clone(&ctx);
        tasks.spawn(async move { sources::applicant::fetch(&ctx, year, force).await.map(|_| ()) });
    }
    if !ctx.policy.is_skipped(year, SourceType::Entrant) {
        let ctx = Arc::clone(&ctx);
        tasks.spawn(async move { sources::entrant::fetch(&ctx, year, force).await.map(|_| ()) });
    }
    if !ctx.policy.is_skipped(year, SourceType::Finisher) {
        let ctx = Arc::clone(&ctx);
        tasks.spawn(async move { sources::finisher::fetch(&ctx, year, force).await.map(|_| ()) });
    }
    if !ctx.policy.is_skipped(year, SourceType::Waitlist) {
        let ctx = Arc::clone(&ctx);
        tasks.spawn(async move { sources::waitlist::fetch(&ctx, year, force).await.map(|_| ()) });
    }
    if !ctx.policy.is_skipped(year, SourceType::Split) {
        let ctx = Arc::clone(&ctx);
        tasks.spawn(async move { sources::split::fetch(&ctx, year, force).await });
    }

    let mut failures = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(Ok(())) => {}
            Ok(Err(e)) => failures.push(e.to_string()),
            Err(e) => failures.push(format!("task panicked: {e}")),
        }
    }

    if failures.is_empty() {
        return Ok(());
    }
    Err(ScraperError::Aggregate {
        scope: format!("year {year}"),
        failures,
    })
}
