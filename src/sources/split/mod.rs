//! Split times: one spreadsheet per year, published in whatever format the
//! timing crew used that era. A missing file for the upcoming year is
//! expected before race weekend and downgraded to a warning.

pub mod time;
mod workbook;

use tracing::warn;

use crate::common::error::{Result, ScraperError};
use crate::infra::fetch::{raw_get, throw_if_http_error};
use crate::pipeline::IngestContext;

/// The published format tracks the timing crew's tooling over the years:
/// tab-delimited text through 2003, legacy Excel through 2013, then xlsx.
pub fn split_url(year: i32) -> String {
    let extension = match year {
        ..=2003 => "txt",
        2004..=2013 => "xls",
        _ => "xlsx",
    };
    format!("https://www.wser.org/splits/{year}-splits.{extension}")
}

pub async fn fetch(ctx: &IngestContext, year: i32, force: bool) -> Result<()> {
    let path = ctx.config.raw_path(year, "split.json");
    let force = force || ctx.config.force;

    if !force && tokio::fs::try_exists(&path).await.unwrap_or(false) {
        return Ok(());
    }

    let url = split_url(year);
    let response = raw_get(&ctx.client, &url, &ctx.config.fetch_cache, force).await?;

    if response.status >= 400 && year == ctx.policy.upcoming_year {
        warn!("⚠️ no splits data available at {url} for year {year}");
        return Ok(());
    }
    throw_if_http_error(&response, &url)?;

    let official_start = ctx.official_start(year)?;

    if url.ends_with(".xlsx") || url.ends_with(".xls") {
        workbook::process(year, &url, &path, response.body, official_start).await?;
        return Ok(());
    }

    // The tab-delimited era predates the supported split years.
    Err(ScraperError::UnsupportedFormat { url })
}
