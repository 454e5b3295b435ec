//! Source types published by the race organization, and the per-type
//! policy describing which years exist for each of them.

pub mod applicant;
pub mod entrant;
pub mod finisher;
pub mod live;
pub mod split;
pub mod waitlist;

use chrono::{Datelike, Utc};
use tracing::info;

use crate::common::error::Result;
use crate::infra::fetch::{self, Fetched};
use crate::pipeline::resource::{self, Document};
use crate::pipeline::schema::{map_table, Schema};
use crate::pipeline::table::{self, extract_table};
use crate::pipeline::IngestContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceType {
    Finisher,
    Entrant,
    Applicant,
    Waitlist,
    Split,
    Live,
}

impl SourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::Finisher => "finisher",
            SourceType::Entrant => "entrant",
            SourceType::Applicant => "applicant",
            SourceType::Waitlist => "waitlist",
            SourceType::Split => "split",
            SourceType::Live => "live",
        }
    }
}

/// Which years to skip per source type, consulted before any network
/// access. Injected into the engine so tests can substitute their own.
///
/// The historical gaps: the 1975 race had a single starter and no
/// finishers; the 2008 race was cancelled due to wildfires; the 2020 race
/// was cancelled due to the COVID-19 pandemic and its lottery rolled over
/// to 2021 (the 2020 entrants list is still published, so entrants are
/// still collected; the 2020 waitlist became the 2021 waitlist).
#[derive(Debug, Clone)]
pub struct SkipPolicy {
    pub first_race_year: i32,
    /// First year applicant and entrant pages are published.
    pub first_supported_year: i32,
    pub first_waitlist_year: i32,
    pub first_split_year: i32,
    pub skipped_applicant_years: Vec<i32>,
    pub skipped_entrant_years: Vec<i32>,
    pub skipped_finisher_years: Vec<i32>,
    pub skipped_waitlist_years: Vec<i32>,
    pub skipped_split_years: Vec<i32>,
    pub current_year: i32,
    /// The upcoming race year: rolls over once lottery season starts in
    /// November.
    pub upcoming_year: i32,
}

impl Default for SkipPolicy {
    fn default() -> Self {
        let now = Utc::now();
        let current_year = now.year();
        let upcoming_year = if now.month() < 11 {
            current_year
        } else {
            current_year + 1
        };
        Self {
            first_race_year: 1974,
            first_supported_year: 2013,
            first_waitlist_year: 2017,
            first_split_year: 2004,
            skipped_applicant_years: vec![2021],
            skipped_entrant_years: vec![],
            skipped_finisher_years: vec![1975, 2008, 2020],
            skipped_waitlist_years: vec![2020],
            skipped_split_years: vec![2008, 2020],
            current_year,
            upcoming_year,
        }
    }
}

impl SkipPolicy {
    pub fn is_skipped(&self, year: i32, source_type: SourceType) -> bool {
        match source_type {
            SourceType::Applicant => {
                year < self.first_supported_year || self.skipped_applicant_years.contains(&year)
            }
            SourceType::Entrant => {
                year < self.first_supported_year || self.skipped_entrant_years.contains(&year)
            }
            SourceType::Waitlist => {
                year < self.first_waitlist_year || self.skipped_waitlist_years.contains(&year)
            }
            SourceType::Split => {
                year < self.first_split_year || self.skipped_split_years.contains(&year)
            }
            SourceType::Finisher => {
                year < self.first_race_year || self.skipped_finisher_years.contains(&year)
            }
            SourceType::Live => year != self.current_year && year != self.upcoming_year,
        }
    }
}

/// Pure normalization step shared by every standard website table source:
/// extract, map onto the canonical schema, assemble the document.
pub fn normalize_table(
    schema: &Schema,
    body: &str,
    selector: &str,
    url: &str,
    year: i32,
) -> Result<Document> {
    let raw = extract_table(body, selector, url, table::HISTORICAL_EXCEPTIONS)?;
    let rows = map_table(schema, &raw, year)?;
    Ok(resource::assemble(schema, year, url, rows))
}

/// Fetch-normalize-persist for one standard website table. Serves the
/// generated document straight from cache unless forced.
pub(crate) async fn process_standard_table(
    ctx: &IngestContext,
    year: i32,
    force: bool,
    schema: &Schema,
    selector: &str,
    url: String,
    cache_file: &str,
) -> Result<Document> {
    let path = ctx.config.raw_path(year, cache_file);
    let force = force || ctx.config.force;

    match fetch::page_if_needed(&ctx.client, &url, &path, force).await? {
        Fetched::Cached(bytes) => Ok(serde_json::from_slice(&bytes)?),
        Fetched::Fresh { body } => {
            let document = normalize_table(schema, &body, selector, &url, year)?;
            resource::persist(&path, &document).await?;
            info!(
                "✅ processed {year} {} | {}",
                schema.record_type,
                path.display()
            );
            Ok(document)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> SkipPolicy {
        SkipPolicy {
            current_year: 2025,
            upcoming_year: 2026,
            ..SkipPolicy::default()
        }
    }

    #[test]
    fn years_before_first_supported_are_skipped() {
        let p = policy();
        assert!(p.is_skipped(2012, SourceType::Applicant));
        assert!(!p.is_skipped(2013, SourceType::Applicant));
        assert!(p.is_skipped(2016, SourceType::Waitlist));
        assert!(!p.is_skipped(2017, SourceType::Waitlist));
        assert!(p.is_skipped(2003, SourceType::Split));
        assert!(p.is_skipped(1973, SourceType::Finisher));
        assert!(!p.is_skipped(1974, SourceType::Finisher));
    }

    #[test]
    fn exception_years_are_skipped() {
        let p = policy();
        assert!(p.is_skipped(2021, SourceType::Applicant));
        assert!(p.is_skipped(1975, SourceType::Finisher));
        assert!(p.is_skipped(2008, SourceType::Finisher));
        assert!(p.is_skipped(2020, SourceType::Waitlist));
        assert!(p.is_skipped(2020, SourceType::Split));
        // The 2020 entrants list is still published and still collected
        assert!(!p.is_skipped(2020, SourceType::Entrant));
    }

    #[test]
    fn live_only_applies_to_current_or_upcoming_year() {
        let p = policy();
        assert!(!p.is_skipped(2025, SourceType::Live));
        assert!(!p.is_skipped(2026, SourceType::Live));
        assert!(p.is_skipped(2024, SourceType::Live));
    }
}
