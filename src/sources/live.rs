//! Live lottery results: scraped from the lottery site while a drawing is
//! underway. Best-effort by design — every failure here is downgraded to a
//! warning by the caller and never joins the aggregate failure report.
//!
//! The page carries no year marker beyond a date header, so the header is
//! validated against the expected drawing year (race year minus one)
//! before anything is extracted. Table labels are stored raw: the live
//! page's layout changes every drawing and is not worth a canonical
//! schema.

use scraper::{ElementRef, Html, Selector};
use serde_json::{json, Map, Value};
use tracing::info;

use crate::common::error::{Result, ScraperError};
use crate::infra::fetch::{self, Fetched};
use crate::pipeline::resource::{
    iso, persist, Document, ListAttributes, ResourceList, ResourceRecord, ResourceRef,
};
use crate::pipeline::table::{TD, TH, TR};
use crate::pipeline::IngestContext;

const LIVE_URL: &str = "https://lottery.wser.org/";

pub async fn fetch_latest(ctx: &IngestContext, year: i32, force: bool) -> Result<Document> {
    let path = ctx.config.raw_path(year, "live-lottery-results.json");
    let force = force || ctx.config.force;

    match fetch::page_if_needed(&ctx.client, LIVE_URL, &path, force).await? {
        Fetched::Cached(bytes) => Ok(serde_json::from_slice(&bytes)?),
        Fetched::Fresh { body } => {
            let document = parse_live_results(&body, year)?;
            persist(&path, &document).await?;
            info!("✅ processed {year} live lottery results | {}", path.display());
            Ok(document)
        }
    }
}

/// Extracts the picks and waitlist tables from the live lottery page.
pub fn parse_live_results(body: &str, year: i32) -> Result<Document> {
    let html = Html::parse_document(body);

    let header_sel = Selector::parse(".card-body h4").unwrap();
    let header = html
        .select(&header_sel)
        .next()
        .filter(|h| h.text().collect::<String>().trim() == "WSER Lottery")
        .ok_or_else(|| structure("the header to validate date of lottery results"))?;

    let date_header = header
        .next_siblings()
        .find_map(ElementRef::wrap)
        .filter(|el| el.value().name() == "h5")
        .ok_or_else(|| structure("the date header to validate date of lottery results"))?;

    // e.g. "December 2, 2023" — the drawing happens the year before the race
    let date_text = date_header.text().collect::<String>().trim().to_string();
    let expected_year = year - 1;
    let parsed_year: i32 = date_text
        .get(date_text.len().saturating_sub(4)..)
        .and_then(|tail| tail.parse().ok())
        .ok_or_else(|| structure(&format!("a drawing year in the date header \"{date_text}\"")))?;
    if parsed_year != expected_year {
        return Err(structure(&format!(
            "drawing year {expected_year} in the date header (parsed \"{parsed_year}\" from \"{date_text}\")"
        )));
    }

    let body_sel = Selector::parse("table#entrants-latest tbody").unwrap();
    let head_sel = Selector::parse("table#entrants-latest thead tr:nth-child(1)").unwrap();

    let bodies: Vec<ElementRef> = html.select(&body_sel).collect();
    let heads: Vec<ElementRef> = html.select(&head_sel).collect();
    let (pick_table, waitlist_table) = match (bodies.first(), bodies.get(1)) {
        (Some(p), Some(w)) => (*p, *w),
        (Some(_), None) => return Err(structure("the table with waitlist data")),
        _ => return Err(structure("the table with lottery result data")),
    };
    let (pick_head, waitlist_head) = match (heads.first(), heads.get(1)) {
        (Some(p), Some(w)) => (*p, *w),
        (Some(_), None) => return Err(structure("the table header with waitlist data")),
        _ => return Err(structure("the table header with lottery result data")),
    };

    let collect_labels = |head: ElementRef| -> Vec<String> {
        head.select(&TH)
            .map(|th| th.text().collect::<String>().trim().to_string())
            .collect()
    };

    // Labels are kept raw: no canonical mapping for the live page
    let collect_records = |table: ElementRef, labels: &[String], kind: &str| -> Vec<ResourceRecord> {
        table
            .select(&TR)
            .enumerate()
            .map(|(index, row)| {
                let cells: Vec<String> = row
                    .select(&TD)
                    .map(|td| td.text().collect::<String>().trim().to_string())
                    .collect();
                let mut attributes = Map::new();
                for (i, label) in labels.iter().enumerate() {
                    let value = cells.get(i).cloned().unwrap_or_default();
                    attributes.insert(label.clone(), Value::String(value));
                }
                ResourceRecord {
                    kind: kind.to_string(),
                    id: format!("{year}:{index}"),
                    attributes,
                    relationships: None,
                }
            })
            .collect()
    };

    let pick_labels = collect_labels(pick_head);
    let waitlist_labels = collect_labels(waitlist_head);
    let entrants = collect_records(pick_table, &pick_labels, "entrant");
    let waitlist = collect_records(waitlist_table, &waitlist_labels, "waitlist-entrant");

    let refs = |records: &[ResourceRecord]| -> Vec<ResourceRef> {
        records
            .iter()
            .map(|r| ResourceRef {
                kind: r.kind.clone(),
                id: r.id.clone(),
            })
            .collect()
    };

    let mut relationships = Map::new();
    relationships.insert("entrants".to_string(), json!({ "data": refs(&entrants) }));
    relationships.insert("waitlist".to_string(), json!({ "data": refs(&waitlist) }));

    let mut included = entrants;
    included.extend(waitlist);

    Ok(Document {
        data: ResourceList {
            kind: "lottery-result".to_string(),
            id: year.to_string(),
            attributes: ListAttributes {
                year,
                source: LIVE_URL.to_string(),
                accessed: iso(chrono::Utc::now()),
            },
            relationships,
        },
        included,
    })
}

fn structure(what: &str) -> ScraperError {
    ScraperError::Structure {
        what: what.to_string(),
        url: LIVE_URL.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn live_page(date: &str) -> String {
        format!(
            "<html><body><div class=\"card-body\"><h4>WSER Lottery</h4><h5>{date}</h5></div>\
             <table id=\"entrants-latest\">\
             <thead><tr><th>First</th><th>Last</th></tr></thead>\
             <tbody><tr><td>Jim</td><td>King</td></tr><tr><td>Ann</td><td>Trason</td></tr></tbody>\
             </table>\
             <table id=\"entrants-latest\">\
             <thead><tr><th>Order</th><th>First</th></tr></thead>\
             <tbody><tr><td>1</td><td>Gordy</td></tr></tbody>\
             </table></body></html>"
        )
    }

    #[test]
    fn extracts_picks_and_waitlist_with_raw_labels() {
        let doc = parse_live_results(&live_page("December 2, 2023"), 2024).unwrap();
        assert_eq!(doc.data.kind, "lottery-result");
        assert_eq!(doc.included.len(), 3);
        assert_eq!(doc.included[0].kind, "entrant");
        assert_eq!(doc.included[0].attributes["First"], "Jim");
        assert_eq!(doc.included[2].kind, "waitlist-entrant");
        assert_eq!(doc.included[2].attributes["Order"], "1");
        assert_eq!(
            doc.data.relationships["entrants"]["data"].as_array().unwrap().len(),
            2
        );
        assert_eq!(
            doc.data.relationships["waitlist"]["data"].as_array().unwrap().len(),
            1
        );
    }

    #[test]
    fn wrong_drawing_year_is_rejected() {
        let err = parse_live_results(&live_page("December 2, 2022"), 2024).unwrap_err();
        assert!(matches!(err, ScraperError::Structure { .. }));
    }

    #[test]
    fn missing_header_is_rejected() {
        let err = parse_live_results("<html><body></body></html>", 2024).unwrap_err();
        assert!(matches!(err, ScraperError::Structure { .. }));
    }
}
