//! Table extractor: turns one HTML table into a generic label/row form.
//!
//! Decades of archive pages use ragged headers: some `th` cells are blank
//! while their column is empty in every row. Blank-label columns are
//! verified empty and then dropped from both labels and rows.

use once_cell::sync::Lazy;
use scraper::{Html, Selector};

use crate::common::error::{Result, ScraperError};

pub(crate) static TH: Lazy<Selector> = Lazy::new(|| Selector::parse("th").unwrap());
pub(crate) static TR: Lazy<Selector> = Lazy::new(|| Selector::parse("tr").unwrap());
pub(crate) static TD: Lazy<Selector> = Lazy::new(|| Selector::parse("td").unwrap());

/// One body row, carrying its original index for record ids.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRow {
    pub index: usize,
    pub cells: Vec<String>,
}

/// Transient tabular form produced per fetch.
#[derive(Debug, Clone, PartialEq)]
pub struct RawTable {
    pub labels: Vec<String>,
    pub rows: Vec<RawRow>,
}

/// A single data-driven carve-out: a known-benign non-empty cell under a
/// blank-label column. The cell is cleared instead of failing the extract.
#[derive(Debug, Clone)]
pub struct ColumnException {
    pub url: &'static str,
    pub column: usize,
    pub value: &'static str,
}

/// The 1990 results page marks runners who were originally disqualified but
/// later reinstated with a `*` in an otherwise unlabeled, empty column. We
/// do not currently represent this fact in the dataset.
pub static HISTORICAL_EXCEPTIONS: &[ColumnException] = &[ColumnException {
    url: "https://www.wser.org/results/1990-results/",
    column: 6,
    value: "*",
}];

fn selector(css: &str, url: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|_| ScraperError::Structure {
        what: format!("valid selector \"{css}\""),
        url: url.to_string(),
    })
}

/// Extracts the table identified by `table_selector` into labels + rows.
///
/// Blank header cells become null labels; a null-label column must be empty
/// in every row (modulo `exceptions`) and is then removed, higher indices
/// first so earlier removals never shift pending ones.
pub fn extract_table(
    body: &str,
    table_selector: &str,
    url: &str,
    exceptions: &[ColumnException],
) -> Result<RawTable> {
    let document = Html::parse_document(body);

    let header_sel = selector(&format!("{table_selector} thead tr:nth-child(1)"), url)?;
    let body_sel = selector(&format!("{table_selector} tbody"), url)?;

    let table_body = document
        .select(&body_sel)
        .next()
        .ok_or_else(|| ScraperError::Structure {
            what: format!("table body \"{table_selector} tbody\""),
            url: url.to_string(),
        })?;
    let table_header = document
        .select(&header_sel)
        .next()
        .ok_or_else(|| ScraperError::Structure {
            what: format!("table header \"{table_selector} thead\""),
            url: url.to_string(),
        })?;

    // Blank header text becomes a null label
    let labels: Vec<Option<String>> = table_header
        .select(&TH)
        .map(|th| {
            let text = th.text().collect::<String>().trim().to_string();
            if text.is_empty() {
                None
            } else {
                Some(text)
            }
        })
        .collect();
    let has_null_labels = labels.iter().any(Option::is_none);

    let mut rows = Vec::new();
    for (index, row) in table_body.select(&TR).enumerate() {
        let mut cells: Vec<String> = row
            .select(&TD)
            .map(|td| td.text().collect::<String>().trim().to_string())
            .collect();

        if cells.len() != labels.len() {
            return Err(ScraperError::Bounds(format!(
                "mismatched labels to fields on row {index} for {url}"
            )));
        }

        if has_null_labels {
            // Every cell under a null label must be empty, save for the
            // documented historical carve-outs which are cleared instead.
            for (i, label) in labels.iter().enumerate() {
                if label.is_none() && !cells[i].is_empty() {
                    let pardoned = exceptions
                        .iter()
                        .any(|e| e.url == url && e.column == i && e.value == cells[i]);
                    if pardoned {
                        cells[i].clear();
                        continue;
                    }
                    return Err(ScraperError::Bounds(format!(
                        "there is no label for the field in cell {i} on row {index} for {url}"
                    )));
                }
            }
        }

        rows.push(RawRow { index, cells });
    }

    if !has_null_labels {
        let labels = labels.into_iter().flatten().collect();
        return Ok(RawTable { labels, rows });
    }

    // Drop the null-label columns, higher indices first so each removal
    // leaves the remaining indices untouched.
    let mut removed: Vec<usize> = labels
        .iter()
        .enumerate()
        .filter_map(|(i, l)| l.is_none().then_some(i))
        .collect();
    removed.reverse();

    for row in &mut rows {
        for &i in &removed {
            let deleted = row.cells.remove(i);
            if !deleted.is_empty() {
                return Err(ScraperError::Bounds(format!(
                    "attempted to delete a non-empty cell {i} with value \"{deleted}\" from row {} for {url}",
                    row.index
                )));
            }
        }
    }

    let labels = labels.into_iter().flatten().collect();
    Ok(RawTable { labels, rows })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(thead: &str, tbody: &str) -> String {
        format!(
            "<html><body><div id=\"content\"><table>\
             <thead><tr>{thead}</tr></thead>\
             <tbody>{tbody}</tbody></table></div></body></html>"
        )
    }

    #[test]
    fn extracts_labels_and_rows() {
        let html = page(
            "<th>Place</th><th>Name</th>",
            "<tr><td>1</td><td>Jim King</td></tr><tr><td>2</td><td>Doug Latimer</td></tr>",
        );
        let table = extract_table(&html, "#content table", "http://example.test/", &[]).unwrap();
        assert_eq!(table.labels, vec!["Place", "Name"]);
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[1].index, 1);
        assert_eq!(table.rows[1].cells, vec!["2", "Doug Latimer"]);
    }

    #[test]
    fn width_mismatch_is_a_bounds_error_naming_the_row() {
        let html = page(
            "<th>Place</th><th>Name</th>",
            "<tr><td>1</td><td>Jim King</td></tr><tr><td>2</td></tr>",
        );
        let err = extract_table(&html, "#content table", "http://example.test/", &[]).unwrap_err();
        match err {
            ScraperError::Bounds(msg) => assert!(msg.contains("row 1"), "{msg}"),
            other => panic!("expected Bounds, got {other}"),
        }
    }

    #[test]
    fn blank_label_column_is_dropped_when_empty_everywhere() {
        let html = page(
            "<th>Place</th><th></th><th>Name</th>",
            "<tr><td>1</td><td></td><td>Jim King</td></tr>",
        );
        let table = extract_table(&html, "#content table", "http://example.test/", &[]).unwrap();
        assert_eq!(table.labels, vec!["Place", "Name"]);
        assert_eq!(table.rows[0].cells, vec!["1", "Jim King"]);
    }

    #[test]
    fn non_empty_cell_under_blank_label_is_fatal() {
        let html = page(
            "<th>Place</th><th></th><th>Name</th>",
            "<tr><td>1</td><td>*</td><td>Jim King</td></tr>",
        );
        let err = extract_table(&html, "#content table", "http://example.test/", &[]).unwrap_err();
        assert!(matches!(err, ScraperError::Bounds(_)));
    }

    #[test]
    fn documented_exception_is_cleared_to_empty() {
        let url = "https://www.wser.org/results/1990-results/";
        let html = page(
            "<th>A</th><th>B</th><th>C</th><th>D</th><th>E</th><th>F</th><th></th>",
            "<tr><td>1</td><td>2</td><td>3</td><td>4</td><td>5</td><td>6</td><td>*</td></tr>",
        );
        let table = extract_table(&html, "#content table", url, HISTORICAL_EXCEPTIONS).unwrap();
        assert_eq!(table.labels.len(), 6);
        assert_eq!(table.rows[0].cells, vec!["1", "2", "3", "4", "5", "6"]);
    }

    #[test]
    fn multiple_blank_columns_are_removed_without_shifting() {
        let html = page(
            "<th></th><th>Place</th><th></th><th>Name</th>",
            "<tr><td></td><td>1</td><td></td><td>Jim King</td></tr>",
        );
        let table = extract_table(&html, "#content table", "http://example.test/", &[]).unwrap();
        assert_eq!(table.labels, vec!["Place", "Name"]);
        assert_eq!(table.rows[0].cells, vec!["1", "Jim King"]);
    }

    #[test]
    fn missing_table_is_a_structure_error() {
        let err =
            extract_table("<html></html>", "#content table", "http://example.test/", &[]).unwrap_err();
        assert!(matches!(err, ScraperError::Structure { .. }));
    }
}
