//! Workbook scanner for split spreadsheets.
//!
//! Each row is one runner: demographic columns followed by a run of
//! aide-station columns that strictly alternate checkpoint time, then
//! checkpoint position. Any header outside the demographic set opens a new
//! checkpoint. Reconstruction is two-pass per runner: raw cells are
//! buffered while scanning (the reference date is only discovered along
//! the way), then resolved to absolute instants in one deterministic pass.

use std::io::Cursor;
use std::path::Path;

use calamine::{open_workbook_auto_from_rs, Data, DataType, Reader};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::common::error::{Result, ScraperError};
use crate::pipeline::resource::{self, iso, Document, ResourceRecord};
use crate::pipeline::schema::FieldSpec;

use super::time::{
    is_time_range, reference_midnight, resolve_range, resolve_stamp, CheckIn, CheckTime, Position,
    TimePoint, TIME_PLACEHOLDER,
};

/// The demographic columns every split sheet carries. Anything else is an
/// aide-station marker.
static DEMOGRAPHIC_FIELDS: &[FieldSpec] = &[
    FieldSpec::new("overallPlace", &["Overall Place"]),
    FieldSpec::new("time", &["Time"]),
    FieldSpec::new("bib", &["Bib"]),
    FieldSpec::new("firstName", &["First Name"]),
    FieldSpec::new("lastName", &["Last Name"]),
    FieldSpec::new("gender", &["Gender"]),
    FieldSpec::new("age", &["Age"]),
    FieldSpec::new("city", &["City"]),
    FieldSpec::new("state", &["State"]),
    FieldSpec::new("country", &["Country"]),
];

fn canonical(label: &str) -> Option<&'static str> {
    DEMOGRAPHIC_FIELDS
        .iter()
        .find(|f| f.attribute == label || f.aliases.contains(&label))
        .map(|f| f.attribute)
}

fn is_canonical(header: &str) -> bool {
    DEMOGRAPHIC_FIELDS.iter().any(|f| f.attribute == header)
}

/// A spreadsheet cell, decoupled from the reader's own value type.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Cell {
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
    Stamp(NaiveDateTime),
}

fn convert_cell(data: &Data, url: &str) -> Result<Cell> {
    match data {
        Data::Empty => Ok(Cell::Empty),
        Data::String(s) => Ok(Cell::Text(s.trim().to_string())),
        Data::Float(f) => Ok(Cell::Number(*f)),
        Data::Int(i) => Ok(Cell::Number(*i as f64)),
        Data::Bool(b) => Ok(Cell::Bool(*b)),
        Data::DateTime(_) | Data::DateTimeIso(_) => data
            .as_datetime()
            .map(Cell::Stamp)
            .ok_or_else(|| ScraperError::TimeFormat(format!("unreadable timestamp cell {data:?}"))),
        Data::DurationIso(s) => Ok(Cell::Text(s.clone())),
        Data::Error(e) => Err(ScraperError::Bounds(format!(
            "unexpected error cell {e:?} in {url}"
        ))),
    }
}

/// Raw per-checkpoint time as buffered during the first pass.
#[derive(Debug, Clone, PartialEq)]
enum RawTime {
    Placeholder,
    Stamp(NaiveDateTime),
    Range(String),
}

struct PendingCheckIn {
    name: String,
    time: RawTime,
    position: Cell,
}

/// The two-state aide-column scanner: a time column always opens a new
/// checkpoint, the next aide column is always that checkpoint's position.
enum ScanState {
    AwaitingTime,
    AwaitingPosition,
}

pub(crate) fn map_headers(first_row: &[Data], url: &str) -> Result<Vec<String>> {
    let mut headers = Vec::with_capacity(first_row.len());
    for cell in first_row {
        let Data::String(text) = cell else {
            return Err(ScraperError::Structure {
                what: format!("a string header cell (got {cell:?})"),
                url: url.to_string(),
            });
        };
        let trimmed = text.trim();
        headers.push(canonical(trimmed).map(str::to_string).unwrap_or_else(|| trimmed.to_string()));
    }
    Ok(headers)
}

/// Aide columns must pair up time/position; an odd count means the strict
/// alternation assumption no longer holds for this sheet.
pub(crate) fn check_aide_column_parity(headers: &[String], year: i32) -> Result<()> {
    let aide_columns = headers.iter().filter(|h| !is_canonical(h)).count();
    if aide_columns % 2 != 0 {
        return Err(ScraperError::Bounds(format!(
            "expected an even number of aide-station columns but got {aide_columns} for year {year}"
        )));
    }
    Ok(())
}

fn raw_time(cell: &Cell) -> Result<RawTime> {
    match cell {
        Cell::Text(t) if t == TIME_PLACEHOLDER => Ok(RawTime::Placeholder),
        Cell::Text(t) if is_time_range(t) => Ok(RawTime::Range(t.clone())),
        Cell::Stamp(stamp) => Ok(RawTime::Stamp(*stamp)),
        other => Err(ScraperError::TimeFormat(format!(
            "expected a timestamp, placeholder or range in a time column, but got {other:?}"
        ))),
    }
}

fn position_from_cell(cell: &Cell) -> Position {
    match cell {
        Cell::Empty => Position::None,
        Cell::Number(n) => Position::Ordinal(*n as i64),
        Cell::Text(t) => {
            if let Ok(n) = t.parse::<i64>() {
                return Position::Ordinal(n);
            }
            if let Some((a, b)) = t.split_once('-') {
                if let (Ok(entry), Ok(exit)) = (a.trim().parse(), b.trim().parse()) {
                    return Position::Pair { entry, exit };
                }
            }
            Position::Text(t.clone())
        }
        Cell::Bool(b) => Position::Text(b.to_string()),
        Cell::Stamp(stamp) => Position::Text(stamp.to_string()),
    }
}

/// Builds one participant record from a row. All reconstruction state is
/// local to the runner; nothing crosses rows.
pub(crate) fn build_runner(
    headers: &[String],
    cells: &[Cell],
    year: i32,
    row_index: usize,
    official_start: DateTime<Utc>,
) -> Result<ResourceRecord> {
    // Pass 1: buffer raw values and discover the reference date. The export
    // tool anchors times to its own placeholder date, so the first real
    // timestamp donates the calendar date; finish-time columns are not used
    // for discovery because they may cross a date boundary.
    let mut demographics: Vec<(&str, &Cell)> = Vec::new();
    let mut pending: Vec<PendingCheckIn> = Vec::new();
    let mut reference: Option<DateTime<Utc>> = None;
    let mut state = ScanState::AwaitingTime;

    for (header, cell) in headers.iter().zip(cells.iter()) {
        if is_canonical(header) {
            demographics.push((header, cell));
            continue;
        }
        match state {
            ScanState::AwaitingTime => {
                let time = raw_time(cell)?;
                if reference.is_none() {
                    if let RawTime::Stamp(stamp) = &time {
                        reference = Some(reference_midnight(*stamp));
                    }
                }
                pending.push(PendingCheckIn {
                    name: header.clone(),
                    time,
                    position: Cell::Empty,
                });
                state = ScanState::AwaitingPosition;
            }
            ScanState::AwaitingPosition => {
                if let Some(open) = pending.last_mut() {
                    open.position = cell.clone();
                }
                state = ScanState::AwaitingTime;
            }
        }
    }

    // Pass 2: resolve everything now that the reference is known.
    let need_reference = |reference: Option<DateTime<Utc>>| -> Result<DateTime<Utc>> {
        reference.ok_or_else(|| {
            ScraperError::TimeFormat(format!(
                "no reference timestamp found on row {row_index} for year {year}"
            ))
        })
    };

    let mut attributes = Map::new();
    for (attribute, cell) in demographics {
        let value = match cell {
            Cell::Empty => Value::Null,
            Cell::Text(t) => Value::String(t.clone()),
            Cell::Number(n) if n.fract() == 0.0 => Value::from(*n as i64),
            Cell::Number(n) => Value::from(*n),
            Cell::Bool(b) => Value::from(*b),
            Cell::Stamp(stamp) => {
                let reference = need_reference(reference)?;
                Value::String(iso(resolve_stamp(*stamp, official_start, reference)))
            }
        };
        attributes.insert(attribute.to_string(), value);
    }

    let mut timing = Vec::with_capacity(pending.len());
    for (index, checkin) in pending.iter().enumerate() {
        let time = match &checkin.time {
            // Runners are implicitly checked in at the start line at the gun
            RawTime::Placeholder if index == 0 => CheckTime::Point(TimePoint::At(official_start)),
            RawTime::Placeholder => CheckTime::Point(TimePoint::NotRecorded),
            RawTime::Stamp(stamp) => {
                let reference = need_reference(reference)?;
                CheckTime::Point(TimePoint::At(resolve_stamp(*stamp, official_start, reference)))
            }
            RawTime::Range(raw) => resolve_range(raw, official_start)?,
        };
        timing.push(CheckIn {
            name: checkin.name.clone(),
            time,
            position: position_from_cell(&checkin.position),
        });
    }
    attributes.insert("timing".to_string(), serde_json::to_value(&timing)?);

    Ok(ResourceRecord {
        kind: "participant".to_string(),
        id: format!("{year}:{row_index}"),
        attributes,
        relationships: None,
    })
}

/// Parses a whole workbook body into the persisted split document.
pub(crate) async fn process(
    year: i32,
    url: &str,
    path: &Path,
    body: Vec<u8>,
    official_start: DateTime<Utc>,
) -> Result<Document> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(body))?;
    let sheet_name = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| ScraperError::Structure {
            what: "a worksheet in the split workbook".to_string(),
            url: url.to_string(),
        })?;
    let range = workbook.worksheet_range(&sheet_name)?;

    let mut rows = range.rows();
    let header_row = rows.next().ok_or_else(|| ScraperError::Structure {
        what: "a header row in the split workbook".to_string(),
        url: url.to_string(),
    })?;
    let headers = map_headers(header_row, url)?;
    check_aide_column_parity(&headers, year)?;

    let mut runners = Vec::new();
    for (index, row) in rows.enumerate() {
        if row.len() != headers.len() {
            return Err(ScraperError::Bounds(format!(
                "expected {} columns on row {index} but got {} for splits from the spreadsheet for year {year}",
                headers.len(),
                row.len()
            )));
        }
        let cells = row
            .iter()
            .map(|data| convert_cell(data, url))
            .collect::<Result<Vec<Cell>>>()?;
        runners.push(build_runner(&headers, &cells, year, index, official_start)?);
    }

    if runners.is_empty() {
        warn!("⚠️ no split records found for year {year}");
    }

    let document = resource::wrap_records("split-list", "splits", year, url, runners);
    resource::persist(path, &document).await?;
    info!("✅ processed {year} split | {}", path.display());
    Ok(document)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate, TimeZone};

    fn start() -> DateTime<Utc> {
        // 5:00 AM Pacific on race morning
        Utc.with_ymd_and_hms(2015, 6, 27, 12, 0, 0).unwrap()
    }

    fn stamp(day: u32, h: u32, m: u32, s: u32) -> Cell {
        Cell::Stamp(
            NaiveDate::from_ymd_opt(1899, 12, day)
                .unwrap()
                .and_hms_opt(h, m, s)
                .unwrap(),
        )
    }

    fn headers(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn timing(record: &ResourceRecord) -> Vec<Value> {
        record.attributes["timing"].as_array().unwrap().clone()
    }

    #[test]
    fn alternating_columns_become_ordered_checkins() {
        let h = headers(&["firstName", "Escarpment", "Escarpment Pos", "Foresthill", "Foresthill Pos"]);
        let cells = vec![
            Cell::Text("Rob".into()),
            stamp(30, 6, 30, 0),
            Cell::Number(4.0),
            stamp(30, 13, 2, 30),
            Cell::Number(2.0),
        ];
        let runner = build_runner(&h, &cells, 2015, 0, start()).unwrap();
        let timing = timing(&runner);
        assert_eq!(timing.len(), 2);
        assert_eq!(timing[0]["name"], "Escarpment");
        assert_eq!(timing[0]["position"], 4);
        assert_eq!(timing[1]["name"], "Foresthill");
        // 13:02:30 relative to midnight of the first-seen date
        assert_eq!(timing[1]["time"], "2015-06-28T01:02:30.000Z");
        assert_eq!(runner.attributes["firstName"], "Rob");
        assert_eq!(runner.id, "2015:0");
    }

    #[test]
    fn placeholder_at_first_checkpoint_is_the_official_start() {
        let h = headers(&["firstName", "Escarpment", "Escarpment Pos", "Foresthill", "Foresthill Pos"]);
        let cells = vec![
            Cell::Text("Ann".into()),
            Cell::Text(TIME_PLACEHOLDER.into()),
            Cell::Empty,
            stamp(30, 13, 0, 0),
            Cell::Number(1.0),
        ];
        let runner = build_runner(&h, &cells, 2015, 3, start()).unwrap();
        let timing = timing(&runner);
        assert_eq!(timing[0]["time"], "2015-06-27T12:00:00.000Z");
        assert_eq!(timing[0]["position"], Value::Null);
        // A later placeholder stays not-recorded
        let cells = vec![
            Cell::Text("Ann".into()),
            stamp(30, 6, 0, 0),
            Cell::Number(1.0),
            Cell::Text(TIME_PLACEHOLDER.into()),
            Cell::Empty,
        ];
        let runner = build_runner(&h, &cells, 2015, 3, start()).unwrap();
        assert_eq!(self::timing(&runner)[1]["time"], "--:--");
    }

    #[test]
    fn stamps_seen_before_the_reference_are_corrected_in_the_second_pass() {
        // The finish-time column precedes the aide columns, so its stamp is
        // buffered first and must still resolve against the reference that
        // is only discovered later — one day after the export's base date.
        let h = headers(&["time", "firstName", "Escarpment", "Escarpment Pos"]);
        let cells = vec![
            stamp(31, 4, 10, 0), // finish: 04:10:00 on day two
            Cell::Text("Rob".into()),
            stamp(30, 6, 30, 0),
            Cell::Number(4.0),
        ];
        let runner = build_runner(&h, &cells, 2015, 0, start()).unwrap();
        // Reference is midnight of day 30, so the finish resolves to
        // start + 1 day + 4h10m.
        let expected = start() + Duration::days(1) + Duration::hours(4) + Duration::minutes(10);
        assert_eq!(runner.attributes["time"], iso(expected));
    }

    #[test]
    fn range_cells_resolve_per_side() {
        let h = headers(&["firstName", "Michigan Bluff", "Michigan Bluff Pos"]);
        let cells = vec![
            Cell::Text("Rob".into()),
            Cell::Text("--:--08:30:00".into()),
            Cell::Text("12-15".into()),
        ];
        let runner = build_runner(&h, &cells, 2015, 0, start()).unwrap();
        let timing = timing(&runner);
        assert_eq!(timing[0]["time"]["in"], "--:--");
        assert_eq!(timing[0]["time"]["out"], "2015-06-27T20:30:00.000Z");
        assert_eq!(timing[0]["position"]["in"], 12);
        assert_eq!(timing[0]["position"]["out"], 15);
    }

    #[test]
    fn odd_aide_column_count_is_a_bounds_error() {
        let h = headers(&["firstName", "Escarpment", "Escarpment Pos", "Dangling"]);
        let err = check_aide_column_parity(&h, 2015).unwrap_err();
        assert!(matches!(err, ScraperError::Bounds(_)));

        let h = headers(&["firstName", "lastName", "Escarpment", "Escarpment Pos"]);
        check_aide_column_parity(&h, 2015).unwrap();
    }

    #[test]
    fn plain_text_in_a_time_column_is_fatal() {
        let h = headers(&["firstName", "Escarpment", "Escarpment Pos"]);
        let cells = vec![
            Cell::Text("Rob".into()),
            Cell::Text("dnf".into()),
            Cell::Empty,
        ];
        let err = build_runner(&h, &cells, 2015, 0, start()).unwrap_err();
        assert!(matches!(err, ScraperError::TimeFormat(_)));
    }

    #[test]
    fn header_aliases_map_to_canonical_demographics() {
        let row = vec![
            Data::String("Overall Place".into()),
            Data::String("First Name".into()),
            Data::String("Robinson Flat".into()),
        ];
        let mapped = map_headers(&row, "http://example.test/").unwrap();
        assert_eq!(mapped, vec!["overallPlace", "firstName", "Robinson Flat"]);
    }
}
