//! Field mapper / schema normalizer.
//!
//! Header text varies by year ("First" vs "First Name", "State/Country" vs
//! "State or Country"), so every source type declares its canonical
//! attributes once, as data: accepted raw-label aliases plus null and
//! numeric policy. One generic routine consumes the declaration.

use std::collections::HashMap;

use serde_json::{Map, Value};

use crate::common::error::{Result, ScraperError};
use crate::pipeline::table::RawTable;

/// Declarative description of one canonical attribute.
#[derive(Debug, Clone)]
pub struct FieldSpec {
    pub attribute: &'static str,
    pub aliases: &'static [&'static str],
    pub nullable: bool,
    pub numeric: bool,
    /// The value is a record id referencing an entrant, not an attribute.
    pub entrant_ref: bool,
}

impl FieldSpec {
    pub const fn new(attribute: &'static str, aliases: &'static [&'static str]) -> Self {
        Self {
            attribute,
            aliases,
            nullable: false,
            numeric: false,
            entrant_ref: false,
        }
    }

    pub const fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub const fn numeric(mut self) -> Self {
        self.numeric = true;
        self
    }

    pub const fn entrant_ref(mut self) -> Self {
        self.entrant_ref = true;
        self
    }
}

/// Canonical per-source-type schema.
#[derive(Debug, Clone)]
pub struct Schema {
    /// Resource type of each record, e.g. "finisher".
    pub record_type: &'static str,
    /// Resource type of the wrapping list, e.g. "finishers-list".
    pub list_type: &'static str,
    /// Relationship key in the list document, e.g. "finishers".
    pub relationship: &'static str,
    pub fields: &'static [FieldSpec],
    /// Lottery-style schemas derive `years` from ticket count when zero.
    pub derive_years: bool,
}

impl Schema {
    /// Inverse lookup raw label -> field. Canonical attribute names are
    /// accepted alongside their aliases, as some years publish them as-is.
    pub fn inverse(&self) -> HashMap<&'static str, &FieldSpec> {
        let mut map = HashMap::new();
        for field in self.fields {
            map.insert(field.attribute, field);
            for alias in field.aliases {
                map.insert(*alias, field);
            }
        }
        map
    }

    pub fn field(&self, attribute: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.attribute == attribute)
    }
}

/// One mapped row: canonical attributes plus an optional entrant reference.
#[derive(Debug, Clone)]
pub struct MappedRow {
    pub index: usize,
    pub attributes: Map<String, Value>,
    pub entrant_ref: Option<String>,
}

/// On the 2^(n - 1) formula: a lottery applicant's ticket count doubles per
/// consecutive year applied. 1 => 1, 2 => 2, 4 => 3, 8 => 4, 16 => 5.
pub fn tickets_to_years(tickets: u64) -> u64 {
    if tickets == 1 {
        return 1;
    }
    let mut years = 1;
    let mut remaining = tickets as f64;
    while remaining > 1.0 {
        remaining /= 2.0;
        years += 1;
    }
    years
}

fn numeric_value(raw: &str) -> Option<Value> {
    if let Ok(n) = raw.parse::<i64>() {
        return Some(Value::from(n));
    }
    raw.parse::<f64>().ok().map(Value::from)
}

/// Maps every row of `table` onto the canonical attributes of `schema`.
///
/// An unmapped raw label is fatal. Per cell: empty + nullable => null,
/// empty + required => missing-value, numeric => parsed number, otherwise
/// the trimmed text.
pub fn map_table(schema: &Schema, table: &RawTable, year: i32) -> Result<Vec<MappedRow>> {
    let inverse = schema.inverse();

    let fields: Vec<&FieldSpec> = table
        .labels
        .iter()
        .map(|label| {
            inverse
                .get(label.as_str())
                .copied()
                .ok_or_else(|| ScraperError::InvalidLabel {
                    label: label.clone(),
                    year,
                    source_type: schema.record_type,
                })
        })
        .collect::<Result<_>>()?;

    let mut mapped = Vec::with_capacity(table.rows.len());
    for row in &table.rows {
        let mut attributes = Map::new();
        let mut entrant_ref = None;

        for (cell, (value, field)) in row.cells.iter().zip(fields.iter()).enumerate() {
            if value.is_empty() {
                if field.nullable {
                    attributes.insert(field.attribute.to_string(), Value::Null);
                    continue;
                }
                return Err(ScraperError::MissingValue {
                    field: field.attribute.to_string(),
                    cell,
                    row: row.index,
                    year,
                });
            }

            if field.entrant_ref {
                entrant_ref = Some(value.clone());
                continue;
            }

            if field.numeric {
                let parsed = numeric_value(value).ok_or_else(|| ScraperError::NumericFormat {
                    field: field.attribute.to_string(),
                    value: value.clone(),
                    year,
                })?;
                attributes.insert(field.attribute.to_string(), parsed);
                continue;
            }

            attributes.insert(field.attribute.to_string(), Value::String(value.clone()));
        }

        if schema.derive_years {
            fix_years(&mut attributes);
        }

        mapped.push(MappedRow {
            index: row.index,
            attributes,
            entrant_ref,
        });
    }

    Ok(mapped)
}

/// Some years omit or zero the "years in lottery" column; reconstruct it
/// from the ticket count via the doubling law.
fn fix_years(attributes: &mut Map<String, Value>) {
    let years = attributes.get("years").and_then(Value::as_u64);
    if years != Some(0) {
        return;
    }
    if let Some(tickets) = attributes.get("tickets").and_then(Value::as_u64) {
        if tickets > 0 {
            attributes.insert("years".to_string(), Value::from(tickets_to_years(tickets)));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::table::RawRow;

    static TEST_SCHEMA: Schema = Schema {
        record_type: "test-entrant",
        list_type: "test-list",
        relationship: "entrants",
        fields: &[
            FieldSpec::new("firstName", &["First Name", "First"]),
            FieldSpec::new("age", &["Age"]).numeric(),
            FieldSpec::new("city", &["City"]).nullable(),
            FieldSpec::new("years", &["Years"]).numeric(),
            FieldSpec::new("tickets", &["Tickets"]).numeric(),
        ],
        derive_years: true,
    };

    fn table(labels: &[&str], rows: &[&[&str]]) -> RawTable {
        RawTable {
            labels: labels.iter().map(|s| s.to_string()).collect(),
            rows: rows
                .iter()
                .enumerate()
                .map(|(index, cells)| RawRow {
                    index,
                    cells: cells.iter().map(|s| s.to_string()).collect(),
                })
                .collect(),
        }
    }

    #[test]
    fn tickets_follow_the_doubling_law() {
        assert_eq!(tickets_to_years(1), 1);
        assert_eq!(tickets_to_years(2), 2);
        assert_eq!(tickets_to_years(4), 3);
        assert_eq!(tickets_to_years(8), 4);
        assert_eq!(tickets_to_years(16), 5);
        assert_eq!(tickets_to_years(32), 6);
        assert_eq!(tickets_to_years(64), 7);
    }

    #[test]
    fn maps_aliases_and_coerces_numbers() {
        let t = table(
            &["First", "Age", "City", "Years", "Tickets"],
            &[&["Jane", "34", "Auburn", "3", "4"]],
        );
        let rows = map_table(&TEST_SCHEMA, &t, 2015).unwrap();
        assert_eq!(rows[0].attributes["firstName"], "Jane");
        assert_eq!(rows[0].attributes["age"], 34);
        assert_eq!(rows[0].attributes["years"], 3);
    }

    #[test]
    fn unmapped_label_is_fatal_and_names_the_label() {
        let t = table(&["Foo Bar"], &[&["x"]]);
        let err = map_table(&TEST_SCHEMA, &t, 2015).unwrap_err();
        match err {
            ScraperError::InvalidLabel { label, year, .. } => {
                assert_eq!(label, "Foo Bar");
                assert_eq!(year, 2015);
            }
            other => panic!("expected InvalidLabel, got {other}"),
        }
    }

    #[test]
    fn empty_nullable_becomes_null_and_empty_required_is_fatal() {
        let t = table(
            &["First", "Age", "City", "Years", "Tickets"],
            &[&["Jane", "34", "", "3", "4"]],
        );
        let rows = map_table(&TEST_SCHEMA, &t, 2015).unwrap();
        assert_eq!(rows[0].attributes["city"], Value::Null);

        let t = table(
            &["First", "Age", "City", "Years", "Tickets"],
            &[&["", "34", "Auburn", "3", "4"]],
        );
        let err = map_table(&TEST_SCHEMA, &t, 2015).unwrap_err();
        match err {
            ScraperError::MissingValue { field, cell, row, year } => {
                assert_eq!(field, "firstName");
                assert_eq!(cell, 0);
                assert_eq!(row, 0);
                assert_eq!(year, 2015);
            }
            other => panic!("expected MissingValue, got {other}"),
        }
    }

    #[test]
    fn non_numeric_text_in_numeric_field_is_fatal() {
        let t = table(
            &["First", "Age", "City", "Years", "Tickets"],
            &[&["Jane", "unknown", "Auburn", "3", "4"]],
        );
        let err = map_table(&TEST_SCHEMA, &t, 2015).unwrap_err();
        assert!(matches!(err, ScraperError::NumericFormat { .. }));
    }

    #[test]
    fn zero_years_is_derived_from_tickets() {
        let t = table(
            &["First", "Age", "City", "Years", "Tickets"],
            &[&["Jane", "34", "Auburn", "0", "8"]],
        );
        let rows = map_table(&TEST_SCHEMA, &t, 2015).unwrap();
        assert_eq!(rows[0].attributes["years"], 4);
    }

    #[test]
    fn nonzero_years_is_left_alone() {
        let t = table(
            &["First", "Age", "City", "Years", "Tickets"],
            &[&["Jane", "34", "Auburn", "2", "8"]],
        );
        let rows = map_table(&TEST_SCHEMA, &t, 2015).unwrap();
        assert_eq!(rows[0].attributes["years"], 2);
    }
}
