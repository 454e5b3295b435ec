//! Standard resource assembler: wraps mapped rows into the normalized
//! list + included-records document that gets persisted per (year, type).

use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::warn;

use crate::common::error::Result;
use crate::pipeline::schema::{MappedRow, Schema};

/// A stable {type, id} reference to an included record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRef {
    #[serde(rename = "type")]
    pub kind: String,
    pub id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceRecord {
    #[serde(rename = "type")]
    pub kind: String,
    pub id: String,
    pub attributes: Map<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relationships: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListAttributes {
    pub year: i32,
    /// Source URL the document was generated from.
    pub source: String,
    /// Retrieval timestamp.
    pub accessed: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceList {
    #[serde(rename = "type")]
    pub kind: String,
    pub id: String,
    pub attributes: ListAttributes,
    pub relationships: Map<String, Value>,
}

/// The persisted JSON shape: `{ data, included }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub data: ResourceList,
    pub included: Vec<ResourceRecord>,
}

pub fn iso(instant: DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Builds the list document for `records`, under `relationship` in the
/// list's relationships map.
pub fn wrap_records(
    list_type: &str,
    relationship: &str,
    year: i32,
    url: &str,
    records: Vec<ResourceRecord>,
) -> Document {
    let refs: Vec<ResourceRef> = records
        .iter()
        .map(|r| ResourceRef {
            kind: r.kind.clone(),
            id: r.id.clone(),
        })
        .collect();

    let mut relationships = Map::new();
    relationships.insert(relationship.to_string(), json!({ "data": refs }));

    Document {
        data: ResourceList {
            kind: list_type.to_string(),
            id: year.to_string(),
            attributes: ListAttributes {
                year,
                source: url.to_string(),
                accessed: iso(Utc::now()),
            },
            relationships,
        },
        included: records,
    }
}

/// Creates one record per mapped row, id `"<year>:<rowIndex>"`, and wraps
/// them into a list with provenance. Zero rows for a year/type pair not
/// known to be skipped is worth a warning, never a failure.
pub fn assemble(schema: &Schema, year: i32, url: &str, rows: Vec<MappedRow>) -> Document {
    let records: Vec<ResourceRecord> = rows
        .into_iter()
        .map(|row| ResourceRecord {
            kind: schema.record_type.to_string(),
            id: format!("{year}:{}", row.index),
            attributes: row.attributes,
            relationships: row.entrant_ref.map(|id| {
                json!({ "entrant": { "data": { "type": "entrant", "id": id } } })
            }),
        })
        .collect();

    if records.is_empty() {
        warn!("⚠️ no {} records found for year {year}", schema.record_type);
    }

    wrap_records(schema.list_type, schema.relationship, year, url, records)
}

/// Whole-file replacement write; parent directories are created on demand.
pub async fn persist(path: &Path, document: &Document) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let json = serde_json::to_vec_pretty(document)?;
    tokio::fs::write(path, json).await?;
    Ok(())
}
