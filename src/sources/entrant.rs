//! Entrants list: the runners admitted to a given year's race.

use crate::common::error::Result;
use crate::pipeline::resource::Document;
use crate::pipeline::schema::{FieldSpec, Schema};
use crate::pipeline::IngestContext;
use crate::sources::process_standard_table;

static SCHEMA: Schema = Schema {
    record_type: "entrant",
    list_type: "entrants-list",
    relationship: "entrants",
    fields: &[
        FieldSpec::new("firstName", &["First Name"]),
        FieldSpec::new("lastName", &["Last Name"]),
        FieldSpec::new("gender", &["gender", "Gender"]),
        FieldSpec::new("awards", &["Awards"]).nullable(),
        FieldSpec::new("age", &["Age"]).numeric(),
        FieldSpec::new("city", &["City"]).nullable(),
        FieldSpec::new("state", &["State"]).nullable(),
        FieldSpec::new("country", &["Country"]),
        FieldSpec::new("bib", &["bib", "Bib"]),
        FieldSpec::new("entryType", &["Entry Type"]).nullable(),
        FieldSpec::new("priorFinishes", &["WS Finishes"]).numeric().nullable(),
        FieldSpec::new("rollover", &["Rollover"]).nullable(),
    ],
    derive_years: false,
};

pub async fn fetch(ctx: &IngestContext, year: i32, force: bool) -> Result<Document> {
    let url = format!("https://www.wser.org/{year}-entrants-list/");
    process_standard_table(ctx, year, force, &SCHEMA, "#content table", url, "entrants.json").await
}
