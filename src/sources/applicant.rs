//! Lottery applicants: everyone who entered a given year's lottery.
//!
//! The applicant table's ID column references the entrant the applicant
//! became if their name was drawn; it maps to a relationship rather than
//! an attribute.

use crate::common::error::Result;
use crate::pipeline::resource::Document;
use crate::pipeline::schema::{FieldSpec, Schema};
use crate::pipeline::IngestContext;
use crate::sources::process_standard_table;

static SCHEMA: Schema = Schema {
    record_type: "lottery-applicant",
    list_type: "lottery",
    relationship: "applicants",
    fields: &[
        FieldSpec::new("id", &["ID"]).entrant_ref(),
        FieldSpec::new("firstName", &["First Name"]),
        FieldSpec::new("lastName", &["Last Name"]),
        FieldSpec::new("gender", &["Gender"]),
        FieldSpec::new("age", &["Age"]),
        FieldSpec::new("state", &["State"]).nullable(),
        FieldSpec::new("country", &["Country"]).nullable(),
        FieldSpec::new("qualifier", &["Qualifier"]),
        FieldSpec::new("years", &["Years"]).numeric(),
        FieldSpec::new("tickets", &["Tickets"]).numeric(),
    ],
    derive_years: true,
};

pub async fn fetch(ctx: &IngestContext, year: i32, force: bool) -> Result<Document> {
    let url = format!("https://www.wser.org/lottery{year}.html");
    process_standard_table(
        ctx,
        year,
        force,
        &SCHEMA,
        "table#entrantTable",
        url,
        "applicants.json",
    )
    .await
}
