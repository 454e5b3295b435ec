//! Waitlist: runners drawn past the entrant cap, in draw order.

use crate::common::error::Result;
use crate::pipeline::resource::Document;
use crate::pipeline::schema::{FieldSpec, Schema};
use crate::pipeline::IngestContext;
use crate::sources::process_standard_table;

static SCHEMA: Schema = Schema {
    record_type: "waitlist-entrant",
    list_type: "waitlist",
    relationship: "waitlist-entrants",
    fields: &[
        FieldSpec::new("order", &["Order"]).numeric(),
        FieldSpec::new("status", &["Status"]).nullable(),
        FieldSpec::new("firstName", &["First Name", "First"]),
        FieldSpec::new("lastName", &["Last Name", "Last"]),
        FieldSpec::new("gender", &["Gender"]),
        FieldSpec::new("age", &["Age"]).nullable(),
        FieldSpec::new("city", &["City"]),
        FieldSpec::new("state", &["State"]),
        FieldSpec::new("country", &["Country"]),
        FieldSpec::new("tickets", &["Tickets", "Ticket Count"]).numeric(),
        FieldSpec::new("years", &["Years", "Years In Lottery", "Years in Lottery"]).numeric(),
        FieldSpec::new("bib", &["Bib"]).nullable(),
    ],
    derive_years: true,
};

pub async fn fetch(ctx: &IngestContext, year: i32, force: bool) -> Result<Document> {
    let url = format!("https://www.wser.org/{year}-wait-list/");
    process_standard_table(ctx, year, force, &SCHEMA, "#content table", url, "wait-list.json").await
}
