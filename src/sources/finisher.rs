//! Finisher results: one page per year back to 1974.

use crate::common::error::Result;
use crate::pipeline::resource::Document;
use crate::pipeline::schema::{FieldSpec, Schema};
use crate::pipeline::IngestContext;
use crate::sources::process_standard_table;

/// Early years drop place/age for some rows and publish no bib at all, so
/// most non-name fields are nullable.
static SCHEMA: Schema = Schema {
    record_type: "finisher",
    list_type: "finishers-list",
    relationship: "finishers",
    fields: &[
        FieldSpec::new("place", &["Place"]).numeric().nullable(),
        FieldSpec::new("time", &["Time"]),
        FieldSpec::new("bib", &["Bib"]).nullable(),
        FieldSpec::new("firstName", &["First", "First Name"]),
        FieldSpec::new("lastName", &["Last", "Last Name"]),
        FieldSpec::new("gender", &["Gender"]),
        FieldSpec::new("age", &["Age"]).numeric().nullable(),
        FieldSpec::new("city", &["City"]).nullable(),
        FieldSpec::new("stateOrCountry", &["State/Country", "State or Country", "State"]).nullable(),
    ],
    derive_years: false,
};

pub async fn fetch(ctx: &IngestContext, year: i32, force: bool) -> Result<Document> {
    let url = format!("https://www.wser.org/results/{year}-results/");
    process_standard_table(ctx, year, force, &SCHEMA, "#content table", url, "finishers.json").await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::normalize_table;

    #[test]
    fn maps_a_results_row() {
        let html = "<div id=\"content\"><table>\
            <thead><tr><th>Place</th><th>Time</th><th>First</th><th>Last</th>\
            <th>Gender</th><th>Age</th><th>City</th><th>State</th></tr></thead>\
            <tbody><tr><td>1</td><td>14:54:09</td><td>Timothy</td><td>Olson</td>\
            <td>M</td><td>28</td><td>Ashland</td><td>OR</td></tr></tbody>\
            </table></div>";
        let doc = normalize_table(
            &SCHEMA,
            html,
            "#content table",
            "https://www.wser.org/results/2012-results/",
            2012,
        )
        .unwrap();
        assert_eq!(doc.included.len(), 1);
        let record = &doc.included[0];
        assert_eq!(record.id, "2012:0");
        assert_eq!(record.attributes["place"], 1);
        assert_eq!(record.attributes["time"], "14:54:09");
        assert_eq!(record.attributes["stateOrCountry"], "OR");
    }
}
