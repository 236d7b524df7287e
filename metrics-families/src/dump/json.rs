use serde::{ser::Error as _, Serialize, Serializer};

use super::FamilySnapshot;
use crate::error::DumpError;
use crate::kind::Sample;

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct FamilyDocument<'a> {
    name: &'a str,
    #[serde(rename = "Type")]
    kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    help: Option<&'a str>,
    children: Vec<ChildDocument<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct ChildDocument<'a> {
    labels: Vec<LabelDocument<'a>>,
    #[serde(skip_serializing_if = "Option::is_none", serialize_with = "finite")]
    value: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none", serialize_with = "finite")]
    sum: Option<f64>,
}

/// JSON has no representation for NaN or infinities, so they fail the document.
fn finite<S: Serializer>(value: &Option<f64>, serializer: S) -> Result<S::Ok, S::Error> {
    match value {
        Some(v) if !v.is_finite() => {
            Err(S::Error::custom(format!("{} cannot be represented in JSON", v)))
        }
        _ => value.serialize(serializer),
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct LabelDocument<'a> {
    name: &'a str,
    value: &'a str,
}

/// Renders a family as a single JSON document followed by a newline.
pub(super) fn render(snapshot: &FamilySnapshot) -> Result<Vec<u8>, DumpError> {
    let children = snapshot
        .records
        .iter()
        .map(|record| {
            let labels = record
                .labels
                .iter()
                .map(|label| LabelDocument { name: label.name(), value: label.value() })
                .collect();

            let (value, count, sum) = match record.sample {
                Sample::Counter(value) | Sample::Gauge(value) => (Some(value), None, None),
                Sample::Summary { count, sum } => (None, Some(count), Some(sum)),
            };

            ChildDocument { labels, value, count, sum }
        })
        .collect();

    let document = FamilyDocument {
        name: snapshot.name.as_str(),
        kind: snapshot.kind.as_str(),
        help: snapshot.help.as_deref(),
        children,
    };

    let mut output = serde_json::to_vec(&document)?;
    output.push(b'\n');
    Ok(output)
}
