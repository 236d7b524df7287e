use std::fmt::Write;

use super::FamilySnapshot;
use crate::kind::Sample;
use crate::label::LabelSet;

/// Renders a family as one `name{labels}: value` line per child.
///
/// Summaries have no single value and render a `_count` and a `_sum` line per child instead.
pub(super) fn render(snapshot: &FamilySnapshot) -> String {
    let mut buffer = String::new();

    for record in &snapshot.records {
        match record.sample {
            Sample::Counter(value) | Sample::Gauge(value) => {
                write_line(&mut buffer, snapshot.name.as_str(), None, &record.labels, value);
            }
            Sample::Summary { count, sum } => {
                #[allow(clippy::cast_precision_loss)]
                let count = count as f64;
                write_line(&mut buffer, snapshot.name.as_str(), Some("count"), &record.labels, count);
                write_line(&mut buffer, snapshot.name.as_str(), Some("sum"), &record.labels, sum);
            }
        }
    }

    buffer
}

fn write_line(
    buffer: &mut String,
    name: &str,
    suffix: Option<&'static str>,
    labels: &LabelSet,
    value: f64,
) {
    buffer.push_str(name);
    if let Some(suffix) = suffix {
        buffer.push('_');
        buffer.push_str(suffix);
    }

    // Writing into a `String` cannot fail.
    let _ = writeln!(buffer, "{{{}}}: {:.6}", labels, value);
}
