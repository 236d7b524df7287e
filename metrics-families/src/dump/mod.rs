//! Rendering of metric families into exchange formats.
//!
//! Dumping happens in two steps.  A family first captures a [`FamilySnapshot`] under its shared
//! lock: its name, kind, optionally its help text, and one [`ExchangeRecord`] per child in label
//! order.  The snapshot is then rendered with no lock held, in one of three formats:
//!
//! - [`DumpFormat::Protobuf`]: one length-delimited `io.prometheus.client.MetricFamily` message
//!   per family.
//! - [`DumpFormat::Text`]: one `name{label=value,...}: value` line per child.
//! - [`DumpFormat::Json`]: one JSON document per family, one document per line.  JSON cannot
//!   represent NaN or infinities, so a family holding one fails with [`DumpError::Json`].
//!
//! Output is written family by family, and a dump stops at the first family that fails to
//! render.  Anything written before the failure is left in the sink.
use std::io::Write;
use std::sync::Arc;

use crate::common::FamilyName;
use crate::error::DumpError;
use crate::family::Family;
use crate::kind::{MetricKind, Sample};
use crate::label::LabelSet;

mod json;
pub mod protobuf;
mod text;

/// Output format of a dump.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub enum DumpFormat {
    /// Length-delimited Prometheus protobuf messages.
    #[default]
    Protobuf,
    /// Line-oriented text.
    Text,
    /// Newline-delimited JSON documents.
    Json,
}

/// Options controlling a dump.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct DumpOptions {
    pub(crate) include_help: bool,
    pub(crate) format: DumpFormat,
}

impl DumpOptions {
    /// Creates a new [`DumpOptions`] with default values.
    ///
    /// Defaults to protobuf output without help text.
    pub fn new() -> Self {
        DumpOptions::default()
    }

    /// Options for protobuf output.
    pub fn protobuf() -> Self {
        DumpOptions::new().format(DumpFormat::Protobuf)
    }

    /// Options for text output.
    pub fn text() -> Self {
        DumpOptions::new().format(DumpFormat::Text)
    }

    /// Options for JSON output.
    pub fn json() -> Self {
        DumpOptions::new().format(DumpFormat::Json)
    }

    /// Sets whether or not the families' help text is included.
    ///
    /// The text format has nowhere to put it and ignores this.  Defaults to `false`.
    pub fn include_help(mut self, include_help: bool) -> Self {
        self.include_help = include_help;
        self
    }

    /// Sets the output format.
    pub fn format(mut self, format: DumpFormat) -> Self {
        self.format = format;
        self
    }

    /// Whether or not help text is included.
    pub fn includes_help(&self) -> bool {
        self.include_help
    }

    /// The output format.
    pub fn output_format(&self) -> DumpFormat {
        self.format
    }
}

/// One child of a family, as captured for a dump.
#[derive(Clone, Debug, PartialEq)]
pub struct ExchangeRecord {
    /// Canonical labels of the child.
    pub labels: LabelSet,
    /// Value of the child at capture time.
    pub sample: Sample,
}

/// A family, as captured for a dump.
#[derive(Clone, Debug, PartialEq)]
pub struct FamilySnapshot {
    /// Display name of the family.
    pub name: FamilyName,
    /// Kind of the family.
    pub kind: MetricKind,
    /// Help text, when requested.
    pub help: Option<String>,
    /// Children, in label order.
    pub records: Vec<ExchangeRecord>,
}

/// Renders a single family snapshot to `writer`.
pub fn render_family<W>(
    snapshot: &FamilySnapshot,
    writer: &mut W,
    options: &DumpOptions,
) -> Result<(), DumpError>
where
    W: Write + ?Sized,
{
    let buffer = match options.format {
        DumpFormat::Protobuf => protobuf::render(snapshot)?,
        DumpFormat::Text => text::render(snapshot).into_bytes(),
        DumpFormat::Json => json::render(snapshot)?,
    };

    writer.write_all(&buffer)?;
    Ok(())
}

/// Renders families to `writer`, in the given order, stopping at the first error.
pub fn render_families<W>(
    families: &[Arc<dyn Family>],
    writer: &mut W,
    options: &DumpOptions,
) -> Result<(), DumpError>
where
    W: Write + ?Sized,
{
    for family in families {
        render_family(&family.snapshot(options), writer, options)?;
    }

    Ok(())
}
