//! Labeled metric families for in-process instrumentation.
//!
//! This crate provides the bookkeeping behind a pull-style metrics exposition: named families of
//! counters, gauges and summaries, each child of a family being identified by a set of labels.
//!
//! # Families and children
//!
//! A [`MetricFamily`] is declared once, with a name, a help text and the label names (its
//! *dimensions*) every child must carry.  Declaring it registers it in a [`Registry`], which
//! refuses a second family with the same name.
//!
//! Children are obtained through a [`Partial`]: a builder that accumulates labels in any order and,
//! when applied, returns the family's one and only child for that set of labels, creating it on
//! first use.  Labels are put into canonical order before lookup, so `method=GET,path=/` and
//! `path=/,method=GET` always resolve to the same child, even when applied concurrently.
//!
//! ```rust
//! use metrics_families::{CounterFamily, CounterOptions, DumpOptions, Registry};
//!
//! let registry = Registry::new();
//! let requests = CounterFamily::new_in(
//!     &registry,
//!     CounterOptions::new("requests", "Requests served.")
//!         .namespace("api")
//!         .dimensions(["method"]),
//! );
//!
//! requests.new_child(&["method", "GET"]).apply().increment_by(5.0);
//!
//! let mut output = Vec::new();
//! registry.dump(&mut output, &DumpOptions::text()).unwrap();
//! assert_eq!(String::from_utf8(output).unwrap(), "api_requests{method=GET}: 5.000000\n");
//! ```
//!
//! # Dumping
//!
//! A registry, or a single family, can be rendered into any [`Write`](std::io::Write) sink in
//! one of the formats of [`DumpFormat`].  Families are written in name order and their children
//! in label order, so two dumps of the same state are byte-for-byte identical.
//!
//! # Errors
//!
//! Misuse of the API, such as an odd number of label strings, labels that do not match a
//! family's dimensions, or a duplicate family name, is a programming error: the plain methods
//! panic with a [`UsageError`] message.  Each of them has a `try_` counterpart that returns the
//! error instead.  Failures of the dump sink are ordinary runtime errors and are returned as
//! [`DumpError`].
#![deny(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg), deny(broken_intra_doc_links))]

mod common;
pub use common::FamilyName;

pub mod dump;
pub use dump::{DumpFormat, DumpOptions, ExchangeRecord, FamilySnapshot};

mod error;
pub use error::{DumpError, UsageError};

mod family;
pub use family::{CounterFamily, Family, GaugeFamily, MetricFamily, SummaryFamily};

mod kind;
pub use kind::{
    CounterKind, GaugeKind, Kind, MetricKind, Sample, SummaryKind, SummaryState, ValueOptions,
};

mod label;
pub use label::{Label, LabelSet};

mod metric;
pub use metric::{Counter, Gauge, Metric, Summary};

mod options;
pub use options::{CounterOptions, GaugeOptions, Options, SummaryOptions};

mod partial;
pub use partial::{CounterPartial, GaugePartial, Partial, SummaryPartial};

mod registry;
pub use registry::Registry;
