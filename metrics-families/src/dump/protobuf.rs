//! Prometheus protobuf exposition.
//!
//! Each family is written as one `io.prometheus.client.MetricFamily` message, prefixed with its
//! varint length.  The message types in [`proto`] can be used to decode a dump.

use prost::Message;

use super::FamilySnapshot;
use crate::error::DumpError;
use crate::kind::{MetricKind, Sample};
use crate::label::LabelSet;

/// Message types of the `io.prometheus.client` package used by dumps.
///
/// .proto:
/// ```protobuf
/// message LabelPair {
///   optional string name  = 1;
///   optional string value = 2;
/// }
///
/// message Gauge   { optional double value = 1; }
/// message Counter { optional double value = 1; }
///
/// message Quantile {
///   optional double quantile = 1;
///   optional double value    = 2;
/// }
///
/// message Summary {
///   optional uint64   sample_count = 1;
///   optional double   sample_sum   = 2;
///   repeated Quantile quantile     = 3;
/// }
///
/// message Metric {
///   repeated LabelPair label        = 1;
///   optional Gauge     gauge        = 2;
///   optional Counter   counter      = 3;
///   optional Summary   summary      = 4;
///   optional int64     timestamp_ms = 6;
/// }
///
/// message MetricFamily {
///   optional string     name   = 1;
///   optional string     help   = 2;
///   optional MetricType type   = 3;
///   repeated Metric     metric = 4;
/// }
/// ```
pub mod proto {
    #![allow(missing_docs)]

    #[derive(prost::Message, Clone, PartialEq)]
    pub struct LabelPair {
        #[prost(string, optional, tag = "1")]
        pub name: Option<String>,
        #[prost(string, optional, tag = "2")]
        pub value: Option<String>,
    }

    #[derive(prost::Message, Clone, PartialEq)]
    pub struct Gauge {
        #[prost(double, optional, tag = "1")]
        pub value: Option<f64>,
    }

    #[derive(prost::Message, Clone, PartialEq)]
    pub struct Counter {
        #[prost(double, optional, tag = "1")]
        pub value: Option<f64>,
    }

    #[derive(prost::Message, Clone, PartialEq)]
    pub struct Quantile {
        #[prost(double, optional, tag = "1")]
        pub quantile: Option<f64>,
        #[prost(double, optional, tag = "2")]
        pub value: Option<f64>,
    }

    #[derive(prost::Message, Clone, PartialEq)]
    pub struct Summary {
        #[prost(uint64, optional, tag = "1")]
        pub sample_count: Option<u64>,
        #[prost(double, optional, tag = "2")]
        pub sample_sum: Option<f64>,
        #[prost(message, repeated, tag = "3")]
        pub quantile: Vec<Quantile>,
    }

    #[derive(prost::Message, Clone, PartialEq)]
    pub struct Metric {
        #[prost(message, repeated, tag = "1")]
        pub label: Vec<LabelPair>,
        #[prost(message, optional, tag = "2")]
        pub gauge: Option<Gauge>,
        #[prost(message, optional, tag = "3")]
        pub counter: Option<Counter>,
        #[prost(message, optional, tag = "4")]
        pub summary: Option<Summary>,
        #[prost(int64, optional, tag = "6")]
        pub timestamp_ms: Option<i64>,
    }

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
    #[repr(i32)]
    pub enum MetricType {
        Counter = 0,
        Gauge = 1,
        Summary = 2,
        Untyped = 3,
        Histogram = 4,
    }

    #[derive(prost::Message, Clone, PartialEq)]
    pub struct MetricFamily {
        #[prost(string, optional, tag = "1")]
        pub name: Option<String>,
        #[prost(string, optional, tag = "2")]
        pub help: Option<String>,
        #[prost(enumeration = "MetricType", optional, tag = "3")]
        pub r#type: Option<i32>,
        #[prost(message, repeated, tag = "4")]
        pub metric: Vec<Metric>,
    }
}

/// Renders a family as a single length-delimited `MetricFamily` message.
pub(super) fn render(snapshot: &FamilySnapshot) -> Result<Vec<u8>, DumpError> {
    let metric = snapshot
        .records
        .iter()
        .map(|record| {
            let label = label_set_to_protobuf(&record.labels);
            match record.sample {
                Sample::Counter(value) => proto::Metric {
                    label,
                    counter: Some(proto::Counter { value: Some(value) }),
                    ..Default::default()
                },
                Sample::Gauge(value) => proto::Metric {
                    label,
                    gauge: Some(proto::Gauge { value: Some(value) }),
                    ..Default::default()
                },
                Sample::Summary { count, sum } => proto::Metric {
                    label,
                    summary: Some(proto::Summary {
                        sample_count: Some(count),
                        sample_sum: Some(sum),
                        quantile: Vec::new(),
                    }),
                    ..Default::default()
                },
            }
        })
        .collect();

    let family = proto::MetricFamily {
        name: Some(snapshot.name.to_string()),
        help: snapshot.help.clone(),
        r#type: Some(metric_type(snapshot.kind) as i32),
        metric,
    };

    let mut output = Vec::with_capacity(family.encoded_len() + 10);
    family.encode_length_delimited(&mut output)?;
    Ok(output)
}

fn metric_type(kind: MetricKind) -> proto::MetricType {
    match kind {
        MetricKind::Counter => proto::MetricType::Counter,
        MetricKind::Gauge => proto::MetricType::Gauge,
        MetricKind::Summary => proto::MetricType::Summary,
    }
}

fn label_set_to_protobuf(labels: &LabelSet) -> Vec<proto::LabelPair> {
    labels
        .iter()
        .map(|label| proto::LabelPair {
            name: Some(label.name().to_owned()),
            value: Some(label.value().to_owned()),
        })
        .collect()
}
