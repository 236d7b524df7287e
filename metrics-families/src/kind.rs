use std::fmt::Debug;

use crate::error::UsageError;

/// Metric kind.
///
/// Defines the kind, or type, of a metric family:
/// - counters
/// - gauges
/// - summaries
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, PartialOrd, Ord)]
pub enum MetricKind {
    /// Counter type.
    Counter,
    /// Gauge type.
    Gauge,
    /// Summary type.
    Summary,
}

impl MetricKind {
    /// Lowercase name of the kind, as used in structured dumps.
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Counter => "counter",
            MetricKind::Gauge => "gauge",
            MetricKind::Summary => "summary",
        }
    }
}

/// A point-in-time value of a single metric instance.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Sample {
    /// Counter value.
    Counter(f64),
    /// Gauge value.
    Gauge(f64),
    /// Summary observations.
    Summary {
        /// Number of samples observed.
        count: u64,
        /// Sum of all samples observed.
        sum: f64,
    },
}

/// Value policy of a metric kind.
///
/// Everything that differs between counters, gauges and summaries lives behind this trait: the
/// kind-specific declaration options, the numeric state of an instance, what that state starts
/// out as and resets to, and how it is projected for dumping.  Families, partials and instances
/// are otherwise shared by all kinds.
pub trait Kind: Send + Sync + 'static {
    /// Kind-specific declaration options.
    type Options: Clone + Debug + Default + Send + Sync;

    /// Numeric state of one instance.
    type Value: Send + Sync;

    /// The kind tag.
    const KIND: MetricKind;

    /// Checks the kind-specific options.
    fn validate(_options: &Self::Options) -> Result<(), UsageError> {
        Ok(())
    }

    /// State of a freshly created instance.
    fn initial(options: &Self::Options) -> Self::Value;

    /// Restores an instance's neutral state.
    fn reset(value: &mut Self::Value, options: &Self::Options);

    /// Projects the state for dumping.
    fn sample(value: &Self::Value) -> Sample;
}

/// Options shared by counters and gauges.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ValueOptions {
    /// Value every child starts at and returns to when reset.
    pub default_value: f64,
}

fn validate_default_value(options: &ValueOptions) -> Result<(), UsageError> {
    if options.default_value.is_nan() {
        return Err(UsageError::Configuration("DefaultValue must not be NaN".to_owned()));
    }
    Ok(())
}

/// Counters: a value that is incremented, decremented or set.
#[derive(Debug)]
pub enum CounterKind {}

impl Kind for CounterKind {
    type Options = ValueOptions;
    type Value = f64;

    const KIND: MetricKind = MetricKind::Counter;

    fn validate(options: &ValueOptions) -> Result<(), UsageError> {
        validate_default_value(options)
    }

    fn initial(options: &ValueOptions) -> f64 {
        options.default_value
    }

    fn reset(value: &mut f64, options: &ValueOptions) {
        *value = options.default_value;
    }

    fn sample(value: &f64) -> Sample {
        Sample::Counter(*value)
    }
}

/// Gauges: a value that is set to whatever was last measured.
#[derive(Debug)]
pub enum GaugeKind {}

impl Kind for GaugeKind {
    type Options = ValueOptions;
    type Value = f64;

    const KIND: MetricKind = MetricKind::Gauge;

    fn validate(options: &ValueOptions) -> Result<(), UsageError> {
        validate_default_value(options)
    }

    fn initial(options: &ValueOptions) -> f64 {
        options.default_value
    }

    fn reset(value: &mut f64, options: &ValueOptions) {
        *value = options.default_value;
    }

    fn sample(value: &f64) -> Sample {
        Sample::Gauge(*value)
    }
}

/// Running totals of a summary instance.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SummaryState {
    /// Number of samples observed.
    pub count: u64,
    /// Sum of all samples observed.
    pub sum: f64,
}

/// Summaries: a stream of observations, reported as a count and a sum.
///
/// Quantiles are not estimated.
#[derive(Debug)]
pub enum SummaryKind {}

impl Kind for SummaryKind {
    type Options = ();
    type Value = SummaryState;

    const KIND: MetricKind = MetricKind::Summary;

    fn initial(_: &()) -> SummaryState {
        SummaryState::default()
    }

    fn reset(value: &mut SummaryState, _: &()) {
        *value = SummaryState::default();
    }

    fn sample(value: &SummaryState) -> Sample {
        Sample::Summary { count: value.count, sum: value.sum }
    }
}
