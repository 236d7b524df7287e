use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::RwLock;

use crate::dump::ExchangeRecord;
use crate::error::UsageError;
use crate::family::MetricFamily;
use crate::kind::{CounterKind, GaugeKind, Kind, Sample, SummaryKind};
use crate::label::LabelSet;

/// A counter instance.
pub type Counter = Metric<CounterKind>;

/// A gauge instance.
pub type Gauge = Metric<GaugeKind>;

/// A summary instance.
pub type Summary = Metric<SummaryKind>;

/// A single label-bound metric.
///
/// Instances are only ever created by applying a [`Partial`][crate::Partial], and are shared as
/// `Arc<Metric<K>>`: applying the same labels again hands back the same allocation.  Each
/// instance guards its value with its own lock, so threads updating different children of one
/// family never contend on the family itself.
pub struct Metric<K: Kind> {
    labels: LabelSet,
    fingerprint: u64,
    value: RwLock<K::Value>,
    options: Arc<K::Options>,
    parent: Weak<MetricFamily<K>>,
}

impl<K: Kind> Metric<K> {
    pub(crate) fn new(
        labels: LabelSet,
        fingerprint: u64,
        options: Arc<K::Options>,
        parent: Weak<MetricFamily<K>>,
    ) -> Self {
        let value = RwLock::new(K::initial(&options));
        Metric { labels, fingerprint, value, options, parent }
    }

    /// Labels of this instance, in canonical order.
    pub fn labels(&self) -> &LabelSet {
        &self.labels
    }

    /// Fingerprint of this instance's labels.
    pub fn fingerprint(&self) -> u64 {
        self.fingerprint
    }

    /// Removes this instance from its family.
    ///
    /// Later dumps no longer include it, and applying the same labels again creates a fresh
    /// instance.  Handles to this instance stay usable but are detached from the family.
    ///
    /// # Panics
    ///
    /// Panics if the instance was already removed, either by an earlier `forget` or by
    /// [`MetricFamily::forget_all`].
    pub fn forget(&self) {
        if let Err(e) = self.try_forget() {
            e.raise();
        }
    }

    /// Removes this instance from its family.
    ///
    /// Returns [`UsageError::InvariantViolation`] if the instance was already removed.
    pub fn try_forget(&self) -> Result<(), UsageError> {
        match self.parent.upgrade() {
            Some(family) => family.forget(self),
            None => {
                tracing::warn!(labels = %self.labels, "forgetting a metric whose family was dropped");
                Ok(())
            }
        }
    }

    /// Restores the neutral state of this instance.
    ///
    /// Counters and gauges return to their family's default value; summaries drop their totals.
    pub fn reset(&self) {
        let mut value = self.value.write();
        K::reset(&mut value, &self.options);
    }

    /// Current value of this instance.
    pub fn current(&self) -> Sample {
        K::sample(&self.value.read())
    }

    /// Projects this instance for dumping.
    pub fn record(&self) -> ExchangeRecord {
        ExchangeRecord { labels: self.labels.clone(), sample: self.current() }
    }

    /// Whether or not this instance sorts before `other` within their family.
    pub fn before(&self, other: &Metric<K>) -> bool {
        self.labels.before(&other.labels)
    }
}

impl Metric<CounterKind> {
    /// Increments the counter by one.
    pub fn increment(&self) {
        *self.value.write() += 1.0;
    }

    /// Increments the counter by the given amount.
    pub fn increment_by(&self, value: f64) {
        *self.value.write() += value;
    }

    /// Decrements the counter by one.
    pub fn decrement(&self) {
        *self.value.write() -= 1.0;
    }

    /// Decrements the counter by the given amount.
    pub fn decrement_by(&self, value: f64) {
        *self.value.write() -= value;
    }

    /// Sets the counter to an absolute value.
    pub fn set(&self, value: f64) {
        *self.value.write() = value;
    }

    /// Current value of the counter.
    pub fn value(&self) -> f64 {
        *self.value.read()
    }
}

impl Metric<GaugeKind> {
    /// Sets the gauge.
    pub fn set(&self, value: f64) {
        *self.value.write() = value;
    }

    /// Increments the gauge by the given amount.
    pub fn increment_by(&self, value: f64) {
        *self.value.write() += value;
    }

    /// Decrements the gauge by the given amount.
    pub fn decrement_by(&self, value: f64) {
        *self.value.write() -= value;
    }

    /// Current value of the gauge.
    pub fn value(&self) -> f64 {
        *self.value.read()
    }
}

impl Metric<SummaryKind> {
    /// Records an observation.
    pub fn sample(&self, value: f64) {
        let mut state = self.value.write();
        state.count += 1;
        state.sum += value;
    }

    /// Number of observations recorded since creation or the last reset.
    pub fn count(&self) -> u64 {
        self.value.read().count
    }

    /// Sum of observations recorded since creation or the last reset.
    pub fn sum(&self) -> f64 {
        self.value.read().sum
    }
}

impl<K: Kind> fmt::Debug for Metric<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Metric")
            .field("kind", &K::KIND)
            .field("labels", &self.labels)
            .field("fingerprint", &self.fingerprint)
            .field("sample", &K::sample(&self.value.read()))
            .finish()
    }
}
