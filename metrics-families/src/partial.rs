use std::fmt;
use std::sync::Arc;

use crate::error::UsageError;
use crate::family::MetricFamily;
use crate::kind::{CounterKind, GaugeKind, Kind, SummaryKind};
use crate::label::LabelSet;
use crate::metric::Metric;

/// A partially labeled counter.
pub type CounterPartial = Partial<CounterKind>;

/// A partially labeled gauge.
pub type GaugePartial = Partial<GaugeKind>;

/// A partially labeled summary.
pub type SummaryPartial = Partial<SummaryKind>;

/// A child of a family that has not been committed yet.
///
/// Obtained from [`MetricFamily::new_child`].  Labels accumulate in whatever order they are given
/// and are only put into canonical order when the partial is applied.  Cloning a partial gives an
/// independent builder with the same labels and family, which is handy for deriving several
/// children that share a common set of labels:
///
/// ```rust
/// # use metrics_families::{CounterFamily, CounterOptions, Registry};
/// let registry = Registry::new();
/// let requests = CounterFamily::new_in(
///     &registry,
///     CounterOptions::new("requests", "Requests served.").dimensions(["method", "path"]),
/// );
///
/// let index = requests.new_child(&["path", "/"]);
/// let get = index.clone().with(&["method", "GET"]).apply();
/// let post = index.clone().with(&["method", "POST"]).apply();
///
/// get.increment();
/// post.increment_by(2.0);
/// assert_eq!(requests.len(), 2);
/// ```
pub struct Partial<K: Kind> {
    labels: LabelSet,
    parent: Arc<MetricFamily<K>>,
}

impl<K: Kind> Partial<K> {
    pub(crate) fn new(parent: Arc<MetricFamily<K>>, labels: LabelSet) -> Self {
        Partial { labels, parent }
    }

    /// Adds alternating label names and values.
    ///
    /// # Panics
    ///
    /// Panics if an odd number of strings is given.
    pub fn with<S: AsRef<str>>(mut self, labels: &[S]) -> Self {
        if let Err(e) = self.labels.append_pairs(labels) {
            e.raise();
        }
        self
    }

    /// Adds alternating label names and values.
    ///
    /// Returns [`UsageError::Argument`] if an odd number of strings is given, in which case none of
    /// them are added.
    pub fn try_with<S: AsRef<str>>(&mut self, labels: &[S]) -> Result<&mut Self, UsageError> {
        self.labels.append_pairs(labels)?;
        Ok(self)
    }

    /// Adds a single label.
    pub fn with_label<N, V>(mut self, name: N, value: V) -> Self
    where
        N: Into<String>,
        V: Into<String>,
    {
        self.labels.append(name, value);
        self
    }

    /// Labels accumulated so far.
    pub fn labels(&self) -> &LabelSet {
        &self.labels
    }

    /// Family this partial belongs to.
    pub fn family(&self) -> &Arc<MetricFamily<K>> {
        &self.parent
    }

    /// Commits the partial, returning the family's child for these labels.
    ///
    /// If the family already has a child with the same labels, in any order, that child is
    /// returned.  Otherwise the labels are checked against the family's dimensions and a new child
    /// is created.
    ///
    /// # Panics
    ///
    /// Panics if a new child would have to be created and the labels do not carry exactly one
    /// value for each declared dimension.
    pub fn apply(&mut self) -> Arc<Metric<K>> {
        self.try_apply().unwrap_or_else(|e| e.raise())
    }

    /// Commits the partial, returning the family's child for these labels.
    ///
    /// Returns [`UsageError::Validation`] if a new child would have to be created and the labels
    /// do not match the family's dimensions.  The family is left untouched in that case.
    pub fn try_apply(&mut self) -> Result<Arc<Metric<K>>, UsageError> {
        self.labels.canonicalize();
        let fingerprint = self.labels.fingerprint();
        self.parent.get_or_create(&self.labels, fingerprint)
    }
}

impl<K: Kind> Clone for Partial<K> {
    fn clone(&self) -> Self {
        Partial { labels: self.labels.clone(), parent: Arc::clone(&self.parent) }
    }
}

impl<K: Kind> fmt::Debug for Partial<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Partial")
            .field("family", self.parent.family_name())
            .field("labels", &self.labels)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Barrier};
    use std::thread;

    use crate::error::UsageError;
    use crate::family::CounterFamily;
    use crate::options::CounterOptions;
    use crate::registry::Registry;

    fn family(registry: &Registry, dimensions: &[&str]) -> Arc<CounterFamily> {
        CounterFamily::new_in(
            registry,
            CounterOptions::new("requests", "Requests served.")
                .dimensions(dimensions.iter().copied()),
        )
    }

    #[test]
    fn test_apply_returns_same_instance_regardless_of_order() {
        let registry = Registry::new();
        let requests = family(&registry, &["method", "path"]);

        let a = requests.new_child(&["method", "GET", "path", "/"]).apply();
        let b = requests.new_child(&["path", "/", "method", "GET"]).apply();
        let c = requests.new_child(&["path", "/"]).with(&["method", "GET"]).apply();

        assert!(Arc::ptr_eq(&a, &b));
        assert!(Arc::ptr_eq(&a, &c));
        assert_eq!(requests.len(), 1);
    }

    #[test]
    fn test_clone_is_independent() {
        let registry = Registry::new();
        let requests = family(&registry, &["method", "path"]);

        let base = requests.new_child(&["path", "/"]);
        let mut get = base.clone().with_label("method", "GET");
        let mut post = base.clone().with_label("method", "POST");

        assert_eq!(base.labels().len(), 1);
        assert!(!Arc::ptr_eq(&get.apply(), &post.apply()));
        assert_eq!(requests.len(), 2);
    }

    #[test]
    fn test_odd_labels() {
        let registry = Registry::new();
        let requests = family(&registry, &["method"]);

        let err = requests.try_new_child(&["method"]).unwrap_err();
        assert!(matches!(err, UsageError::Argument { count: 1, .. }));

        let mut partial = requests.new_child::<&str>(&[]);
        assert!(partial.try_with(&["method", "GET", "extra"]).is_err());
        assert!(partial.labels().is_empty());
    }

    #[test]
    #[should_panic(expected = "illegal labels")]
    fn test_odd_labels_panic() {
        let registry = Registry::new();
        let requests = family(&registry, &["method"]);
        let _ = requests.new_child(&["method", "GET"]).with(&["path"]);
    }

    #[test]
    fn test_dimension_mismatch() {
        let registry = Registry::new();
        let pairs = family(&registry, &["a", "b"]);

        // Missing dimension.
        let err = pairs.new_child(&["a", "x"]).try_apply().unwrap_err();
        assert!(matches!(err, UsageError::Validation { .. }));

        // Undeclared dimension.
        let err = pairs.new_child(&["a", "x", "c", "y"]).try_apply().unwrap_err();
        assert!(matches!(err, UsageError::Validation { .. }));

        // Repeated dimension.
        let err = pairs.new_child(&["a", "x", "a", "y"]).try_apply().unwrap_err();
        assert!(matches!(err, UsageError::Validation { .. }));

        // Too many.
        let err = pairs.new_child(&["a", "x", "b", "y", "b", "z"]).try_apply().unwrap_err();
        assert!(matches!(err, UsageError::Validation { .. }));

        assert_eq!(pairs.len(), 0);
    }

    #[test]
    #[should_panic(expected = "illegal labels for a_b")]
    fn test_dimension_mismatch_panics() {
        let registry = Registry::new();
        let pairs = CounterFamily::new_in(
            &registry,
            CounterOptions::new("a_b", "Pairs.").dimensions(["a", "b"]),
        );
        pairs.new_child(&["a", "x"]).apply();
    }

    #[test]
    fn test_apply_is_repeatable() {
        let registry = Registry::new();
        let requests = family(&registry, &["method"]);

        let mut partial = requests.new_child(&["method", "GET"]);
        let first = partial.apply();
        let second = partial.apply();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_concurrent_apply_creates_exactly_one_instance() {
        const THREADS: usize = 16;

        let registry = Registry::new();
        let requests = family(&registry, &["method", "path"]);
        let barrier = Arc::new(Barrier::new(THREADS));

        let handles: Vec<_> = (0..THREADS)
            .map(|i| {
                let requests = Arc::clone(&requests);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    let mut partial = if i % 2 == 0 {
                        requests.new_child(&["method", "GET", "path", "/"])
                    } else {
                        requests.new_child(&["path", "/", "method", "GET"])
                    };
                    barrier.wait();
                    let counter = partial.apply();
                    counter.increment();
                    counter
                })
            })
            .collect();

        let counters: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        for counter in &counters[1..] {
            assert!(Arc::ptr_eq(&counters[0], counter));
        }
        assert_eq!(requests.len(), 1);
        assert_eq!(counters[0].value(), THREADS as f64);
    }
}
