use std::fmt;
use std::io::Write;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::common::{FamilyName, FingerprintMap};
use crate::dump::{self, DumpOptions, FamilySnapshot};
use crate::error::{DumpError, UsageError};
use crate::kind::{CounterKind, GaugeKind, Kind, MetricKind, SummaryKind};
use crate::label::LabelSet;
use crate::metric::Metric;
use crate::options::Options;
use crate::partial::Partial;
use crate::registry::Registry;

/// A family of counters.
pub type CounterFamily = MetricFamily<CounterKind>;

/// A family of gauges.
pub type GaugeFamily = MetricFamily<GaugeKind>;

/// A family of summaries.
pub type SummaryFamily = MetricFamily<SummaryKind>;

/// Kind-independent view of a metric family.
///
/// This is what a [`Registry`] holds on to and dumps.
pub trait Family: Send + Sync {
    /// Display name of the family.
    fn family_name(&self) -> &FamilyName;

    /// Identity of the family within a registry: the fingerprint of its name.
    fn fingerprint(&self) -> u64;

    /// Kind of metric held by the family.
    fn kind(&self) -> MetricKind;

    /// Documentation of the family.
    fn help(&self) -> &str;

    /// Number of live children.
    fn len(&self) -> usize;

    /// Whether or not the family has no live children.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Restores every child's neutral state.
    fn reset_all(&self);

    /// Removes every child.
    fn forget_all(&self);

    /// Whether or not the family should be part of a dump.
    fn should_dump(&self, options: &DumpOptions) -> bool;

    /// Captures the family's children, in order, for rendering.
    fn snapshot(&self, options: &DumpOptions) -> FamilySnapshot;

    /// Renders the family to `writer` in the format selected by `options`.
    fn dump(&self, writer: &mut dyn Write, options: &DumpOptions) -> Result<(), DumpError> {
        dump::render_family(&self.snapshot(options), writer, options)
    }
}

struct Children<K: Kind> {
    sorted: Vec<Arc<Metric<K>>>,
    index: FingerprintMap<usize>,
}

impl<K: Kind> Children<K> {
    fn get(&self, fingerprint: u64) -> Option<&Arc<Metric<K>>> {
        self.index.get(&fingerprint).map(|&i| &self.sorted[i])
    }

    fn insert(&mut self, metric: Arc<Metric<K>>) {
        let position = self.sorted.partition_point(|m| m.before(&metric));
        self.sorted.insert(position, metric);
        self.renumber_from(position);
    }

    fn remove(&mut self, metric: &Metric<K>) -> Option<Arc<Metric<K>>> {
        let position = *self.index.get(&metric.fingerprint())?;
        // A stale handle must not take out a newer child with the same labels.
        if !std::ptr::eq(Arc::as_ptr(&self.sorted[position]), metric) {
            return None;
        }

        self.index.remove(&metric.fingerprint());
        let removed = self.sorted.remove(position);
        self.renumber_from(position);
        Some(removed)
    }

    fn renumber_from(&mut self, position: usize) {
        for (i, metric) in self.sorted.iter().enumerate().skip(position) {
            self.index.insert(metric.fingerprint(), i);
        }
    }

    fn clear(&mut self) {
        self.sorted.clear();
        self.index.clear();
    }
}

/// A named group of metrics sharing a set of label dimensions.
///
/// Children are kept sorted by their labels and indexed by their fingerprint, so looking up a
/// child that already exists costs a hash lookup under a shared lock, and dumps always see
/// children in the same order.
///
/// Families are created once, registered into a [`Registry`] at construction, and live as long as
/// that registry does.
pub struct MetricFamily<K: Kind> {
    name: FamilyName,
    fingerprint: u64,
    help: String,
    dimensions: Vec<String>,
    options: Arc<K::Options>,
    children: RwLock<Children<K>>,
}

impl<K: Kind> MetricFamily<K> {
    /// Creates a family and registers it into the process-wide registry.
    ///
    /// # Panics
    ///
    /// Panics if the options are invalid, or if a family with the same name is already registered.
    pub fn new(options: Options<K>) -> Arc<Self> {
        Self::new_in(Registry::default_registry(), options)
    }

    /// Creates a family and registers it into `registry`.
    ///
    /// # Panics
    ///
    /// Panics if the options are invalid, or if a family with the same name is already registered.
    pub fn new_in(registry: &Registry, options: Options<K>) -> Arc<Self> {
        Self::try_new_in(registry, options).unwrap_or_else(|e| e.raise())
    }

    /// Creates a family and registers it into `registry`.
    ///
    /// Returns [`UsageError::Configuration`] if the options are invalid, and
    /// [`UsageError::InvariantViolation`] if a family with the same name is already registered.
    /// Nothing is registered in either case.
    pub fn try_new_in(registry: &Registry, options: Options<K>) -> Result<Arc<Self>, UsageError> {
        options.validate()?;

        let name = options.family_name();
        let family = Arc::new(MetricFamily {
            fingerprint: name.fingerprint(),
            name,
            help: options.help,
            dimensions: options.dimensions,
            options: Arc::new(options.kind),
            children: RwLock::new(Children {
                sorted: Vec::new(),
                index: FingerprintMap::default(),
            }),
        });

        registry.try_register(family.clone())?;

        Ok(family)
    }

    /// Starts building a child with the given alternating label names and values.
    ///
    /// More labels can be added to the returned [`Partial`] before it is applied.
    ///
    /// # Panics
    ///
    /// Panics if an odd number of strings is given.
    pub fn new_child<S: AsRef<str>>(self: &Arc<Self>, labels: &[S]) -> Partial<K> {
        self.try_new_child(labels).unwrap_or_else(|e| e.raise())
    }

    /// Starts building a child with the given alternating label names and values.
    ///
    /// Returns [`UsageError::Argument`] if an odd number of strings is given.
    pub fn try_new_child<S: AsRef<str>>(
        self: &Arc<Self>,
        labels: &[S],
    ) -> Result<Partial<K>, UsageError> {
        let labels = LabelSet::from_pairs(labels)?;
        Ok(Partial::new(Arc::clone(self), labels))
    }

    /// Looks up a child by the fingerprint of its canonical labels.
    pub fn find(&self, fingerprint: u64) -> Option<Arc<Metric<K>>> {
        self.children.read().get(fingerprint).cloned()
    }

    /// Returns the child for `labels`, creating it if it does not exist yet.
    ///
    /// `labels` must already be canonical and `fingerprint` computed from them.  Existing children
    /// are returned without checking the labels against the declared dimensions; new ones are
    /// validated first.  Racing callers with the same labels all get the same child.
    pub(crate) fn get_or_create(
        self: &Arc<Self>,
        labels: &LabelSet,
        fingerprint: u64,
    ) -> Result<Arc<Metric<K>>, UsageError> {
        // Try and get the child if it exists.
        if let Some(metric) = self.find(fingerprint) {
            tracing::trace!(family = %self.name, labels = %labels, "found existing metric");
            return Ok(metric);
        }

        self.validate(labels)?;

        // Switch to the write guard and check again before inserting.
        let mut children = self.children.write();
        if let Some(metric) = children.get(fingerprint) {
            return Ok(Arc::clone(metric));
        }

        let metric = Arc::new(Metric::new(
            labels.clone(),
            fingerprint,
            Arc::clone(&self.options),
            Arc::downgrade(self),
        ));
        children.insert(Arc::clone(&metric));
        drop(children);

        tracing::debug!(family = %self.name, labels = %labels, "created metric");

        Ok(metric)
    }

    fn validate(&self, labels: &LabelSet) -> Result<(), UsageError> {
        let invalid = |reason: String| UsageError::Validation {
            family: self.name.to_string(),
            reason,
        };

        if labels.len() != self.dimensions.len() {
            return Err(invalid(format!(
                "expected {} labels for dimensions {:?}, got {} ({})",
                self.dimensions.len(),
                self.dimensions,
                labels.len(),
                labels
            )));
        }

        let mut previous: Option<&str> = None;
        for name in labels.names() {
            if !self.dimensions.iter().any(|d| d == name) {
                return Err(invalid(format!(
                    "{} does not match declared dimensions {:?}",
                    name, self.dimensions
                )));
            }
            // Canonical order puts repeated names next to each other.
            if previous == Some(name) {
                return Err(invalid(format!("{} given more than once", name)));
            }
            previous = Some(name);
        }

        Ok(())
    }

    /// Removes `metric` from the family's children.
    pub(crate) fn forget(&self, metric: &Metric<K>) -> Result<(), UsageError> {
        let removed = self.children.write().remove(metric);
        match removed {
            Some(metric) => {
                tracing::trace!(family = %self.name, labels = %metric.labels(), "forgot metric");
                Ok(())
            }
            None => Err(UsageError::InvariantViolation(format!(
                "missing fingerprint {} in {}",
                metric.fingerprint(),
                self.name
            ))),
        }
    }

    /// Removes every child.
    pub fn forget_all(&self) {
        self.children.write().clear();
    }

    /// Restores every child's neutral state.
    ///
    /// Only a shared lock is taken on the family; each child is reset under its own lock.
    pub fn reset_all(&self) {
        for child in &self.children.read().sorted {
            child.reset();
        }
    }

    /// Whether or not the family should be part of a dump.
    ///
    /// Families without children are left out.
    pub fn should_dump(&self, _options: &DumpOptions) -> bool {
        !self.children.read().sorted.is_empty()
    }

    /// Captures the family's children, in order, for rendering.
    ///
    /// The family lock is released before this returns, so rendering the snapshot never holds it.
    pub fn snapshot(&self, options: &DumpOptions) -> FamilySnapshot {
        let records = self.children.read().sorted.iter().map(|child| child.record()).collect();

        FamilySnapshot {
            name: self.name.clone(),
            kind: K::KIND,
            help: options.include_help.then(|| self.help.clone()),
            records,
        }
    }

    /// Renders the family to `writer` in the format selected by `options`.
    pub fn dump<W: Write>(&self, writer: &mut W, options: &DumpOptions) -> Result<(), DumpError> {
        dump::render_family(&self.snapshot(options), writer, options)
    }

    /// Live children, in order.
    pub fn children(&self) -> Vec<Arc<Metric<K>>> {
        self.children.read().sorted.clone()
    }

    /// Number of live children.
    pub fn len(&self) -> usize {
        self.children.read().sorted.len()
    }

    /// Whether or not the family has no live children.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Display name of the family.
    pub fn family_name(&self) -> &FamilyName {
        &self.name
    }

    /// Fingerprint of the family's name.
    pub fn fingerprint(&self) -> u64 {
        self.fingerprint
    }

    /// Documentation of the family.
    pub fn help(&self) -> &str {
        &self.help
    }

    /// Declared label dimensions, in declaration order.
    pub fn dimensions(&self) -> &[String] {
        &self.dimensions
    }

    /// Kind-specific options the family was declared with.
    pub fn kind_options(&self) -> &K::Options {
        &self.options
    }
}

impl<K: Kind> Family for MetricFamily<K> {
    fn family_name(&self) -> &FamilyName {
        MetricFamily::family_name(self)
    }

    fn fingerprint(&self) -> u64 {
        MetricFamily::fingerprint(self)
    }

    fn kind(&self) -> MetricKind {
        K::KIND
    }

    fn help(&self) -> &str {
        MetricFamily::help(self)
    }

    fn len(&self) -> usize {
        MetricFamily::len(self)
    }

    fn reset_all(&self) {
        MetricFamily::reset_all(self)
    }

    fn forget_all(&self) {
        MetricFamily::forget_all(self)
    }

    fn should_dump(&self, options: &DumpOptions) -> bool {
        MetricFamily::should_dump(self, options)
    }

    fn snapshot(&self, options: &DumpOptions) -> FamilySnapshot {
        MetricFamily::snapshot(self, options)
    }
}

impl<K: Kind> fmt::Debug for MetricFamily<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetricFamily")
            .field("kind", &K::KIND)
            .field("name", &self.name)
            .field("dimensions", &self.dimensions)
            .field("children", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::{CounterFamily, Family, GaugeFamily, SummaryFamily};
    use crate::dump::DumpOptions;
    use crate::error::UsageError;
    use crate::options::{CounterOptions, GaugeOptions, SummaryOptions};
    use crate::registry::Registry;

    fn requests(registry: &Registry) -> Arc<CounterFamily> {
        CounterFamily::new_in(
            registry,
            CounterOptions::new("requests", "Requests served.").dimensions(["method"]),
        )
    }

    fn assert_sorted_and_indexed(family: &CounterFamily) {
        let children = family.children();
        for pair in children.windows(2) {
            assert!(pair[0].before(&pair[1]), "{:?} not before {:?}", pair[0], pair[1]);
        }
        for child in &children {
            let found = family.find(child.fingerprint()).expect("child must be indexed");
            assert!(Arc::ptr_eq(&found, child));
        }
    }

    #[test]
    fn test_children_are_sorted_and_indexed() {
        let registry = Registry::new();
        let family = requests(&registry);

        for method in ["PUT", "GET", "POST", "DELETE", "HEAD"] {
            family.new_child(&["method", method]).apply();
        }

        let methods: Vec<String> = family
            .children()
            .iter()
            .map(|c| c.labels().iter().next().unwrap().value().to_owned())
            .collect();
        assert_eq!(methods, ["DELETE", "GET", "HEAD", "POST", "PUT"]);
        assert_sorted_and_indexed(&family);
    }

    #[test]
    fn test_forget_first_middle_last() {
        let registry = Registry::new();
        let family = requests(&registry);

        let children: Vec<_> = ["a", "b", "c", "d", "e"]
            .iter()
            .map(|m| family.new_child(&["method", *m]).apply())
            .collect();

        // first
        children[0].forget();
        assert_eq!(family.len(), 4);
        assert!(family.find(children[0].fingerprint()).is_none());
        assert_sorted_and_indexed(&family);

        // last
        children[4].forget();
        assert_eq!(family.len(), 3);
        assert_sorted_and_indexed(&family);

        // middle
        children[2].forget();
        assert_eq!(family.len(), 2);
        assert_sorted_and_indexed(&family);

        let remaining: Vec<_> = family.children();
        assert!(Arc::ptr_eq(&remaining[0], &children[1]));
        assert!(Arc::ptr_eq(&remaining[1], &children[3]));
    }

    #[test]
    fn test_forget_twice_is_an_invariant_violation() {
        let registry = Registry::new();
        let family = requests(&registry);

        let child = family.new_child(&["method", "GET"]).apply();
        child.forget();

        let err = child.try_forget().unwrap_err();
        assert!(matches!(err, UsageError::InvariantViolation(_)));
    }

    #[test]
    #[should_panic(expected = "illegal invariant: missing fingerprint")]
    fn test_forget_twice_panics() {
        let registry = Registry::new();
        let family = requests(&registry);

        let child = family.new_child(&["method", "GET"]).apply();
        child.forget();
        child.forget();
    }

    #[test]
    fn test_forget_only_child() {
        let registry = Registry::new();
        let family = requests(&registry);
        let options = DumpOptions::default();

        let child = family.new_child(&["method", "GET"]).apply();
        assert!(family.should_dump(&options));

        child.forget();
        assert!(family.find(child.fingerprint()).is_none());
        assert!(!family.should_dump(&options));
    }

    #[test]
    fn test_forget_all() {
        let registry = Registry::new();
        let family = requests(&registry);

        let children: Vec<_> =
            (0..10).map(|i| family.new_child(&["method", &i.to_string()]).apply()).collect();
        assert_eq!(family.len(), 10);

        family.forget_all();
        assert!(family.is_empty());
        for child in &children {
            assert!(family.find(child.fingerprint()).is_none());
        }

        // Forgotten children cannot be forgotten again.
        assert!(children[0].try_forget().is_err());

        // Applying the same labels creates a fresh child.
        let fresh = family.new_child(&["method", "0"]).apply();
        assert!(!Arc::ptr_eq(&fresh, &children[0]));

        // The stale handle shares the fresh child's labels but does not remove it.
        assert!(children[0].try_forget().is_err());
        assert!(Arc::ptr_eq(&family.find(fresh.fingerprint()).unwrap(), &fresh));
    }

    #[test]
    fn test_reset_all() {
        let registry = Registry::new();
        let family = GaugeFamily::new_in(
            &registry,
            GaugeOptions::new("temperature", "Room temperature.")
                .dimensions(["room"])
                .default_value(20.0),
        );

        let kitchen = family.new_child(&["room", "kitchen"]).apply();
        let hall = family.new_child(&["room", "hall"]).apply();
        assert_eq!(kitchen.value(), 20.0);

        kitchen.set(24.5);
        hall.set(18.0);
        family.reset_all();

        assert_eq!(kitchen.value(), 20.0);
        assert_eq!(hall.value(), 20.0);
    }

    #[test]
    fn test_snapshot_includes_help_on_request() {
        let registry = Registry::new();
        let family = SummaryFamily::new_in(
            &registry,
            SummaryOptions::new("latency", "Request latency.").dimensions(["path"]),
        );
        family.new_child(&["path", "/"]).apply().sample(0.5);

        let snapshot = family.snapshot(&DumpOptions::default());
        assert_eq!(snapshot.help, None);
        assert_eq!(snapshot.records.len(), 1);

        let snapshot = family.snapshot(&DumpOptions::default().include_help(true));
        assert_eq!(snapshot.help.as_deref(), Some("Request latency."));
    }

    #[test]
    fn test_family_trait_object() {
        let registry = Registry::new();
        let concrete = requests(&registry);
        let family: Arc<dyn Family> = concrete.clone();
        assert_eq!(family.family_name().as_str(), "requests");
        assert_eq!(family.kind(), crate::MetricKind::Counter);
        assert!(family.is_empty());

        concrete.new_child(&["method", "GET"]).apply().increment_by(2.0);
        let mut output = Vec::new();
        family.dump(&mut output, &DumpOptions::text()).unwrap();
        assert_eq!(output, b"requests{method=GET}: 2.000000\n");
    }
}
