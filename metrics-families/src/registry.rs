//! Family registration and dumping.

use std::fmt;
use std::io::Write;
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::RwLock;

use crate::common::FingerprintMap;
use crate::dump::{self, DumpOptions};
use crate::error::{DumpError, UsageError};
use crate::family::Family;

static DEFAULT_REGISTRY: Lazy<Registry> = Lazy::new(Registry::new);

#[derive(Default)]
struct Families {
    sorted: Vec<Arc<dyn Family>>,
    index: FingerprintMap<usize>,
}

/// A collection of metric families.
///
/// Each family name can only be registered once: declaring the same metric twice is a
/// programming error, never a silent merge.  Families are kept sorted by name, which is the order
/// they are dumped in.
///
/// Most applications use the process-wide [`default_registry`](Registry::default_registry), which
/// [`MetricFamily::new`][crate::MetricFamily::new] registers into.  Independent registries, each
/// with their own locks, can be created for isolated use, such as in tests.
pub struct Registry {
    families: RwLock<Families>,
}

impl Registry {
    /// Creates a new, empty `Registry`.
    pub fn new() -> Self {
        Registry { families: RwLock::new(Families::default()) }
    }

    /// The process-wide registry.
    ///
    /// Created on first use and never torn down.
    pub fn default_registry() -> &'static Registry {
        &DEFAULT_REGISTRY
    }

    /// Registers a family.
    ///
    /// # Panics
    ///
    /// Panics if a family with the same name is already registered.
    pub fn register(&self, family: Arc<dyn Family>) {
        if let Err(e) = self.try_register(family) {
            e.raise();
        }
    }

    /// Registers a family.
    ///
    /// Returns [`UsageError::InvariantViolation`] if a family with the same name is already
    /// registered, leaving the registry unchanged.
    pub fn try_register(&self, family: Arc<dyn Family>) -> Result<(), UsageError> {
        let fingerprint = family.fingerprint();
        let mut families = self.families.write();

        if families.index.contains_key(&fingerprint) {
            return Err(UsageError::InvariantViolation(format!(
                "{} is already registered",
                family.family_name()
            )));
        }

        let position = families
            .sorted
            .partition_point(|existing| existing.family_name() < family.family_name());
        tracing::debug!(
            family = %family.family_name(),
            kind = family.kind().as_str(),
            "registered metric family"
        );
        families.sorted.insert(position, family);

        let Families { sorted, index } = &mut *families;
        for (i, family) in sorted.iter().enumerate().skip(position) {
            index.insert(family.fingerprint(), i);
        }

        Ok(())
    }

    /// Looks up a family by its name's fingerprint.
    pub fn find(&self, fingerprint: u64) -> Option<Arc<dyn Family>> {
        let families = self.families.read();
        families.index.get(&fingerprint).map(|&i| Arc::clone(&families.sorted[i]))
    }

    /// Every registered family, in name order.
    pub fn families(&self) -> Vec<Arc<dyn Family>> {
        self.families.read().sorted.clone()
    }

    /// Families that should be part of a dump with the given options, in name order.
    ///
    /// The registry lock is released before the families themselves are inspected.
    pub fn collect_families(&self, options: &DumpOptions) -> Vec<Arc<dyn Family>> {
        let mut families = self.families();
        families.retain(|family| family.should_dump(options));
        families
    }

    /// Renders every non-empty family to `writer` in the format selected by `options`.
    ///
    /// The set of families is captured first and each family is then rendered as of the moment
    /// it is reached, so a family whose last child is forgotten in between still shows up, empty.
    /// Rendering stops at the first error, leaving whatever was already written in `writer`.
    pub fn dump<W: Write>(&self, writer: &mut W, options: &DumpOptions) -> Result<(), DumpError> {
        let families = self.collect_families(options);
        dump::render_families(&families, writer, options)
    }

    /// Restores the neutral state of every child of every family.
    pub fn reset_all(&self) {
        for family in self.families() {
            family.reset_all();
        }
    }

    /// Removes every child of every family.
    ///
    /// The families themselves stay registered.
    pub fn forget_all(&self) {
        for family in self.families() {
            family.forget_all();
        }
    }

    /// Number of registered families.
    pub fn len(&self) -> usize {
        self.families.read().sorted.len()
    }

    /// Whether or not no family is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for Registry {
    fn default() -> Self {
        Registry::new()
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let families = self.families.read();
        f.debug_struct("Registry")
            .field(
                "families",
                &families.sorted.iter().map(|f| f.family_name().as_str()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::sync::Arc;

    use super::Registry;
    use crate::common::FamilyName;
    use crate::dump::{DumpOptions, FamilySnapshot};
    use crate::error::UsageError;
    use crate::family::{CounterFamily, Family, GaugeFamily};
    use crate::kind::MetricKind;
    use crate::options::{CounterOptions, GaugeOptions};

    struct DummyFamily {
        name: FamilyName,
    }

    impl DummyFamily {
        fn new(name: &str) -> Arc<Self> {
            Arc::new(DummyFamily { name: FamilyName::compose(None, None, name) })
        }
    }

    impl Family for DummyFamily {
        fn family_name(&self) -> &FamilyName {
            &self.name
        }

        fn fingerprint(&self) -> u64 {
            self.name.fingerprint()
        }

        fn kind(&self) -> MetricKind {
            MetricKind::Counter
        }

        fn help(&self) -> &str {
            "dummy"
        }

        fn len(&self) -> usize {
            1
        }

        fn reset_all(&self) {}

        fn forget_all(&self) {}

        fn should_dump(&self, _: &DumpOptions) -> bool {
            true
        }

        fn snapshot(&self, _: &DumpOptions) -> FamilySnapshot {
            FamilySnapshot {
                name: self.name.clone(),
                kind: MetricKind::Counter,
                help: None,
                records: Vec::new(),
            }
        }
    }

    #[test]
    fn test_register() {
        let scenarios: Vec<(Vec<&str>, Vec<bool>)> = vec![
            (vec!["The Great"], vec![true]),
            (vec!["The Only Family", "The Only Family"], vec![true, false]),
            (vec!["b", "a", "c"], vec![true, true, true]),
        ];

        for (i, (names, success)) in scenarios.into_iter().enumerate() {
            let registry = Registry::new();
            for (j, (name, expected)) in names.iter().zip(success).enumerate() {
                let result = registry.try_register(DummyFamily::new(name));
                assert_eq!(result.is_ok(), expected, "{}.{}. unexpected result: {:?}", i, j, result);
            }
        }
    }

    #[test]
    fn test_duplicate_leaves_registry_unchanged() {
        let registry = Registry::new();
        CounterFamily::new_in(&registry, CounterOptions::new("requests", "Requests served."));
        assert_eq!(registry.len(), 1);

        let err = GaugeFamily::try_new_in(
            &registry,
            GaugeOptions::new("requests", "Requests, again.").namespace(""),
        )
        .unwrap_err();
        assert!(matches!(err, UsageError::InvariantViolation(_)));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    #[should_panic(expected = "requests is already registered")]
    fn test_duplicate_panics() {
        let registry = Registry::new();
        CounterFamily::new_in(&registry, CounterOptions::new("requests", "Requests served."));
        CounterFamily::new_in(&registry, CounterOptions::new("requests", "Requests served."));
    }

    #[test]
    fn test_families_are_sorted_by_name() {
        let registry = Registry::new();
        for name in ["zeta", "alpha", "mu", "beta"] {
            registry.register(DummyFamily::new(name));
        }

        let names: Vec<String> =
            registry.families().iter().map(|f| f.family_name().to_string()).collect();
        assert_eq!(names, ["alpha", "beta", "mu", "zeta"]);

        for family in registry.families() {
            let found = registry.find(family.fingerprint()).expect("family must be indexed");
            assert!(Arc::ptr_eq(&found, &family));
        }
    }

    #[test]
    fn test_collect_families_skips_empty() {
        let registry = Registry::new();
        let requests = CounterFamily::new_in(
            &registry,
            CounterOptions::new("requests", "Requests served.").dimensions(["method"]),
        );
        GaugeFamily::new_in(&registry, GaugeOptions::new("idle", "Never touched."));

        let options = DumpOptions::default();
        assert!(registry.collect_families(&options).is_empty());

        requests.new_child(&["method", "GET"]).apply();
        let collected = registry.collect_families(&options);
        assert_eq!(collected.len(), 1);
        assert_eq!(collected[0].family_name().as_str(), "requests");
    }

    #[test]
    fn test_registries_are_independent() {
        let first = Registry::new();
        let second = Registry::new();
        CounterFamily::new_in(&first, CounterOptions::new("requests", "Requests served."));
        CounterFamily::new_in(&second, CounterOptions::new("requests", "Requests served."));
        assert_eq!(first.len(), 1);
        assert_eq!(second.len(), 1);
    }

    #[test]
    fn test_reset_and_forget_all() {
        let registry = Registry::new();
        let requests = CounterFamily::new_in(
            &registry,
            CounterOptions::new("requests", "Requests served.").dimensions(["method"]),
        );
        let get = requests.new_child(&["method", "GET"]).apply();
        get.increment_by(3.0);

        registry.reset_all();
        assert_eq!(get.value(), 0.0);

        registry.forget_all();
        assert!(requests.is_empty());
        assert_eq!(registry.len(), 1);
    }

    struct FailingWriter;

    impl Write for FailingWriter {
        fn write(&mut self, _: &[u8]) -> std::io::Result<usize> {
            Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "closed"))
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_dump_propagates_write_errors() {
        let registry = Registry::new();
        let requests = CounterFamily::new_in(
            &registry,
            CounterOptions::new("requests", "Requests served.").dimensions(["method"]),
        );
        requests.new_child(&["method", "GET"]).apply();

        for options in [DumpOptions::text(), DumpOptions::protobuf(), DumpOptions::json()] {
            let err = registry.dump(&mut FailingWriter, &options).unwrap_err();
            assert!(matches!(err, crate::DumpError::Io(_) | crate::DumpError::Json(_)));
        }
    }
}
