use std::fmt;

use crate::common::FamilyName;
use crate::error::UsageError;
use crate::kind::{CounterKind, GaugeKind, Kind, SummaryKind, ValueOptions};

/// Declaration options for a counter family.
pub type CounterOptions = Options<CounterKind>;

/// Declaration options for a gauge family.
pub type GaugeOptions = Options<GaugeKind>;

/// Declaration options for a summary family.
pub type SummaryOptions = Options<SummaryKind>;

/// A configuration builder for a metric family.
///
/// `name` and `help` are required; everything else is optional.  The options are checked when the
/// family is constructed, before it is registered anywhere.
pub struct Options<K: Kind> {
    pub(crate) name: String,
    pub(crate) namespace: Option<String>,
    pub(crate) subsystem: Option<String>,
    pub(crate) dimensions: Vec<String>,
    pub(crate) help: String,
    pub(crate) kind: K::Options,
}

impl<K: Kind> Options<K> {
    /// Creates a new [`Options`] with the given base name and documentation.
    pub fn new<N, H>(name: N, help: H) -> Self
    where
        N: Into<String>,
        H: Into<String>,
    {
        Options {
            name: name.into(),
            namespace: None,
            subsystem: None,
            dimensions: Vec::new(),
            help: help.into(),
            kind: K::Options::default(),
        }
    }

    /// Sets the namespace.
    ///
    /// The namespace is the leading component of the family name, typically the application or
    /// library the metric belongs to.
    pub fn namespace<S: Into<String>>(mut self, namespace: S) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Sets the subsystem.
    ///
    /// The subsystem scopes families of the same base name within a process, for instance the
    /// API versus the asset fetcher.  It sits between the namespace and the base name.
    pub fn subsystem<S: Into<String>>(mut self, subsystem: S) -> Self {
        self.subsystem = Some(subsystem.into());
        self
    }

    /// Sets the label dimensions.
    ///
    /// Every child of the family must carry exactly one label for each dimension, and no others.
    /// Defaults to no dimensions, which gives a family with a single unlabeled child.
    pub fn dimensions<I, S>(mut self, dimensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dimensions = dimensions.into_iter().map(Into::into).collect();
        self
    }

    /// Composes the display name of the family.
    pub fn family_name(&self) -> FamilyName {
        FamilyName::compose(self.namespace.as_deref(), self.subsystem.as_deref(), &self.name)
    }

    /// Checks the options.
    ///
    /// Returns [`UsageError::Configuration`] if the name or help text is empty, if a dimension
    /// name is empty or declared twice, or if the kind-specific options are invalid.
    pub fn validate(&self) -> Result<(), UsageError> {
        if self.name.is_empty() {
            return Err(UsageError::Configuration("Name must be provided".to_owned()));
        }
        if self.help.is_empty() {
            return Err(UsageError::Configuration(format!(
                "Help must be provided for {}",
                self.family_name()
            )));
        }

        for (i, dimension) in self.dimensions.iter().enumerate() {
            if dimension.is_empty() {
                return Err(UsageError::Configuration(format!(
                    "empty dimension name declared for {}",
                    self.family_name()
                )));
            }
            if self.dimensions[..i].contains(dimension) {
                return Err(UsageError::Configuration(format!(
                    "dimension {} declared twice for {}",
                    dimension,
                    self.family_name()
                )));
            }
        }

        K::validate(&self.kind)
    }

    /// Documentation of the family.
    pub fn help(&self) -> &str {
        &self.help
    }

    /// Declared dimensions, in declaration order.
    pub fn declared_dimensions(&self) -> &[String] {
        &self.dimensions
    }
}

impl<K: Kind<Options = ValueOptions>> Options<K> {
    /// Sets the default value.
    ///
    /// Children start at this value and return to it when reset.  Defaults to `0.0`.
    pub fn default_value(mut self, value: f64) -> Self {
        self.kind.default_value = value;
        self
    }
}

impl<K: Kind> Clone for Options<K> {
    fn clone(&self) -> Self {
        Options {
            name: self.name.clone(),
            namespace: self.namespace.clone(),
            subsystem: self.subsystem.clone(),
            dimensions: self.dimensions.clone(),
            help: self.help.clone(),
            kind: self.kind.clone(),
        }
    }
}

impl<K: Kind> fmt::Debug for Options<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Options")
            .field("kind", &K::KIND)
            .field("name", &self.name)
            .field("namespace", &self.namespace)
            .field("subsystem", &self.subsystem)
            .field("dimensions", &self.dimensions)
            .field("help", &self.help)
            .field("options", &self.kind)
            .finish()
    }
}
