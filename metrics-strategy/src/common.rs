use std::fmt;

use thiserror::Error as ThisError;

/// Errors that can occur while building or registering metrics.
#[derive(Clone, Debug, PartialEq, ThisError)]
pub enum Error {
    /// A required configuration field was empty or absent.
    ///
    /// Raised before any instrument is constructed.
    #[error("invalid configuration: required field `{field}` is missing")]
    ConfigInvalid {
        /// Path of the offending field, e.g. `requests.labels`.
        field: &'static str,
    },

    /// The storage layer rejected otherwise complete parameters.
    #[error("failed to construct metric `{name}`: {reason}")]
    ConstructionFailed {
        /// Name of the metric that could not be built.
        name: String,
        /// Why the parameters were rejected.
        reason: String,
    },

    /// A strategy declared no fields at all.
    #[error("strategies need at least one field")]
    EmptyStrategy,

    /// A strategy field is neither an instrument nor a nested strategy.
    #[error("field `{field}` is neither a metric collector nor a strategy")]
    UnsupportedField {
        /// Name of the offending field.
        field: &'static str,
    },

    /// A member handed to [`register_collectors`](crate::register_collectors) is neither a metric
    /// collector nor a strategy.
    #[error("member {index} is neither a metric collector nor a strategy")]
    UnsupportedMember {
        /// Position of the offending member in the list.
        index: usize,
    },

    /// The catalogue already holds a metric under this fully-qualified name.
    #[error("duplicate metric: `{name}` is already registered")]
    DuplicateMetric {
        /// Fully-qualified name that collided.
        name: String,
    },

    /// The number of label values does not match the metric's label names.
    #[error("metric `{name}` expects {expected} label values, got {actual}")]
    LabelCardinality {
        /// Fully-qualified name of the metric.
        name: String,
        /// Number of label names the metric was declared with.
        expected: usize,
        /// Number of label values that were supplied.
        actual: usize,
    },
}

/// Metric kind.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum MetricKind {
    /// Monotonically increasing total.
    Counter,
    /// Arbitrary value that can go up and down.
    Gauge,
    /// Observations counted into pre-defined buckets.
    Histogram,
    /// Observations summarised as quantiles.
    Summary,
}

impl MetricKind {
    /// Gets the lowercase name of this kind, as used by Prometheus `TYPE` lines.
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Counter => "counter",
            MetricKind::Gauge => "gauge",
            MetricKind::Histogram => "histogram",
            MetricKind::Summary => "summary",
        }
    }

    /// Label name the exposition of this kind adds on its own, if any.
    pub(crate) fn reserved_label(&self) -> Option<&'static str> {
        match self {
            MetricKind::Histogram => Some("le"),
            MetricKind::Summary => Some("quantile"),
            MetricKind::Counter | MetricKind::Gauge => None,
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable identity of a metric: what the catalogue claims when it is registered.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct Descriptor {
    namespace: String,
    name: String,
    help: String,
    labels: Vec<String>,
    kind: MetricKind,
}

impl Descriptor {
    pub(crate) fn new(opts: &MetricOpts, kind: MetricKind) -> Descriptor {
        Descriptor {
            namespace: opts.namespace.clone(),
            name: opts.name.clone(),
            help: opts.help.clone(),
            labels: opts.labels.clone(),
            kind,
        }
    }

    /// Gets the namespace.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Gets the metric name, without the namespace.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Gets the fully-qualified name: `<namespace>_<name>`.
    pub fn fq_name(&self) -> String {
        format!("{}_{}", self.namespace, self.name)
    }

    /// Gets the help text.
    pub fn help(&self) -> &str {
        &self.help
    }

    /// Gets the label names, in declaration order.
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Gets the metric kind.
    pub fn kind(&self) -> MetricKind {
        self.kind
    }
}

/// Options shared by every instrument kind.
///
/// All four fields are required: see [`Validate`].
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct MetricOpts {
    /// Namespace prefixed to the metric name.
    pub namespace: String,
    /// Metric name, without the namespace.
    pub name: String,
    /// Help text describing the metric.
    pub help: String,
    /// Label names, in the order label values will be supplied.
    pub labels: Vec<String>,
}

impl MetricOpts {
    /// Creates a new [`MetricOpts`].
    pub fn new<N, M, H, I, L>(namespace: N, name: M, help: H, labels: I) -> MetricOpts
    where
        N: Into<String>,
        M: Into<String>,
        H: Into<String>,
        I: IntoIterator<Item = L>,
        L: Into<String>,
    {
        MetricOpts {
            namespace: namespace.into(),
            name: name.into(),
            help: help.into(),
            labels: labels.into_iter().map(Into::into).collect(),
        }
    }

    /// Returns a copy of these options under a different name.
    #[must_use]
    pub fn renamed(&self, name: impl Into<String>) -> MetricOpts {
        MetricOpts { name: name.into(), ..self.clone() }
    }
}

impl Validate for MetricOpts {
    fn validate(&self) -> Result<(), Error> {
        required_str(&self.namespace, "namespace")?;
        required_str(&self.name, "name")?;
        required_str(&self.help, "help")?;
        required_labels(&self.labels, "labels")
    }
}

/// Structural validation of configuration.
///
/// Implementations check that every required field is present, in a fixed order, and report the
/// first one that is missing.
pub trait Validate {
    /// Validates the configuration.
    ///
    /// ## Errors
    ///
    /// Returns [`Error::ConfigInvalid`] naming the first missing field.
    fn validate(&self) -> Result<(), Error>;
}

pub(crate) fn required_str(value: &str, field: &'static str) -> Result<(), Error> {
    if value.is_empty() {
        return Err(Error::ConfigInvalid { field });
    }
    Ok(())
}

pub(crate) fn required_labels(labels: &[String], field: &'static str) -> Result<(), Error> {
    if labels.is_empty() {
        return Err(Error::ConfigInvalid { field });
    }
    Ok(())
}

/// Returns `true` if `name` is a valid fully-qualified metric name: `[a-zA-Z_:][a-zA-Z0-9_:]*`.
pub(crate) fn valid_metric_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if valid_metric_name_start_character(first) => {
            chars.all(valid_metric_name_character)
        }
        _ => false,
    }
}

/// Returns `true` if `name` is a valid label name: `[a-zA-Z_][a-zA-Z0-9_]*`.
pub(crate) fn valid_label_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if valid_label_name_start_character(first) => {
            chars.all(valid_label_name_character)
        }
        _ => false,
    }
}

#[inline]
fn valid_metric_name_start_character(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || c == ':'
}

#[inline]
fn valid_metric_name_character(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == ':'
}

#[inline]
fn valid_label_name_start_character(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

#[inline]
fn valid_label_name_character(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Resolves a metric name: a non-empty override wins, otherwise the default is used.
pub(crate) fn name_or_default<F>(name: Option<&str>, default: F) -> String
where
    F: FnOnce() -> String,
{
    match name {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => default(),
    }
}
