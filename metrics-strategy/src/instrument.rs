//! Instrument factory and labelled metric families.
//!
//! Each instrument is a family of children keyed by label values, in the style of Prometheus
//! "vec" metrics. Children are created on first use and handed out as regular `metrics` handles,
//! so recording goes through [`metrics::Counter`], [`metrics::Gauge`] and [`metrics::Histogram`].
use std::{fmt, sync::Arc};

use indexmap::IndexMap;
use metrics::{Counter, Gauge, Histogram};
use metrics_util::Quantile;
use parking_lot::RwLock;

use crate::common::{
    valid_label_name, valid_metric_name, Descriptor, Error, MetricKind, MetricOpts, Validate,
};
use crate::storage::{
    histogram_params, summary_params, BucketCell, Cell, CounterCell, GaugeCell, Objective,
    SummaryCell, Value, DEFAULT_BUCKETS,
};

/// Something the catalogue can hold on to and collect values from.
pub trait Collector: Send + Sync {
    /// Gets the descriptor identifying this metric.
    fn descriptor(&self) -> &Descriptor;

    /// Collects the current value of every labelled child.
    fn collect(&self) -> MetricFamily;
}

/// Collected values of one metric.
#[derive(Clone, Debug, PartialEq)]
pub struct MetricFamily {
    /// Identity of the metric.
    pub descriptor: Descriptor,
    /// One sample per label set, in the order the label sets were first used.
    pub samples: Vec<Sample>,
}

/// Value of one labelled child.
#[derive(Clone, Debug, PartialEq)]
pub struct Sample {
    /// Label values, in the order of the descriptor's label names.
    pub label_values: Vec<String>,
    /// Current value.
    pub value: Value,
}

pub(crate) struct Family<C: Cell> {
    descriptor: Descriptor,
    params: C::Params,
    children: RwLock<IndexMap<Vec<String>, Arc<C>>>,
}

impl<C: Cell> Family<C> {
    fn new(descriptor: Descriptor, params: C::Params) -> Family<C> {
        Family { descriptor, params, children: RwLock::new(IndexMap::new()) }
    }

    /// Gets the child for the given label values, creating it if it doesn't exist yet.
    pub(crate) fn child(&self, values: &[&str]) -> Result<Arc<C>, Error> {
        let expected = self.descriptor.labels().len();
        if values.len() != expected {
            return Err(Error::LabelCardinality {
                name: self.descriptor.fq_name(),
                expected,
                actual: values.len(),
            });
        }

        let key = values.iter().map(|v| v.to_string()).collect::<Vec<_>>();
        if let Some(child) = self.children.read().get(&key) {
            return Ok(child.clone());
        }

        let mut children = self.children.write();
        let child = children.entry(key).or_insert_with(|| Arc::new(C::create(&self.params)));
        Ok(child.clone())
    }
}

impl<C: Cell> Collector for Family<C> {
    fn descriptor(&self) -> &Descriptor {
        &self.descriptor
    }

    fn collect(&self) -> MetricFamily {
        let samples = self
            .children
            .read()
            .iter()
            .map(|(label_values, child)| Sample {
                label_values: label_values.clone(),
                value: child.value(),
            })
            .collect();

        MetricFamily { descriptor: self.descriptor.clone(), samples }
    }
}

macro_rules! family_handle {
    ($handle:ident) => {
        impl $handle {
            /// Gets the descriptor identifying this metric.
            pub fn descriptor(&self) -> &Descriptor {
                &self.family.descriptor
            }

            /// Collects the current value of every labelled child.
            pub fn collect(&self) -> MetricFamily {
                self.family.collect()
            }

            /// Gets the shared collector, as handed to a [`Registerer`](crate::Registerer).
            pub fn collector(&self) -> Arc<dyn Collector> {
                self.family.clone()
            }
        }

        impl fmt::Debug for $handle {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.debug_struct(stringify!($handle))
                    .field("descriptor", &self.family.descriptor)
                    .finish_non_exhaustive()
            }
        }
    };
}

/// A family of counters partitioned by label values.
///
/// A counter is a cumulative metric that only ever goes up, such as the total number of requests
/// served or errors encountered.
#[derive(Clone)]
pub struct CounterVec {
    family: Arc<Family<CounterCell>>,
}

impl CounterVec {
    /// Gets the counter for the given label values.
    ///
    /// ## Errors
    ///
    /// Returns [`Error::LabelCardinality`] if the number of values doesn't match the label names.
    pub fn with_label_values(&self, values: &[&str]) -> Result<Counter, Error> {
        Ok(Counter::from_arc(self.family.child(values)?))
    }
}

family_handle!(CounterVec);

/// A family of gauges partitioned by label values.
///
/// A gauge is a single value that can arbitrarily go up and down, such as memory in use or the
/// number of requests in flight.
#[derive(Clone)]
pub struct GaugeVec {
    family: Arc<Family<GaugeCell>>,
}

impl GaugeVec {
    /// Gets the gauge for the given label values.
    ///
    /// ## Errors
    ///
    /// Returns [`Error::LabelCardinality`] if the number of values doesn't match the label names.
    pub fn with_label_values(&self, values: &[&str]) -> Result<Gauge, Error> {
        Ok(Gauge::from_arc(self.family.child(values)?))
    }
}

family_handle!(GaugeVec);

/// A family of bucketed histograms partitioned by label values.
///
/// A histogram counts observations, such as request durations or response sizes, into
/// configurable buckets and tracks their sum.
#[derive(Clone)]
pub struct HistogramVec {
    family: Arc<Family<BucketCell>>,
}

impl HistogramVec {
    /// Gets the histogram for the given label values.
    ///
    /// ## Errors
    ///
    /// Returns [`Error::LabelCardinality`] if the number of values doesn't match the label names.
    pub fn with_label_values(&self, values: &[&str]) -> Result<Histogram, Error> {
        Ok(Histogram::from_arc(self.child(values)?))
    }

    pub(crate) fn child(&self, values: &[&str]) -> Result<Arc<BucketCell>, Error> {
        self.family.child(values)
    }

    /// Gets the upper bounds of the buckets.
    pub fn buckets(&self) -> Vec<f64> {
        self.family.params.buckets().into_iter().map(|(bound, _)| bound).collect()
    }
}

family_handle!(HistogramVec);

/// A family of summaries partitioned by label values.
///
/// A summary tracks the count and sum of observations and estimates configurable quantiles over
/// them.
#[derive(Clone)]
pub struct SummaryVec {
    family: Arc<Family<SummaryCell>>,
}

impl SummaryVec {
    /// Gets the summary for the given label values.
    ///
    /// ## Errors
    ///
    /// Returns [`Error::LabelCardinality`] if the number of values doesn't match the label names.
    pub fn with_label_values(&self, values: &[&str]) -> Result<Histogram, Error> {
        Ok(Histogram::from_arc(self.child(values)?))
    }

    pub(crate) fn child(&self, values: &[&str]) -> Result<Arc<SummaryCell>, Error> {
        self.family.child(values)
    }

    /// Gets the quantiles this summary reports.
    pub fn quantiles(&self) -> &[Quantile] {
        self.family.params.quantiles()
    }
}

family_handle!(SummaryVec);

fn describe(opts: &MetricOpts, kind: MetricKind) -> Result<Descriptor, Error> {
    opts.validate()?;

    let fq_name = format!("{}_{}", opts.namespace, opts.name);
    let failed = |reason: String| Error::ConstructionFailed { name: fq_name.clone(), reason };

    if !valid_metric_name(&fq_name) {
        return Err(failed(format!("invalid metric name `{}`", fq_name)));
    }

    let labels = &opts.labels;
    for (i, label) in labels.iter().enumerate() {
        if !valid_label_name(label) {
            return Err(failed(format!("invalid label name `{}`", label)));
        }
        if label.starts_with("__") {
            return Err(failed(format!("label name `{}` is reserved for internal use", label)));
        }
        if kind.reserved_label() == Some(label.as_str()) {
            let reason = format!("label name `{}` is reserved for {} metrics", label, kind);
            return Err(failed(reason));
        }
        if labels[..i].contains(label) {
            return Err(failed(format!("duplicate label name `{}`", label)));
        }
    }

    Ok(Descriptor::new(opts, kind))
}

/// Creates a counter family.
///
/// ## Errors
///
/// Returns [`Error::ConfigInvalid`] if a required option is missing, and
/// [`Error::ConstructionFailed`] if a name is invalid or label names are repeated.
pub fn new_counter(opts: &MetricOpts) -> Result<CounterVec, Error> {
    let descriptor = describe(opts, MetricKind::Counter)?;
    Ok(CounterVec { family: Arc::new(Family::new(descriptor, ())) })
}

/// Creates a gauge family.
///
/// ## Errors
///
/// Returns [`Error::ConfigInvalid`] if a required option is missing, and
/// [`Error::ConstructionFailed`] if a name is invalid or label names are repeated.
pub fn new_gauge(opts: &MetricOpts) -> Result<GaugeVec, Error> {
    let descriptor = describe(opts, MetricKind::Gauge)?;
    Ok(GaugeVec { family: Arc::new(Family::new(descriptor, ())) })
}

/// Creates a histogram family.
///
/// `buckets` are the inclusive upper bounds of each bucket and are passed through as given. When
/// `None` or empty, [`DEFAULT_BUCKETS`] is used.
///
/// ## Errors
///
/// Returns [`Error::ConfigInvalid`] if a required option is missing, and
/// [`Error::ConstructionFailed`] if a name is invalid, label names are repeated or use `le`, or
/// the buckets contain NaN or are not strictly increasing.
pub fn new_histogram(opts: &MetricOpts, buckets: Option<&[f64]>) -> Result<HistogramVec, Error> {
    let descriptor = describe(opts, MetricKind::Histogram)?;
    let buckets = match buckets {
        Some(buckets) if !buckets.is_empty() => buckets,
        _ => DEFAULT_BUCKETS,
    };
    let params = histogram_params(&descriptor.fq_name(), buckets)?;
    Ok(HistogramVec { family: Arc::new(Family::new(descriptor, params)) })
}

/// Creates a summary family.
///
/// `objectives` pair each quantile to report with the error tolerated when estimating it. When
/// `None`, [`DEFAULT_QUANTILES`](crate::DEFAULT_QUANTILES) are reported.
///
/// ## Errors
///
/// Returns [`Error::ConfigInvalid`] if a required option is missing, and
/// [`Error::ConstructionFailed`] if a name is invalid, label names are repeated or use
/// `quantile`, a quantile lies outside of `[0, 1]`, or an error lies outside of `(0, 1)`.
pub fn new_summary(opts: &MetricOpts, objectives: Option<&[Objective]>) -> Result<SummaryVec, Error> {
    let descriptor = describe(opts, MetricKind::Summary)?;
    let params = summary_params(&descriptor.fq_name(), objectives)?;
    Ok(SummaryVec { family: Arc::new(Family::new(descriptor, params)) })
}
