use super::{Distribution, Field, Strategy};
use crate::common::{name_or_default, required_labels, required_str, Error, MetricOpts, Validate};
use crate::instrument::{new_counter, new_gauge, CounterVec, GaugeVec};
use crate::storage::Objective;

const DEFAULT_ERROR_LABEL: &str = "error";

/// Options for the latency distribution of a [`FourGoldenSignals`] strategy.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LatencyOpts {
    /// Base name of the latency distribution. Required.
    pub name: String,
    /// Help text of the latency distribution. Required.
    pub help: String,
    /// Labels of the latency distribution. Required.
    pub labels: Vec<String>,
    /// Histogram bucket bounds. Defaults to [`DEFAULT_BUCKETS`](crate::DEFAULT_BUCKETS).
    pub buckets: Option<Vec<f64>>,
    /// Summary objectives. Defaults to [`DEFAULT_QUANTILES`](crate::DEFAULT_QUANTILES).
    pub objectives: Option<Vec<Objective>>,
}

/// Options for the traffic counter of a [`FourGoldenSignals`] strategy.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct TrafficOpts {
    /// Name of the traffic counter. Required.
    pub name: String,
    /// Help text of the traffic counter. Required.
    pub help: String,
    /// Labels of the traffic counter. Required.
    pub labels: Vec<String>,
}

/// Options for the errors counter of a [`FourGoldenSignals`] strategy.
///
/// Both fields are optional.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct GoldenErrorsOpts {
    /// Name of the errors counter. Defaults to `errors_total`.
    pub name: Option<String>,
    /// Labels of the errors counter. Defaults to a single `error` label.
    pub labels: Vec<String>,
}

/// Options for the saturation gauge of a [`FourGoldenSignals`] strategy.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct SaturationOpts {
    /// Name of the saturation gauge. Required.
    pub name: String,
    /// Help text of the saturation gauge. Required.
    pub help: String,
    /// Labels of the saturation gauge. Required.
    pub labels: Vec<String>,
}

/// Options to create a [`FourGoldenSignals`] strategy.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FourGoldenSignalsOpts {
    /// Namespace of every metric in the strategy. Required.
    pub namespace: String,
    /// Latency distribution options.
    pub latency: LatencyOpts,
    /// Traffic counter options.
    pub traffic: TrafficOpts,
    /// Errors counter options.
    pub errors: GoldenErrorsOpts,
    /// Saturation gauge options.
    pub saturation: SaturationOpts,
}

impl Validate for FourGoldenSignalsOpts {
    fn validate(&self) -> Result<(), Error> {
        required_str(&self.namespace, "namespace")?;
        required_str(&self.latency.name, "latency.name")?;
        required_str(&self.latency.help, "latency.help")?;
        required_labels(&self.latency.labels, "latency.labels")?;
        required_str(&self.traffic.name, "traffic.name")?;
        required_str(&self.traffic.help, "traffic.help")?;
        required_labels(&self.traffic.labels, "traffic.labels")?;
        required_str(&self.saturation.name, "saturation.name")?;
        required_str(&self.saturation.help, "saturation.help")?;
        required_labels(&self.saturation.labels, "saturation.labels")
    }
}

/// Latency, traffic, errors and saturation of a user-facing system.
///
/// See <https://sre.google/sre-book/monitoring-distributed-systems/#xref_monitoring_golden-signals>.
#[derive(Clone, Debug)]
pub struct FourGoldenSignals {
    latency: Distribution,
    traffic: CounterVec,
    errors: CounterVec,
    saturation: GaugeVec,
    opts: FourGoldenSignalsOpts,
}

impl FourGoldenSignals {
    /// Creates a [`FourGoldenSignals`] strategy.
    ///
    /// ## Errors
    ///
    /// Returns [`Error::ConfigInvalid`] if a required option is missing, before anything is
    /// built, and [`Error::ConstructionFailed`] if the latency buckets or objectives are rejected.
    pub fn new(opts: FourGoldenSignalsOpts) -> Result<FourGoldenSignals, Error> {
        opts.validate()?;

        let latency = Distribution::new(
            &MetricOpts::new(
                opts.namespace.as_str(),
                latency_name(&opts),
                opts.latency.help.as_str(),
                opts.latency.labels.iter().cloned(),
            ),
            opts.latency.buckets.as_deref(),
            opts.latency.objectives.as_deref(),
        )?;

        let traffic = new_counter(&MetricOpts::new(
            opts.namespace.as_str(),
            traffic_name(&opts),
            opts.traffic.help.as_str(),
            opts.traffic.labels.iter().cloned(),
        ))?;

        let error_labels = if opts.errors.labels.is_empty() {
            vec![DEFAULT_ERROR_LABEL.to_string()]
        } else {
            opts.errors.labels.clone()
        };
        let errors = new_counter(&MetricOpts::new(
            opts.namespace.as_str(),
            errors_name(&opts),
            "Number of errors",
            error_labels,
        ))?;

        let saturation = new_gauge(&MetricOpts::new(
            opts.namespace.as_str(),
            saturation_name(&opts),
            opts.saturation.help.as_str(),
            opts.saturation.labels.iter().cloned(),
        ))?;

        Ok(FourGoldenSignals { latency, traffic, errors, saturation, opts })
    }

    /// Gets the latency distribution.
    pub fn latency(&self) -> &Distribution {
        &self.latency
    }

    /// Gets the traffic counter.
    pub fn traffic(&self) -> &CounterVec {
        &self.traffic
    }

    /// Gets the errors counter.
    pub fn errors(&self) -> &CounterVec {
        &self.errors
    }

    /// Gets the saturation gauge.
    pub fn saturation(&self) -> &GaugeVec {
        &self.saturation
    }

    /// Gets the base name of the latency distribution.
    pub fn latency_metric_name(&self) -> String {
        latency_name(&self.opts)
    }

    /// Gets the name of the traffic counter.
    pub fn traffic_metric_name(&self) -> String {
        traffic_name(&self.opts)
    }

    /// Gets the name of the errors counter.
    pub fn error_metric_name(&self) -> String {
        errors_name(&self.opts)
    }

    /// Gets the name of the saturation gauge.
    pub fn saturation_metric_name(&self) -> String {
        saturation_name(&self.opts)
    }
}

impl Strategy for FourGoldenSignals {
    fn fields(&self) -> Vec<Field<'_>> {
        vec![
            Field::new("latency", &self.latency),
            Field::new("traffic", &self.traffic),
            Field::new("errors", &self.errors),
            Field::new("saturation", &self.saturation),
        ]
    }
}

fn latency_name(opts: &FourGoldenSignalsOpts) -> String {
    opts.latency.name.clone()
}

fn traffic_name(opts: &FourGoldenSignalsOpts) -> String {
    opts.traffic.name.clone()
}

fn errors_name(opts: &FourGoldenSignalsOpts) -> String {
    name_or_default(opts.errors.name.as_deref(), || "errors_total".to_string())
}

fn saturation_name(opts: &FourGoldenSignalsOpts) -> String {
    opts.saturation.name.clone()
}
