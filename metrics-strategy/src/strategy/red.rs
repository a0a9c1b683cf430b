use super::{Distribution, Field, Strategy};
use crate::common::{name_or_default, required_labels, required_str, Error, MetricOpts, Validate};
use crate::instrument::{new_counter, CounterVec};
use crate::storage::Objective;

/// Options for the requests counter of a [`Red`] strategy.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RedRequestsOpts {
    /// Name of the requests counter. Defaults to `<request_type>_requests_total`.
    pub name: Option<String>,
    /// Type of the requests being served, e.g. `http` or `grpc`. Required.
    pub request_type: String,
    /// Labels of the requests counter. Required.
    pub labels: Vec<String>,
}

/// Options for the errors counter of a [`Red`] strategy.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RedErrorsOpts {
    /// Name of the errors counter. Defaults to `errors_total`.
    pub name: Option<String>,
    /// Labels of the errors counter. Required.
    pub labels: Vec<String>,
}

/// Options for the duration distribution of a [`Red`] strategy.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RedDurationOpts {
    /// Base name of the duration distribution. Defaults to
    /// `<request_type>_request_duration_seconds`.
    pub name: Option<String>,
    /// Labels of the duration distribution. Required.
    pub labels: Vec<String>,
    /// Histogram bucket bounds. Defaults to [`DEFAULT_BUCKETS`](crate::DEFAULT_BUCKETS).
    pub buckets: Option<Vec<f64>>,
    /// Summary objectives. Defaults to [`DEFAULT_QUANTILES`](crate::DEFAULT_QUANTILES).
    pub objectives: Option<Vec<Objective>>,
}

/// Options to create a [`Red`] strategy.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RedOpts {
    /// Namespace of every metric in the strategy. Required.
    pub namespace: String,
    /// Requests counter options.
    pub requests: RedRequestsOpts,
    /// Errors counter options.
    pub errors: RedErrorsOpts,
    /// Duration distribution options.
    pub duration: RedDurationOpts,
}

impl Validate for RedOpts {
    fn validate(&self) -> Result<(), Error> {
        required_str(&self.namespace, "namespace")?;
        required_str(&self.requests.request_type, "requests.request_type")?;
        required_labels(&self.requests.labels, "requests.labels")?;
        required_labels(&self.errors.labels, "errors.labels")?;
        required_labels(&self.duration.labels, "duration.labels")
    }
}

/// Rate, errors and duration of a request-handling service, such as an HTTP API or a database
/// server.
///
/// See <https://www.weave.works/blog/the-red-method-key-metrics-for-microservices-architecture/>.
#[derive(Clone, Debug)]
pub struct Red {
    requests: CounterVec,
    errors: CounterVec,
    duration: Distribution,
    opts: RedOpts,
}

impl Red {
    /// Creates a [`Red`] strategy.
    ///
    /// ## Errors
    ///
    /// Returns [`Error::ConfigInvalid`] if a required option is missing, before anything is
    /// built, and [`Error::ConstructionFailed`] if the duration buckets or objectives are
    /// rejected.
    pub fn new(opts: RedOpts) -> Result<Red, Error> {
        opts.validate()?;

        let requests = new_counter(&MetricOpts::new(
            opts.namespace.as_str(),
            requests_name(&opts),
            "Number of requests",
            opts.requests.labels.iter().cloned(),
        ))?;

        let errors = new_counter(&MetricOpts::new(
            opts.namespace.as_str(),
            errors_name(&opts),
            "Number of errors, RED",
            opts.errors.labels.iter().cloned(),
        ))?;

        let duration = Distribution::new(
            &MetricOpts::new(
                opts.namespace.as_str(),
                duration_name(&opts),
                "Duration of request in seconds",
                opts.duration.labels.iter().cloned(),
            ),
            opts.duration.buckets.as_deref(),
            opts.duration.objectives.as_deref(),
        )?;

        Ok(Red { requests, errors, duration, opts })
    }

    /// Gets the requests counter.
    pub fn requests(&self) -> &CounterVec {
        &self.requests
    }

    /// Gets the errors counter.
    pub fn errors(&self) -> &CounterVec {
        &self.errors
    }

    /// Gets the duration distribution.
    pub fn duration(&self) -> &Distribution {
        &self.duration
    }

    /// Gets the name of the requests counter.
    pub fn request_metric_name(&self) -> String {
        requests_name(&self.opts)
    }

    /// Gets the name of the errors counter.
    pub fn error_metric_name(&self) -> String {
        errors_name(&self.opts)
    }

    /// Gets the base name of the duration distribution.
    pub fn duration_metric_name(&self) -> String {
        duration_name(&self.opts)
    }
}

impl Strategy for Red {
    fn fields(&self) -> Vec<Field<'_>> {
        vec![
            Field::new("requests", &self.requests),
            Field::new("errors", &self.errors),
            Field::new("duration", &self.duration),
        ]
    }
}

fn requests_name(opts: &RedOpts) -> String {
    name_or_default(opts.requests.name.as_deref(), || {
        format!("{}_requests_total", opts.requests.request_type)
    })
}

fn errors_name(opts: &RedOpts) -> String {
    name_or_default(opts.errors.name.as_deref(), || "errors_total".to_string())
}

fn duration_name(opts: &RedOpts) -> String {
    name_or_default(opts.duration.name.as_deref(), || {
        format!("{}_request_duration_seconds", opts.requests.request_type)
    })
}
