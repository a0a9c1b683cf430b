use super::{Field, Strategy};
use crate::common::{name_or_default, required_labels, required_str, Error, MetricOpts, Validate};
use crate::instrument::{new_counter, new_gauge, CounterVec, GaugeVec};

/// Options for the utilization gauge of a [`Use`] strategy.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct UseUtilizationOpts {
    /// Name of the utilization gauge. Required.
    pub name: String,
    /// Help text of the utilization gauge. Required.
    pub help: String,
    /// Labels of the utilization gauge. Required.
    pub labels: Vec<String>,
}

/// Options for the saturation gauge of a [`Use`] strategy.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct UseSaturationOpts {
    /// Name of the saturation gauge. Required.
    pub name: String,
    /// Help text of the saturation gauge. Required.
    pub help: String,
    /// Labels of the saturation gauge. Required.
    pub labels: Vec<String>,
}

/// Options for the errors counter of a [`Use`] strategy.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct UseErrorsOpts {
    /// Name of the errors counter. Defaults to `errors_total`.
    pub name: Option<String>,
    /// Labels of the errors counter. Required.
    pub labels: Vec<String>,
}

/// Options to create a [`Use`] strategy.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct UseOpts {
    /// Namespace of every metric in the strategy. Required.
    pub namespace: String,
    /// Utilization gauge options.
    pub utilization: UseUtilizationOpts,
    /// Saturation gauge options.
    pub saturation: UseSaturationOpts,
    /// Errors counter options.
    pub errors: UseErrorsOpts,
}

impl Validate for UseOpts {
    fn validate(&self) -> Result<(), Error> {
        required_str(&self.namespace, "namespace")?;
        required_str(&self.utilization.name, "utilization.name")?;
        required_str(&self.utilization.help, "utilization.help")?;
        required_labels(&self.utilization.labels, "utilization.labels")?;
        required_str(&self.saturation.name, "saturation.name")?;
        required_str(&self.saturation.help, "saturation.help")?;
        required_labels(&self.saturation.labels, "saturation.labels")?;
        required_labels(&self.errors.labels, "errors.labels")
    }
}

/// Utilization, saturation and errors of a resource that can be used or idle: queues, CPUs,
/// memory, disks.
///
/// See <https://www.brendangregg.com/usemethod.html>.
#[derive(Clone, Debug)]
pub struct Use {
    utilization: GaugeVec,
    saturation: GaugeVec,
    errors: CounterVec,
    opts: UseOpts,
}

impl Use {
    /// Creates a [`Use`] strategy.
    ///
    /// ## Errors
    ///
    /// Returns [`Error::ConfigInvalid`] if a required option is missing, before anything is
    /// built.
    pub fn new(opts: UseOpts) -> Result<Use, Error> {
        opts.validate()?;

        let utilization = new_gauge(&MetricOpts::new(
            opts.namespace.as_str(),
            utilization_name(&opts),
            opts.utilization.help.as_str(),
            opts.utilization.labels.iter().cloned(),
        ))?;

        let saturation = new_gauge(&MetricOpts::new(
            opts.namespace.as_str(),
            saturation_name(&opts),
            opts.saturation.help.as_str(),
            opts.saturation.labels.iter().cloned(),
        ))?;

        let errors = new_counter(&MetricOpts::new(
            opts.namespace.as_str(),
            errors_name(&opts),
            "Number of errors",
            opts.errors.labels.iter().cloned(),
        ))?;

        Ok(Use { utilization, saturation, errors, opts })
    }

    /// Gets the utilization gauge: how busy the resource was, as a fraction of time.
    pub fn utilization(&self) -> &GaugeVec {
        &self.utilization
    }

    /// Gets the saturation gauge: how much extra work is queued or refused.
    pub fn saturation(&self) -> &GaugeVec {
        &self.saturation
    }

    /// Gets the errors counter.
    pub fn errors(&self) -> &CounterVec {
        &self.errors
    }

    /// Gets the name of the utilization gauge.
    pub fn utilization_metric_name(&self) -> String {
        utilization_name(&self.opts)
    }

    /// Gets the name of the saturation gauge.
    pub fn saturation_metric_name(&self) -> String {
        saturation_name(&self.opts)
    }

    /// Gets the name of the errors counter.
    pub fn error_metric_name(&self) -> String {
        errors_name(&self.opts)
    }
}

impl Strategy for Use {
    fn fields(&self) -> Vec<Field<'_>> {
        vec![
            Field::new("utilization", &self.utilization),
            Field::new("saturation", &self.saturation),
            Field::new("errors", &self.errors),
        ]
    }
}

// Utilization and saturation have no default: validation guarantees they are set.
fn utilization_name(opts: &UseOpts) -> String {
    opts.utilization.name.clone()
}

fn saturation_name(opts: &UseOpts) -> String {
    opts.saturation.name.clone()
}

fn errors_name(opts: &UseOpts) -> String {
    name_or_default(opts.errors.name.as_deref(), || "errors_total".to_string())
}
