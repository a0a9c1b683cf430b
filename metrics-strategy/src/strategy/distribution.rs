use std::sync::Arc;

use metrics::{Histogram, HistogramFn};

use super::{Field, Strategy};
use crate::common::{Error, MetricOpts, Validate};
use crate::instrument::{new_histogram, new_summary, HistogramVec, SummaryVec};
use crate::storage::{BucketCell, Objective, SummaryCell};

/// One logical measurement exposed as both a histogram and a summary.
///
/// The histogram is named `<name>_hist` and the summary `<name>_sum`; both share the namespace,
/// help text and labels. Histograms aggregate well across instances, summaries give precise
/// quantiles per instance, and a distribution keeps the two in step.
#[derive(Clone, Debug)]
pub struct Distribution {
    histogram: HistogramVec,
    summary: SummaryVec,
    opts: MetricOpts,
}

impl Distribution {
    /// Creates a [`Distribution`].
    ///
    /// `buckets` are passed to the histogram and `objectives` to the summary, unmodified. Either
    /// half failing to build fails the whole distribution.
    ///
    /// ## Errors
    ///
    /// Returns [`Error::ConfigInvalid`] if a required option is missing, before anything is
    /// built, and [`Error::ConstructionFailed`] if either half rejects its parameters.
    pub fn new(
        opts: &MetricOpts,
        buckets: Option<&[f64]>,
        objectives: Option<&[Objective]>,
    ) -> Result<Distribution, Error> {
        opts.validate()?;

        let histogram = new_histogram(&opts.renamed(histogram_name(&opts.name)), buckets)?;
        let summary = new_summary(&opts.renamed(summary_name(&opts.name)), objectives)?;

        Ok(Distribution { histogram, summary, opts: opts.clone() })
    }

    /// Gets a handle that records every observation into both the histogram and the summary.
    ///
    /// ## Errors
    ///
    /// Returns [`Error::LabelCardinality`] if the number of values doesn't match the label names.
    pub fn with_label_values(&self, values: &[&str]) -> Result<Histogram, Error> {
        let histogram = self.histogram.child(values)?;
        let summary = self.summary.child(values)?;
        Ok(Histogram::from_arc(Arc::new(Paired { histogram, summary })))
    }

    /// Gets the histogram half.
    pub fn histogram(&self) -> &HistogramVec {
        &self.histogram
    }

    /// Gets the summary half.
    pub fn summary(&self) -> &SummaryVec {
        &self.summary
    }

    /// Gets the base name both halves are derived from.
    pub fn name(&self) -> &str {
        &self.opts.name
    }

    /// Gets the name of the histogram half.
    pub fn histogram_name(&self) -> String {
        histogram_name(&self.opts.name)
    }

    /// Gets the name of the summary half.
    pub fn summary_name(&self) -> String {
        summary_name(&self.opts.name)
    }
}

impl Strategy for Distribution {
    fn fields(&self) -> Vec<Field<'_>> {
        vec![Field::new("histogram", &self.histogram), Field::new("summary", &self.summary)]
    }
}

fn histogram_name(name: &str) -> String {
    format!("{}_hist", name)
}

fn summary_name(name: &str) -> String {
    format!("{}_sum", name)
}

struct Paired {
    histogram: Arc<BucketCell>,
    summary: Arc<SummaryCell>,
}

impl HistogramFn for Paired {
    fn record(&self, value: f64) {
        self.histogram.record(value);
        self.summary.record(value);
    }
}

#[cfg(test)]
mod tests {
    use super::Distribution;
    use crate::catalogue::{Catalogue, Registerer};
    use crate::common::{Error, MetricKind, MetricOpts};
    use crate::storage::{Objective, Value};
    use crate::strategy::Strategy;

    fn opts() -> MetricOpts {
        MetricOpts::new("foobar", "foo", "bar", ["baz", "qux", "quux"])
    }

    #[test]
    fn test_new_distribution() {
        let objectives = [
            Objective::new(0.5, 0.05),
            Objective::new(0.9, 0.01),
            Objective::new(0.99, 0.001),
        ];
        let dist = Distribution::new(&opts(), Some(&[0.5, 1.5, 2.0]), Some(&objectives))
            .expect("distribution");

        assert_eq!(dist.name(), "foo");
        assert_eq!(dist.histogram_name(), "foo_hist");
        assert_eq!(dist.summary_name(), "foo_sum");

        let hist = dist.histogram().descriptor();
        assert_eq!(hist.kind(), MetricKind::Histogram);
        assert_eq!(hist.fq_name(), "foobar_foo_hist");
        assert_eq!(dist.histogram().buckets(), vec![0.5, 1.5, 2.0]);

        let sum = dist.summary().descriptor();
        assert_eq!(sum.kind(), MetricKind::Summary);
        assert_eq!(sum.fq_name(), "foobar_foo_sum");
        assert_eq!(dist.summary().quantiles().len(), 3);

        for descriptor in [hist, sum] {
            assert_eq!(descriptor.namespace(), "foobar");
            assert_eq!(descriptor.help(), "bar");
            assert_eq!(descriptor.labels(), ["baz", "qux", "quux"]);
        }
    }

    #[test]
    fn test_names_match_what_was_built() {
        let dist = Distribution::new(&opts(), None, None).expect("distribution");

        // Asking twice gives the same answer, and it matches the constructed metrics.
        assert_eq!(dist.histogram_name(), dist.histogram_name());
        assert_eq!(dist.histogram_name(), dist.histogram().descriptor().name());
        assert_eq!(dist.summary_name(), dist.summary().descriptor().name());
    }

    #[test]
    fn test_missing_fields() {
        let result = Distribution::new(&MetricOpts { help: String::new(), ..opts() }, None, None);
        assert_eq!(result.map(|_| ()), Err(Error::ConfigInvalid { field: "help" }));
    }

    #[test]
    fn test_no_partial_distribution() {
        let bad_buckets = Distribution::new(&opts(), Some(&[1.0, 0.5]), None);
        assert!(matches!(bad_buckets, Err(Error::ConstructionFailed { .. })));

        // The histogram builds fine here; the summary does not.
        let bad_objectives = Distribution::new(&opts(), None, Some(&[Objective::new(0.5, 2.0)]));
        match bad_objectives {
            Err(Error::ConstructionFailed { name, .. }) => assert_eq!(name, "foobar_foo_sum"),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_records_into_both_halves() {
        let dist = Distribution::new(&opts(), Some(&[1.0, 2.0]), None).expect("distribution");
        let handle = dist.with_label_values(&["a", "b", "c"]).expect("handle");
        handle.record(0.5);
        handle.record(1.5);

        let hist = dist.histogram().collect();
        assert_eq!(
            hist.samples[0].value,
            Value::Histogram { buckets: vec![(1.0, 1), (2.0, 2)], count: 2, sum: 2.0 }
        );

        match &dist.summary().collect().samples[0].value {
            Value::Summary { count, sum, .. } => {
                assert_eq!(*count, 2);
                assert_eq!(*sum, 2.0);
            }
            other => panic!("unexpected value: {:?}", other),
        }

        let result = dist.with_label_values(&["a"]).map(|_| ());
        assert!(matches!(result, Err(Error::LabelCardinality { expected: 3, actual: 1, .. })));
    }

    #[test]
    fn test_register_both_halves() {
        let dist = Distribution::new(&opts(), None, None).expect("distribution");
        let catalogue = Catalogue::new();
        dist.register(&catalogue).expect("registered");

        assert_eq!(catalogue.len(), 2);
        assert!(catalogue.contains("foobar_foo_hist"));
        assert!(catalogue.contains("foobar_foo_sum"));
    }

    #[test]
    fn test_register_is_not_transactional() {
        let dist = Distribution::new(&opts(), None, None).expect("distribution");
        let squatter = Distribution::new(&opts(), None, None).expect("distribution");
        let catalogue = Catalogue::new();
        catalogue.register(squatter.summary().collector()).expect("registered");

        assert_eq!(
            dist.register(&catalogue),
            Err(Error::DuplicateMetric { name: "foobar_foo_sum".to_string() })
        );
        // The histogram went in before the summary collided.
        assert_eq!(catalogue.len(), 2);
        assert!(catalogue.contains("foobar_foo_hist"));
    }
}
