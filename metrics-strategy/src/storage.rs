//! Per-label-set storage backing each instrument family.
//!
//! Counters and gauges are plain atomics. Bucketing and quantile estimation are delegated to
//! `metrics-util`; the cells here only guard that storage and snapshot it on collection.
use std::sync::{atomic::Ordering, Arc};

use metrics::{atomics::AtomicU64, CounterFn, GaugeFn, HistogramFn};
use metrics_util::{
    parse_quantiles,
    storage::{Histogram, Summary},
    Quantile,
};
use parking_lot::Mutex;

use crate::common::Error;

/// Histogram buckets used when none are supplied, tailored to request latencies in seconds.
pub const DEFAULT_BUCKETS: &[f64] = &[0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0];

/// Summary quantiles used when no objectives are supplied.
pub const DEFAULT_QUANTILES: &[f64] = &[0.0, 0.5, 0.9, 0.95, 0.99, 0.999, 1.0];

// Matches `Summary::with_defaults`, which is what we fall back to without objectives.
const SUMMARY_MAX_BUCKETS: u32 = 32_768;
const SUMMARY_MIN_VALUE: f64 = 1.0e-9;

/// A summary quantile together with the error tolerated when estimating it.
///
/// Errors are not tracked per quantile: every quantile of a summary is estimated by one sketch,
/// whose relative accuracy is the smallest error among its objectives. Loosening the error of one
/// quantile therefore has no effect while another objective asks for more.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Objective {
    /// Quantile rank, between 0.0 and 1.0 inclusive.
    pub quantile: f64,
    /// Tolerated relative error, strictly between 0.0 and 1.0.
    pub error: f64,
}

impl Objective {
    /// Creates a new [`Objective`].
    pub fn new(quantile: f64, error: f64) -> Objective {
        Objective { quantile, error }
    }
}

/// Point-in-time value of a single labelled child.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    /// Counter total.
    Counter(u64),
    /// Gauge value.
    Gauge(f64),
    /// Cumulative bucket counts, as `(upper bound, count)` pairs.
    Histogram {
        /// Bucket bounds and the number of samples less than or equal to each bound.
        buckets: Vec<(f64, u64)>,
        /// Number of samples.
        count: u64,
        /// Sum of all samples.
        sum: f64,
    },
    /// Estimated quantiles.
    ///
    /// Quantiles of an empty summary are `NaN`.
    Summary {
        /// Quantiles and their estimated values.
        quantiles: Vec<(Quantile, f64)>,
        /// Number of samples.
        count: u64,
        /// Sum of all samples.
        sum: f64,
    },
}

/// Storage for one labelled child of a family.
pub(crate) trait Cell: Send + Sync + 'static {
    /// Kind-specific parameters shared by every child of a family.
    type Params: Send + Sync + 'static;

    fn create(params: &Self::Params) -> Self;

    fn value(&self) -> Value;
}

pub(crate) struct CounterCell(AtomicU64);

impl Cell for CounterCell {
    type Params = ();

    fn create(_: &()) -> Self {
        CounterCell(AtomicU64::new(0))
    }

    fn value(&self) -> Value {
        Value::Counter(self.0.load(Ordering::Acquire))
    }
}

impl CounterFn for CounterCell {
    fn increment(&self, value: u64) {
        CounterFn::increment(&self.0, value);
    }

    fn absolute(&self, value: u64) {
        CounterFn::absolute(&self.0, value);
    }
}

pub(crate) struct GaugeCell(AtomicU64);

impl Cell for GaugeCell {
    type Params = ();

    fn create(_: &()) -> Self {
        GaugeCell(AtomicU64::new(0.0f64.to_bits()))
    }

    fn value(&self) -> Value {
        Value::Gauge(f64::from_bits(self.0.load(Ordering::Acquire)))
    }
}

impl GaugeFn for GaugeCell {
    fn increment(&self, value: f64) {
        GaugeFn::increment(&self.0, value);
    }

    fn decrement(&self, value: f64) {
        GaugeFn::decrement(&self.0, value);
    }

    fn set(&self, value: f64) {
        GaugeFn::set(&self.0, value);
    }
}

pub(crate) struct BucketCell {
    inner: Mutex<Histogram>,
}

impl Cell for BucketCell {
    /// Empty histogram cloned into every new child.
    type Params = Histogram;

    fn create(params: &Histogram) -> Self {
        BucketCell { inner: Mutex::new(params.clone()) }
    }

    fn value(&self) -> Value {
        let hist = self.inner.lock();
        Value::Histogram { buckets: hist.buckets(), count: hist.count(), sum: hist.sum() }
    }
}

impl HistogramFn for BucketCell {
    fn record(&self, value: f64) {
        self.inner.lock().record(value);
    }
}

/// Builds the empty histogram every child of a family starts from.
///
/// Bounds must be non-empty, free of NaN and strictly increasing.
pub(crate) fn histogram_params(name: &str, buckets: &[f64]) -> Result<Histogram, Error> {
    let failed = |reason: &str| Error::ConstructionFailed {
        name: name.to_string(),
        reason: reason.to_string(),
    };

    if buckets.iter().any(|bound| bound.is_nan()) {
        return Err(failed("bucket bounds must not be NaN"));
    }
    if buckets.windows(2).any(|pair| pair[0] >= pair[1]) {
        return Err(failed("bucket bounds must be strictly increasing"));
    }

    Histogram::new(buckets).ok_or_else(|| failed("histograms need at least one bucket"))
}

pub(crate) struct SummaryParams {
    quantiles: Arc<Vec<Quantile>>,
    alpha: Option<f64>,
}

impl SummaryParams {
    pub(crate) fn quantiles(&self) -> &[Quantile] {
        &self.quantiles
    }
}

/// Resolves summary objectives into the quantiles to report and the sketch accuracy.
///
/// Without objectives, the default quantiles are reported at the default accuracy. With
/// objectives, the tightest error among them becomes the sketch's relative accuracy.
pub(crate) fn summary_params(
    name: &str,
    objectives: Option<&[Objective]>,
) -> Result<SummaryParams, Error> {
    let objectives = match objectives {
        None => {
            return Ok(SummaryParams {
                quantiles: Arc::new(parse_quantiles(DEFAULT_QUANTILES)),
                alpha: None,
            })
        }
        Some(objectives) => objectives,
    };

    for objective in objectives {
        if !(0.0..=1.0).contains(&objective.quantile) {
            return Err(Error::ConstructionFailed {
                name: name.to_string(),
                reason: format!("quantile {} is outside of [0, 1]", objective.quantile),
            });
        }
        if !(objective.error > 0.0 && objective.error < 1.0) {
            return Err(Error::ConstructionFailed {
                name: name.to_string(),
                reason: format!("error {} is outside of (0, 1)", objective.error),
            });
        }
    }

    let quantiles = objectives.iter().map(|o| Quantile::new(o.quantile)).collect();
    let alpha = objectives.iter().map(|o| o.error).reduce(f64::min);

    Ok(SummaryParams { quantiles: Arc::new(quantiles), alpha })
}

struct SummaryState {
    sketch: Summary,
    count: u64,
    sum: f64,
}

pub(crate) struct SummaryCell {
    quantiles: Arc<Vec<Quantile>>,
    state: Mutex<SummaryState>,
}

impl Cell for SummaryCell {
    type Params = SummaryParams;

    fn create(params: &SummaryParams) -> Self {
        let sketch = match params.alpha {
            Some(alpha) => Summary::new(alpha, SUMMARY_MAX_BUCKETS, SUMMARY_MIN_VALUE),
            None => Summary::with_defaults(),
        };

        SummaryCell {
            quantiles: params.quantiles.clone(),
            state: Mutex::new(SummaryState { sketch, count: 0, sum: 0.0 }),
        }
    }

    fn value(&self) -> Value {
        let state = self.state.lock();
        let quantiles = self
            .quantiles
            .iter()
            .map(|q| (q.clone(), state.sketch.quantile(q.value()).unwrap_or(f64::NAN)))
            .collect();

        Value::Summary { quantiles, count: state.count, sum: state.sum }
    }
}

impl HistogramFn for SummaryCell {
    fn record(&self, value: f64) {
        let mut state = self.state.lock();
        state.sketch.add(value);
        state.count += 1;
        state.sum += value;
    }
}
