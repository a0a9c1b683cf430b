//! Composable metric strategies, registered with a single call.
//!
//! A *strategy* is a plain struct grouping related, labelled instruments: counters, gauges,
//! histograms and summaries, or other strategies. The whole group is registered with a
//! [`Registerer`] in one call, under one naming policy and one failure model.
//!
//! Three well-known strategies are provided:
//!
//! - [`Red`]: rate, errors and duration of a request-handling service.
//! - [`Use`]: utilization, saturation and errors of a resource.
//! - [`FourGoldenSignals`]: latency, traffic, errors and saturation of a user-facing system.
//!
//! Durations and latencies are recorded through a [`Distribution`], which exposes one logical
//! measurement as both a bucketed histogram (`<name>_hist`) and a quantile-estimating summary
//! (`<name>_sum`).
//!
//! ## Registering a strategy
//!
//! ```
//! use metrics_strategy::{Catalogue, Red, RedDurationOpts, RedErrorsOpts, RedOpts, RedRequestsOpts, Strategy};
//!
//! let red = Red::new(RedOpts {
//!     namespace: "api".to_string(),
//!     requests: RedRequestsOpts {
//!         request_type: "http".to_string(),
//!         labels: vec!["path".to_string()],
//!         ..Default::default()
//!     },
//!     errors: RedErrorsOpts { labels: vec!["path".to_string()], ..Default::default() },
//!     duration: RedDurationOpts { labels: vec!["path".to_string()], ..Default::default() },
//! })?;
//!
//! let catalogue = Catalogue::new();
//! red.register(&catalogue)?;
//! assert!(catalogue.contains("api_http_requests_total"));
//! assert!(catalogue.contains("api_http_request_duration_seconds_hist"));
//!
//! red.requests().with_label_values(&["/login"])?.increment(1);
//! red.duration().with_label_values(&["/login"])?.record(0.042);
//! # Ok::<(), metrics_strategy::Error>(())
//! ```
//!
//! ## Failure model
//!
//! Options are validated before anything is built, so a missing field is reported as
//! [`Error::ConfigInvalid`] without touching the catalogue. Registration, however, is **not
//! transactional**: if a field fails to register, the fields registered before it stay
//! registered. Strategies are meant to be registered once, at startup, with any error treated as
//! fatal.
#![deny(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg), deny(rustdoc::broken_intra_doc_links))]

mod common;
pub use self::common::{Descriptor, Error, MetricKind, MetricOpts, Validate};

mod storage;
pub use self::storage::{Objective, Value, DEFAULT_BUCKETS, DEFAULT_QUANTILES};

mod instrument;
pub use self::instrument::{
    new_counter, new_gauge, new_histogram, new_summary, Collector, CounterVec, GaugeVec,
    HistogramVec, MetricFamily, Sample, SummaryVec,
};

mod catalogue;
pub use self::catalogue::{Catalogue, Registerer};

pub mod strategy;
pub use self::strategy::{
    register_collectors, register_fields, Distribution, Field, FourGoldenSignals,
    FourGoldenSignalsOpts, GoldenErrorsOpts, LatencyOpts, Member, Red, RedDurationOpts,
    RedErrorsOpts, RedOpts, RedRequestsOpts, SaturationOpts, Strategy, TrafficOpts, Use,
    UseErrorsOpts, UseOpts, UseSaturationOpts, UseUtilizationOpts,
};

pub use metrics_util::Quantile;

#[cfg(test)]
mod test_util;
