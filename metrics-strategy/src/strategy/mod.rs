//! Strategies: composites of metrics and other strategies, registered with a single call.
//!
//! A strategy lists its members, in declaration order, through [`Strategy::fields`]. Each member
//! reports what it is capable of through [`Member`]: either it is a metric that can be handed to
//! a [`Registerer`], or it is itself a strategy that knows how to register its own members. The
//! registration engine, [`register_fields`], relies on nothing else, so strategies nest to any
//! depth and new ones need no changes to the engine.
//!
//! ```
//! use metrics_strategy::{
//!     new_counter, new_gauge, Catalogue, CounterVec, Field, GaugeVec, Member, MetricOpts,
//!     Strategy,
//! };
//!
//! struct Queue {
//!     enqueued: CounterVec,
//!     depth: GaugeVec,
//! }
//!
//! impl Strategy for Queue {
//!     fn fields(&self) -> Vec<Field<'_>> {
//!         vec![Field::new("enqueued", &self.enqueued), Field::new("depth", &self.depth)]
//!     }
//! }
//!
//! impl Member for Queue {
//!     fn as_strategy(&self) -> Option<&dyn Strategy> {
//!         Some(self)
//!     }
//! }
//!
//! let queue = Queue {
//!     enqueued: new_counter(&MetricOpts::new("jobs", "enqueued_total", "Jobs enqueued", ["queue"]))?,
//!     depth: new_gauge(&MetricOpts::new("jobs", "depth", "Jobs waiting", ["queue"]))?,
//! };
//!
//! let catalogue = Catalogue::new();
//! queue.register(&catalogue)?;
//! assert!(catalogue.contains("jobs_enqueued_total"));
//! assert!(catalogue.contains("jobs_depth"));
//! # Ok::<(), metrics_strategy::Error>(())
//! ```
use std::{fmt, sync::Arc};

use tracing::debug;

use crate::catalogue::Registerer;
use crate::common::Error;
use crate::instrument::{Collector, CounterVec, GaugeVec, HistogramVec, SummaryVec};

mod distribution;
pub use self::distribution::Distribution;

mod golden;
pub use self::golden::{
    FourGoldenSignals, FourGoldenSignalsOpts, GoldenErrorsOpts, LatencyOpts, SaturationOpts,
    TrafficOpts,
};

mod red;
pub use self::red::{Red, RedDurationOpts, RedErrorsOpts, RedOpts, RedRequestsOpts};

mod usage;
pub use self::usage::{Use, UseErrorsOpts, UseOpts, UseSaturationOpts, UseUtilizationOpts};

/// A composite of metrics and nested strategies.
pub trait Strategy {
    /// Gets the members of this strategy, in declaration order.
    fn fields(&self) -> Vec<Field<'_>>;

    /// Registers every metric reachable from this strategy.
    ///
    /// The default implementation defers to [`register_fields`]; see there for the exact
    /// semantics. Registration is **not transactional**: if it fails part way, whatever was
    /// registered before the failing field stays registered.
    ///
    /// ## Errors
    ///
    /// See [`register_fields`].
    fn register(&self, registry: &dyn Registerer) -> Result<(), Error> {
        register_fields(self, registry)
    }
}

/// Capabilities of a strategy member.
///
/// Both methods default to `None`: a type that overrides neither is rejected by the registration
/// engine with [`Error::UnsupportedField`].
pub trait Member {
    /// Gets the collector to register if this member is a metric.
    fn as_collector(&self) -> Option<Arc<dyn Collector>> {
        None
    }

    /// Gets this member as a strategy if it is a composite.
    fn as_strategy(&self) -> Option<&dyn Strategy> {
        None
    }
}

/// A named member of a strategy.
#[derive(Clone, Copy)]
pub struct Field<'a> {
    name: &'static str,
    member: &'a dyn Member,
}

impl<'a> Field<'a> {
    /// Creates a new [`Field`].
    pub fn new(name: &'static str, member: &'a dyn Member) -> Field<'a> {
        Field { name, member }
    }

    /// Gets the field name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Gets the member.
    pub fn member(&self) -> &'a dyn Member {
        self.member
    }
}

impl fmt::Debug for Field<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Field").field("name", &self.name).finish_non_exhaustive()
    }
}

/// Registers every field of a strategy, in declaration order.
///
/// Metrics are handed to `registry` directly; nested strategies are asked to register
/// themselves, and any error they return is propagated unchanged.
///
/// Registration is **not transactional**. Processing stops at the first failing field, and the
/// fields registered before it remain registered: nothing is rolled back. Callers that need all
/// or nothing should treat any error as fatal, which is the typical "register once at startup"
/// usage.
///
/// ## Errors
///
/// - [`Error::EmptyStrategy`] if the strategy has no fields. The registry is not touched.
/// - [`Error::DuplicateMetric`] if the registry already holds one of the metrics.
/// - [`Error::UnsupportedField`] if a field is neither a metric nor a strategy.
/// - Any error returned by a nested strategy.
pub fn register_fields<S>(strategy: &S, registry: &dyn Registerer) -> Result<(), Error>
where
    S: Strategy + ?Sized,
{
    let fields = strategy.fields();
    if fields.is_empty() {
        return Err(Error::EmptyStrategy);
    }

    for field in fields {
        let member = field.member();
        if let Some(collector) = member.as_collector() {
            debug!(field = field.name(), metric = %collector.descriptor().fq_name(), "registering field");
            registry.register(collector)?;
        } else if let Some(nested) = member.as_strategy() {
            debug!(field = field.name(), "registering nested strategy");
            nested.register(registry)?;
        } else {
            return Err(Error::UnsupportedField { field: field.name() });
        }
    }

    Ok(())
}

/// Registers a list of members that do not belong to any strategy, in order.
///
/// Metrics are handed to `registry` directly and strategies register themselves, exactly as
/// [`register_fields`] treats the fields of a strategy. An empty list is not an error. The same
/// failure model applies: processing stops at the first error and nothing is rolled back.
///
/// ## Errors
///
/// - [`Error::DuplicateMetric`] if the registry already holds one of the metrics.
/// - [`Error::UnsupportedMember`] if a member is neither a metric nor a strategy.
/// - Any error returned by a strategy.
pub fn register_collectors(
    registry: &dyn Registerer,
    members: &[&dyn Member],
) -> Result<(), Error> {
    for (index, member) in members.iter().enumerate() {
        if let Some(collector) = member.as_collector() {
            debug!(index, metric = %collector.descriptor().fq_name(), "registering collector");
            registry.register(collector)?;
        } else if let Some(strategy) = member.as_strategy() {
            debug!(index, "registering strategy");
            strategy.register(registry)?;
        } else {
            return Err(Error::UnsupportedMember { index });
        }
    }

    Ok(())
}

macro_rules! collector_member {
    ($($handle:ty),+) => {
        $(
            impl Member for $handle {
                fn as_collector(&self) -> Option<Arc<dyn Collector>> {
                    Some(self.collector())
                }
            }
        )+
    };
}

collector_member!(CounterVec, GaugeVec, HistogramVec, SummaryVec);

macro_rules! strategy_member {
    ($($strategy:ty),+) => {
        $(
            impl Member for $strategy {
                fn as_strategy(&self) -> Option<&dyn Strategy> {
                    Some(self)
                }
            }
        )+
    };
}

strategy_member!(Distribution, Red, Use, FourGoldenSignals);

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use mockall::Sequence;

    use super::{register_collectors, register_fields, Field, Member, Strategy};
    use crate::catalogue::{Catalogue, Registerer};
    use crate::common::{Error, MetricOpts};
    use crate::instrument::{new_counter, new_gauge, Collector, CounterVec, GaugeVec};
    use crate::test_util::MockTestRegisterer;

    fn counter(name: &str) -> CounterVec {
        new_counter(&MetricOpts::new("test", name, "help", ["label"])).expect("counter")
    }

    fn gauge(name: &str) -> GaugeVec {
        new_gauge(&MetricOpts::new("test", name, "help", ["label"])).expect("gauge")
    }

    struct Empty;

    impl Strategy for Empty {
        fn fields(&self) -> Vec<Field<'_>> {
            Vec::new()
        }
    }

    struct Note;

    impl Member for Note {}

    struct WithForeign {
        before: CounterVec,
        note: Note,
        after: CounterVec,
    }

    impl Strategy for WithForeign {
        fn fields(&self) -> Vec<Field<'_>> {
            vec![
                Field::new("before", &self.before),
                Field::new("note", &self.note),
                Field::new("after", &self.after),
            ]
        }
    }

    struct Inner {
        depth: GaugeVec,
        dropped: CounterVec,
    }

    impl Strategy for Inner {
        fn fields(&self) -> Vec<Field<'_>> {
            vec![Field::new("depth", &self.depth), Field::new("dropped", &self.dropped)]
        }
    }

    impl Member for Inner {
        fn as_strategy(&self) -> Option<&dyn Strategy> {
            Some(self)
        }
    }

    struct Outer {
        enqueued: CounterVec,
        inner: Inner,
    }

    impl Strategy for Outer {
        fn fields(&self) -> Vec<Field<'_>> {
            vec![Field::new("enqueued", &self.enqueued), Field::new("inner", &self.inner)]
        }
    }

    fn fq_name_is(name: &'static str) -> impl Fn(&Arc<dyn Collector>) -> bool {
        move |collector| collector.descriptor().fq_name() == name
    }

    #[test]
    fn test_empty_strategy_touches_nothing() {
        let mut registry = MockTestRegisterer::new();
        registry.expect_register().times(0);

        assert_eq!(register_fields(&Empty, &registry), Err(Error::EmptyStrategy));
        assert_eq!(Empty.register(&registry), Err(Error::EmptyStrategy));
    }

    #[test]
    fn test_fields_are_registered_in_order() {
        let outer = Outer {
            enqueued: counter("enqueued_total"),
            inner: Inner { depth: gauge("depth"), dropped: counter("dropped_total") },
        };

        let mut registry = MockTestRegisterer::new();
        let mut seq = Sequence::new();
        for name in ["test_enqueued_total", "test_depth", "test_dropped_total"] {
            registry
                .expect_register()
                .withf(fq_name_is(name))
                .times(1)
                .in_sequence(&mut seq)
                .returning(|_| Ok(()));
        }

        assert_eq!(outer.register(&registry), Ok(()));
    }

    #[test]
    fn test_unsupported_field_is_not_transactional() {
        let strategy = WithForeign { before: counter("before"), note: Note, after: counter("after") };

        let catalogue = Catalogue::new();
        assert_eq!(strategy.register(&catalogue), Err(Error::UnsupportedField { field: "note" }));
        assert!(catalogue.contains("test_before"));
        assert!(!catalogue.contains("test_after"));
    }

    #[test]
    fn test_registry_error_stops_processing() {
        let outer = Outer {
            enqueued: counter("enqueued_total"),
            inner: Inner { depth: gauge("depth"), dropped: counter("dropped_total") },
        };

        let mut registry = MockTestRegisterer::new();
        let mut seq = Sequence::new();
        registry
            .expect_register()
            .withf(fq_name_is("test_enqueued_total"))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        registry
            .expect_register()
            .withf(fq_name_is("test_depth"))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Err(Error::DuplicateMetric { name: "test_depth".to_string() }));

        // `dropped_total` is never offered to the registry.
        assert_eq!(
            outer.register(&registry),
            Err(Error::DuplicateMetric { name: "test_depth".to_string() })
        );
    }

    #[test]
    fn test_nested_registration() {
        let outer = Outer {
            enqueued: counter("enqueued_total"),
            inner: Inner { depth: gauge("depth"), dropped: counter("dropped_total") },
        };

        let catalogue = Catalogue::new();
        outer.register(&catalogue).expect("first registration succeeds");
        assert_eq!(catalogue.len(), 3);

        // Everything is claimed now, so the very first field collides.
        assert_eq!(
            outer.register(&catalogue),
            Err(Error::DuplicateMetric { name: "test_enqueued_total".to_string() })
        );
    }

    #[test]
    fn test_nested_error_is_propagated_unchanged() {
        let catalogue = Catalogue::new();
        let squatter = counter("dropped_total");
        catalogue.register(squatter.collector()).expect("registered");

        let outer = Outer {
            enqueued: counter("enqueued_total"),
            inner: Inner { depth: gauge("depth"), dropped: counter("dropped_total") },
        };

        // The nested strategy's own error reaches the outer caller as is.
        assert_eq!(
            outer.register(&catalogue),
            Err(Error::DuplicateMetric { name: "test_dropped_total".to_string() })
        );
        assert!(catalogue.contains("test_enqueued_total"));
        assert!(catalogue.contains("test_depth"));
    }

    #[test]
    fn test_register_collectors() {
        let requests = counter("requests_total");
        let inner = Inner { depth: gauge("depth"), dropped: counter("dropped_total") };

        let catalogue = Catalogue::new();
        register_collectors(&catalogue, &[&requests, &inner]).expect("registered");
        assert_eq!(catalogue.len(), 3);
        assert!(catalogue.contains("test_requests_total"));
        assert!(catalogue.contains("test_dropped_total"));

        assert_eq!(
            register_collectors(&catalogue, &[&requests]),
            Err(Error::DuplicateMetric { name: "test_requests_total".to_string() })
        );
    }

    #[test]
    fn test_register_collectors_in_order() {
        let first = counter("first_total");
        let second = gauge("second");

        let mut registry = MockTestRegisterer::new();
        let mut seq = Sequence::new();
        for name in ["test_second", "test_first_total"] {
            registry
                .expect_register()
                .withf(fq_name_is(name))
                .times(1)
                .in_sequence(&mut seq)
                .returning(|_| Ok(()));
        }

        assert_eq!(register_collectors(&registry, &[&second, &first]), Ok(()));
    }

    #[test]
    fn test_register_collectors_edge_cases() {
        let mut registry = MockTestRegisterer::new();
        registry.expect_register().times(0);
        assert_eq!(register_collectors(&registry, &[]), Ok(()));

        let before = counter("before");
        let catalogue = Catalogue::new();
        assert_eq!(
            register_collectors(&catalogue, &[&before, &Note]),
            Err(Error::UnsupportedMember { index: 1 })
        );
        assert!(catalogue.contains("test_before"));
    }
}
