//! The catalogue that registered metrics are claimed in.
use std::sync::{Arc, Weak};

use indexmap::IndexMap;
use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::common::{Descriptor, Error};
use crate::instrument::{Collector, MetricFamily};

/// A place metrics can be registered with.
///
/// This is the only outward call the registration engine makes. Implementations decide what
/// counts as a duplicate; they must claim names atomically if they are shared across threads.
pub trait Registerer {
    /// Registers the given collector.
    ///
    /// ## Errors
    ///
    /// Returns [`Error::DuplicateMetric`] if the collector's name has already been claimed.
    fn register(&self, collector: Arc<dyn Collector>) -> Result<(), Error>;
}

struct Entry {
    descriptor: Descriptor,
    collector: Weak<dyn Collector>,
}

/// An in-memory catalogue of registered metrics.
///
/// Metrics are keyed by their fully-qualified name, compared case-sensitively. Any attempt to
/// register a name that is already claimed fails, regardless of kind, help text or labels.
///
/// The catalogue never owns the metrics registered in it: it holds weak references, and metrics
/// that have been dropped are skipped when gathering. Their names stay claimed.
///
/// Typically one catalogue is created at process start and shared with everything that registers
/// metrics. Tests create a fresh one per test.
#[derive(Default)]
pub struct Catalogue {
    entries: RwLock<IndexMap<String, Entry>>,
}

impl Catalogue {
    /// Creates an empty [`Catalogue`].
    pub fn new() -> Catalogue {
        Catalogue::default()
    }

    /// Returns `true` if the given fully-qualified name has been claimed.
    pub fn contains(&self, fq_name: &str) -> bool {
        self.entries.read().contains_key(fq_name)
    }

    /// Gets the number of claimed names.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns `true` if nothing has been registered.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Gets the descriptors of every registered metric, in registration order.
    pub fn descriptors(&self) -> Vec<Descriptor> {
        self.entries.read().values().map(|entry| entry.descriptor.clone()).collect()
    }

    /// Collects every registered metric that is still alive, in registration order.
    pub fn gather(&self) -> Vec<MetricFamily> {
        self.entries
            .read()
            .values()
            .filter_map(|entry| entry.collector.upgrade())
            .map(|collector| collector.collect())
            .collect()
    }
}

impl Registerer for Catalogue {
    fn register(&self, collector: Arc<dyn Collector>) -> Result<(), Error> {
        let descriptor = collector.descriptor().clone();
        let fq_name = descriptor.fq_name();

        let mut entries = self.entries.write();
        if entries.contains_key(&fq_name) {
            warn!(metric = %fq_name, "metric is already registered");
            return Err(Error::DuplicateMetric { name: fq_name });
        }

        debug!(metric = %fq_name, kind = %descriptor.kind(), "registered metric");
        let collector = Arc::downgrade(&collector);
        entries.insert(fq_name, Entry { descriptor, collector });

        Ok(())
    }
}
