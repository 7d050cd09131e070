use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use super::{Metric, MetricKey};

/// Deduplicating store of the metrics of one product, keyed by metric name and instance.
///
/// Entries survive reload cycles so a metric seen again keeps its series cache. The map
/// is only locked for the lookup or insert itself.
#[derive(Debug, Default)]
pub struct MetricRegistry {
    metrics: DashMap<MetricKey, Arc<Metric>>,
}

impl MetricRegistry {
    /// Returns the metric stored under `key`, or builds and stores it.
    ///
    /// The returned flag is true if the metric was built by this call. Nothing is stored
    /// when `build` fails.
    ///
    /// # Errors
    ///
    /// Propagates the error returned by `build`.
    pub fn get_or_try_insert_with<E>(
        &self,
        key: MetricKey,
        build: impl FnOnce() -> Result<Metric, E>,
    ) -> Result<(Arc<Metric>, bool), E> {
        match self.metrics.entry(key) {
            Entry::Occupied(entry) => Ok((Arc::clone(entry.get()), false)),
            Entry::Vacant(entry) => {
                let metric = Arc::new(build()?);
                entry.insert(Arc::clone(&metric));
                Ok((metric, true))
            }
        }
    }

    pub fn get(&self, key: &MetricKey) -> Option<Arc<Metric>> {
        self.metrics.get(key).map(|m| Arc::clone(m.value()))
    }

    /// Returns all metrics ordered by key.
    pub fn snapshot(&self) -> Vec<Arc<Metric>> {
        let mut out: Vec<Arc<Metric>> = self
            .metrics
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        out.sort_by(|a, b| a.key().cmp(b.key()));
        out
    }

    pub fn len(&self) -> usize {
        self.metrics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }
}
