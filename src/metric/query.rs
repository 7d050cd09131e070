use std::sync::Arc;

use super::Metric;

/// The unit of batching: one metric and the repository its samples are fetched from.
#[derive(Debug)]
pub struct Query<M> {
    metric: Arc<Metric>,
    repository: Arc<M>,
}

impl<M> Query<M> {
    pub fn new(metric: Arc<Metric>, repository: Arc<M>) -> Self {
        Self { metric, repository }
    }

    pub fn metric(&self) -> &Arc<Metric> {
        &self.metric
    }

    pub fn repository(&self) -> &Arc<M> {
        &self.repository
    }
}

impl<M> Clone for Query<M> {
    fn clone(&self) -> Self {
        Self {
            metric: Arc::clone(&self.metric),
            repository: Arc::clone(&self.repository),
        }
    }
}

/// Ordered queries of one collection cycle.
#[derive(Debug)]
pub struct QuerySet<M> {
    queries: Vec<Query<M>>,
}

impl<M> Default for QuerySet<M> {
    fn default() -> Self {
        Self {
            queries: Vec::default(),
        }
    }
}

impl<M> QuerySet<M> {
    pub fn new(queries: Vec<Query<M>>) -> Self {
        Self { queries }
    }

    /// Builds the query set of a cycle started at `cycle_start` (UNIX seconds).
    ///
    /// Metrics not loaded within the recency window of the cycle start are left out.
    pub fn from_metrics(metrics: Vec<Arc<Metric>>, repository: &Arc<M>, cycle_start: u64) -> Self {
        let queries = metrics
            .into_iter()
            .filter(|m| m.is_fresh(cycle_start))
            .map(|m| Query::new(m, Arc::clone(repository)))
            .collect();
        Self { queries }
    }

    /// Splits the queries into consecutive batches of at most `size` queries.
    ///
    /// Only the last batch may be shorter. A `size` of zero is treated as one.
    ///
    /// # Examples
    ///
    /// ```
    /// # use cloudmon_collector::metric::QuerySet;
    /// let set: QuerySet<()> = QuerySet::default();
    /// assert!(set.split_by_batch(10).is_empty());
    /// ```
    pub fn split_by_batch(&self, size: usize) -> Vec<&[Query<M>]> {
        self.queries.chunks(size.max(1)).collect()
    }

    pub fn len(&self) -> usize {
        self.queries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Query<M>> {
        self.queries.iter()
    }

    /// Total number of series across all queried metrics.
    pub fn series_count(&self) -> usize {
        self.queries.iter().map(|q| q.metric.series_count()).sum()
    }
}
