//! Metric model of a product: metadata listed per instance, the metric objects built
//! from it, their resolved series and the queries that fetch their samples.
//!
//! # Key Components
//!
//! - [`Metric`]: a named signal scoped to one instance, identified by [`MetricKey`].
//! - [`MetricRegistry`]: deduplicating store of metrics shared across reload cycles.
//! - [`QuerySet`]: the per-cycle list of [`Query`] values, split into batches on scrape.
//! - [`MetricRepository`]: the consumed monitoring API.
//!
//! A metric counts as fresh while its series were loaded no more than
//! [`RECENCY_WINDOW_SECS`] before the start of the current cycle. Only fresh metrics
//! are queried.
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::config::ProductConfig;
use crate::instance::InstanceID;

mod error;
mod filter;
mod query;
mod registry;
mod repository;
mod series;

pub use error::{Error, Result};
pub use filter::MetricFilter;
pub use query::{Query, QuerySet};
pub use registry::MetricRegistry;
pub use repository::{MetricRepository, Sample};
pub use series::{Series, SeriesCache};

/// Seconds a metric's last load may lag behind the cycle start and still be queried.
pub const RECENCY_WINDOW_SECS: u64 = 60;

/// Current UNIX time in seconds.
pub(crate) fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_secs())
}

/// Identity of a [`Metric`]: the metric name together with the instance it is scoped to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MetricKey {
    name: Arc<str>,
    instance_id: InstanceID,
}

impl MetricKey {
    pub fn new(name: impl AsRef<str>, instance_id: InstanceID) -> Self {
        Self {
            name: name.as_ref().into(),
            instance_id,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn instance_id(&self) -> &InstanceID {
        &self.instance_id
    }
}

impl fmt::Display for MetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.name, self.instance_id)
    }
}

/// Metric metadata as listed by the monitoring API for one instance.
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize)]
pub struct MetricMeta {
    pub name: String,
    #[serde(default)]
    pub unit: String,
    #[serde(default)]
    pub description: String,
    /// Dimension names a series of this metric is selected by.
    #[serde(default)]
    pub dimensions: Vec<String>,
    /// Supported sampling periods in seconds.
    #[serde(default)]
    pub periods: Vec<u32>,
}

impl MetricMeta {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            unit: String::new(),
            description: String::new(),
            dimensions: Vec::default(),
            periods: Vec::default(),
        }
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = unit.into();
        self
    }

    pub fn with_dimensions(mut self, dimensions: &[&str]) -> Self {
        self.dimensions = dimensions.iter().map(|d| (*d).to_owned()).collect();
        self
    }

    pub fn with_periods(mut self, periods: &[u32]) -> Self {
        self.periods = periods.to_vec();
        self
    }
}

/// Collection settings of one metric, derived from its meta and the product config.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricConfig {
    unit: String,
    dimensions: Vec<String>,
    period_seconds: u32,
    labels: BTreeMap<String, String>,
}

impl MetricConfig {
    /// Derives the metric config.
    ///
    /// The product's period is used when the metric supports it (or advertises no
    /// periods at all); otherwise the shortest period the metric supports is used.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPeriod`] if the metric advertises a zero period.
    pub fn from_product(product: &ProductConfig, meta: &MetricMeta) -> Result<Self> {
        if meta.periods.contains(&0) {
            return Err(Error::InvalidPeriod {
                metric: meta.name.clone(),
                period: 0,
            });
        }
        let supported =
            meta.periods.is_empty() || meta.periods.contains(&product.period_seconds);
        let period_seconds = if supported {
            product.period_seconds
        } else {
            meta.periods
                .iter()
                .copied()
                .min()
                .unwrap_or(product.period_seconds)
        };

        Ok(Self {
            unit: meta.unit.clone(),
            dimensions: meta.dimensions.clone(),
            period_seconds,
            labels: product.extra_labels.clone(),
        })
    }

    pub fn unit(&self) -> &str {
        &self.unit
    }

    pub fn dimensions(&self) -> &[String] {
        &self.dimensions
    }

    pub fn period_seconds(&self) -> u32 {
        self.period_seconds
    }

    /// Labels attached to every sample of the metric.
    pub fn labels(&self) -> &BTreeMap<String, String> {
        &self.labels
    }
}

/// A named signal of one instance together with its cache of resolved series.
///
/// Metrics are shared between the registry and the query set of the cycles that
/// include them; the series cache is updated in place on every load.
#[derive(Debug)]
pub struct Metric {
    key: MetricKey,
    meta: MetricMeta,
    config: MetricConfig,
    cache: RwLock<SeriesCache>,
}

impl Metric {
    /// # Errors
    ///
    /// Returns [`Error::InvalidMeta`] if the metric name is blank.
    pub fn new(meta: MetricMeta, instance_id: InstanceID, config: MetricConfig) -> Result<Self> {
        if meta.name.trim().is_empty() {
            return Err(Error::InvalidMeta(format!(
                "empty metric name for instance `{instance_id}`"
            )));
        }
        Ok(Self {
            key: MetricKey::new(&meta.name, instance_id),
            meta,
            config,
            cache: RwLock::new(SeriesCache::default()),
        })
    }

    pub fn key(&self) -> &MetricKey {
        &self.key
    }

    pub fn name(&self) -> &str {
        self.key.name()
    }

    pub fn instance_id(&self) -> &InstanceID {
        self.key.instance_id()
    }

    pub fn meta(&self) -> &MetricMeta {
        &self.meta
    }

    pub fn config(&self) -> &MetricConfig {
        &self.config
    }

    /// Loads resolved series into the cache and stamps the load time with the current time.
    ///
    /// Returns the number of series held after the load.
    pub fn load_series(&self, series: Vec<Series>) -> Result<usize> {
        self.load_series_at(series, unix_now())
    }

    /// Loads resolved series into the cache and stamps the load time with `loaded_at`
    /// (UNIX seconds).
    ///
    /// Series already cached are kept. Nothing is loaded if any series belongs to a
    /// different metric or instance.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SeriesMismatch`] for a series of another metric or instance.
    pub fn load_series_at(&self, series: Vec<Series>, loaded_at: u64) -> Result<usize> {
        if let Some(foreign) = series
            .iter()
            .find(|s| s.metric_name() != self.name() || s.instance_id() != self.instance_id())
        {
            return Err(Error::SeriesMismatch {
                metric: self.key.clone(),
                series: foreign.selector(),
            });
        }

        let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
        cache.extend(series);
        cache.set_loaded_at(loaded_at);
        Ok(cache.len())
    }

    /// UNIX seconds of the last successful load, if any.
    pub fn loaded_at(&self) -> Option<u64> {
        self.cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .loaded_at()
    }

    /// Returns true if the metric was loaded within [`RECENCY_WINDOW_SECS`] of `cycle_start`.
    pub fn is_fresh(&self, cycle_start: u64) -> bool {
        self.loaded_at()
            .is_some_and(|at| cycle_start.saturating_sub(at) <= RECENCY_WINDOW_SECS)
    }

    /// Returns a copy of the cached series, ordered by selector.
    pub fn series(&self) -> Vec<Series> {
        self.cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }

    pub fn series_count(&self) -> usize {
        self.cache.read().unwrap_or_else(PoisonError::into_inner).len()
    }
}
