use std::collections::BTreeMap;
use std::time::Duration;

use crate::Namespace;

/// Number of queries sent to the monitoring API in one request.
pub const DEFAULT_QUERY_BATCH_SIZE: usize = 50;

/// Namespaces whose monitoring API accepts fewer queries per request.
const SMALL_BATCH_NAMESPACES: &[(&str, usize)] = &[("KS3", 10)];

/// Upper bound of instances loaded for a multi-dimension product.
pub const DEFAULT_MAX_INSTANCES: usize = 100;

pub const DEFAULT_RELOAD_INTERVAL_MINUTES: u64 = 60;

pub const DEFAULT_PERIOD_SECONDS: u32 = 60;

fn default_reload_interval_minutes() -> u64 {
    DEFAULT_RELOAD_INTERVAL_MINUTES
}

fn default_max_instances() -> usize {
    DEFAULT_MAX_INSTANCES
}

fn default_period_seconds() -> u32 {
    DEFAULT_PERIOD_SECONDS
}

/// Per-product collection settings.
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize)]
pub struct ProductConfig {
    pub namespace: Namespace,
    /// Metric names never collected for this product. Matched case-insensitively.
    #[serde(default)]
    pub exclude_metrics: Vec<String>,
    /// If non-empty, only these metric names are collected. Matched case-insensitively.
    #[serde(default)]
    pub only_include_metrics: Vec<String>,
    #[serde(default = "default_reload_interval_minutes")]
    pub reload_interval_minutes: u64,
    /// Whether the product is monitored across multiple dimensions, which bounds
    /// the number of instances loaded per cycle by `max_instances`.
    #[serde(default)]
    pub multi_dimension: bool,
    #[serde(default = "default_max_instances")]
    pub max_instances: usize,
    #[serde(default)]
    pub batch_size: Option<usize>,
    #[serde(default = "default_period_seconds")]
    pub period_seconds: u32,
    /// Labels attached to every sample of this product.
    #[serde(default)]
    pub extra_labels: BTreeMap<String, String>,
}

impl ProductConfig {
    /// Creates a config with every setting at its default.
    pub fn new(namespace: Namespace) -> Self {
        Self {
            namespace,
            exclude_metrics: Vec::default(),
            only_include_metrics: Vec::default(),
            reload_interval_minutes: DEFAULT_RELOAD_INTERVAL_MINUTES,
            multi_dimension: false,
            max_instances: DEFAULT_MAX_INSTANCES,
            batch_size: None,
            period_seconds: DEFAULT_PERIOD_SECONDS,
            extra_labels: BTreeMap::default(),
        }
    }

    pub fn reload_interval(&self) -> Duration {
        Duration::from_secs(self.reload_interval_minutes.saturating_mul(60))
    }

    /// Returns the configured batch size, or the namespace's API limit.
    ///
    /// # Examples
    ///
    /// ```
    /// # use cloudmon_collector::{Namespace, config::ProductConfig};
    /// let ks3 = ProductConfig::new(Namespace::new("KS3").unwrap());
    /// assert_eq!(ks3.batch_size(), 10);
    /// let kec = ProductConfig::new(Namespace::new("KEC").unwrap());
    /// assert_eq!(kec.batch_size(), 50);
    /// ```
    pub fn batch_size(&self) -> usize {
        self.batch_size.unwrap_or_else(|| {
            SMALL_BATCH_NAMESPACES
                .iter()
                .find(|(ns, _)| *ns == self.namespace.as_ref())
                .map_or(DEFAULT_QUERY_BATCH_SIZE, |(_, size)| *size)
        })
    }

    /// Returns the maximum number of instances processed per cycle, if bounded.
    pub fn instance_limit(&self) -> Option<usize> {
        self.multi_dimension.then_some(self.max_instances)
    }

    pub(super) fn validate(&self) -> super::Result<()> {
        let invalid = |reason| super::Error::InvalidProduct {
            namespace: self.namespace.clone(),
            reason,
        };
        if self.reload_interval_minutes == 0 {
            return Err(invalid("reload_interval_minutes must be greater than 0"));
        }
        if self.max_instances == 0 {
            return Err(invalid("max_instances must be greater than 0"));
        }
        if self.batch_size == Some(0) {
            return Err(invalid("batch_size must be greater than 0"));
        }
        if self.period_seconds == 0 {
            return Err(invalid("period_seconds must be greater than 0"));
        }
        Ok(())
    }
}
