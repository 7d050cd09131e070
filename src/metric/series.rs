use std::collections::BTreeMap;
use std::sync::Arc;

use crate::instance::InstanceID;

use super::Metric;

/// One concrete time series of a metric: an instance plus a dimension combination.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Series {
    metric_name: Arc<str>,
    instance_id: InstanceID,
    dimensions: BTreeMap<String, String>,
}

impl Series {
    pub fn new(
        metric_name: impl AsRef<str>,
        instance_id: InstanceID,
        dimensions: BTreeMap<String, String>,
    ) -> Self {
        Self {
            metric_name: metric_name.as_ref().into(),
            instance_id,
            dimensions,
        }
    }

    /// Builds a series of `metric` on the metric's own instance.
    pub fn for_instance<K, V>(metric: &Metric, dimensions: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self::new(
            metric.name(),
            metric.instance_id().clone(),
            dimensions
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    pub fn metric_name(&self) -> &str {
        &self.metric_name
    }

    pub fn instance_id(&self) -> &InstanceID {
        &self.instance_id
    }

    pub fn dimensions(&self) -> &BTreeMap<String, String> {
        &self.dimensions
    }

    /// Stable textual selector, e.g. `cpu.util{instance_id=i-1,cpu=0}`.
    pub fn selector(&self) -> String {
        let mut out = format!("{}{{instance_id={}", self.metric_name, self.instance_id);
        for (k, v) in &self.dimensions {
            if k == "instance_id" {
                continue;
            }
            out.push(',');
            out.push_str(k);
            out.push('=');
            out.push_str(v);
        }
        out.push('}');
        out
    }
}

/// Series resolved for a metric, keyed by selector, and the time they were last loaded.
#[derive(Debug, Default, Clone)]
pub struct SeriesCache {
    series: BTreeMap<String, Series>,
    loaded_at: Option<u64>,
}

impl SeriesCache {
    pub(super) fn extend(&mut self, series: impl IntoIterator<Item = Series>) {
        for s in series {
            self.series.insert(s.selector(), s);
        }
    }

    pub(super) fn set_loaded_at(&mut self, loaded_at: u64) {
        self.loaded_at = Some(loaded_at);
    }

    pub fn loaded_at(&self) -> Option<u64> {
        self.loaded_at
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Series> {
        self.series.values()
    }
}
