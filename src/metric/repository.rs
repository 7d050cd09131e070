use std::collections::BTreeMap;

use crate::Namespace;
use crate::error::BoxError;
use crate::instance::InstanceID;

use super::{MetricMeta, Query};

/// A sample ready to be published to the consumer.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct Sample {
    pub name: String,
    pub labels: BTreeMap<String, String>,
    pub value: f64,
    /// Sample time in UNIX milliseconds, if the API reported one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp_ms: Option<i64>,
}

impl Sample {
    pub fn new(name: impl Into<String>, value: f64) -> Self {
        Self {
            name: name.into(),
            labels: BTreeMap::default(),
            value,
            timestamp_ms: None,
        }
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    pub fn with_timestamp_ms(mut self, timestamp_ms: i64) -> Self {
        self.timestamp_ms = Some(timestamp_ms);
        self
    }

    /// Adds every label of `labels` the sample does not carry yet.
    pub fn with_default_labels(mut self, labels: &BTreeMap<String, String>) -> Self {
        for (key, value) in labels {
            self.labels
                .entry(key.clone())
                .or_insert_with(|| value.clone());
        }
        self
    }
}

/// The remote monitoring API of a product.
///
/// Implementations own timeouts and retries; the collector never cancels a call.
pub trait MetricRepository: Send + Sync + Sized + 'static {
    /// Lists the metrics available for one instance.
    fn list_metrics(
        &self,
        namespace: &Namespace,
        instance_id: &InstanceID,
    ) -> impl std::future::Future<Output = Result<Vec<MetricMeta>, BoxError>> + Send;

    /// Fetches the latest samples of every series of the given queries in one request.
    fn fetch_batch(
        &self,
        queries: &[Query<Self>],
    ) -> impl std::future::Future<Output = Result<Vec<Sample>, BoxError>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_serializes_without_missing_timestamp() {
        let sample = Sample::new("cpu.util", 0.5).with_label("instance_id", "i-1");
        let json = serde_json::to_value(&sample).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"name": "cpu.util", "labels": {"instance_id": "i-1"}, "value": 0.5})
        );

        let json = serde_json::to_value(sample.with_timestamp_ms(1_700_000_000_000)).unwrap();
        assert_eq!(json["timestamp_ms"], 1_700_000_000_000_i64);
    }

    #[test]
    fn test_default_labels_do_not_override_reported_ones() {
        let defaults = BTreeMap::from([
            ("env".to_owned(), "prod".to_owned()),
            ("region".to_owned(), "cn-beijing-6".to_owned()),
        ]);
        let sample = Sample::new("cpu.util", 0.5)
            .with_label("region", "cn-shanghai-2")
            .with_default_labels(&defaults);

        assert_eq!(sample.labels["env"], "prod");
        assert_eq!(sample.labels["region"], "cn-shanghai-2");
    }
}
