//! Per-namespace series resolution.
//!
//! Every product namespace needs a [`SeriesResolver`] that turns a metric and the
//! instances it applies to into concrete series. Resolvers are created by the
//! [`HandlerFactory`] registered for the namespace in [`Handlers`].
use std::collections::BTreeMap;
use std::collections::HashMap;

use crate::Namespace;
use crate::config::ProductConfig;
use crate::error::BoxError;
use crate::instance::{Instance, InstanceID};
use crate::metric::{Metric, Series};

/// Dimension name that always maps to the instance id.
pub const INSTANCE_ID_DIMENSION: &str = "instance_id";

/// Resolves the series of a metric for a set of instances.
pub trait SeriesResolver: Send + Sync {
    fn resolve_series(&self, metric: &Metric, instances: &[Instance])
    -> Result<Vec<Series>, BoxError>;
}

/// Creates the resolver of a namespace.
pub type HandlerFactory =
    fn(&Namespace, &ProductConfig) -> Result<Box<dyn SeriesResolver>, BoxError>;

/// Registry of handler factories keyed by namespace.
#[derive(Debug, Clone, Default)]
pub struct Handlers {
    factories: HashMap<Namespace, HandlerFactory>,
    fallback: Option<HandlerFactory>,
}

impl Handlers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, namespace: Namespace, factory: HandlerFactory) -> &mut Self {
        self.factories.insert(namespace, factory);
        self
    }

    /// Sets the factory used for namespaces without a registered one.
    pub fn with_fallback(mut self, factory: HandlerFactory) -> Self {
        self.fallback = Some(factory);
        self
    }

    pub fn factory(&self, namespace: &Namespace) -> Option<HandlerFactory> {
        self.factories.get(namespace).copied().or(self.fallback)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("instance `{instance_id}` has no value for dimension `{dimension}`")]
    MissingDimension {
        instance_id: InstanceID,
        dimension: String,
    },
}

/// Resolves one series per instance, filling each dimension from the instance attributes.
///
/// The `instance_id` dimension is always present and taken from the instance id.
#[derive(Debug, Default, Clone, Copy)]
pub struct InstanceSeriesResolver;

impl InstanceSeriesResolver {
    /// [`HandlerFactory`] producing an [`InstanceSeriesResolver`].
    pub fn factory(
        _namespace: &Namespace,
        _product: &ProductConfig,
    ) -> Result<Box<dyn SeriesResolver>, BoxError> {
        Ok(Box::new(InstanceSeriesResolver))
    }
}

impl SeriesResolver for InstanceSeriesResolver {
    fn resolve_series(
        &self,
        metric: &Metric,
        instances: &[Instance],
    ) -> Result<Vec<Series>, BoxError> {
        let mut out = Vec::with_capacity(instances.len());
        for instance in instances {
            let mut dimensions = BTreeMap::new();
            dimensions.insert(
                INSTANCE_ID_DIMENSION.to_owned(),
                instance.id().as_ref().to_owned(),
            );
            for dimension in metric.config().dimensions() {
                if dimension == INSTANCE_ID_DIMENSION {
                    continue;
                }
                let value = instance.attribute(dimension).ok_or_else(|| {
                    ResolveError::MissingDimension {
                        instance_id: instance.id().clone(),
                        dimension: dimension.clone(),
                    }
                })?;
                dimensions.insert(dimension.clone(), value.to_owned());
            }
            out.push(Series::new(metric.name(), instance.id().clone(), dimensions));
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metric::{MetricConfig, MetricMeta};
    use crate::testutil::instance;

    fn metric_with_dimensions(dimensions: &[&str]) -> Metric {
        let meta = MetricMeta::new("net.in").with_dimensions(dimensions);
        let product = ProductConfig::new(Namespace::new("EIP").unwrap());
        let conf = MetricConfig::from_product(&product, &meta).unwrap();
        Metric::new(meta, InstanceID::new("eip-1").unwrap(), conf).unwrap()
    }

    #[test]
    fn test_factory_lookup_with_fallback() {
        let ns = Namespace::new("EIP").unwrap();
        let mut handlers = Handlers::new();
        assert!(handlers.factory(&ns).is_none());

        handlers.register(ns.clone(), InstanceSeriesResolver::factory);
        assert!(handlers.factory(&ns).is_some());

        let handlers = Handlers::new().with_fallback(InstanceSeriesResolver::factory);
        assert!(handlers.factory(&Namespace::new("SLB").unwrap()).is_some());
    }

    #[test]
    fn test_resolve_fills_dimensions_from_attributes() {
        let metric = metric_with_dimensions(&["instance_id", "region"]);
        let instances = [instance("eip-1").with_attribute("region", "cn-shanghai-2")];

        let series = InstanceSeriesResolver
            .resolve_series(&metric, &instances)
            .unwrap();
        assert_eq!(series.len(), 1);
        assert_eq!(
            series[0].selector(),
            "net.in{instance_id=eip-1,region=cn-shanghai-2}"
        );
    }

    #[test]
    fn test_resolve_fails_on_missing_dimension() {
        let metric = metric_with_dimensions(&["region"]);
        let err = InstanceSeriesResolver
            .resolve_series(&metric, &[instance("eip-1")])
            .unwrap_err();
        let err = err.downcast_ref::<ResolveError>().unwrap();
        assert!(matches!(
            err,
            ResolveError::MissingDimension { dimension, .. } if dimension == "region"
        ));
    }
}
