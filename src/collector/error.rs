use crate::Namespace;
use crate::error::BoxError;
use crate::instance::InstanceID;
use crate::metric::MetricKey;

/// Errors of product collection.
///
/// Construction and cycle-level structural failures are returned to the caller. The
/// per-instance, per-metric and per-batch variants are only ever logged.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] crate::config::Error),
    #[error(transparent)]
    Instances(#[from] crate::instance::Error),
    #[error("product handler not found: namespace={0}")]
    HandlerNotFound(Namespace),
    #[error("failed to create product handler: namespace={namespace}: {source}")]
    HandlerInit {
        namespace: Namespace,
        #[source]
        source: BoxError,
    },
    #[error("failed to create instance repository: namespace={namespace}: {source}")]
    InstanceRepository {
        namespace: Namespace,
        #[source]
        source: BoxError,
    },
    #[error("failed to refresh project context: namespace={namespace}: {source}")]
    ProjectRefresh {
        namespace: Namespace,
        #[source]
        source: BoxError,
    },
    #[error("failed to list metrics: namespace={namespace}, instance_id={instance_id}: {source}")]
    ListMetrics {
        namespace: Namespace,
        instance_id: InstanceID,
        #[source]
        source: BoxError,
    },
    #[error("failed to create metric: namespace={namespace}, metric={metric}, instance_id={instance_id}: {source}")]
    CreateMetric {
        namespace: Namespace,
        metric: String,
        instance_id: InstanceID,
        #[source]
        source: crate::metric::Error,
    },
    #[error("failed to resolve series: namespace={namespace}, metric={metric}: {source}")]
    ResolveSeries {
        namespace: Namespace,
        metric: MetricKey,
        #[source]
        source: BoxError,
    },
    #[error("failed to load series: namespace={namespace}: {source}")]
    LoadSeries {
        namespace: Namespace,
        #[source]
        source: crate::metric::Error,
    },
    #[error("failed to fetch samples: namespace={namespace}, queries={queries}: {source}")]
    FetchBatch {
        namespace: Namespace,
        queries: usize,
        #[source]
        source: BoxError,
    },
    #[error("batch task failed: namespace={namespace}: {source}")]
    BatchTask {
        namespace: Namespace,
        #[source]
        source: tokio::task::JoinError,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
