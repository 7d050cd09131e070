use std::slice;
use std::sync::{Arc, PoisonError, RwLock};

use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::Namespace;
use crate::config::{ExporterConfig, ProductConfig};
use crate::credential::ProjectRefresher;
use crate::error::ResultOkLogExt;
use crate::handler::{Handlers, SeriesResolver};
use crate::instance::{Instance, InstanceCache, InstanceID, InstanceRepository};
use crate::metric::{
    self, Metric, MetricConfig, MetricFilter, MetricKey, MetricMeta, MetricRegistry,
    MetricRepository, QuerySet, Sample,
};

use super::{CollectorReloader, Error, Result};

/// Collects the metrics of one product namespace.
///
/// A reload cycle ([`load_metrics_by_product_conf`]) discovers instances and their
/// metrics, updates the metric registry and publishes a fresh [`QuerySet`]. A scrape
/// ([`collect`]) fetches the samples of the last published query set.
///
/// [`load_metrics_by_product_conf`]: ProductCollector::load_metrics_by_product_conf
/// [`collect`]: ProductCollector::collect
pub struct ProductCollector<I, M> {
    namespace: Namespace,
    config: Arc<ExporterConfig>,
    batch_size: usize,
    metric_repo: Arc<M>,
    instances: Arc<InstanceCache<I>>,
    resolver: Box<dyn SeriesResolver>,
    refresher: Option<Arc<dyn ProjectRefresher>>,
    registry: MetricRegistry,
    queries: RwLock<Arc<QuerySet<M>>>,
    reload_lock: Mutex<()>,
    shutdown: CancellationToken,
}

impl<I, M> ProductCollector<I, M>
where
    I: InstanceRepository,
    M: MetricRepository,
{
    pub fn builder(
        namespace: Namespace,
        config: Arc<ExporterConfig>,
        metric_repo: Arc<M>,
        instance_repo: I,
    ) -> ProductCollectorBuilder<I, M> {
        ProductCollectorBuilder {
            namespace,
            config,
            metric_repo,
            instance_repo,
            handlers: Handlers::default(),
            refresher: None,
        }
    }

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    pub fn registry(&self) -> &MetricRegistry {
        &self.registry
    }

    pub fn instances(&self) -> &InstanceCache<I> {
        &self.instances
    }

    /// Returns the query set published by the last completed reload cycle.
    pub fn queries(&self) -> Arc<QuerySet<M>> {
        Arc::clone(&self.queries.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Returns the reload interval of the product.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the product is no longer configured.
    pub fn reload_interval(&self) -> Result<std::time::Duration> {
        Ok(self
            .config
            .get_product_config(&self.namespace)?
            .reload_interval())
    }

    /// Creates a reloader re-running [`load_metrics_by_product_conf`] every `interval`.
    ///
    /// The reloader also stops when the collector is closed.
    ///
    /// [`load_metrics_by_product_conf`]: ProductCollector::load_metrics_by_product_conf
    pub fn reloader(self: &Arc<Self>, interval: std::time::Duration) -> CollectorReloader<I, M> {
        CollectorReloader::new(Arc::clone(self), interval, self.shutdown.child_token())
    }

    /// Stops the instance cache refresher and every reloader of this collector.
    pub fn close(&self) {
        self.shutdown.cancel();
    }

    /// Runs one reload cycle: discovery, metric construction and query materialization.
    ///
    /// Failures of single instances or metrics are logged and skipped. Cycles of one
    /// collector never overlap; a call made during a running cycle waits for it.
    ///
    /// # Errors
    ///
    /// * [`Error::Config`] if the product is no longer configured.
    /// * [`Error::Instances`] if no instance listing is available.
    pub async fn load_metrics_by_product_conf(&self) -> Result<()> {
        let _cycle = self.reload_lock.lock().await;
        let cycle_start = metric::unix_now();
        log::info!("start loading metrics: namespace={}", self.namespace);

        let product = self.config.get_product_config(&self.namespace)?;
        self.refresh_project_context().await;

        let instances = self.instances.list().await?;
        let instances = self.limit_instances(product, &instances);

        let filter = MetricFilter::from_product(product);
        for instance in instances {
            self.load_instance_metrics(product, &filter, instance).await;
        }

        let queries =
            QuerySet::from_metrics(self.registry.snapshot(), &self.metric_repo, cycle_start);
        log::info!(
            "initialized queries: namespace={}, metrics={}, queries={}, series={}",
            self.namespace,
            self.registry.len(),
            queries.len(),
            queries.series_count()
        );
        *self.queries.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(queries);
        Ok(())
    }

    /// Fetches the samples of the current query set and sends them to `sink`.
    ///
    /// Every batch is fetched by its own task. A failed batch is logged and adds no
    /// samples; the other batches are unaffected. Samples get the labels of their
    /// metric's config unless the repository already set them. Returns once all
    /// batches finished, with the number of samples sent.
    pub async fn collect(&self, sink: &mpsc::Sender<Sample>) -> usize {
        let queries = self.queries();
        let mut tasks = JoinSet::new();

        for batch in queries.split_by_batch(self.batch_size) {
            let Some(repository) = batch.first().map(|q| Arc::clone(q.repository())) else {
                continue;
            };
            let batch = batch.to_vec();
            let sink = sink.clone();
            let namespace = self.namespace.clone();

            tasks.spawn(async move {
                let samples = match repository.fetch_batch(&batch).await {
                    Ok(samples) => samples,
                    Err(source) => {
                        log::error!(
                            "{}",
                            Error::FetchBatch {
                                namespace,
                                queries: batch.len(),
                                source,
                            }
                        );
                        return 0;
                    }
                };
                let mut sent = 0;
                for sample in samples {
                    let labels = batch
                        .iter()
                        .find(|q| q.metric().name() == sample.name)
                        .map(|q| q.metric().config().labels());
                    let sample = match labels {
                        Some(labels) => sample.with_default_labels(labels),
                        None => sample,
                    };
                    if sink.send(sample).await.is_err() {
                        log::warn!("sample sink closed: namespace={}", namespace);
                        break;
                    }
                    sent += 1;
                }
                sent
            });
        }

        let mut emitted = 0;
        while let Some(res) = tasks.join_next().await {
            match res {
                Ok(sent) => emitted += sent,
                Err(source) => log::error!(
                    "{}",
                    Error::BatchTask {
                        namespace: self.namespace.clone(),
                        source,
                    }
                ),
            }
        }
        log::debug!(
            "collected samples: namespace={}, samples={}",
            self.namespace,
            emitted
        );
        emitted
    }

    async fn refresh_project_context(&self) {
        let Some(refresher) = &self.refresher else {
            return;
        };
        if let Err(source) = refresher.refresh(&self.namespace).await {
            log::warn!(
                "{}",
                Error::ProjectRefresh {
                    namespace: self.namespace.clone(),
                    source,
                }
            );
        }
    }

    /// Bounds the instances of a multi-dimension product to the configured maximum,
    /// keeping the first ones in listing order.
    fn limit_instances<'a>(
        &self,
        product: &ProductConfig,
        instances: &'a [Instance],
    ) -> &'a [Instance] {
        match product.instance_limit() {
            Some(max) if instances.len() > max => {
                log::warn!(
                    "loaded instances exceed the maximum of a single product: namespace={}, instances={}, only_load_instances={}",
                    self.namespace,
                    instances.len(),
                    max
                );
                &instances[..max]
            }
            _ => instances,
        }
    }

    async fn load_instance_metrics(
        &self,
        product: &ProductConfig,
        filter: &MetricFilter,
        instance: &Instance,
    ) {
        let metas = match self
            .metric_repo
            .list_metrics(&self.namespace, instance.id())
            .await
        {
            Ok(metas) => metas,
            Err(source) => {
                log::warn!(
                    "{}",
                    Error::ListMetrics {
                        namespace: self.namespace.clone(),
                        instance_id: instance.id().clone(),
                        source,
                    }
                );
                return;
            }
        };

        for meta in metas.iter().filter(|meta| filter.allows(&meta.name)) {
            let Some(metric) = self
                .metric_for(product, meta, instance.id())
                .ok_log_at(log::Level::Warn)
            else {
                continue;
            };

            let series = self
                .resolver
                .resolve_series(&metric, slice::from_ref(instance))
                .map_err(|source| Error::ResolveSeries {
                    namespace: self.namespace.clone(),
                    metric: metric.key().clone(),
                    source,
                })
                .ok_log();
            let Some(series) = series else {
                continue;
            };
            log::trace!(
                "resolved series: namespace={}, metric={}, count={}",
                self.namespace,
                metric.key(),
                series.len()
            );

            metric
                .load_series(series)
                .map_err(|source| Error::LoadSeries {
                    namespace: self.namespace.clone(),
                    source,
                })
                .ok_log();
        }
    }

    /// Returns the registered metric of (`meta.name`, `instance_id`), creating it on first sight.
    fn metric_for(
        &self,
        product: &ProductConfig,
        meta: &MetricMeta,
        instance_id: &InstanceID,
    ) -> Result<Arc<Metric>> {
        let key = MetricKey::new(&meta.name, instance_id.clone());
        let (metric, created) = self
            .registry
            .get_or_try_insert_with(key, || {
                let config = MetricConfig::from_product(product, meta)?;
                Metric::new(meta.clone(), instance_id.clone(), config)
            })
            .map_err(|source| Error::CreateMetric {
                namespace: self.namespace.clone(),
                metric: meta.name.clone(),
                instance_id: instance_id.clone(),
                source,
            })?;
        if created {
            log::debug!(
                "created metric: namespace={}, metric={}",
                self.namespace,
                metric.key()
            );
        }
        Ok(metric)
    }
}

impl<I, M> Drop for ProductCollector<I, M> {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// Builds a [`ProductCollector`] and runs its first reload cycle.
pub struct ProductCollectorBuilder<I, M> {
    namespace: Namespace,
    config: Arc<ExporterConfig>,
    metric_repo: Arc<M>,
    instance_repo: I,
    handlers: Handlers,
    refresher: Option<Arc<dyn ProjectRefresher>>,
}

impl<I, M> ProductCollectorBuilder<I, M>
where
    I: InstanceRepository,
    M: MetricRepository,
{
    /// Sets the handler factories the namespace's series resolver is created from.
    pub fn handlers(mut self, handlers: &Handlers) -> Self {
        self.handlers = handlers.clone();
        self
    }

    pub fn refresher(mut self, refresher: Arc<dyn ProjectRefresher>) -> Self {
        self.refresher = Some(refresher);
        self
    }

    /// Creates the collector, starts its instance cache refresher and runs cycle zero.
    ///
    /// # Errors
    ///
    /// * [`Error::Config`] if the namespace has no product config.
    /// * [`Error::HandlerNotFound`] or [`Error::HandlerInit`] if no resolver can be created.
    /// * Any error of the first [`ProductCollector::load_metrics_by_product_conf`].
    pub async fn build(self) -> Result<Arc<ProductCollector<I, M>>> {
        let product = self.config.get_product_config(&self.namespace)?;
        let factory = self
            .handlers
            .factory(&self.namespace)
            .ok_or_else(|| Error::HandlerNotFound(self.namespace.clone()))?;
        let resolver = factory(&self.namespace, product).map_err(|source| Error::HandlerInit {
            namespace: self.namespace.clone(),
            source,
        })?;
        let batch_size = product.batch_size();

        let instances = Arc::new(InstanceCache::new(
            self.namespace.clone(),
            self.instance_repo,
            product.reload_interval(),
        ));
        let shutdown = CancellationToken::new();
        instances.spawn_refresher(shutdown.child_token());

        let collector = Arc::new(ProductCollector {
            namespace: self.namespace,
            config: self.config,
            batch_size,
            metric_repo: self.metric_repo,
            instances,
            resolver,
            refresher: self.refresher,
            registry: MetricRegistry::default(),
            queries: RwLock::new(Arc::new(QuerySet::default())),
            reload_lock: Mutex::new(()),
            shutdown,
        });
        collector.load_metrics_by_product_conf().await?;
        Ok(collector)
    }
}
