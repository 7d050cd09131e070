//! Collection across all configured products.
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};

use crate::Namespace;
use crate::collector::{self, CollectorReloader, ProductCollector};
use crate::config::ExporterConfig;
use crate::credential::ProjectRefresher;
use crate::error::BoxError;
use crate::handler::Handlers;
use crate::instance::InstanceRepository;
use crate::metric::{MetricRepository, Sample};

/// Owns one [`ProductCollector`] per configured product and their reloaders.
pub struct Exporter<I, M> {
    collectors: Vec<Arc<ProductCollector<I, M>>>,
    reloaders: Vec<(CollectorReloader<I, M>, JoinHandle<()>)>,
}

impl<I, M> Exporter<I, M>
where
    I: InstanceRepository,
    M: MetricRepository,
{
    /// Builds a collector for every product in `config`.
    ///
    /// `instance_repo` creates the instance repository of a namespace.
    ///
    /// # Errors
    ///
    /// Returns the first structural error of any product; collectors built so far are
    /// closed again.
    pub async fn new<F>(
        config: Arc<ExporterConfig>,
        handlers: &Handlers,
        metric_repo: Arc<M>,
        mut instance_repo: F,
        refresher: Option<Arc<dyn ProjectRefresher>>,
    ) -> collector::Result<Self>
    where
        F: FnMut(&Namespace) -> Result<I, BoxError>,
    {
        let mut collectors = Vec::with_capacity(config.products().len());
        for product in config.products() {
            let namespace = product.namespace.clone();
            let built = match instance_repo(&namespace) {
                Ok(repo) => {
                    let mut builder = ProductCollector::builder(
                        namespace,
                        Arc::clone(&config),
                        Arc::clone(&metric_repo),
                        repo,
                    )
                    .handlers(handlers);
                    if let Some(refresher) = &refresher {
                        builder = builder.refresher(Arc::clone(refresher));
                    }
                    builder.build().await
                }
                Err(source) => Err(collector::Error::InstanceRepository { namespace, source }),
            };
            match built {
                Ok(collector) => collectors.push(collector),
                Err(err) => {
                    collectors.iter().for_each(|c| c.close());
                    return Err(err);
                }
            }
        }
        log::info!("created product collectors: count={}", collectors.len());

        Ok(Self {
            collectors,
            reloaders: Vec::default(),
        })
    }

    pub fn collectors(&self) -> &[Arc<ProductCollector<I, M>>] {
        &self.collectors
    }

    /// Starts one reloader per product using the product's reload interval.
    ///
    /// Does nothing if the reloaders are already running.
    pub fn start(&mut self) -> collector::Result<()> {
        if !self.reloaders.is_empty() {
            return Ok(());
        }
        for collector in &self.collectors {
            let interval = collector.reload_interval()?;
            let reloader = collector.reloader(interval);
            if let Some(handle) = reloader.start() {
                self.reloaders.push((reloader, handle));
            }
        }
        Ok(())
    }

    /// Collects every product concurrently and returns the number of samples sent to `sink`.
    pub async fn collect(&self, sink: &mpsc::Sender<Sample>) -> usize {
        let mut tasks = JoinSet::new();
        for collector in &self.collectors {
            let collector = Arc::clone(collector);
            let sink = sink.clone();
            tasks.spawn(async move { collector.collect(&sink).await });
        }

        let mut emitted = 0;
        while let Some(res) = tasks.join_next().await {
            match res {
                Ok(sent) => emitted += sent,
                Err(err) => log::error!("product collection task failed: {}", err),
            }
        }
        emitted
    }

    /// Stops all reloaders and instance refreshers and waits for the reloaders to exit.
    pub async fn shutdown(&mut self) {
        for collector in &self.collectors {
            collector.close();
        }
        for (reloader, handle) in self.reloaders.drain(..) {
            reloader.stop();
            if let Err(err) = handle.await {
                log::error!("reloader task failed: {}", err);
            }
        }
        log::info!("exporter stopped");
    }
}
