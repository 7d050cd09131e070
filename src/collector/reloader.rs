use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::instance::InstanceRepository;
use crate::metric::MetricRepository;

use super::ProductCollector;

/// Re-runs the reload cycle of a [`ProductCollector`] on a fixed interval.
///
/// The first reload happens one full interval after [`start`](Self::start); the cycle run
/// while building the collector counts as the initial one. Stopping never interrupts a
/// running reload, it only prevents the next one.
pub struct CollectorReloader<I, M> {
    collector: Arc<ProductCollector<I, M>>,
    interval: Duration,
    token: CancellationToken,
    started: AtomicBool,
}

impl<I, M> CollectorReloader<I, M>
where
    I: InstanceRepository,
    M: MetricRepository,
{
    pub(super) fn new(
        collector: Arc<ProductCollector<I, M>>,
        interval: Duration,
        token: CancellationToken,
    ) -> Self {
        Self {
            collector,
            // `tokio::time::interval` rejects a zero period
            interval: interval.max(Duration::from_millis(1)),
            token,
            started: AtomicBool::new(false),
        }
    }

    /// Spawns the reload loop.
    ///
    /// Returns `None` if the loop was already started.
    pub fn start(&self) -> Option<JoinHandle<()>> {
        if self.started.swap(true, Ordering::SeqCst) {
            log::warn!(
                "reloader already started: namespace={}",
                self.collector.namespace()
            );
            return None;
        }
        let collector = Arc::clone(&self.collector);
        let token = self.token.clone();
        let interval = self.interval;
        log::info!(
            "starting reloader: namespace={}, interval={:?}",
            collector.namespace(),
            interval
        );
        Some(tokio::spawn(run(collector, interval, token)))
    }

    /// Requests the reload loop to stop. Calling it again has no effect.
    pub fn stop(&self) {
        if !self.token.is_cancelled() {
            log::info!("stopping reloader: namespace={}", self.collector.namespace());
        }
        self.token.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.token.is_cancelled()
    }
}

async fn run<I, M>(
    collector: Arc<ProductCollector<I, M>>,
    interval: Duration,
    token: CancellationToken,
) where
    I: InstanceRepository,
    M: MetricRepository,
{
    let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => break,
            _ = ticker.tick() => {}
        }

        log::info!("start reload product metadata: namespace={}", collector.namespace());
        if let Err(err) = collector.load_metrics_by_product_conf().await {
            log::error!(
                "reload product failed: namespace={}: {}",
                collector.namespace(),
                err
            );
        }
        log::info!("complete reload product metadata: namespace={}", collector.namespace());

        if token.is_cancelled() {
            break;
        }
    }
    log::info!("reloader stopped: namespace={}", collector.namespace());
}
