use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::Namespace;

use super::{Error, Instance, InstanceRepository, Result};

/// Serves the last instance listing of a namespace and re-lists it on a fixed interval.
///
/// Readers get the current snapshot without waiting for an in-flight refresh. A failed
/// refresh keeps the previous snapshot. Only the very first listing, when nothing is
/// cached yet, reports its failure to the caller.
#[derive(Debug)]
pub struct InstanceCache<R> {
    namespace: Namespace,
    repository: R,
    refresh_interval: Duration,
    snapshot: RwLock<Option<Arc<[Instance]>>>,
}

impl<R: InstanceRepository> InstanceCache<R> {
    pub fn new(namespace: Namespace, repository: R, refresh_interval: Duration) -> Self {
        Self {
            namespace,
            repository,
            // `tokio::time::interval` rejects a zero period
            refresh_interval: refresh_interval.max(Duration::from_millis(1)),
            snapshot: RwLock::new(None),
        }
    }

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    /// Returns the cached instances, listing them first if nothing has been cached yet.
    ///
    /// # Errors
    ///
    /// Returns [`Error::List`] if the cache is empty and the initial listing fails.
    pub async fn list(&self) -> Result<Arc<[Instance]>> {
        if let Some(snapshot) = self.current() {
            return Ok(snapshot);
        }
        self.refresh().await
    }

    /// Returns the current snapshot, if any listing has succeeded so far.
    pub fn current(&self) -> Option<Arc<[Instance]>> {
        self.snapshot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Re-lists the instances and replaces the snapshot.
    ///
    /// The listing runs without holding the snapshot lock; the previous snapshot stays
    /// in place when it fails.
    ///
    /// # Errors
    ///
    /// Returns [`Error::List`] if the repository fails.
    pub async fn refresh(&self) -> Result<Arc<[Instance]>> {
        let instances = self
            .repository
            .list(&self.namespace)
            .await
            .map_err(|source| Error::List {
                namespace: self.namespace.clone(),
                source,
            })?;
        let snapshot: Arc<[Instance]> = instances.into();
        *self.snapshot.write().unwrap_or_else(PoisonError::into_inner) =
            Some(Arc::clone(&snapshot));
        log::debug!(
            "refreshed instance cache: namespace={}, count={}",
            self.namespace,
            snapshot.len()
        );
        Ok(snapshot)
    }

    /// Spawns the periodic refresh loop. The loop exits once `token` is cancelled.
    pub fn spawn_refresher(self: &Arc<Self>, token: CancellationToken) -> JoinHandle<()> {
        let cache = Arc::clone(self);
        tokio::spawn(async move { cache.run_refresher(token).await })
    }

    async fn run_refresher(&self, token: CancellationToken) {
        let mut ticker = tokio::time::interval_at(
            Instant::now() + self.refresh_interval,
            self.refresh_interval,
        );
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                _ = ticker.tick() => {}
            }
            if let Err(err) = self.refresh().await {
                log::warn!("keeping previous instance snapshot: {}", err);
            }
        }
        log::debug!("instance cache refresher stopped: namespace={}", self.namespace);
    }
}
