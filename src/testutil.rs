//! In-memory repositories for unit tests.
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::Notify;

use crate::Namespace;
use crate::config::ProductConfig;
use crate::credential::{ProjectRefresher, RefreshFuture};
use crate::error::BoxError;
use crate::instance::{Instance, InstanceID, InstanceRepository};
use crate::metric::{Metric, MetricConfig, MetricMeta, MetricRepository, Query, Sample};

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn instance(id: &str) -> Instance {
    Instance::new(InstanceID::new(id).unwrap())
}

pub fn metric(name: &str, instance_id: &str) -> Metric {
    let meta = MetricMeta::new(name);
    let product = ProductConfig::new(Namespace::new("TEST").unwrap());
    let conf = MetricConfig::from_product(&product, &meta).unwrap();
    Metric::new(meta, InstanceID::new(instance_id).unwrap(), conf).unwrap()
}

/// Holds a repository call until the test releases it.
#[derive(Debug, Default)]
pub struct Gate {
    entered: Notify,
    released: Notify,
}

impl Gate {
    /// Waits until a call has reached the gate.
    pub async fn entered(&self) {
        self.entered.notified().await;
    }

    /// Lets one waiting (or the next) call through.
    pub fn release(&self) {
        self.released.notify_one();
    }

    async fn pass(&self) {
        self.entered.notify_one();
        self.released.notified().await;
    }
}

#[derive(Debug, Default)]
pub struct FakeInstanceRepository {
    instances: Mutex<Vec<Instance>>,
    failing: AtomicBool,
    calls: AtomicUsize,
    gate: Mutex<Option<Arc<Gate>>>,
}

impl FakeInstanceRepository {
    pub fn new(instances: Vec<Instance>) -> Self {
        Self {
            instances: Mutex::new(instances),
            ..Self::default()
        }
    }

    pub fn set_instances(&self, instances: Vec<Instance>) {
        *self.instances.lock().unwrap() = instances;
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Makes every following `list` call wait at the returned gate.
    pub fn gate(&self) -> Arc<Gate> {
        let gate = Arc::new(Gate::default());
        *self.gate.lock().unwrap() = Some(Arc::clone(&gate));
        gate
    }
}

impl InstanceRepository for FakeInstanceRepository {
    async fn list(&self, _namespace: &Namespace) -> Result<Vec<Instance>, BoxError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let gate = self.gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.pass().await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err("instance listing unavailable".into());
        }
        Ok(self.instances.lock().unwrap().clone())
    }
}

/// Lists configured metas per instance id and answers every query with one sample per
/// metric, labelled with its instance id.
#[derive(Debug, Default)]
pub struct FakeMetricRepository {
    metas: Mutex<HashMap<String, Vec<MetricMeta>>>,
    failing_listings: Mutex<HashSet<String>>,
    failing_fetches: Mutex<HashSet<String>>,
    listed: Mutex<Vec<String>>,
    batch_sizes: Mutex<Vec<usize>>,
    list_calls: AtomicUsize,
    fetch_calls: AtomicUsize,
    listing_gate: Mutex<Option<Arc<Gate>>>,
}

impl FakeMetricRepository {
    pub fn set_metrics(&self, instance_id: &str, names: &[&str]) {
        self.set_metas(instance_id, names.iter().map(|n| MetricMeta::new(*n)).collect());
    }

    pub fn set_metas(&self, instance_id: &str, metas: Vec<MetricMeta>) {
        self.metas
            .lock()
            .unwrap()
            .insert(instance_id.to_owned(), metas);
    }

    pub fn fail_listing(&self, instance_id: &str) {
        self.failing_listings
            .lock()
            .unwrap()
            .insert(instance_id.to_owned());
    }

    /// Fails every batch containing a query of the named metric.
    pub fn fail_fetch(&self, metric_name: &str) {
        self.failing_fetches
            .lock()
            .unwrap()
            .insert(metric_name.to_owned());
    }

    /// Instance ids successfully listed so far, in call order.
    pub fn listed_instances(&self) -> Vec<String> {
        self.listed.lock().unwrap().clone()
    }

    pub fn batch_sizes(&self) -> Vec<usize> {
        self.batch_sizes.lock().unwrap().clone()
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    /// Makes every following `list_metrics` call wait at the returned gate.
    pub fn gate_listing(&self) -> Arc<Gate> {
        let gate = Arc::new(Gate::default());
        *self.listing_gate.lock().unwrap() = Some(Arc::clone(&gate));
        gate
    }
}

impl MetricRepository for FakeMetricRepository {
    async fn list_metrics(
        &self,
        _namespace: &Namespace,
        instance_id: &InstanceID,
    ) -> Result<Vec<MetricMeta>, BoxError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        let gate = self.listing_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.pass().await;
        }
        if self
            .failing_listings
            .lock()
            .unwrap()
            .contains(instance_id.as_ref())
        {
            return Err(format!("listing failed for {instance_id}").into());
        }
        self.listed
            .lock()
            .unwrap()
            .push(instance_id.as_ref().to_owned());
        Ok(self
            .metas
            .lock()
            .unwrap()
            .get(instance_id.as_ref())
            .cloned()
            .unwrap_or_default())
    }

    async fn fetch_batch(&self, queries: &[Query<Self>]) -> Result<Vec<Sample>, BoxError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        self.batch_sizes.lock().unwrap().push(queries.len());
        let failing = self.failing_fetches.lock().unwrap().clone();
        if queries.iter().any(|q| failing.contains(q.metric().name())) {
            return Err("fetch failed".into());
        }
        Ok(queries
            .iter()
            .map(|q| {
                Sample::new(q.metric().name(), 1.0)
                    .with_label("instance_id", q.metric().instance_id().as_ref())
            })
            .collect())
    }
}

#[derive(Debug, Default)]
pub struct FailingRefresher {
    calls: AtomicUsize,
}

impl FailingRefresher {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ProjectRefresher for FailingRefresher {
    fn refresh<'a>(&'a self, _namespace: &'a Namespace) -> RefreshFuture<'a> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err::<(), BoxError>("project service unavailable".into())
        })
    }
}
