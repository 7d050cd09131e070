/// Cloudmon Collector: collects telemetry of cloud products from a remote monitoring API.
///
/// For every configured product namespace a [`ProductCollector`] periodically discovers
/// the product's instances and the metrics available for them, keeps the series of
/// recently seen metrics cached, and on every scrape fetches their samples in bounded
/// batches. The monitoring and instance APIs are consumed through the
/// [`MetricRepository`] and [`InstanceRepository`] traits, so any transport can be
/// plugged in.
///
/// [`MetricRepository`]: metric::MetricRepository
/// [`InstanceRepository`]: instance::InstanceRepository
pub mod collector;
pub mod config;
pub mod credential;
pub mod error;
pub mod exporter;
pub mod handler;
pub mod instance;
pub mod metric;
mod namespace;

#[cfg(test)]
mod testutil;

pub use collector::{CollectorReloader, ProductCollector};
pub use exporter::Exporter;
pub use namespace::{InvalidNamespace, Namespace};
