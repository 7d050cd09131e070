//! Product collection: reload cycles that discover instances and metrics, and scrapes
//! that fetch the samples of the discovered metrics.
//!
//! # Key Components
//!
//! - [`ProductCollector`]: owns the metric registry and query set of one namespace.
//! - [`CollectorReloader`]: background task re-running the reload cycle on an interval.
//!
//! # Error Handling
//!
//! Only structural failures (missing product config or handler, no instance listing
//! available) are returned. Failures of a single instance, metric or batch are logged
//! with their namespace, instance and metric and the rest of the work continues.
mod error;
mod product;
mod reloader;

pub use error::{Error, Result};
pub use product::{ProductCollector, ProductCollectorBuilder};
pub use reloader::CollectorReloader;
