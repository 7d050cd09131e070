//! Exporter and per-product configuration.
//!
//! The configuration is a JSON document listing one entry per product namespace:
//!
//! ```json
//! {
//!   "products": [
//!     { "namespace": "KEC", "exclude_metrics": ["cpu.idle"], "multi_dimension": true }
//!   ]
//! }
//! ```
//!
//! Omitted settings take the defaults documented on [`ProductConfig`].
use std::collections::HashSet;
use std::path::Path;
use std::str::FromStr;

use crate::Namespace;

mod error;
mod product;

pub use error::{Error, Result};
pub use product::{
    DEFAULT_MAX_INSTANCES, DEFAULT_PERIOD_SECONDS, DEFAULT_QUERY_BATCH_SIZE,
    DEFAULT_RELOAD_INTERVAL_MINUTES, ProductConfig,
};

#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Deserialize)]
pub struct ExporterConfig {
    #[serde(default)]
    products: Vec<ProductConfig>,
}

impl ExporterConfig {
    /// Builds a validated config from already constructed product configs.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateProduct`] or [`Error::InvalidProduct`] if validation fails.
    pub fn new(products: Vec<ProductConfig>) -> Result<Self> {
        let config = Self { products };
        config.validate()?;
        Ok(config)
    }

    /// Reads and validates a JSON config file.
    ///
    /// # Errors
    ///
    /// * [`Error::Read`] if the file cannot be read.
    /// * [`Error::Parse`] if the content is not a valid config document.
    /// * [`Error::DuplicateProduct`] or [`Error::InvalidProduct`] if validation fails.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| Error::Read {
            path: path.to_path_buf(),
            source,
        })?;
        log::debug!("Loaded config file `{}`", path.display());
        raw.parse()
    }

    pub fn products(&self) -> &[ProductConfig] {
        &self.products
    }

    /// Returns the config of the given product.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ProductNotFound`] if no product with this namespace is configured.
    pub fn get_product_config(&self, namespace: &Namespace) -> Result<&ProductConfig> {
        self.products
            .iter()
            .find(|p| &p.namespace == namespace)
            .ok_or_else(|| Error::ProductNotFound(namespace.clone()))
    }

    fn validate(&self) -> Result<()> {
        let mut seen = HashSet::with_capacity(self.products.len());
        for product in &self.products {
            if !seen.insert(&product.namespace) {
                return Err(Error::DuplicateProduct(product.namespace.clone()));
            }
            product.validate()?;
        }
        Ok(())
    }
}

impl FromStr for ExporterConfig {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let config: ExporterConfig = serde_json::from_str(s).map_err(Error::Parse)?;
        config.validate()?;
        Ok(config)
    }
}
