use std::path::PathBuf;

use crate::Namespace;

/// Errors that may occur while loading or querying the exporter configuration.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to read config file `{path}`: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[source] serde_json::Error),
    #[error("duplicate product config: namespace={0}")]
    DuplicateProduct(Namespace),
    #[error("invalid product config: namespace={namespace}: {reason}")]
    InvalidProduct {
        namespace: Namespace,
        reason: &'static str,
    },
    #[error("product config not found: namespace={0}")]
    ProductNotFound(Namespace),
}

pub type Result<T> = std::result::Result<T, Error>;
