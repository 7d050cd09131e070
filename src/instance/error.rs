use crate::Namespace;
use crate::error::BoxError;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid instance id: `{0}`")]
    InvalidInstanceID(String),
    #[error("failed to list instances: namespace={namespace}: {source}")]
    List {
        namespace: Namespace,
        #[source]
        source: BoxError,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
