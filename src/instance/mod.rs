//! Discovered cloud resources and the cache that keeps a bounded-staleness view of them.
use std::borrow::Borrow;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::Namespace;
use crate::error::BoxError;

mod cache;
mod error;

pub use cache::InstanceCache;
pub use error::{Error, Result};

/// The maximum allowed length for an [`InstanceID`].
const INSTANCE_ID_MAX_LEN: usize = 255;

/// A validated instance identifier.
///
/// # Examples
///
/// ```
/// # use cloudmon_collector::instance::InstanceID;
/// let id = InstanceID::new("i-2ze1f0c9b5").unwrap();
/// assert_eq!(id.as_ref(), "i-2ze1f0c9b5");
/// assert!(InstanceID::new("").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceID(Arc<str>);

impl InstanceID {
    /// Creates a new `InstanceID` from the given raw id.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInstanceID`] if the id is empty or longer than
    /// [`INSTANCE_ID_MAX_LEN`] bytes.
    pub fn new(src: impl AsRef<str>) -> Result<Self> {
        let src = src.as_ref();
        if src.is_empty() || src.len() > INSTANCE_ID_MAX_LEN {
            return Err(Error::InvalidInstanceID(src.to_owned()));
        }

        Ok(Self(src.into()))
    }
}

impl AsRef<str> for InstanceID {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for InstanceID {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InstanceID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl serde::Serialize for InstanceID {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

/// One monitorable resource of a product, as returned by an [`InstanceRepository`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instance {
    id: InstanceID,
    attributes: HashMap<String, String>,
}

impl Instance {
    pub fn new(id: InstanceID) -> Self {
        Self {
            id,
            attributes: HashMap::default(),
        }
    }

    /// Adds a free-form attribute (e.g. `region`, `name`) used when resolving series.
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn id(&self) -> &InstanceID {
        &self.id
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    pub fn attributes(&self) -> &HashMap<String, String> {
        &self.attributes
    }
}

/// Lists the live instances of a product namespace.
pub trait InstanceRepository: Send + Sync + 'static {
    fn list(
        &self,
        namespace: &Namespace,
    ) -> impl std::future::Future<Output = std::result::Result<Vec<Instance>, BoxError>> + Send;
}

impl<T: InstanceRepository> InstanceRepository for Arc<T> {
    fn list(
        &self,
        namespace: &Namespace,
    ) -> impl std::future::Future<Output = std::result::Result<Vec<Instance>, BoxError>> + Send
    {
        T::list(self, namespace)
    }
}
