use std::borrow::Borrow;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Error returned when a namespace string is rejected.
#[derive(Debug, thiserror::Error)]
#[error("invalid namespace: `{0}`")]
pub struct InvalidNamespace(pub String);

/// Identifier of a cloud product whose telemetry is collected, e.g. `KEC` or `KS3`.
///
/// Cloning is cheap; the name is shared.
///
/// # Examples
///
/// ```
/// # use cloudmon_collector::Namespace;
/// let ns = Namespace::new("KEC").unwrap();
/// assert_eq!(ns.as_ref(), "KEC");
/// assert!(Namespace::new("  ").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Namespace(Arc<str>);

impl Namespace {
    /// Creates a namespace from a non-blank name. Surrounding whitespace is trimmed.
    pub fn new(src: impl AsRef<str>) -> Result<Self, InvalidNamespace> {
        let src = src.as_ref().trim();
        if src.is_empty() {
            return Err(InvalidNamespace(src.to_owned()));
        }
        Ok(Self(src.into()))
    }
}

impl FromStr for Namespace {
    type Err = InvalidNamespace;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl AsRef<str> for Namespace {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for Namespace {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> serde::Deserialize<'de> for Namespace {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Namespace::new(raw).map_err(serde::de::Error::custom)
    }
}

impl serde::Serialize for Namespace {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}
