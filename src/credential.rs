use std::pin::Pin;

use crate::Namespace;
use crate::error::BoxError;

pub type RefreshFuture<'a> = Pin<Box<dyn Future<Output = Result<(), BoxError>> + Send + 'a>>;

/// Refreshes the credentials and project context discovery runs with.
///
/// Called at the start of every reload cycle. A failure does not stop the cycle.
pub trait ProjectRefresher: Send + Sync {
    fn refresh<'a>(&'a self, namespace: &'a Namespace) -> RefreshFuture<'a>;
}
