//! Collaborator traits implemented by the host

use crate::errors::BoxError;
use async_trait::async_trait;
use std::fmt::Debug;
use std::hash::Hash;

/// A pooled handle to an expensive backend connection
pub trait Resource: Sized + Send + 'static {
    /// Allow the handle to be used by a task other than the one that created it.
    ///
    /// Called once, right after creation and before the resource can be pooled.
    fn mark_transferable(&mut self) {}

    /// Whether the resource is still usable. Checked every time it is reused.
    fn is_valid(&self) -> bool;

    /// Close the underlying connection.
    fn close(self) -> Result<(), BoxError> {
        Ok(())
    }
}

/// Creates resources for a key on demand
///
/// # Examples
///
/// ```
/// use async_trait::async_trait;
/// use esox_connpool::{BoxError, Resource, ResourceFactory};
///
/// struct Conn(String);
///
/// impl Resource for Conn {
///     fn is_valid(&self) -> bool {
///         true
///     }
/// }
///
/// struct Factory;
///
/// #[async_trait]
/// impl ResourceFactory for Factory {
///     type Key = &'static str;
///     type Resource = Conn;
///
///     async fn create(&self, key: &Self::Key) -> Result<Conn, BoxError> {
///         Ok(Conn(format!("connected to {key}")))
///     }
/// }
/// ```
#[async_trait]
pub trait ResourceFactory: Send + Sync + 'static {
    /// Identifies a backend configuration; each key gets its own pool
    type Key: Clone + Eq + Hash + Debug + Send + Sync + 'static;

    type Resource: Resource;

    async fn create(&self, key: &Self::Key) -> Result<Self::Resource, BoxError>;
}
