//! Unit-of-work boundaries and the connection capability handed to data-access code

use crate::binding::UnitOfWork;
use crate::errors::PoolResult;
use crate::registry::PoolRegistry;
use crate::resource::ResourceFactory;

use async_trait::async_trait;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// A boxed future borrowing from its caller for `'a`
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Something that can hand out a connection for a key.
///
/// Data-access code is written against this trait and receives the current
/// unit of work, so it never reaches into the pools directly.
#[async_trait]
pub trait ConnectionProvider: Send {
    type Key: Send + Sync;
    type Connection: Send;

    async fn connection(&mut self, key: &Self::Key) -> PoolResult<&mut Self::Connection>;
}

#[async_trait]
impl<F: ResourceFactory> ConnectionProvider for UnitOfWork<F> {
    type Key = F::Key;
    type Connection = F::Resource;

    async fn connection(&mut self, key: &F::Key) -> PoolResult<&mut F::Resource> {
        self.get(key).await
    }
}

/// Called by the host at the start and end of every unit of work
///
/// # Examples
///
/// ```
/// use async_trait::async_trait;
/// use esox_connpool::{
///     BoxError, ConnectionProvider, LifecycleAdapter, PoolConfiguration, PoolRegistry, Resource,
///     ResourceFactory,
/// };
/// use std::sync::Arc;
///
/// struct Conn(u32);
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
///     async fn create(&self, _key: &Self::Key) -> Result<Conn, BoxError> {
///         Ok(Conn(7))
///     }
/// }
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let registry = Arc::new(PoolRegistry::new(Factory, PoolConfiguration::default()).unwrap());
/// let adapter = LifecycleAdapter::new(Arc::clone(&registry));
///
/// let value = adapter
///     .run(|unit| Box::pin(async move { unit.connection(&"db").await.map(|conn| conn.0) }))
///     .await
///     .unwrap();
///
/// assert_eq!(value, 7);
/// assert_eq!(registry.pool(&"db").idle_count(), 1);
/// # }
/// ```
pub struct LifecycleAdapter<F: ResourceFactory> {
    registry: Arc<PoolRegistry<F>>,
}

impl<F: ResourceFactory> Clone for LifecycleAdapter<F> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
        }
    }
}

impl<F: ResourceFactory> LifecycleAdapter<F> {
    pub fn new(registry: Arc<PoolRegistry<F>>) -> Self {
        Self { registry }
    }

    /// Start a unit of work. The caller must `finish` it (or drop it).
    pub fn begin(&self) -> UnitOfWork<F> {
        UnitOfWork::new(Arc::clone(&self.registry))
    }

    /// Run `work` inside a fresh unit of work and finish it afterwards,
    /// whatever the work returned.
    pub async fn run<T, W>(&self, work: W) -> T
    where
        W: for<'a> FnOnce(&'a mut UnitOfWork<F>) -> BoxFuture<'a, T>,
    {
        let mut unit = self.begin();
        let output = work(&mut unit).await;
        unit.finish();
        output
    }

    /// End-of-work hook for hosts that manage the unit of work themselves.
    pub fn finish(&self, unit: &mut UnitOfWork<F>) {
        unit.finish();
    }

    pub fn registry(&self) -> &Arc<PoolRegistry<F>> {
        &self.registry
    }
}
