//! Per-unit-of-work binding of keys to checked-out resources

use crate::errors::{PoolError, PoolResult};
use crate::pool::Pool;
use crate::registry::PoolRegistry;
use crate::resource::{Resource, ResourceFactory};

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// The resources one unit of work (e.g. one request) holds, at most one per key
///
/// The first [`get`](UnitOfWork::get) for a key checks a resource out of that
/// key's pool; later calls return the same resource. [`finish`](UnitOfWork::finish)
/// hands everything back. Dropping an unfinished unit of work finishes it.
pub struct UnitOfWork<F: ResourceFactory> {
    registry: Arc<PoolRegistry<F>>,
    bound: HashMap<F::Key, F::Resource>,
}

impl<F: ResourceFactory> UnitOfWork<F> {
    pub fn new(registry: Arc<PoolRegistry<F>>) -> Self {
        Self {
            registry,
            bound: HashMap::new(),
        }
    }

    /// Get the resource bound to `key`, checking one out on first use.
    pub async fn get(&mut self, key: &F::Key) -> PoolResult<&mut F::Resource> {
        match self.bound.entry(key.clone()) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                let pool = self.registry.pool(key);
                let resource = checkout_valid(&pool).await?;
                debug!(key = ?key, "bound resource to unit of work");
                Ok(entry.insert(resource))
            }
        }
    }

    pub fn is_bound(&self, key: &F::Key) -> bool {
        self.bound.contains_key(key)
    }

    pub fn bound_count(&self) -> usize {
        self.bound.len()
    }

    /// Give back the resource bound to `key` before the unit of work ends.
    /// Returns whether anything was bound.
    pub fn release(&mut self, key: &F::Key) -> bool {
        match self.bound.remove(key) {
            Some(resource) => {
                self.registry.pool(key).release(resource);
                true
            }
            None => false,
        }
    }

    /// Release every bound resource to its pool and clear the binding.
    ///
    /// Calling it again releases nothing.
    pub fn finish(&mut self) {
        if self.bound.is_empty() {
            return;
        }
        debug!(count = self.bound.len(), "releasing unit of work resources");
        for (key, resource) in self.bound.drain() {
            self.registry.pool(&key).release(resource);
        }
    }

    pub fn registry(&self) -> &Arc<PoolRegistry<F>> {
        &self.registry
    }
}

impl<F: ResourceFactory> Drop for UnitOfWork<F> {
    fn drop(&mut self) {
        self.finish();
    }
}

/// Check out a resource, validating it if it was reused.
///
/// An invalid reused resource is closed. With `replace_invalid` the caller
/// keeps its slot and gets a freshly created resource; otherwise the slot is
/// freed and the checkout fails.
async fn checkout_valid<F: ResourceFactory>(pool: &Pool<F>) -> PoolResult<F::Resource> {
    let acquired = pool.checkout().await?;
    if !acquired.reused || acquired.resource.is_valid() {
        return Ok(acquired.resource);
    }

    pool.record_validation_failure();
    warn!(key = ?pool.key(), "reused resource failed validation");

    if !pool.config().replace_invalid {
        pool.discard(acquired.resource);
        return Err(PoolError::ResourceInvalid);
    }
    pool.replace(acquired.resource).await.map(|fresh| fresh.resource)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PoolConfiguration;
    use crate::errors::BoxError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    struct Conn {
        id: usize,
        healthy: Arc<AtomicBool>,
    }

    impl Resource for Conn {
        fn is_valid(&self) -> bool {
            self.healthy.load(Ordering::SeqCst)
        }
    }

    #[derive(Default)]
    struct Factory {
        created: AtomicUsize,
    }

    #[async_trait]
    impl ResourceFactory for Factory {
        type Key = &'static str;
        type Resource = Conn;

        async fn create(&self, _key: &Self::Key) -> Result<Conn, BoxError> {
            Ok(Conn {
                id: self.created.fetch_add(1, Ordering::SeqCst) + 1,
                healthy: Arc::new(AtomicBool::new(true)),
            })
        }
    }

    fn registry(config: PoolConfiguration) -> Arc<PoolRegistry<Factory>> {
        Arc::new(PoolRegistry::new(Factory::default(), config).unwrap())
    }

    #[tokio::test]
    async fn test_get_reuses_bound_resource() {
        let registry = registry(PoolConfiguration::default());
        let mut unit = UnitOfWork::new(Arc::clone(&registry));

        let first = unit.get(&"db").await.unwrap().id;
        let second = unit.get(&"db").await.unwrap().id;

        assert_eq!(first, second);
        assert_eq!(registry.pool(&"db").outstanding(), 1);
        assert_eq!(unit.bound_count(), 1);
    }

    #[tokio::test]
    async fn test_one_resource_per_key() {
        let registry = registry(PoolConfiguration::default());
        let mut unit = UnitOfWork::new(Arc::clone(&registry));

        let db = unit.get(&"db").await.unwrap().id;
        let cache = unit.get(&"cache").await.unwrap().id;

        assert_ne!(db, cache);
        assert!(unit.is_bound(&"db"));
        assert!(unit.is_bound(&"cache"));
        assert_eq!(registry.len(), 2);
    }

    #[tokio::test]
    async fn test_finish_is_idempotent() {
        let registry = registry(PoolConfiguration::default());
        let mut unit = UnitOfWork::new(Arc::clone(&registry));
        unit.get(&"db").await.unwrap();

        unit.finish();
        unit.finish();

        let pool = registry.pool(&"db");
        assert_eq!(pool.idle_count(), 1);
        assert_eq!(pool.outstanding(), 0);
        assert_eq!(pool.metrics().total_released, 1);
    }

    #[tokio::test]
    async fn test_early_release() {
        let registry = registry(PoolConfiguration::default());
        let mut unit = UnitOfWork::new(Arc::clone(&registry));
        unit.get(&"db").await.unwrap();

        assert!(unit.release(&"db"));
        assert!(!unit.release(&"db"));
        assert!(!unit.is_bound(&"db"));
        assert_eq!(registry.pool(&"db").idle_count(), 1);
    }

    #[tokio::test]
    async fn test_drop_releases_resources() {
        let registry = registry(PoolConfiguration::default());
        {
            let mut unit = UnitOfWork::new(Arc::clone(&registry));
            unit.get(&"db").await.unwrap();
        }
        assert_eq!(registry.pool(&"db").outstanding(), 0);
        assert_eq!(registry.pool(&"db").idle_count(), 1);
    }

    #[tokio::test]
    async fn test_invalid_reused_resource_replaced() {
        let registry = registry(PoolConfiguration::default());

        let mut unit = UnitOfWork::new(Arc::clone(&registry));
        let healthy = Arc::clone(&unit.get(&"db").await.unwrap().healthy);
        unit.finish();
        healthy.store(false, Ordering::SeqCst);

        let id = unit.get(&"db").await.unwrap().id;
        assert_eq!(id, 2);

        let metrics = registry.pool(&"db").metrics();
        assert_eq!(metrics.validation_failures, 1);
        assert_eq!(metrics.total_closed, 1);
        assert_eq!(metrics.outstanding, 1);
    }

    #[tokio::test]
    async fn test_replacement_keeps_waiter_order() {
        let registry = registry(
            PoolConfiguration::new()
                .with_capacity(1)
                .with_max_outstanding(1)
                .with_timeout(std::time::Duration::from_secs(5)),
        );

        let mut holder = UnitOfWork::new(Arc::clone(&registry));
        let healthy = Arc::clone(&holder.get(&"db").await.unwrap().healthy);
        healthy.store(false, Ordering::SeqCst);

        let pool = registry.pool(&"db");
        let order = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let mut tasks = Vec::new();
        for name in ["first", "second"] {
            let mut unit = UnitOfWork::new(Arc::clone(&registry));
            let order = Arc::clone(&order);
            tasks.push(tokio::spawn(async move {
                let id = unit.get(&"db").await.unwrap().id;
                order.lock().push((name, id));
                unit.finish();
            }));
            while pool.waiting() < tasks.len() {
                tokio::task::yield_now().await;
            }
        }

        holder.finish();
        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(*order.lock(), vec![("first", 2), ("second", 2)]);
        let metrics = pool.metrics();
        assert_eq!(metrics.validation_failures, 1);
        assert_eq!(metrics.total_created, 2);
        assert_eq!(metrics.outstanding, 0);
    }

    #[tokio::test]
    async fn test_invalid_reused_resource_rejected() {
        let registry = registry(PoolConfiguration::new().with_replace_invalid(false));

        let mut unit = UnitOfWork::new(Arc::clone(&registry));
        let healthy = Arc::clone(&unit.get(&"db").await.unwrap().healthy);
        unit.finish();
        healthy.store(false, Ordering::SeqCst);

        let err = unit.get(&"db").await.err();
        assert_eq!(err, Some(PoolError::ResourceInvalid));
        assert!(!unit.is_bound(&"db"));
        assert_eq!(registry.pool(&"db").outstanding(), 0);
    }
}
