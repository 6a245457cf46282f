//! Key to pool mapping shared by every unit of work

use crate::config::PoolConfiguration;
use crate::errors::PoolResult;
use crate::metrics::{MetricsExporter, PoolMetrics};
use crate::pool::Pool;
use crate::resource::ResourceFactory;

use dashmap::DashMap;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Lazily creates one [`Pool`] per key and keeps it for its own lifetime.
///
/// Build it once at startup and share it behind an `Arc`.
pub struct PoolRegistry<F: ResourceFactory> {
    factory: Arc<F>,
    config: RwLock<PoolConfiguration>,
    pools: DashMap<F::Key, Arc<Pool<F>>>,
}

impl<F: ResourceFactory> PoolRegistry<F> {
    pub fn new(factory: F, config: PoolConfiguration) -> PoolResult<Self> {
        Ok(Self {
            factory: Arc::new(factory),
            config: RwLock::new(config.validate()?),
            pools: DashMap::new(),
        })
    }

    /// Get the pool for `key`, creating it with the current configuration.
    pub fn pool(&self, key: &F::Key) -> Arc<Pool<F>> {
        if let Some(pool) = self.pools.get(key) {
            return Arc::clone(pool.value());
        }

        let entry = self.pools.entry(key.clone()).or_insert_with(|| {
            Arc::new(Pool::with_validated(
                key.clone(),
                Arc::clone(&self.factory),
                self.config.read().clone(),
            ))
        });
        Arc::clone(entry.value())
    }

    /// Replace the configuration used for pools created from now on.
    /// Pools that already exist keep the settings they were built with.
    pub fn set_configuration(&self, config: PoolConfiguration) -> PoolResult<()> {
        *self.config.write() = config.validate()?;
        Ok(())
    }

    pub fn configuration(&self) -> PoolConfiguration {
        self.config.read().clone()
    }

    pub fn factory(&self) -> &F {
        &self.factory
    }

    pub fn keys(&self) -> Vec<F::Key> {
        self.pools.iter().map(|entry| entry.key().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.pools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pools.is_empty()
    }

    /// Snapshot every pool's metrics
    pub fn metrics(&self) -> Vec<(F::Key, PoolMetrics)> {
        self.pools
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().metrics()))
            .collect()
    }

    /// Export all pools in Prometheus format, labelled by key
    pub fn export_metrics_prometheus(&self, tags: Option<&HashMap<String, String>>) -> String {
        let mut pools = self.metrics();
        pools.sort_by_cached_key(|(key, _)| format!("{:?}", key));

        pools
            .iter()
            .map(|(key, metrics)| {
                let name = format!("{:?}", key);
                MetricsExporter::export_prometheus(metrics, name.trim_matches('"'), tags)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{BoxError, PoolError};
    use crate::resource::Resource;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct Conn;

    impl Resource for Conn {
        fn is_valid(&self) -> bool {
            true
        }
    }

    #[derive(Default)]
    struct Factory {
        created: AtomicUsize,
    }

    #[async_trait]
    impl ResourceFactory for Factory {
        type Key = String;
        type Resource = Conn;

        async fn create(&self, _key: &String) -> Result<Conn, BoxError> {
            self.created.fetch_add(1, Ordering::SeqCst);
            Ok(Conn)
        }
    }

    #[test]
    fn test_invalid_configuration_rejected() {
        let result = PoolRegistry::new(Factory::default(), PoolConfiguration::new().with_capacity(0));
        assert!(matches!(result, Err(PoolError::InvalidConfiguration(_))));
    }

    #[test]
    fn test_pool_created_once_per_key() {
        let registry = PoolRegistry::new(Factory::default(), PoolConfiguration::default()).unwrap();
        let first = registry.pool(&"db".to_string());
        let again = registry.pool(&"db".to_string());
        let other = registry.pool(&"cache".to_string());

        assert!(Arc::ptr_eq(&first, &again));
        assert!(!Arc::ptr_eq(&first, &other));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_concurrent_first_access_yields_one_pool() {
        let registry = Arc::new(PoolRegistry::new(Factory::default(), PoolConfiguration::default()).unwrap());

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || registry.pool(&"db".to_string()))
            })
            .collect();
        let pools: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert!(pools.windows(2).all(|pair| Arc::ptr_eq(&pair[0], &pair[1])));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_reconfiguration_applies_to_new_pools() {
        let registry = PoolRegistry::new(Factory::default(), PoolConfiguration::default()).unwrap();
        let before = registry.pool(&"db".to_string());

        registry
            .set_configuration(PoolConfiguration::new().with_capacity(4).with_timeout(Duration::from_secs(1)))
            .unwrap();
        let after = registry.pool(&"cache".to_string());

        assert_eq!(before.config().capacity, 1);
        assert_eq!(after.config().capacity, 4);
        assert!(registry.set_configuration(PoolConfiguration::new().with_capacity(0)).is_err());
        assert_eq!(registry.configuration().capacity, 4);
    }

    #[tokio::test]
    async fn test_prometheus_export_labels_each_key() {
        let registry = PoolRegistry::new(Factory::default(), PoolConfiguration::default()).unwrap();
        let pool = registry.pool(&"db".to_string());
        let conn = pool.acquire().await.unwrap();
        pool.release(conn);
        registry.pool(&"cache".to_string());

        let output = registry.export_metrics_prometheus(None);
        assert!(output.contains("connpool_idle{pool=\"db\"} 1"));
        assert!(output.contains("connpool_idle{pool=\"cache\"} 0"));
        assert_eq!(registry.factory().created.load(Ordering::SeqCst), 1);
    }
}
