//! Advanced features: validation policies, reconfiguration, metrics export

use async_trait::async_trait;
use esox_connpool::{
    BoxError, PoolConfiguration, PoolError, PoolRegistry, PrometheusCollector, Resource, ResourceFactory, UnitOfWork,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

#[derive(Debug)]
struct Connection {
    id: usize,
    alive: Arc<AtomicBool>,
}

impl Resource for Connection {
    fn is_valid(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }
}

#[derive(Default)]
struct Backend {
    next_id: AtomicUsize,
}

#[async_trait]
impl ResourceFactory for Backend {
    type Key = String;
    type Resource = Connection;

    async fn create(&self, _key: &String) -> Result<Connection, BoxError> {
        Ok(Connection {
            id: self.next_id.fetch_add(1, Ordering::Relaxed) + 1,
            alive: Arc::new(AtomicBool::new(true)),
        })
    }
}

#[tokio::main]
async fn main() {
    println!("=== EsoxSolutions.ConnectionPool - Advanced Features ===\n");

    // Example 1: Replacing a dead connection
    replace_invalid().await;

    // Example 2: Rejecting a dead connection
    reject_invalid().await;

    // Example 3: Reconfiguration for new keys
    reconfiguration();

    // Example 4: Prometheus metrics
    prometheus_export().await;
}

async fn kill_pooled_connection(registry: &Arc<PoolRegistry<Backend>>, key: &String) {
    let mut unit = UnitOfWork::new(Arc::clone(registry));
    let alive = Arc::clone(&unit.get(key).await.unwrap().alive);
    unit.finish();
    alive.store(false, Ordering::SeqCst);
}

async fn replace_invalid() {
    println!("1. Replace Invalid Connections:");
    let registry = Arc::new(PoolRegistry::new(Backend::default(), PoolConfiguration::default()).unwrap());
    let key = "primary".to_string();
    kill_pooled_connection(&registry, &key).await;

    let mut unit = UnitOfWork::new(Arc::clone(&registry));
    let conn = unit.get(&key).await.unwrap();
    println!("   Got replacement connection {}", conn.id);
    println!(
        "   Validation failures: {}",
        registry.pool(&key).metrics().validation_failures
    );
    println!();
}

async fn reject_invalid() {
    println!("2. Reject Invalid Connections:");
    let config = PoolConfiguration::new().with_replace_invalid(false);
    let registry = Arc::new(PoolRegistry::new(Backend::default(), config).unwrap());
    let key = "primary".to_string();
    kill_pooled_connection(&registry, &key).await;

    let mut unit = UnitOfWork::new(Arc::clone(&registry));
    match unit.get(&key).await {
        Ok(conn) => println!("   Unexpected connection {}", conn.id),
        Err(PoolError::ResourceInvalid) => println!("   Rejected dead connection"),
        Err(e) => println!("   Error: {}", e),
    }
    println!();
}

fn reconfiguration() {
    println!("3. Reconfiguration:");
    let registry = PoolRegistry::new(Backend::default(), PoolConfiguration::default()).unwrap();
    let before = registry.pool(&"primary".to_string());

    registry
        .set_configuration(
            PoolConfiguration::new()
                .with_capacity(8)
                .with_max_outstanding(32)
                .with_timeout(Duration::from_secs(2)),
        )
        .unwrap();
    let after = registry.pool(&"replica".to_string());

    println!("   primary capacity: {}", before.config().capacity);
    println!("   replica capacity: {}", after.config().capacity);
    println!();
}

async fn prometheus_export() {
    println!("4. Prometheus Metrics Export:");
    let registry = PoolRegistry::new(Backend::default(), PoolConfiguration::new().with_capacity(2)).unwrap();
    let pool = registry.pool(&"primary".to_string());

    let first = pool.acquire().await.unwrap();
    let _second = pool.acquire().await.unwrap();
    pool.release(first);

    let mut tags = HashMap::new();
    tags.insert("service".to_string(), "example".to_string());
    println!("{}", registry.export_metrics_prometheus(Some(&tags)));

    let prometheus_registry = prometheus::Registry::new();
    let collector = PrometheusCollector::new(&prometheus_registry).unwrap();
    for (key, metrics) in registry.metrics() {
        collector.observe(&key, &metrics);
    }
    println!("   Registered metric families: {}", prometheus_registry.gather().len());
}
