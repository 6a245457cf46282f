//! Request-scoped connections shared by concurrent tasks

use async_trait::async_trait;
use esox_connpool::{
    configure, BoxError, ConnectionProvider, LifecycleAdapter, PoolError, PoolRegistry, PoolResult, Resource,
    ResourceFactory,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::time::sleep;

struct Connection {
    id: usize,
    backend: &'static str,
}

impl Resource for Connection {
    fn is_valid(&self) -> bool {
        true
    }
}

#[derive(Default)]
struct Backends {
    next_id: AtomicUsize,
}

#[async_trait]
impl ResourceFactory for Backends {
    type Key = &'static str;
    type Resource = Connection;

    async fn create(&self, key: &Self::Key) -> Result<Connection, BoxError> {
        sleep(Duration::from_millis(20)).await;
        Ok(Connection {
            id: self.next_id.fetch_add(1, Ordering::Relaxed) + 1,
            backend: *key,
        })
    }
}

/// Data-access layer written against the capability only
struct OrderRepository;

impl OrderRepository {
    async fn load<P>(&self, provider: &mut P, order: usize) -> PoolResult<String>
    where
        P: ConnectionProvider<Key = &'static str, Connection = Connection>,
    {
        let conn = provider.connection(&"orders").await?;
        Ok(format!("order {} via {} connection {}", order, conn.backend, conn.id))
    }

    async fn audit<P>(&self, provider: &mut P, order: usize) -> PoolResult<String>
    where
        P: ConnectionProvider<Key = &'static str, Connection = Connection>,
    {
        let conn = provider.connection(&"audit").await?;
        Ok(format!("audit {} via {} connection {}", order, conn.backend, conn.id))
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt().with_env_filter("esox_connpool=info").init();

    println!("=== EsoxSolutions.ConnectionPool - Request Scope ===\n");

    let config = configure(2, Some(4), Duration::from_secs(2)).unwrap();
    let registry = Arc::new(PoolRegistry::new(Backends::default(), config).unwrap());
    let adapter = LifecycleAdapter::new(Arc::clone(&registry));

    let mut handles = vec![];
    for request in 0..12 {
        let adapter = adapter.clone();
        handles.push(tokio::spawn(async move {
            adapter
                .run(|unit| {
                    Box::pin(async move {
                        let repository = OrderRepository;
                        let first = repository.load(&mut *unit, request).await?;
                        // same request, same connection
                        let second = repository.load(&mut *unit, request).await?;
                        let audit = repository.audit(&mut *unit, request).await?;
                        sleep(Duration::from_millis(10)).await;
                        Ok::<_, PoolError>(format!("{} | {} | {}", first, second, audit))
                    })
                })
                .await
        }));
    }

    for handle in handles {
        match handle.await.unwrap() {
            Ok(line) => println!("   {}", line),
            Err(e) => println!("   Request failed: {}", e),
        }
    }

    println!();
    for (key, metrics) in registry.metrics() {
        println!(
            "   {}: created={} reused={} idle={} outstanding={}",
            key, metrics.total_created, metrics.total_reused, metrics.idle, metrics.outstanding
        );
    }
}
