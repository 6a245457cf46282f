// EsoxSolutions.ConnectionPool
// Keyed async connection pool with per-request binding

// This is just a binary wrapper - the actual library is in lib.rs
// Run demos with: cargo run --example basic

use async_trait::async_trait;
use esox_connpool::{BoxError, LifecycleAdapter, PoolConfiguration, PoolRegistry, Resource, ResourceFactory};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

struct DemoConnection {
    id: usize,
}

impl Resource for DemoConnection {
    fn is_valid(&self) -> bool {
        true
    }
}

#[derive(Default)]
struct DemoFactory {
    next_id: AtomicUsize,
}

#[async_trait]
impl ResourceFactory for DemoFactory {
    type Key = &'static str;
    type Resource = DemoConnection;

    async fn create(&self, _key: &Self::Key) -> Result<DemoConnection, BoxError> {
        Ok(DemoConnection {
            id: self.next_id.fetch_add(1, Ordering::Relaxed) + 1,
        })
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), BoxError> {
    println!("=== EsoxSolutions.ConnectionPool ===");
    println!("See demos/ directory for usage examples");
    println!("Run: cargo run --example basic");
    println!();

    println!("Quick Demo:");
    let registry = Arc::new(PoolRegistry::new(DemoFactory::default(), PoolConfiguration::default())?);
    let adapter = LifecycleAdapter::new(Arc::clone(&registry));

    for request in 1..=3 {
        let mut unit = adapter.begin();
        let conn = unit.get(&"db").await?;
        println!("  Request {} used connection {}", request, conn.id);
        unit.finish();
    }

    println!("  Idle after requests: {}", registry.pool(&"db").idle_count());
    Ok(())
}
