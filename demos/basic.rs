//! Basic pool usage examples

use async_trait::async_trait;
use esox_connpool::{configure, BoxError, Pool, PoolConfiguration, Resource, ResourceFactory};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

struct Connection {
    id: usize,
}

impl Resource for Connection {
    fn is_valid(&self) -> bool {
        true
    }

    fn close(self) -> Result<(), BoxError> {
        println!("   Closing connection {}", self.id);
        Ok(())
    }
}

#[derive(Default)]
struct Database {
    next_id: AtomicUsize,
}

#[async_trait]
impl ResourceFactory for Database {
    type Key = &'static str;
    type Resource = Connection;

    async fn create(&self, key: &Self::Key) -> Result<Connection, BoxError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        println!("   Opening connection {} to {}", id, key);
        Ok(Connection { id })
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt().with_env_filter("esox_connpool=debug").init();

    println!("=== EsoxSolutions.ConnectionPool - Basic Examples ===\n");

    // Example 1: Acquire and release
    acquire_release().await;

    // Example 2: Idle retention
    idle_retention().await;

    // Example 3: Blocking with a ceiling
    ceiling_and_timeout().await;
}

async fn acquire_release() {
    println!("1. Acquire and Release:");
    let pool = Pool::new("primary", Arc::new(Database::default()), PoolConfiguration::default()).unwrap();

    let conn = pool.acquire().await.unwrap();
    println!("   Got connection {}", conn.id);
    pool.release(conn);

    let conn = pool.acquire().await.unwrap();
    println!("   Reused connection {}", conn.id);
    pool.release(conn);

    println!();
}

async fn idle_retention() {
    println!("2. Idle Retention:");
    let config = configure(2, None, Duration::from_secs(5)).unwrap();
    let pool = Pool::new("primary", Arc::new(Database::default()), config).unwrap();

    let held: Vec<_> = acquire_many(&pool, 4).await;
    for conn in held {
        pool.release(conn);
    }

    println!("   Idle after releasing 4: {}", pool.idle_count());
    println!();
}

async fn acquire_many(pool: &Pool<Database>, count: usize) -> Vec<Connection> {
    let mut held = Vec::with_capacity(count);
    for _ in 0..count {
        held.push(pool.acquire().await.unwrap());
    }
    held
}

async fn ceiling_and_timeout() {
    println!("3. Ceiling and Timeout:");
    let config = configure(1, Some(1), Duration::from_millis(100)).unwrap();
    let pool = Pool::new("primary", Arc::new(Database::default()), config).unwrap();

    let conn = pool.acquire().await.unwrap();
    match pool.acquire().await {
        Ok(_) => println!("   Got a second connection"),
        Err(e) => println!("   Error: {}", e),
    }
    pool.release(conn);

    let health = pool.health();
    println!("   Healthy: {} ({:?})", health.is_healthy(), health.warnings);
    println!();
}
