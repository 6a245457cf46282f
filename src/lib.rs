//! # EsoxSolutions.ConnectionPool
//!
//! Keyed async connection pool for services that handle many short units of
//! work (requests) and want each one to reuse a pooled backend connection
//! instead of opening its own.
//!
//! ## Features
//!
//! - One pool per key, created lazily by a shared [`PoolRegistry`]
//! - Bounded idle retention with oldest-first reuse
//! - Optional outstanding ceiling with first-come-first-served waiting
//! - Acquire timeouts; aborted or timed-out waiters never leak resources
//! - Per-unit-of-work binding: one connection per key for the whole request
//! - Validation of reused connections, with replace or reject policies
//! - Metrics, health reporting and Prometheus export
//!
//! ## Quick Start
//!
//! ```rust
//! use async_trait::async_trait;
//! use esox_connpool::{
//!     configure, BoxError, LifecycleAdapter, PoolRegistry, Resource, ResourceFactory,
//! };
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! struct Connection {
//!     backend: String,
//! }
//!
//! impl Resource for Connection {
//!     fn is_valid(&self) -> bool {
//!         true
//!     }
//! }
//!
//! struct Backends;
//!
//! #[async_trait]
//! impl ResourceFactory for Backends {
//!     type Key = String;
//!     type Resource = Connection;
//!
//!     async fn create(&self, key: &String) -> Result<Connection, BoxError> {
//!         Ok(Connection { backend: key.clone() })
//!     }
//! }
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let config = configure(4, Some(16), Duration::from_secs(5)).unwrap();
//! let registry = Arc::new(PoolRegistry::new(Backends, config).unwrap());
//! let adapter = LifecycleAdapter::new(registry);
//!
//! let mut unit = adapter.begin();
//! let conn = unit.get(&"default".to_string()).await.unwrap();
//! println!("Using {}", conn.backend);
//! unit.finish();
//! # }
//! ```

mod binding;
mod config;
mod errors;
mod health;
mod lifecycle;
mod metrics;
mod pool;
mod registry;
mod resource;

pub use binding::UnitOfWork;
pub use config::{configure, PoolConfiguration, DEFAULT_TIMEOUT};
pub use errors::{BoxError, PoolError, PoolResult};
pub use health::HealthStatus;
pub use lifecycle::{BoxFuture, ConnectionProvider, LifecycleAdapter};
#[cfg(feature = "prometheus")]
pub use metrics::PrometheusCollector;
pub use metrics::{MetricsExporter, PoolMetrics};
pub use pool::Pool;
pub use registry::PoolRegistry;
pub use resource::{Resource, ResourceFactory};
