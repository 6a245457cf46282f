//! Metrics collection and export for connection pools

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

#[cfg(feature = "serde")]
use serde::Serialize;

/// Metrics snapshot for a single pool
///
/// # Examples
///
/// ```
/// # use async_trait::async_trait;
/// # use esox_connpool::{BoxError, Resource, ResourceFactory};
/// # struct Conn;
/// # impl Resource for Conn { fn is_valid(&self) -> bool { true } }
/// # struct Factory;
/// # #[async_trait]
/// # impl ResourceFactory for Factory {
/// #     type Key = &'static str;
/// #     type Resource = Conn;
/// #     async fn create(&self, _key: &Self::Key) -> Result<Conn, BoxError> { Ok(Conn) }
/// # }
/// use esox_connpool::{Pool, PoolConfiguration};
/// use std::sync::Arc;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let pool = Pool::new("db", Arc::new(Factory), PoolConfiguration::default()).unwrap();
///
/// let conn = pool.acquire().await.unwrap();
/// let metrics = pool.metrics();
/// assert_eq!(metrics.total_created, 1);
/// assert_eq!(metrics.outstanding, 1);
///
/// pool.release(conn);
/// assert_eq!(pool.metrics().idle, 1);
/// # }
/// ```
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct PoolMetrics {
    /// Resources created by the factory
    pub total_created: usize,

    /// Acquisitions served from the idle queue or by handoff
    pub total_reused: usize,

    /// Resources released back to the pool
    pub total_released: usize,

    /// Releases passed straight to a waiting caller
    pub total_handed_off: usize,

    /// Resources closed (surplus, invalid or discarded)
    pub total_closed: usize,

    /// Close calls that returned an error
    pub close_failures: usize,

    /// Factory calls that returned an error
    pub creation_failures: usize,

    /// Reused resources that failed validation
    pub validation_failures: usize,

    /// Acquisitions that had to wait
    pub wait_events: usize,

    /// Waits that ended in a timeout
    pub timeouts: usize,

    /// Current idle resources
    pub idle: usize,

    /// Current checked-out resources
    pub outstanding: usize,

    /// Callers currently waiting
    pub waiting: usize,

    /// Idle retention limit
    pub capacity: usize,

    /// Outstanding ceiling, if enabled
    pub max_outstanding: Option<usize>,

    /// Outstanding relative to the ceiling, or to capacity without one
    pub utilization: f64,
}

impl PoolMetrics {
    /// Export metrics as a HashMap
    pub fn export(&self) -> HashMap<String, String> {
        let mut metrics = HashMap::new();
        metrics.insert("total_created".to_string(), self.total_created.to_string());
        metrics.insert("total_reused".to_string(), self.total_reused.to_string());
        metrics.insert("total_released".to_string(), self.total_released.to_string());
        metrics.insert("total_handed_off".to_string(), self.total_handed_off.to_string());
        metrics.insert("total_closed".to_string(), self.total_closed.to_string());
        metrics.insert("close_failures".to_string(), self.close_failures.to_string());
        metrics.insert("creation_failures".to_string(), self.creation_failures.to_string());
        metrics.insert("validation_failures".to_string(), self.validation_failures.to_string());
        metrics.insert("wait_events".to_string(), self.wait_events.to_string());
        metrics.insert("timeouts".to_string(), self.timeouts.to_string());
        metrics.insert("idle".to_string(), self.idle.to_string());
        metrics.insert("outstanding".to_string(), self.outstanding.to_string());
        metrics.insert("waiting".to_string(), self.waiting.to_string());
        metrics.insert("capacity".to_string(), self.capacity.to_string());
        if let Some(max) = self.max_outstanding {
            metrics.insert("max_outstanding".to_string(), max.to_string());
        }
        metrics.insert("utilization".to_string(), format!("{:.2}", self.utilization));
        metrics
    }
}

/// Metrics exporter for Prometheus text format
pub struct MetricsExporter;

impl MetricsExporter {
    /// Render one pool's snapshot in Prometheus exposition format.
    ///
    /// ```
    /// use esox_connpool::{MetricsExporter, PoolMetrics};
    /// use std::collections::HashMap;
    ///
    /// let metrics = PoolMetrics { outstanding: 2, ..Default::default() };
    /// let mut tags = HashMap::new();
    /// tags.insert("service".to_string(), "api".to_string());
    ///
    /// let output = MetricsExporter::export_prometheus(&metrics, "orders", Some(&tags));
    /// assert!(output.contains("connpool_outstanding{pool=\"orders\",service=\"api\"} 2"));
    /// ```
    pub fn export_prometheus(
        metrics: &PoolMetrics,
        pool_name: &str,
        tags: Option<&HashMap<String, String>>,
    ) -> String {
        let labels = Self::format_labels(pool_name, tags);
        let mut output = String::new();

        let gauges = [
            ("connpool_idle", "Current idle resources", metrics.idle),
            ("connpool_outstanding", "Current checked-out resources", metrics.outstanding),
            ("connpool_waiting", "Callers waiting for a resource", metrics.waiting),
        ];
        for (name, help, value) in gauges {
            output.push_str(&format!("# HELP {} {}\n", name, help));
            output.push_str(&format!("# TYPE {} gauge\n", name));
            output.push_str(&format!("{}{{{}}} {}\n", name, labels, value));
        }

        output.push_str("# HELP connpool_utilization Outstanding resources relative to the limit\n");
        output.push_str("# TYPE connpool_utilization gauge\n");
        output.push_str(&format!("connpool_utilization{{{}}} {:.2}\n", labels, metrics.utilization));

        let counters = [
            ("connpool_created_total", "Resources created", metrics.total_created),
            ("connpool_reused_total", "Resources reused", metrics.total_reused),
            ("connpool_released_total", "Resources released", metrics.total_released),
            ("connpool_closed_total", "Resources closed", metrics.total_closed),
            ("connpool_timeouts_total", "Acquire timeouts", metrics.timeouts),
            ("connpool_validation_failures_total", "Reused resources that failed validation", metrics.validation_failures),
        ];
        for (name, help, value) in counters {
            output.push_str(&format!("# HELP {} {}\n", name, help));
            output.push_str(&format!("# TYPE {} counter\n", name));
            output.push_str(&format!("{}{{{}}} {}\n", name, labels, value));
        }

        output
    }

    fn format_labels(pool_name: &str, tags: Option<&HashMap<String, String>>) -> String {
        let mut labels = vec![format!("pool=\"{}\"", pool_name)];

        if let Some(tags) = tags {
            let mut tags: Vec<_> = tags.iter().collect();
            tags.sort();
            for (key, value) in tags {
                labels.push(format!("{}=\"{}\"", key, value));
            }
        }

        labels.join(",")
    }
}

/// Publishes pool snapshots into a `prometheus::Registry`
#[cfg(feature = "prometheus")]
pub struct PrometheusCollector {
    idle: prometheus::IntGaugeVec,
    outstanding: prometheus::IntGaugeVec,
    waiting: prometheus::IntGaugeVec,
    created: prometheus::IntGaugeVec,
    closed: prometheus::IntGaugeVec,
    timeouts: prometheus::IntGaugeVec,
}

#[cfg(feature = "prometheus")]
impl PrometheusCollector {
    /// Register the pool gauges with `registry`.
    pub fn new(registry: &prometheus::Registry) -> prometheus::Result<Self> {
        let gauge = |name: &str, help: &str| -> prometheus::Result<prometheus::IntGaugeVec> {
            let vec = prometheus::IntGaugeVec::new(prometheus::Opts::new(name, help), &["pool"])?;
            registry.register(Box::new(vec.clone()))?;
            Ok(vec)
        };

        Ok(Self {
            idle: gauge("connpool_idle", "Current idle resources")?,
            outstanding: gauge("connpool_outstanding", "Current checked-out resources")?,
            waiting: gauge("connpool_waiting", "Callers waiting for a resource")?,
            created: gauge("connpool_created", "Resources created since start")?,
            closed: gauge("connpool_closed", "Resources closed since start")?,
            timeouts: gauge("connpool_timeouts", "Acquire timeouts since start")?,
        })
    }

    /// Record a snapshot under the `pool` label.
    pub fn observe(&self, pool_name: &str, metrics: &PoolMetrics) {
        let set = |vec: &prometheus::IntGaugeVec, value: usize| {
            vec.with_label_values(&[pool_name]).set(value as i64);
        };
        set(&self.idle, metrics.idle);
        set(&self.outstanding, metrics.outstanding);
        set(&self.waiting, metrics.waiting);
        set(&self.created, metrics.total_created);
        set(&self.closed, metrics.total_closed);
        set(&self.timeouts, metrics.timeouts);
    }
}

/// Internal counters, one set per pool
#[derive(Default)]
pub(crate) struct MetricsTracker {
    pub created: AtomicUsize,
    pub reused: AtomicUsize,
    pub released: AtomicUsize,
    pub handed_off: AtomicUsize,
    pub closed: AtomicUsize,
    pub close_failures: AtomicUsize,
    pub creation_failures: AtomicUsize,
    pub validation_failures: AtomicUsize,
    pub waits: AtomicUsize,
    pub timeouts: AtomicUsize,
}

impl MetricsTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bump(counter: &AtomicUsize) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(
        &self,
        idle: usize,
        outstanding: usize,
        waiting: usize,
        capacity: usize,
        max_outstanding: Option<usize>,
    ) -> PoolMetrics {
        let limit = max_outstanding.unwrap_or(capacity);
        let utilization = if limit > 0 {
            outstanding as f64 / limit as f64
        } else {
            0.0
        };

        PoolMetrics {
            total_created: self.created.load(Ordering::Relaxed),
            total_reused: self.reused.load(Ordering::Relaxed),
            total_released: self.released.load(Ordering::Relaxed),
            total_handed_off: self.handed_off.load(Ordering::Relaxed),
            total_closed: self.closed.load(Ordering::Relaxed),
            close_failures: self.close_failures.load(Ordering::Relaxed),
            creation_failures: self.creation_failures.load(Ordering::Relaxed),
            validation_failures: self.validation_failures.load(Ordering::Relaxed),
            wait_events: self.waits.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
            idle,
            outstanding,
            waiting,
            capacity,
            max_outstanding,
            utilization,
        }
    }
}
