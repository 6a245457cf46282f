//! Health reporting for connection pools

use crate::metrics::PoolMetrics;

/// Health status of a pool, derived from a metrics snapshot
///
/// A pool is unhealthy while callers are queued behind the outstanding
/// ceiling or once it has recorded acquire timeouts.
#[derive(Debug, Clone)]
pub struct HealthStatus {
    /// Whether the pool is healthy
    pub is_healthy: bool,

    /// Number of warnings detected
    pub warning_count: usize,

    /// Outstanding resources relative to the limit (0.0 to 1.0)
    pub utilization: f64,

    /// Idle resources
    pub idle: usize,

    /// Checked-out resources
    pub outstanding: usize,

    /// Queued callers
    pub waiting: usize,

    /// Warning messages
    pub warnings: Vec<String>,
}

impl HealthStatus {
    pub fn from_metrics(metrics: &PoolMetrics) -> Self {
        let mut warnings = Vec::new();
        let mut is_healthy = true;

        if metrics.utilization > 0.9 {
            warnings.push(format!("High utilization: {:.1}%", metrics.utilization * 100.0));
        }

        if metrics.waiting > 0 {
            warnings.push(format!("{} caller(s) waiting for a resource", metrics.waiting));
            is_healthy = false;
        }

        if metrics.timeouts > 0 {
            warnings.push(format!("{} acquire timeout(s) recorded", metrics.timeouts));
            is_healthy = false;
        }

        if metrics.close_failures > 0 {
            warnings.push(format!("{} close failure(s) recorded", metrics.close_failures));
        }

        Self {
            is_healthy,
            warning_count: warnings.len(),
            utilization: metrics.utilization,
            idle: metrics.idle,
            outstanding: metrics.outstanding,
            waiting: metrics.waiting,
            warnings,
        }
    }

    /// Check if the pool is healthy
    pub fn is_healthy(&self) -> bool {
        self.is_healthy
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_idle_pool_is_healthy() {
        let health = HealthStatus::from_metrics(&PoolMetrics {
            idle: 2,
            capacity: 2,
            ..Default::default()
        });
        assert!(health.is_healthy());
        assert_eq!(health.warning_count, 0);
    }

    #[test]
    fn test_waiters_make_pool_unhealthy() {
        let health = HealthStatus::from_metrics(&PoolMetrics {
            outstanding: 3,
            waiting: 1,
            max_outstanding: Some(3),
            utilization: 1.0,
            ..Default::default()
        });
        assert!(!health.is_healthy());
        assert_eq!(health.warning_count, 2);
    }
}
