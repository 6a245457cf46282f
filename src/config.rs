//! Pool configuration options

use crate::errors::{PoolError, PoolResult};
use std::time::Duration;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Default wait for a blocking acquire.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Configuration shared by every pool a registry creates
///
/// # Examples
///
/// ```
/// use esox_connpool::PoolConfiguration;
/// use std::time::Duration;
///
/// let config = PoolConfiguration::new()
///     .with_capacity(10)
///     .with_max_outstanding(50)
///     .with_timeout(Duration::from_secs(5))
///     .validate()
///     .unwrap();
///
/// assert_eq!(config.capacity, 10);
/// assert_eq!(config.max_outstanding, Some(50));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct PoolConfiguration {
    /// Maximum number of idle resources retained per key
    pub capacity: usize,

    /// Ceiling on resources checked out at once; ignored when below `capacity`
    pub max_outstanding: Option<usize>,

    /// Maximum wait for a blocking acquire
    pub timeout: Duration,

    /// Replace a reused resource that fails validation instead of failing the caller
    pub replace_invalid: bool,
}

impl Default for PoolConfiguration {
    fn default() -> Self {
        Self {
            capacity: 1,
            max_outstanding: None,
            timeout: DEFAULT_TIMEOUT,
            replace_invalid: true,
        }
    }
}

impl PoolConfiguration {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set how many idle resources each pool keeps
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Set the outstanding ceiling
    pub fn with_max_outstanding(mut self, count: usize) -> Self {
        self.max_outstanding = Some(count);
        self
    }

    /// Set the blocking acquire timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Choose between replacing and rejecting invalid reused resources
    pub fn with_replace_invalid(mut self, replace: bool) -> Self {
        self.replace_invalid = replace;
        self
    }

    /// Check the configuration and normalize the outstanding ceiling.
    ///
    /// A ceiling below `capacity` is dropped rather than rejected.
    ///
    /// ```
    /// use esox_connpool::PoolConfiguration;
    ///
    /// let config = PoolConfiguration::new()
    ///     .with_capacity(4)
    ///     .with_max_outstanding(2)
    ///     .validate()
    ///     .unwrap();
    ///
    /// assert_eq!(config.max_outstanding, None);
    /// assert!(PoolConfiguration::new().with_capacity(0).validate().is_err());
    /// ```
    pub fn validate(mut self) -> PoolResult<Self> {
        if self.capacity == 0 {
            return Err(PoolError::InvalidConfiguration(
                "capacity must be greater than zero".to_string(),
            ));
        }
        if matches!(self.max_outstanding, Some(max) if max < self.capacity) {
            self.max_outstanding = None;
        }
        Ok(self)
    }
}

/// Build a validated configuration in one call.
///
/// ```
/// use esox_connpool::configure;
/// use std::time::Duration;
///
/// let config = configure(2, Some(3), Duration::from_secs(1)).unwrap();
/// assert_eq!(config.max_outstanding, Some(3));
/// ```
pub fn configure(
    capacity: usize,
    max_outstanding: Option<usize>,
    timeout: Duration,
) -> PoolResult<PoolConfiguration> {
    PoolConfiguration {
        capacity,
        max_outstanding,
        timeout,
        ..PoolConfiguration::default()
    }
    .validate()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_capacity_rejected() {
        let err = configure(0, None, DEFAULT_TIMEOUT).unwrap_err();
        assert!(matches!(err, PoolError::InvalidConfiguration(_)));
    }

    #[test]
    fn test_ceiling_below_capacity_disabled() {
        let config = configure(1, Some(0), Duration::from_secs(1)).unwrap();
        assert_eq!(config.max_outstanding, None);
    }

    #[test]
    fn test_ceiling_equal_to_capacity_kept() {
        let config = configure(3, Some(3), Duration::from_secs(1)).unwrap();
        assert_eq!(config.max_outstanding, Some(3));
    }

    #[test]
    fn test_defaults() {
        let config = PoolConfiguration::default();
        assert_eq!(config.capacity, 1);
        assert_eq!(config.timeout, Duration::from_secs(60));
        assert!(config.replace_invalid);
    }
}
