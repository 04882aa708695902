//! HTTP client configuration and polling constants.
//!
//! Both providers are driven through plain reqwest clients configured here.
//! There is deliberately no automatic retry of failed requests: the only
//! repeated calls are the two bounded polling loops (action completion and
//! snapshot completion), and those re-read status rather than re-issuing
//! operations.

use std::time::Duration;

// Provider-specific timeout configurations (in seconds)

/// Default timeout for cloud API requests
pub const HCLOUD_DEFAULT_TIMEOUT: u64 = 30;

/// Default timeout for hypervisor API requests
pub const PROXMOX_DEFAULT_TIMEOUT: u64 = 30;

// Polling budgets

/// Seconds between polls of a cloud action
pub const ACTION_POLL_INTERVAL_SECS: u64 = 5;

/// Maximum number of action polls (5s apart, roughly five minutes)
pub const ACTION_MAX_POLLS: u32 = 60;

/// Seconds between polls of a snapshot being created
pub const SNAPSHOT_POLL_INTERVAL_SECS: u64 = 10;

/// Default wall-clock budget for waiting on a snapshot, in seconds
pub const SNAPSHOT_DEFAULT_TIMEOUT_SECS: u64 = 900;

/// Seconds to let a guest settle before re-reading status after start/stop
pub const GUEST_SETTLE_DELAY_SECS: u64 = 2;

// Connection pool settings

/// Default idle timeout for connection pools
pub const DEFAULT_POOL_IDLE_TIMEOUT: u64 = 90;

/// Default maximum idle connections per host
pub const DEFAULT_POOL_MAX_IDLE_PER_HOST: usize = 10;

/// HTTP client configuration.
///
/// Configures timeouts, connection pooling, and TLS verification for a
/// provider client.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Request timeout
    pub timeout: Duration,

    /// Connection pool idle timeout
    pub pool_idle_timeout: Duration,

    /// Maximum idle connections per host
    pub pool_max_idle_per_host: usize,

    /// Accept self-signed certificates (hypervisor hosts commonly use them)
    pub accept_invalid_certs: bool,
}

impl HttpConfig {
    /// Create a new configuration with default values.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            pool_idle_timeout: Duration::from_secs(DEFAULT_POOL_IDLE_TIMEOUT),
            pool_max_idle_per_host: DEFAULT_POOL_MAX_IDLE_PER_HOST,
            accept_invalid_certs: false,
        }
    }

    /// Set request timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set connection pool idle timeout.
    #[must_use]
    pub const fn with_pool_idle_timeout(mut self, timeout: Duration) -> Self {
        self.pool_idle_timeout = timeout;
        self
    }

    /// Set maximum idle connections per host.
    #[must_use]
    pub const fn with_pool_max_idle(mut self, max: usize) -> Self {
        self.pool_max_idle_per_host = max;
        self
    }

    /// Accept or reject self-signed certificates.
    #[must_use]
    pub const fn with_accept_invalid_certs(mut self, accept: bool) -> Self {
        self.accept_invalid_certs = accept;
        self
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_constants() {
        assert_eq!(HCLOUD_DEFAULT_TIMEOUT, 30);
        assert_eq!(PROXMOX_DEFAULT_TIMEOUT, 30);
    }

    #[test]
    fn test_polling_budget_constants() {
        // The action budget must cover the "wait up to five minutes" window.
        assert_eq!(
            ACTION_POLL_INTERVAL_SECS * u64::from(ACTION_MAX_POLLS),
            300
        );
        assert_eq!(SNAPSHOT_POLL_INTERVAL_SECS, 10);
        assert_eq!(SNAPSHOT_DEFAULT_TIMEOUT_SECS, 900);
        assert_eq!(GUEST_SETTLE_DELAY_SECS, 2);
    }

    #[test]
    fn test_http_config_new() {
        let config = HttpConfig::new();
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(
            config.pool_idle_timeout,
            Duration::from_secs(DEFAULT_POOL_IDLE_TIMEOUT)
        );
        assert_eq!(config.pool_max_idle_per_host, DEFAULT_POOL_MAX_IDLE_PER_HOST);
        assert!(!config.accept_invalid_certs);
    }

    #[test]
    fn test_http_config_builder() {
        let config = HttpConfig::new()
            .with_timeout(Duration::from_secs(60))
            .with_pool_idle_timeout(Duration::from_secs(120))
            .with_pool_max_idle(20)
            .with_accept_invalid_certs(true);

        assert_eq!(config.timeout, Duration::from_secs(60));
        assert_eq!(config.pool_idle_timeout, Duration::from_secs(120));
        assert_eq!(config.pool_max_idle_per_host, 20);
        assert!(config.accept_invalid_certs);
    }

    #[test]
    fn test_http_config_default() {
        let config = HttpConfig::default();
        assert_eq!(config.timeout, Duration::from_secs(30));
    }
}
