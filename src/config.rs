//! Static configuration, built once at startup and injected where needed.

use crate::application::policy::DispatchPolicy;
use crate::domain::payment::Route;
use crate::error::{PaymentError, Result};
use std::time::Duration;

pub const DEFAULT_QUEUE_CAPACITY: usize = 750_000;
pub const DEFAULT_MAX_IN_FLIGHT: usize = 32;
pub const DEFAULT_GATEWAY_TIMEOUT: Duration = Duration::from_millis(100);
pub const DEFAULT_ADMIN_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_ADMIN_TOKEN: &str = "123";

/// Address and call limits of one upstream processor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayEndpoint {
    pub route: Route,
    pub base_url: String,
    /// Deadline of a `process` or lookup call. Kept below the processor's
    /// typical latency so a slow processor turns into a timeout.
    pub request_timeout: Duration,
    /// Deadline of health and purge calls.
    pub admin_timeout: Duration,
    pub admin_token: String,
}

impl GatewayEndpoint {
    pub fn new(route: Route, base_url: impl Into<String>) -> Self {
        Self {
            route,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            request_timeout: DEFAULT_GATEWAY_TIMEOUT,
            admin_timeout: DEFAULT_ADMIN_TIMEOUT,
            admin_token: DEFAULT_ADMIN_TOKEN.to_string(),
        }
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_admin_token(mut self, token: impl Into<String>) -> Self {
        self.admin_token = token.into();
        self
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatcherConfig {
    /// Capacity of each route queue.
    pub queue_capacity: usize,
    /// Requests processed concurrently. 1 gives a single sequential consumer.
    pub max_in_flight: usize,
    pub policy: DispatchPolicy,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
            policy: DispatchPolicy::default(),
        }
    }
}

impl DispatcherConfig {
    pub fn validate(&self) -> Result<()> {
        if self.queue_capacity == 0 {
            return Err(PaymentError::ConfigError(
                "queue capacity must be at least 1".to_string(),
            ));
        }
        if self.max_in_flight == 0 {
            return Err(PaymentError::ConfigError(
                "max in-flight must be at least 1".to_string(),
            ));
        }
        self.policy.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_urls() {
        let endpoint = GatewayEndpoint::new(Route::Primary, "http://localhost:8001/");
        assert_eq!(endpoint.url("/payments"), "http://localhost:8001/payments");
        assert_eq!(endpoint.request_timeout, Duration::from_millis(100));
    }

    #[test]
    fn test_config_validation() {
        assert!(DispatcherConfig::default().validate().is_ok());

        let no_queue = DispatcherConfig {
            queue_capacity: 0,
            ..Default::default()
        };
        assert!(no_queue.validate().is_err());

        let no_workers = DispatcherConfig {
            max_in_flight: 0,
            ..Default::default()
        };
        assert!(no_workers.validate().is_err());
    }
}
