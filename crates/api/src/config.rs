//! Application configuration loaded from environment variables.

use std::time::Duration;

use saga::ReservationPathOrder;

/// Server and collaborator configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST` — bind address (default: `"0.0.0.0"`)
/// - `PORT` — listen port (default: `8080`)
/// - `RUST_LOG` — tracing filter directive (default: `"info"`)
/// - `CATALOG_URL` — catalog service base URL
/// - `RESERVATION_URL` — reservation service base URL
/// - `RESERVATION_PATH_ORDER` — `"qty-user"` (default) or `"user-qty"`,
///   matching whichever upstream revision is deployed
/// - `UPSTREAM_TIMEOUT_MS` — outbound HTTP timeout (default: 5000)
/// - `DOWNSTREAM_MAX_RETRIES` — retry budget for commit calls (default: 3)
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub catalog_url: String,
    pub reservation_url: String,
    pub reservation_path_order: ReservationPathOrder,
    pub upstream_timeout: Duration,
    pub downstream_max_retries: usize,
}

impl Config {
    /// Loads configuration from environment variables, falling back to
    /// defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: std::env::var("HOST").unwrap_or(defaults.host),
            port: std::env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            log_level: std::env::var("RUST_LOG").unwrap_or(defaults.log_level),
            catalog_url: std::env::var("CATALOG_URL").unwrap_or(defaults.catalog_url),
            reservation_url: std::env::var("RESERVATION_URL").unwrap_or(defaults.reservation_url),
            reservation_path_order: std::env::var("RESERVATION_PATH_ORDER")
                .ok()
                .and_then(|v| ReservationPathOrder::parse(&v))
                .unwrap_or(defaults.reservation_path_order),
            upstream_timeout: std::env::var("UPSTREAM_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(defaults.upstream_timeout),
            downstream_max_retries: std::env::var("DOWNSTREAM_MAX_RETRIES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.downstream_max_retries),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            log_level: "info".to_string(),
            catalog_url: "http://catalog-service:8000".to_string(),
            reservation_url: "http://reservation-service:5002".to_string(),
            reservation_path_order: ReservationPathOrder::QuantityThenUser,
            upstream_timeout: Duration::from_millis(5000),
            downstream_max_retries: 3,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let config = Config::default();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 8080);
        assert_eq!(config.upstream_timeout, Duration::from_millis(5000));
        assert_eq!(
            config.reservation_path_order,
            ReservationPathOrder::QuantityThenUser
        );
        assert_eq!(config.downstream_max_retries, 3);
    }

    #[test]
    fn test_addr_formatting() {
        let config = Config {
            host: "127.0.0.1".to_string(),
            port: 9090,
            ..Config::default()
        };
        assert_eq!(config.addr(), "127.0.0.1:9090");
    }
}
