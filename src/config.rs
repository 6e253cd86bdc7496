use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::str::FromStr;

use tracing::warn;

/// Which market-data source backs `GET /prices`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriceSource {
    /// Yahoo Finance, falling back to a mock series per ticker.
    Yahoo,
    /// Mock random-walk series only.
    Mock,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: IpAddr,
    pub port: u16,
    pub price_source: PriceSource,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 8000,
            price_source: PriceSource::Yahoo,
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let price_source = match std::env::var("PRICE_PROVIDER")
            .unwrap_or_else(|_| "yahoo".to_string())
            .to_lowercase()
            .as_str()
        {
            "yahoo" => PriceSource::Yahoo,
            "mock" => PriceSource::Mock,
            other => {
                warn!("Unknown PRICE_PROVIDER '{}', using yahoo", other);
                PriceSource::Yahoo
            }
        };

        Self {
            host: env_parse("HOST", defaults.host),
            port: env_parse("PORT", defaults.port),
            price_source,
        }
    }

    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

/// Reads and parses an environment variable, keeping `default` when unset or invalid.
pub fn env_parse<T>(key: &str, default: T) -> T
where
    T: FromStr + std::fmt::Debug,
{
    match std::env::var(key) {
        Ok(raw) => match raw.trim().parse::<T>() {
            Ok(value) => value,
            Err(_) => {
                warn!("Invalid value '{}' for {}, using default {:?}", raw, key, default);
                default
            }
        },
        Err(_) => default,
    }
}

pub fn env_flag(key: &str) -> bool {
    std::env::var(key)
        .map(|v| matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_binds_all_interfaces_on_8000() {
        let config = ServerConfig::default();
        assert_eq!(config.bind_addr().to_string(), "0.0.0.0:8000");
        assert_eq!(config.price_source, PriceSource::Yahoo);
    }

    #[test]
    fn test_env_parse_falls_back_on_garbage() {
        std::env::set_var("LG_TEST_PORT_GARBAGE", "not-a-port");
        assert_eq!(env_parse("LG_TEST_PORT_GARBAGE", 8000u16), 8000);

        std::env::set_var("LG_TEST_PORT_OK", " 9001 ");
        assert_eq!(env_parse("LG_TEST_PORT_OK", 8000u16), 9001);

        assert_eq!(env_parse("LG_TEST_PORT_UNSET", 42u16), 42);
    }

    #[test]
    fn test_env_flag_accepts_common_truthy_values() {
        std::env::set_var("LG_TEST_FLAG_TRUE", "TRUE");
        std::env::set_var("LG_TEST_FLAG_ONE", "1");
        std::env::set_var("LG_TEST_FLAG_NO", "no");
        assert!(env_flag("LG_TEST_FLAG_TRUE"));
        assert!(env_flag("LG_TEST_FLAG_ONE"));
        assert!(!env_flag("LG_TEST_FLAG_NO"));
        assert!(!env_flag("LG_TEST_FLAG_MISSING"));
    }
}
