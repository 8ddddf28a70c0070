//! Gateway configuration with validation.

use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

/// Main gateway configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listen address.
    pub host: IpAddr,
    /// Listen port.
    pub port: u16,
    /// Allowed-host string handed to the (external) domain middleware.
    pub allowed_hosts: String,
    /// This deployment's public base URL, e.g. `https://shop.example`.
    /// The webhook ingress URL is derived from it.
    pub public_base_url: String,
    /// Session lifetime in hours.
    pub session_ttl_hours: i64,
    /// Request body cap in bytes.
    pub max_body_bytes: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)),
            port: 8377,
            allowed_hosts: "localhost".to_string(),
            public_base_url: "http://localhost:8377".to_string(),
            session_ttl_hours: 24,
            max_body_bytes: 64 * 1024,
        }
    }
}

/// Configuration validation errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A numeric field is zero that must not be
    #[error("invalid config: {0}")]
    Invalid(&'static str),
}

impl GatewayConfig {
    /// Validate field ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.session_ttl_hours <= 0 {
            return Err(ConfigError::Invalid("session_ttl_hours must be positive"));
        }
        if self.max_body_bytes == 0 {
            return Err(ConfigError::Invalid("max_body_bytes cannot be 0"));
        }
        if self.public_base_url.is_empty() {
            return Err(ConfigError::Invalid("public_base_url cannot be empty"));
        }
        Ok(())
    }

    /// Socket address to bind.
    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// The webhook ingress URL Square signs against.
    pub fn notification_url(&self) -> String {
        format!(
            "{}/payment/webhook",
            self.public_base_url.trim_end_matches('/')
        )
    }
}
