//! Environment configuration for the server binary.

use anyhow::{bail, Context, Result};
use shared_crypto::DataKey;
use stockroom_gateway::GatewayConfig;

/// Everything the process needs at start.
pub struct RuntimeConfig {
    /// SQLite path, or `:memory:`.
    pub db_path: String,
    /// 32-byte base64 process root key (`STOCKROOM_ROOT_KEY`).
    pub root_key: DataKey,
    /// Gateway settings.
    pub gateway: GatewayConfig,
    admin_user: Option<String>,
    admin_password: Option<String>,
}

impl RuntimeConfig {
    /// Read configuration from the environment.
    ///
    /// Required: `STOCKROOM_ROOT_KEY`. Optional: `STOCKROOM_DB`,
    /// `STOCKROOM_BIND`, `STOCKROOM_PUBLIC_URL`, `STOCKROOM_ALLOWED_HOSTS`,
    /// `STOCKROOM_ADMIN_USER` + `STOCKROOM_ADMIN_PASSWORD` (one-shot setup).
    pub fn from_env() -> Result<Self> {
        let root_key_b64 =
            std::env::var("STOCKROOM_ROOT_KEY").context("STOCKROOM_ROOT_KEY is required")?;
        let root_key = DataKey::from_base64(&root_key_b64)
            .ok()
            .context("STOCKROOM_ROOT_KEY must be 32 bytes of base64")?;

        let mut gateway = GatewayConfig::default();
        if let Ok(bind) = std::env::var("STOCKROOM_BIND") {
            let addr: std::net::SocketAddr =
                bind.parse().context("STOCKROOM_BIND must be host:port")?;
            gateway.host = addr.ip();
            gateway.port = addr.port();
        }
        if let Ok(url) = std::env::var("STOCKROOM_PUBLIC_URL") {
            gateway.public_base_url = url;
        }
        if let Ok(hosts) = std::env::var("STOCKROOM_ALLOWED_HOSTS") {
            gateway.allowed_hosts = hosts;
        }
        gateway.validate().context("gateway config")?;

        let admin_user = std::env::var("STOCKROOM_ADMIN_USER").ok();
        let admin_password = std::env::var("STOCKROOM_ADMIN_PASSWORD").ok();
        if admin_user.is_some() != admin_password.is_some() {
            bail!("STOCKROOM_ADMIN_USER and STOCKROOM_ADMIN_PASSWORD must be set together");
        }

        Ok(Self {
            db_path: std::env::var("STOCKROOM_DB").unwrap_or_else(|_| "stockroom.db".to_string()),
            root_key,
            gateway,
            admin_user,
            admin_password,
        })
    }

    /// Setup credentials, when both halves are present.
    pub fn setup_credentials(&self) -> Option<(&str, &str)> {
        match (&self.admin_user, &self.admin_password) {
            (Some(user), Some(password)) => Some((user, password)),
            _ => None,
        }
    }
}
