//! RPC Endpoint Configuration
//!
//! Supports loading from environment variables with a per-service prefix
//! (`POT_WALLET_RPC_` / `POT_DAEMON_RPC_`).

use serde::{Deserialize, Serialize};
use std::env;

/// JSON-RPC endpoint configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcEndpointConfig {
    /// JSON-RPC URL, including the `/json_rpc` path
    pub url: String,
    /// Username (empty disables authentication)
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_timeout() -> u64 {
    120
}

impl RpcEndpointConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            username: String::new(),
            password: String::new(),
            timeout_secs: default_timeout(),
        }
    }

    /// Default local wallet service
    pub fn wallet_default() -> Self {
        Self::new("http://localhost:18082/json_rpc")
    }

    /// Default local blockchain daemon
    pub fn daemon_default() -> Self {
        Self::new("http://localhost:28081/json_rpc")
    }

    /// Load from environment variables
    ///
    /// - `{prefix}URL`: JSON-RPC URL
    /// - `{prefix}USER`: username
    /// - `{prefix}PASS`: password
    /// - `{prefix}TIMEOUT`: request timeout in seconds
    pub fn from_env(prefix: &str, fallback: Self) -> Self {
        Self {
            url: env::var(format!("{}URL", prefix)).unwrap_or(fallback.url),
            username: env::var(format!("{}USER", prefix)).unwrap_or(fallback.username),
            password: env::var(format!("{}PASS", prefix)).unwrap_or(fallback.password),
            timeout_secs: env::var(format!("{}TIMEOUT", prefix))
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(fallback.timeout_secs),
        }
    }

    /// Wallet endpoint from `POT_WALLET_RPC_*`
    pub fn wallet_from_env() -> Self {
        Self::from_env("POT_WALLET_RPC_", Self::wallet_default())
    }

    /// Daemon endpoint from `POT_DAEMON_RPC_*`
    pub fn daemon_from_env() -> Self {
        Self::from_env("POT_DAEMON_RPC_", Self::daemon_default())
    }

    pub fn with_credentials(mut self, username: &str, password: &str) -> Self {
        self.username = username.to_string();
        self.password = password.to_string();
        self
    }

    pub fn has_credentials(&self) -> bool {
        !self.username.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let wallet = RpcEndpointConfig::wallet_default();
        assert_eq!(wallet.url, "http://localhost:18082/json_rpc");
        assert!(!wallet.has_credentials());

        let daemon = RpcEndpointConfig::daemon_default().with_credentials("user", "pass");
        assert!(daemon.has_credentials());
        assert_eq!(daemon.password, "pass");
    }

    #[test]
    fn test_from_env() {
        env::set_var("POT_TEST_RPC_URL", "http://10.0.0.2:18082/json_rpc");
        env::set_var("POT_TEST_RPC_TIMEOUT", "5");
        let config = RpcEndpointConfig::from_env("POT_TEST_RPC_", RpcEndpointConfig::wallet_default());
        assert_eq!(config.url, "http://10.0.0.2:18082/json_rpc");
        assert_eq!(config.timeout_secs, 5);
        assert_eq!(config.username, "");
    }
}
