use std::{env, net::SocketAddr, path::PathBuf};

use thiserror::Error;

pub const DEFAULT_CHILD_CONFIG: &str = "notebooklm-config.json";
pub const DEFAULT_CHILD_PROGRAM: &str = "notebooklm-mcp";

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: String,
    pub bind_port: u16,
    pub mcp_enabled: bool,
    pub child_program: String,
    pub child_config_path: PathBuf,
    pub default_notebook_id: String,
    pub service_account_key: Option<PathBuf>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("PORT must be a valid u16")]
    InvalidPort,
    #[error("invalid bind address or port")]
    InvalidSocket,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let bind_addr = non_empty("BIND_ADDR").unwrap_or_else(|| "0.0.0.0".to_string());
        let bind_port = non_empty("PORT")
            .map(|value| value.parse::<u16>().map_err(|_| ConfigError::InvalidPort))
            .transpose()?
            .unwrap_or(8080);
        let mcp_enabled = non_empty("ENABLE_NOTEBOOKLM_MCP")
            .is_some_and(|value| value.eq_ignore_ascii_case("true"));

        let config = Self {
            bind_addr,
            bind_port,
            mcp_enabled,
            child_program: non_empty("NOTEBOOKLM_MCP_BIN")
                .unwrap_or_else(|| DEFAULT_CHILD_PROGRAM.to_string()),
            child_config_path: non_empty("NOTEBOOKLM_CONFIG")
                .unwrap_or_else(|| DEFAULT_CHILD_CONFIG.to_string())
                .into(),
            default_notebook_id: non_empty("NOTEBOOKLM_NOTEBOOK_ID").unwrap_or_default(),
            service_account_key: non_empty("FIREBASE_SERVICE_ACCOUNT_KEY").map(PathBuf::from),
        };

        let _ = config.bind_socket()?;
        Ok(config)
    }

    pub fn bind_socket(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.bind_addr, self.bind_port)
            .parse::<SocketAddr>()
            .map_err(|_| ConfigError::InvalidSocket)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn parse_defaults() {
        let config = config_from(&[]).expect("config should parse");
        assert_eq!(config.bind_addr, "0.0.0.0");
        assert_eq!(config.bind_port, 8080);
        assert!(!config.mcp_enabled);
        assert_eq!(config.child_program, DEFAULT_CHILD_PROGRAM);
        assert_eq!(config.child_config_path, PathBuf::from(DEFAULT_CHILD_CONFIG));
        assert_eq!(config.default_notebook_id, "");
        assert_eq!(config.service_account_key, None);
    }

    #[test]
    fn enable_flag_is_case_insensitive() {
        let config = config_from(&[("ENABLE_NOTEBOOKLM_MCP", "TRUE")]).expect("config");
        assert!(config.mcp_enabled);

        let config = config_from(&[("ENABLE_NOTEBOOKLM_MCP", "yes")]).expect("config");
        assert!(!config.mcp_enabled);
    }

    #[test]
    fn overrides_are_applied() {
        let config = config_from(&[
            ("PORT", "9090"),
            ("BIND_ADDR", "127.0.0.1"),
            ("NOTEBOOKLM_CONFIG", "/tmp/nb.json"),
            ("NOTEBOOKLM_NOTEBOOK_ID", "abc123"),
            ("NOTEBOOKLM_MCP_BIN", "echo-child"),
            ("FIREBASE_SERVICE_ACCOUNT_KEY", "/secrets/key.json"),
        ])
        .expect("config should parse");

        assert_eq!(config.bind_socket().expect("socket").port(), 9090);
        assert_eq!(config.child_config_path, PathBuf::from("/tmp/nb.json"));
        assert_eq!(config.default_notebook_id, "abc123");
        assert_eq!(config.child_program, "echo-child");
        assert_eq!(
            config.service_account_key,
            Some(PathBuf::from("/secrets/key.json"))
        );
    }

    #[test]
    fn invalid_port_fails() {
        let err = config_from(&[("PORT", "eighty")]).expect_err("expected invalid port");
        assert!(matches!(err, ConfigError::InvalidPort));
    }

    #[test]
    fn invalid_bind_addr_fails() {
        let err = config_from(&[("BIND_ADDR", "not an ip")]).expect_err("expected bad socket");
        assert!(matches!(err, ConfigError::InvalidSocket));
    }
}
