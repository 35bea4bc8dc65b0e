//! Server configuration.
//!
//! Settings come from an optional TOML file (path in `OSCARD_CONFIG`),
//! with every key overridable through its own environment variable —
//! `OSCAR_HOST`, `AUTH_PORT`, `BOS_PORT`, `CHAT_PORT`, `DB_PATH`,
//! `DISABLE_AUTH`, `FAIL_FAST`, `LOG_LEVEL`.

use serde::{Deserialize, Serialize};

/// Complete server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host string used in redirect TLVs (`ReconnectHere`).
    #[serde(default = "default_host")]
    pub oscar_host: String,
    /// AUTH listener port.
    #[serde(default = "default_auth_port")]
    pub auth_port: u16,
    /// BOS listener port.
    #[serde(default = "default_bos_port")]
    pub bos_port: u16,
    /// CHAT listener port.
    #[serde(default = "default_chat_port")]
    pub chat_port: u16,
    /// SQLite database path.
    #[serde(default = "default_db_path")]
    pub db_path: String,
    /// Auto-provision unknown screen names and skip digest checks.
    #[serde(default)]
    pub disable_auth: bool,
    /// Terminate the process on an unsupported SNAC (developer mode).
    #[serde(default)]
    pub fail_fast: bool,
    /// Log level: "trace" | "debug" | "info" | "warn" | "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_auth_port() -> u16 {
    5190
}

fn default_bos_port() -> u16 {
    5191
}

fn default_chat_port() -> u16 {
    5192
}

fn default_db_path() -> String {
    "oscard.db".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            oscar_host: default_host(),
            auth_port: default_auth_port(),
            bos_port: default_bos_port(),
            chat_port: default_chat_port(),
            db_path: default_db_path(),
            disable_auth: false,
            fail_fast: false,
            log_level: default_log_level(),
        }
    }
}

impl ServerConfig {
    /// Load configuration: TOML file if present, then env overrides.
    pub fn load() -> anyhow::Result<Self> {
        let mut config = match std::env::var("OSCARD_CONFIG") {
            Ok(path) => {
                let content = std::fs::read_to_string(&path)?;
                toml::from_str(&content)?
            }
            Err(_) => Self::default(),
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply per-key environment-variable overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("OSCAR_HOST") {
            self.oscar_host = v;
        }
        if let Some(v) = env_port("AUTH_PORT") {
            self.auth_port = v;
        }
        if let Some(v) = env_port("BOS_PORT") {
            self.bos_port = v;
        }
        if let Some(v) = env_port("CHAT_PORT") {
            self.chat_port = v;
        }
        if let Ok(v) = std::env::var("DB_PATH") {
            self.db_path = v;
        }
        if let Some(v) = env_bool("DISABLE_AUTH") {
            self.disable_auth = v;
        }
        if let Some(v) = env_bool("FAIL_FAST") {
            self.fail_fast = v;
        }
        if let Ok(v) = std::env::var("LOG_LEVEL") {
            self.log_level = v;
        }
    }
}

fn env_port(key: &str) -> Option<u16> {
    std::env::var(key).ok()?.parse().ok()
}

fn env_bool(key: &str) -> Option<bool> {
    parse_bool(&std::env::var(key).ok()?)
}

/// Parse a permissive boolean: "true"/"1"/"yes" (any case) are true.
fn parse_bool(v: &str) -> Option<bool> {
    match v.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.auth_port, 5190);
        assert_eq!(config.bos_port, 5191);
        assert_eq!(config.chat_port, 5192);
        assert_eq!(config.oscar_host, "127.0.0.1");
        assert!(!config.disable_auth);
        assert!(!config.fail_fast);
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_config_toml_roundtrip() {
        let config = ServerConfig::default();
        let toml_str = toml::to_string(&config).expect("serialize");
        let parsed: ServerConfig = toml::from_str(&toml_str).expect("parse");
        assert_eq!(parsed.bos_port, config.bos_port);
        assert_eq!(parsed.db_path, config.db_path);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let parsed: ServerConfig =
            toml::from_str("oscar_host = \"aim.example.net\"\ndisable_auth = true\n")
                .expect("parse");
        assert_eq!(parsed.oscar_host, "aim.example.net");
        assert!(parsed.disable_auth);
        assert_eq!(parsed.auth_port, 5190);
    }

    #[test]
    fn test_parse_bool() {
        assert_eq!(parse_bool("TRUE"), Some(true));
        assert_eq!(parse_bool("1"), Some(true));
        assert_eq!(parse_bool("no"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }
}
