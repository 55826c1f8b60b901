//! Gateway configuration
//!
//! Values are layered: built-in defaults, then an optional TOML file, then
//! `PROPGATE_*` environment variables (nested keys joined with `__`, e.g.
//! `PROPGATE_DATABASE__URL`).

use approval_engine::GatePolicy;
use audit_engine::{DEFAULT_LIST_LIMIT, DEFAULT_RETENTION_DAYS, DEFAULT_STATS_WINDOW_DAYS};
use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};

pub const ENV_PREFIX: &str = "PROPGATE";

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct GatewayConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub policy: GatePolicy,
    #[serde(default)]
    pub audit: AuditSettings,
}

/// HTTP listener settings
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// PostgreSQL connection settings. Without a URL the gateway keeps its
/// records in memory.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct DatabaseConfig {
    pub url: Option<String>,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: default_max_connections(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct AuditSettings {
    /// Low/medium events older than this are purged (default: 90)
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,

    /// Window used by the stats endpoint when `days` is not given (default: 30)
    #[serde(default = "default_stats_window_days")]
    pub stats_window_days: u32,

    /// Page size used by the listing endpoint when `limit` is not given
    #[serde(default = "default_limit")]
    pub default_limit: u32,
}

impl Default for AuditSettings {
    fn default() -> Self {
        Self {
            retention_days: default_retention_days(),
            stats_window_days: default_stats_window_days(),
            default_limit: default_limit(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_max_connections() -> u32 {
    10
}

fn default_retention_days() -> u32 {
    DEFAULT_RETENTION_DAYS
}

fn default_stats_window_days() -> u32 {
    DEFAULT_STATS_WINDOW_DAYS
}

fn default_limit() -> u32 {
    DEFAULT_LIST_LIMIT
}

impl GatewayConfig {
    /// Load from an optional TOML file and the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be parsed, or a value
    /// has the wrong type.
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::new(path, FileFormat::Toml).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }

    /// Parse a TOML document without consulting the environment.
    ///
    /// # Errors
    ///
    /// Returns an error on malformed TOML or mistyped values.
    pub fn from_toml_str(toml: &str) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()?
            .try_deserialize()
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approval_engine::Action;

    #[test]
    fn test_defaults() {
        let config = GatewayConfig::default();
        assert_eq!(config.server.port, 8080);
        assert!(config.database.url.is_none());
        assert_eq!(config.audit.retention_days, 90);
        assert_eq!(config.audit.stats_window_days, 30);
        assert_eq!(config.audit.default_limit, 100);
        assert!((config.policy.expense_amount_threshold - 500.0).abs() < f64::EPSILON);
        assert!(config.policy.is_gated("expense", Action::Create));
        assert!(!config.policy.is_gated("tenant", Action::Update));
    }

    #[test]
    fn test_empty_document_yields_defaults() {
        let config = GatewayConfig::from_toml_str("").unwrap();
        assert_eq!(config, GatewayConfig::default());
    }

    #[test]
    fn test_partial_toml_overrides() {
        let config = GatewayConfig::from_toml_str(
            r#"
            [server]
            port = 9000

            [database]
            url = "postgres://propgate@localhost/propgate"

            [policy]
            expense_amount_threshold = 250.0

            [policy.gated_actions]
            expense = ["create"]
            lease = ["update", "delete"]

            [audit]
            retention_days = 30
            "#,
        )
        .unwrap();

        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.database.url.as_deref(), Some("postgres://propgate@localhost/propgate"));
        assert_eq!(config.database.max_connections, 10);
        assert!((config.policy.expense_amount_threshold - 250.0).abs() < f64::EPSILON);
        assert!(config.policy.is_gated("lease", Action::Delete));
        assert!(!config.policy.is_gated("expense", Action::Delete));
        assert!(!config.policy.is_gated("property", Action::Update));
        assert_eq!(config.audit.retention_days, 30);
        assert_eq!(config.audit.stats_window_days, 30);
    }

    #[test]
    fn test_unknown_gated_action_is_rejected() {
        let result = GatewayConfig::from_toml_str(
            r#"
            [policy.gated_actions]
            expense = ["approve"]
            "#,
        );
        assert!(result.is_err());
    }
}
