//! Application configuration management.

use serde::Deserialize;

use crate::error::AppResult;

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Database configuration.
    pub database: DatabaseConfig,
    /// Collaborating services (contracts, leave workflow).
    #[serde(default)]
    pub services: ServicesConfig,
    /// Ledger engine and batch job tuning.
    #[serde(default)]
    pub ledger: LedgerConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on.
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

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Database connection URL.
    pub url: String,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    1
}

/// Base URLs and timeouts of the services Saldo calls.
#[derive(Debug, Clone, Deserialize)]
pub struct ServicesConfig {
    /// Contract / labor-agreement configuration service.
    #[serde(default = "default_contracts_url")]
    pub contracts_base_url: String,
    /// Leave-request workflow service.
    #[serde(default = "default_leave_requests_url")]
    pub leave_requests_base_url: String,
    /// Per-request timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for ServicesConfig {
    fn default() -> Self {
        Self {
            contracts_base_url: default_contracts_url(),
            leave_requests_base_url: default_leave_requests_url(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

fn default_contracts_url() -> String {
    "http://localhost:8081".to_string()
}

fn default_leave_requests_url() -> String {
    "http://localhost:8082".to_string()
}

fn default_timeout_ms() -> u64 {
    3000
}

/// Ledger engine and batch job settings.
#[derive(Debug, Clone, Deserialize)]
pub struct LedgerConfig {
    /// Lifetime of a reservation when the caller gives no expiry.
    #[serde(default = "default_reservation_ttl_hours")]
    pub reservation_ttl_hours: i64,
    /// Carry-over window used when no agreement version specifies one.
    #[serde(default = "default_carryover_months")]
    pub carryover_months: u32,
    /// Rows per auto-fix batch.
    #[serde(default = "default_batch_size")]
    pub reconciliation_batch_size: usize,
    /// Whether reconciliation repairs what it finds.
    #[serde(default)]
    pub reconciliation_auto_fix: bool,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            reservation_ttl_hours: default_reservation_ttl_hours(),
            carryover_months: default_carryover_months(),
            reconciliation_batch_size: default_batch_size(),
            reconciliation_auto_fix: false,
        }
    }
}

fn default_reservation_ttl_hours() -> i64 {
    72
}

fn default_carryover_months() -> u32 {
    18
}

fn default_batch_size() -> usize {
    100
}

impl AppConfig {
    /// Loads configuration from environment and config files.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded.
    pub fn load() -> AppResult<Self> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{run_mode}")).required(false))
            .add_source(
                config::Environment::with_prefix("SALDO")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(config.try_deserialize()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_from_environment_with_defaults() {
        temp_env::with_vars(
            [
                ("SALDO__DATABASE__URL", Some("postgres://localhost/saldo_test")),
                ("SALDO__LEDGER__CARRYOVER_MONTHS", None::<&str>),
                ("RUN_MODE", Some("test-no-such-file")),
            ],
            || {
                let config = AppConfig::load().unwrap();
                assert_eq!(config.database.url, "postgres://localhost/saldo_test");
                assert_eq!(config.server.port, 8080);
                assert_eq!(config.services.timeout_ms, 3000);
                assert_eq!(config.ledger.carryover_months, 18);
                assert_eq!(config.ledger.reconciliation_batch_size, 100);
                assert!(!config.ledger.reconciliation_auto_fix);
            },
        );
    }

    #[test]
    fn test_environment_overrides_ledger_settings() {
        temp_env::with_vars(
            [
                ("SALDO__DATABASE__URL", Some("postgres://localhost/saldo_test")),
                ("SALDO__LEDGER__CARRYOVER_MONTHS", Some("24")),
                ("SALDO__LEDGER__RECONCILIATION_AUTO_FIX", Some("true")),
                ("RUN_MODE", Some("test-no-such-file")),
            ],
            || {
                let config = AppConfig::load().unwrap();
                assert_eq!(config.ledger.carryover_months, 24);
                assert!(config.ledger.reconciliation_auto_fix);
            },
        );
    }

    #[test]
    fn test_missing_database_url_fails() {
        temp_env::with_vars(
            [
                ("SALDO__DATABASE__URL", None::<&str>),
                ("RUN_MODE", Some("test-no-such-file")),
            ],
            || {
                let err = AppConfig::load().unwrap_err();
                assert_eq!(err.error_code(), "CONFIG_ERROR");
            },
        );
    }

    #[test]
    fn test_ledger_defaults_from_json() {
        let ledger: LedgerConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(ledger.reservation_ttl_hours, 72);
        assert_eq!(ledger.carryover_months, 18);
    }
}
