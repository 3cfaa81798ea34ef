//! Configuration type definitions.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Source database (TAKP / EQMacEmu).
    pub source: DatabaseConfig,

    /// Destination database (PEQ / EQEmu).
    pub target: DatabaseConfig,
}

/// Connection settings for one MySQL/MariaDB schema.
#[derive(Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database host.
    pub host: String,

    /// Database port (default: 3306).
    #[serde(default = "default_mysql_port")]
    pub port: u16,

    /// Schema name.
    pub database: String,

    /// Username.
    pub user: String,

    /// Password.
    #[serde(default)]
    pub password: String,

    /// TLS mode: disable, prefer, require, verify-ca, verify-full (default: prefer).
    #[serde(default = "default_ssl_mode")]
    pub ssl_mode: String,
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .field("ssl_mode", &self.ssl_mode)
            .finish()
    }
}

pub(crate) fn default_mysql_port() -> u16 {
    3306
}

pub(crate) fn default_ssl_mode() -> String {
    "prefer".to_string()
}
