//! Configuration loading and validation.
//!
//! Connection settings come from the environment (`HOST`, `USERNAME`,
//! `PASSWD`, `EQEMU_DATABASE`, `EQMACEMU_DATABASE`, and optionally `PORT`
//! and `SSL_MODE`) or from a YAML file with the same structure as [`Config`].

mod types;
mod validation;

pub use types::*;

use crate::error::{Result, TransferError};
use std::path::Path;

/// Environment variable holding the database host.
pub const ENV_HOST: &str = "HOST";
/// Environment variable holding the database port.
pub const ENV_PORT: &str = "PORT";
/// Environment variable holding the username for both schemas.
pub const ENV_USERNAME: &str = "USERNAME";
/// Environment variable holding the password for both schemas.
pub const ENV_PASSWD: &str = "PASSWD";
/// Environment variable naming the destination (PEQ) schema.
pub const ENV_EQEMU_DATABASE: &str = "EQEMU_DATABASE";
/// Environment variable naming the source (TAKP) schema.
pub const ENV_EQMACEMU_DATABASE: &str = "EQMACEMU_DATABASE";
/// Environment variable holding the TLS mode.
pub const ENV_SSL_MODE: &str = "SSL_MODE";

impl Config {
    /// Load configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Build configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable lookup.
    ///
    /// Both schemas live on the same server and share credentials; only the
    /// schema name differs.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key)
                .filter(|v| !v.is_empty())
                .ok_or_else(|| TransferError::Config(format!("{} is not set", key)))
        };

        let host = required(ENV_HOST)?;
        let user = required(ENV_USERNAME)?;
        let target_db = required(ENV_EQEMU_DATABASE)?;
        let source_db = required(ENV_EQMACEMU_DATABASE)?;
        let password = lookup(ENV_PASSWD).unwrap_or_default();

        let port = match lookup(ENV_PORT).filter(|v| !v.is_empty()) {
            Some(raw) => raw.parse::<u16>().map_err(|_| {
                TransferError::Config(format!("{} must be a port number, got '{}'", ENV_PORT, raw))
            })?,
            None => default_mysql_port(),
        };
        let ssl_mode = lookup(ENV_SSL_MODE)
            .filter(|v| !v.is_empty())
            .unwrap_or_else(default_ssl_mode);

        let database = |name: String| DatabaseConfig {
            host: host.clone(),
            port,
            database: name,
            user: user.clone(),
            password: password.clone(),
            ssl_mode: ssl_mode.clone(),
        };

        let config = Config {
            source: database(source_db),
            target: database(target_db),
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        validation::validate(self)
    }
}

impl DatabaseConfig {
    /// Build a `mysql://` URL with the password masked, for log output.
    pub fn display_url(&self) -> String {
        format!(
            "mysql://{}@{}:{}/{}",
            self.user, self.host, self.port, self.database
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn full_env() -> HashMap<String, String> {
        env(&[
            ("HOST", "db.local"),
            ("USERNAME", "eq"),
            ("PASSWD", "secret"),
            ("EQEMU_DATABASE", "peq"),
            ("EQMACEMU_DATABASE", "takp"),
        ])
    }

    #[test]
    fn test_from_lookup_maps_schemas() {
        let vars = full_env();
        let config = Config::from_lookup(|k| vars.get(k).cloned()).unwrap();

        assert_eq!(config.source.database, "takp");
        assert_eq!(config.target.database, "peq");
        assert_eq!(config.source.host, "db.local");
        assert_eq!(config.target.user, "eq");
        assert_eq!(config.source.port, 3306);
        assert_eq!(config.target.ssl_mode, "prefer");
    }

    #[test]
    fn test_from_lookup_missing_variable() {
        let mut vars = full_env();
        vars.remove("EQMACEMU_DATABASE");
        let err = Config::from_lookup(|k| vars.get(k).cloned()).unwrap_err();
        assert!(err.to_string().contains("EQMACEMU_DATABASE"));
    }

    #[test]
    fn test_from_lookup_empty_password_allowed() {
        let mut vars = full_env();
        vars.remove("PASSWD");
        let config = Config::from_lookup(|k| vars.get(k).cloned()).unwrap();
        assert!(config.source.password.is_empty());
    }

    #[test]
    fn test_from_lookup_port_override() {
        let mut vars = full_env();
        vars.insert("PORT".into(), "3307".into());
        let config = Config::from_lookup(|k| vars.get(k).cloned()).unwrap();
        assert_eq!(config.source.port, 3307);
        assert_eq!(config.target.port, 3307);
    }

    #[test]
    fn test_from_lookup_bad_port() {
        let mut vars = full_env();
        vars.insert("PORT".into(), "mysql".into());
        assert!(Config::from_lookup(|k| vars.get(k).cloned()).is_err());
    }

    #[test]
    fn test_from_lookup_same_schema_rejected() {
        let mut vars = full_env();
        vars.insert("EQEMU_DATABASE".into(), "takp".into());
        assert!(Config::from_lookup(|k| vars.get(k).cloned()).is_err());
    }

    #[test]
    fn test_load_yaml_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "source:\n  host: localhost\n  database: takp\n  user: eq\n\
             target:\n  host: localhost\n  database: peq\n  user: eq\n  ssl_mode: disable"
        )
        .unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.source.port, 3306);
        assert_eq!(config.target.ssl_mode, "disable");
        assert_eq!(config.target.display_url(), "mysql://eq@localhost:3306/peq");
    }
}
