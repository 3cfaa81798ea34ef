//! Configuration validation.

use super::{Config, DatabaseConfig};
use crate::error::{Result, TransferError};

const SSL_MODES: &[&str] = &[
    "disable",
    "prefer",
    "require",
    "verify-ca",
    "verify_ca",
    "verify-full",
    "verify_identity",
];

/// Validate the configuration.
pub fn validate(config: &Config) -> Result<()> {
    validate_database("source", &config.source)?;
    validate_database("target", &config.target)?;

    // Cannot copy into the same schema
    if config.source.host == config.target.host
        && config.source.port == config.target.port
        && config.source.database == config.target.database
    {
        return Err(TransferError::Config(
            "source and target cannot be the same database".into(),
        ));
    }

    Ok(())
}

fn validate_database(side: &str, db: &DatabaseConfig) -> Result<()> {
    if db.host.is_empty() {
        return Err(TransferError::Config(format!("{}.host is required", side)));
    }
    if db.database.is_empty() {
        return Err(TransferError::Config(format!(
            "{}.database is required",
            side
        )));
    }
    if db.user.is_empty() {
        return Err(TransferError::Config(format!("{}.user is required", side)));
    }
    if !SSL_MODES.contains(&db.ssl_mode.to_lowercase().as_str()) {
        return Err(TransferError::Config(format!(
            "{}.ssl_mode must be one of {:?}, got '{}'",
            side, SSL_MODES, db.ssl_mode
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn database(name: &str) -> DatabaseConfig {
        DatabaseConfig {
            host: "localhost".to_string(),
            port: 3306,
            database: name.to_string(),
            user: "eq".to_string(),
            password: "password".to_string(),
            ssl_mode: "prefer".to_string(),
        }
    }

    fn valid_config() -> Config {
        Config {
            source: database("takp"),
            target: database("peq"),
        }
    }

    #[test]
    fn test_valid_config() {
        let config = valid_config();
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_missing_source_host() {
        let mut config = valid_config();
        config.source.host = "".to_string();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_missing_target_user() {
        let mut config = valid_config();
        config.target.user = "".to_string();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_same_database_rejected() {
        let mut config = valid_config();
        config.target.database = "takp".to_string();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_same_name_on_other_port_allowed() {
        let mut config = valid_config();
        config.target.database = "takp".to_string();
        config.target.port = 3307;
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_unknown_ssl_mode() {
        let mut config = valid_config();
        config.source.ssl_mode = "sometimes".to_string();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_database_config_debug_redacts_password() {
        let mut config = valid_config();
        config.source.password = "super_secret_password_123".to_string();
        let debug_output = format!("{:?}", config.source);
        assert!(
            debug_output.contains("[REDACTED]"),
            "Debug output should contain [REDACTED]"
        );
        assert!(
            !debug_output.contains("super_secret_password_123"),
            "Debug output should not contain actual password value"
        );
    }
}
