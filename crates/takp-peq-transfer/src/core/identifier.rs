//! Identifier validation and quoting for dynamically built MySQL statements.
//!
//! Table and column names cannot be bound as statement parameters, so every
//! identifier interpolated into SQL goes through [`quote_mysql`].

use crate::error::{Result, TransferError};

/// MySQL's identifier length limit.
const MAX_IDENTIFIER_LENGTH: usize = 64;

/// Validate an identifier.
///
/// Rejects empty names, names containing null bytes and names longer than
/// MySQL allows.
pub fn validate_identifier(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(TransferError::Config(
            "Identifier cannot be empty".to_string(),
        ));
    }

    if name.contains('\0') {
        return Err(TransferError::Config(format!(
            "Identifier contains null byte: {:?}",
            name
        )));
    }

    if name.chars().count() > MAX_IDENTIFIER_LENGTH {
        return Err(TransferError::Config(format!(
            "Identifier exceeds maximum length of {} characters: {:?}",
            MAX_IDENTIFIER_LENGTH, name
        )));
    }

    Ok(())
}

/// Quote a MySQL identifier with backticks, doubling embedded backticks.
pub fn quote_mysql(name: &str) -> Result<String> {
    validate_identifier(name)?;
    Ok(format!("`{}`", name.replace('`', "``")))
}
