//! Error types for the character transfer library.

use thiserror::Error;

/// Exit code for configuration errors.
pub const EXIT_CONFIG_ERROR: u8 = 1;
/// Exit code when a database cannot be reached.
pub const EXIT_CONNECTION_ERROR: u8 = 2;
/// Exit code when the character is missing from the source.
pub const EXIT_NOT_FOUND: u8 = 3;
/// Exit code when the character name matches several source rows.
pub const EXIT_AMBIGUOUS: u8 = 4;
/// Exit code when the character already exists in the destination.
pub const EXIT_ALREADY_EXISTS: u8 = 5;
/// Exit code for incompatible schemas.
pub const EXIT_SCHEMA_MISMATCH: u8 = 6;
/// Exit code for file errors.
pub const EXIT_IO_ERROR: u8 = 7;
/// Exit code when the destination transaction was rolled back.
pub const EXIT_TRANSACTION_ERROR: u8 = 8;
/// Exit code for source data that cannot be transformed.
pub const EXIT_INVALID_RECORD: u8 = 9;
/// Exit code for any other query failure.
pub const EXIT_QUERY_ERROR: u8 = 10;
/// Exit code for command-line usage errors. Never returned by
/// [`TransferError::exit_code`].
pub const EXIT_USAGE_ERROR: u8 = 11;

/// Main error type for transfer operations.
#[derive(Error, Debug)]
pub enum TransferError {
    /// Configuration error (missing variables, invalid YAML, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// No source character with the requested name.
    #[error("Character '{0}' does not exist in the source database")]
    NotFound(String),

    /// Several source characters share the requested name.
    #[error("Character name '{name}' matches {count} rows in the source database")]
    Ambiguous { name: String, count: usize },

    /// The destination already has a character with this name.
    #[error("Character '{name}' already exists in the destination database (id {id})")]
    AlreadyExists { name: String, id: i64 },

    /// Connection or pool error with context.
    #[error("Connection error: {message}\n  Context: {context}")]
    Connection { message: String, context: String },

    /// A mapped table lacks expected columns.
    #[error("Schema mismatch in {database}.{table}: missing columns {missing:?}")]
    SchemaMismatch {
        database: String,
        table: String,
        missing: Vec<String>,
    },

    /// A destination write failed and the transaction was rolled back.
    #[error("Transaction rolled back while writing {table}: {message}")]
    Transaction { table: String, message: String },

    /// Source data that cannot be mapped onto the destination schema.
    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    /// Query failed outside the destination transaction.
    #[error("Query failed ({context}): {message}")]
    Query { message: String, context: String },

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl TransferError {
    /// Create a Connection error with context about where it occurred
    pub fn connection(message: impl ToString, context: impl Into<String>) -> Self {
        TransferError::Connection {
            message: message.to_string(),
            context: context.into(),
        }
    }

    /// Create a Query error with context about where it occurred
    pub fn query(message: impl ToString, context: impl Into<String>) -> Self {
        TransferError::Query {
            message: message.to_string(),
            context: context.into(),
        }
    }

    /// Create a Transaction error
    pub fn transaction(table: impl Into<String>, message: impl ToString) -> Self {
        TransferError::Transaction {
            table: table.into(),
            message: message.to_string(),
        }
    }

    /// Process exit code for this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            TransferError::Config(_) | TransferError::Yaml(_) => EXIT_CONFIG_ERROR,
            TransferError::Connection { .. } => EXIT_CONNECTION_ERROR,
            TransferError::NotFound(_) => EXIT_NOT_FOUND,
            TransferError::Ambiguous { .. } => EXIT_AMBIGUOUS,
            TransferError::AlreadyExists { .. } => EXIT_ALREADY_EXISTS,
            TransferError::SchemaMismatch { .. } => EXIT_SCHEMA_MISMATCH,
            TransferError::Io(_) => EXIT_IO_ERROR,
            TransferError::Transaction { .. } => EXIT_TRANSACTION_ERROR,
            TransferError::InvalidRecord(_) => EXIT_INVALID_RECORD,
            TransferError::Query { .. } | TransferError::Json(_) => EXIT_QUERY_ERROR,
        }
    }

    /// Format error with full details including error chain
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }
}

/// Result type alias for transfer operations.
pub type Result<T> = std::result::Result<T, TransferError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes_are_distinct_per_kind() {
        let errors = [
            TransferError::Config("x".into()),
            TransferError::connection("refused", "source"),
            TransferError::NotFound("Fippy".into()),
            TransferError::Ambiguous {
                name: "Fippy".into(),
                count: 2,
            },
            TransferError::AlreadyExists {
                name: "Fippy".into(),
                id: 7,
            },
            TransferError::SchemaMismatch {
                database: "peq".into(),
                table: "inventory".into(),
                missing: vec!["guid".into()],
            },
            TransferError::Io(std::io::Error::new(std::io::ErrorKind::NotFound, "gone")),
            TransferError::transaction("inventory", "duplicate key"),
            TransferError::InvalidRecord("bad slot".into()),
            TransferError::query("syntax", "loading rows"),
        ];

        let mut codes: Vec<u8> = errors.iter().map(|e| e.exit_code()).collect();
        assert!(codes.iter().all(|c| *c != 0 && *c != EXIT_USAGE_ERROR));
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), errors.len());
    }

    #[test]
    fn test_format_detailed_includes_cause_chain() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = TransferError::Io(io);
        let detailed = err.format_detailed();
        assert!(detailed.starts_with("Error: IO error: denied"));
    }

    #[test]
    fn test_already_exists_message_names_character() {
        let err = TransferError::AlreadyExists {
            name: "Fippy".into(),
            id: 12,
        };
        assert_eq!(
            err.to_string(),
            "Character 'Fippy' already exists in the destination database (id 12)"
        );
    }
}
