//! Error types for ProfileVault

use std::time::Duration;

use thiserror::Error;

/// Main error type for ProfileVault operations
#[derive(Error, Debug)]
pub enum VaultError {
    /// Key derivation, encryption, or decryption failed
    /// (corrupted token, wrong key, or a blob that is not ours)
    #[error("Crypto error: {0}")]
    Crypto(String),

    /// Operation referenced a profile id absent from the collection
    #[error("Profile not found: {0}")]
    NotFound(String),

    /// Save attempted with an id that already exists
    #[error("Profile with ID {0} already exists. Use updateProfile instead.")]
    DuplicateId(String),

    /// Malformed import payload or out-of-range value
    #[error("Invalid data format: {0}")]
    Validation(String),

    /// A request omitted a field the operation cannot run without
    #[error("{0}")]
    MissingInput(String),

    /// A handler panicked while processing a request
    #[error("Handler for {0} panicked: {1}")]
    HandlerPanicked(String, String),

    /// No handler bound to the message type of an inbound request
    #[error("No handler registered for message type: {0}")]
    NoHandler(String),

    /// The transport could not deliver a request or its response
    #[error("Transport error: {0}")]
    Transport(String),

    /// The remote handler answered with a failure response
    #[error("{0}")]
    Remote(String),

    /// No response arrived within the configured deadline
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// Error during serialization/deserialization
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Error during backend storage operations
    #[error("Storage error: {0}")]
    Storage(String),

    /// Database creation/opening error
    #[error("Database error: {0}")]
    Database(#[from] redb::DatabaseError),

    /// Transaction error
    #[error("Transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),

    /// Table error
    #[error("Table error: {0}")]
    Table(#[from] redb::TableError),

    /// Storage operation error
    #[error("Storage operation error: {0}")]
    StorageOp(#[from] redb::StorageError),

    /// Commit error
    #[error("Commit error: {0}")]
    Commit(#[from] redb::CommitError),

    /// General I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias using VaultError
pub type VaultResult<T> = Result<T, VaultError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = VaultError::NotFound("01HZX".to_string());
        assert_eq!(format!("{}", err), "Profile not found: 01HZX");
    }

    #[test]
    fn test_no_handler_message() {
        let err = VaultError::NoHandler("DETECT_FORMS".to_string());
        assert_eq!(
            err.to_string(),
            "No handler registered for message type: DETECT_FORMS"
        );
    }

    #[test]
    fn test_remote_error_is_verbatim() {
        let err = VaultError::Remote("Profile ID is required".to_string());
        assert_eq!(err.to_string(), "Profile ID is required");
    }

    #[test]
    fn test_missing_input_is_unprefixed() {
        let err = VaultError::MissingInput("Settings data is required".to_string());
        assert_eq!(err.to_string(), "Settings data is required");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let vault_err: VaultError = io_err.into();
        assert!(matches!(vault_err, VaultError::Io(_)));
    }
}
