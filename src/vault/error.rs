// Credential store error types

use std::path::PathBuf;
use thiserror::Error;

/// Errors from the encrypted credential store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// `initialize` found an existing store file.
    #[error("credential store already exists at {}", .0.display())]
    AlreadyExists(PathBuf),

    /// The store file does not exist.
    #[error("credential store not initialized at {} (run `sshhop passwords init` first)", .0.display())]
    NotInitialized(PathBuf),

    /// The file is shorter than the salt.
    #[error("invalid credential store format")]
    Format,

    /// Authenticated decryption failed. Wrong passphrase and tampered data
    /// are deliberately indistinguishable.
    #[error("decryption failed (wrong master password or corrupted store)")]
    Decryption,

    /// `change_master_passphrase` could not decrypt with the old passphrase.
    #[error("incorrect old password")]
    IncorrectOldPassphrase,

    /// The cipher refused to encrypt.
    #[error("encryption failed")]
    Encryption,

    /// No entry with this ID.
    #[error("credential '{0}' not found")]
    NotFound(String),

    /// An entry with this ID is already stored.
    #[error("credential '{0}' already exists")]
    Duplicate(String),

    /// A stored secret decrypted to bytes that are not UTF-8.
    #[error("stored secret for '{0}' is not valid UTF-8")]
    InvalidSecret(String),

    /// A stored secret was not valid base64.
    #[error("failed to decode stored secret: {0}")]
    Encoding(#[from] base64::DecodeError),

    /// The decrypted entry list was not valid JSON.
    #[error("failed to parse credential store: {0}")]
    Json(#[from] serde_json::Error),

    /// Reading or writing the store file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
