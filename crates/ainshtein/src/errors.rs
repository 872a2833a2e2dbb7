use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A structured error suitable for printing to the UI layer (CLI JSON output).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserError {
    pub code: String,
    pub message: String,
}

impl UserError {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_owned(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WalletError {
    #[error("invalid recovery phrase: {0}")]
    InvalidRecoveryPhrase(String),

    #[error("derivation failed for {path}: {reason}")]
    DerivationFailure { path: String, reason: String },

    #[error("invalid private key format")]
    InvalidPrivateKeyFormat,

    #[error("balance query failed for {public_key}: {reason}")]
    BalanceQueryFailure { public_key: String, reason: String },

    #[error("stored credential is corrupt: {0}")]
    StorageCorrupt(String),

    #[error("failed to persist credential: {0}")]
    StorageWriteFailure(String),

    #[error("credential store busy")]
    StorageBusy,

    #[error("account {0} was not offered for selection")]
    SelectionNotOffered(String),

    #[error("no wallet imported")]
    NotImported,
}

impl WalletError {
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidRecoveryPhrase(_) => "invalid_recovery_phrase",
            Self::DerivationFailure { .. } => "derivation_failure",
            Self::InvalidPrivateKeyFormat => "invalid_private_key_format",
            Self::BalanceQueryFailure { .. } => "balance_query_failure",
            Self::StorageCorrupt(_) => "storage_corrupt",
            Self::StorageWriteFailure(_) => "storage_write_failure",
            Self::StorageBusy => "storage_busy",
            Self::SelectionNotOffered(_) => "selection_not_offered",
            Self::NotImported => "not_imported",
        }
    }
}

impl From<WalletError> for UserError {
    fn from(e: WalletError) -> Self {
        match &e {
            WalletError::InvalidRecoveryPhrase(_) => Self::new(
                e.code(),
                "Invalid seed phrase. Please check and try again.",
            ),
            WalletError::InvalidPrivateKeyFormat => Self::new(
                e.code(),
                "Invalid private key format. Please provide a valid Solana private key.",
            ),
            WalletError::StorageCorrupt(_) => {
                Self::new(e.code(), "Failed to load wallet: invalid storage format")
            }
            WalletError::StorageBusy => {
                Self::new(e.code(), "credential store busy; retry the operation")
            }
            WalletError::DerivationFailure { .. }
            | WalletError::BalanceQueryFailure { .. }
            | WalletError::StorageWriteFailure(_)
            | WalletError::SelectionNotOffered(_)
            | WalletError::NotImported => Self::new(e.code(), e.to_string()),
        }
    }
}
