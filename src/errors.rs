//! Error types for the casino core
//!
//! Bet-level failures are expected outcomes surfaced to the caller; storage
//! failures are the only fatal class.

use thiserror::Error;

/// Root error type for all casino operations
#[derive(Debug, Error)]
pub enum CasinoError {
    /// Recoverable, user-visible betting errors
    #[error("Bet error: {0}")]
    Bet(#[from] BetError),

    /// Storage system errors
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Configuration related errors
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    /// Outbound message could not be handed to the transport
    #[error("Delivery failed: {0}")]
    Delivery(String),
}

/// Expected betting conditions reported back to the player
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BetError {
    #[error("Insufficient funds: balance {balance}, requested {requested}")]
    InsufficientFunds { balance: i64, requested: i64 },

    #[error("Invalid bet descriptor: {0}")]
    InvalidDescriptor(String),

    #[error("No bet at index {index} ({available} bets stored)")]
    IndexOutOfRange { index: usize, available: usize },

    #[error("Betting is closed, the wheel is about to spin")]
    BettingClosed,

    #[error("Invalid stake: {0}")]
    InvalidStake(i64),
}

/// Storage system errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database open failed: {0}")]
    DatabaseOpenFailed(String),

    #[error("Read failed: {0}")]
    ReadFailed(String),

    #[error("Write failed: {0}")]
    WriteFailed(String),

    #[error("Corrupted data: {0}")]
    CorruptedData(String),

    #[error("Balance overflow for account {0}")]
    BalanceOverflow(String),
}

/// Configuration and validation errors
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    #[error("Missing required field: {0}")]
    MissingRequired(String),

    #[error("Invalid value for {field}: '{value}' ({reason})")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("Failed to save configuration: {0}")]
    SaveFailed(String),
}

impl CasinoError {
    /// True for conditions the caller should report to the player rather
    /// than treat as a fault.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, CasinoError::Bet(_))
    }

    /// The betting error, if this is one.
    pub fn as_bet_error(&self) -> Option<&BetError> {
        match self {
            CasinoError::Bet(e) => Some(e),
            _ => None,
        }
    }
}

// External error conversions
impl From<rocksdb::Error> for CasinoError {
    fn from(e: rocksdb::Error) -> Self {
        CasinoError::Storage(StorageError::WriteFailed(e.to_string()))
    }
}

impl From<std::io::Error> for CasinoError {
    fn from(e: std::io::Error) -> Self {
        match e.kind() {
            std::io::ErrorKind::PermissionDenied | std::io::ErrorKind::NotFound => {
                CasinoError::Storage(StorageError::ReadFailed(e.to_string()))
            }
            _ => CasinoError::Storage(StorageError::WriteFailed(e.to_string())),
        }
    }
}

impl From<serde_json::Error> for CasinoError {
    fn from(e: serde_json::Error) -> Self {
        CasinoError::Storage(StorageError::CorruptedData(e.to_string()))
    }
}

/// Convenience type alias for Results
pub type CasinoResult<T> = Result<T, CasinoError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_error_display() {
        let err: CasinoError = BetError::InsufficientFunds {
            balance: 100,
            requested: 500,
        }
        .into();

        assert!(err.to_string().contains("Bet error"));
        assert!(err.to_string().contains("balance 100"));
        assert!(err.to_string().contains("requested 500"));
    }

    #[test]
    fn test_recoverable_classification() {
        let bet: CasinoError = BetError::BettingClosed.into();
        let storage: CasinoError = StorageError::WriteFailed("disk full".to_string()).into();

        assert!(bet.is_recoverable());
        assert_eq!(bet.as_bet_error(), Some(&BetError::BettingClosed));
        assert!(!storage.is_recoverable());
        assert!(storage.as_bet_error().is_none());
    }

    #[test]
    fn test_error_source() {
        let err: CasinoError = ConfigurationError::ValidationFailed("test".to_string()).into();
        assert!(err.source().is_some());
    }

    #[test]
    fn test_json_error_maps_to_corruption() {
        let json_err = serde_json::from_slice::<u64>(b"not json").unwrap_err();
        let err: CasinoError = json_err.into();

        match err {
            CasinoError::Storage(StorageError::CorruptedData(_)) => {}
            other => panic!("Expected corrupted data, got {other:?}"),
        }
    }
}
