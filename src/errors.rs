use std::path::PathBuf;

use thiserror::Error;
use uuid::Uuid;

/// Error type that captures bill ledger and persistence failures.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Unknown month: {0}")]
    UnknownMonth(String),
    #[error("Month already exists: {0}")]
    DuplicateMonth(String),
    #[error("Bill not found: {0}")]
    BillNotFound(Uuid),
    #[error("Corrupt bill record #{bill}: {reason}")]
    CorruptRecord { bill: usize, reason: String },
    #[error("Unable to write `{}`: {source}", path.display())]
    WriteError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Configuration error: {0}")]
    Config(String),
}

impl LedgerError {
    pub(crate) fn corrupt(bill: usize, reason: impl Into<String>) -> Self {
        LedgerError::CorruptRecord {
            bill,
            reason: reason.into(),
        }
    }

    pub(crate) fn write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        LedgerError::WriteError {
            path: path.into(),
            source,
        }
    }
}

impl From<serde_json::Error> for LedgerError {
    fn from(err: serde_json::Error) -> Self {
        LedgerError::Config(err.to_string())
    }
}
