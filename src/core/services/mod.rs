pub mod ledger_service;

pub use ledger_service::LedgerService;

use crate::errors::LedgerError;

pub type ServiceResult<T> = Result<T, ServiceError>;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error("{0}")]
    Invalid(String),
    #[error("No file has been chosen for this ledger")]
    NoTargetPath,
}
