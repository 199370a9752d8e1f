pub mod codec;
pub mod xml_backend;

use std::path::{Path, PathBuf};

use crate::{errors::LedgerError, ledger::MonthlyLedger};

pub type Result<T> = std::result::Result<T, LedgerError>;

/// Whether a load found a file to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStatus {
    Loaded,
    /// No file at the path; the report carries an empty ledger.
    FileAbsent,
}

/// Outcome of a successful load.
#[derive(Debug, Clone)]
pub struct LoadReport {
    pub ledger: MonthlyLedger,
    pub path: PathBuf,
    pub status: LoadStatus,
}

impl LoadReport {
    pub fn is_absent(&self) -> bool {
        self.status == LoadStatus::FileAbsent
    }
}

/// Abstraction over persistence backends that read and write year-files.
pub trait StorageBackend: Send + Sync {
    fn load(&self, path: &Path) -> Result<LoadReport>;
    fn save(&self, ledger: &MonthlyLedger, path: &Path) -> Result<()>;
}

pub use xml_backend::{load_ledger_from_path, save_ledger_to_path, XmlStorage};
