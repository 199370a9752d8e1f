use std::{
    fs::{self, File},
    io::{self, BufReader, BufWriter, Write},
    path::{Path, PathBuf},
};

use tracing::{debug, info, warn};

use crate::{errors::LedgerError, ledger::MonthlyLedger};

use super::{codec, LoadReport, LoadStatus, Result, StorageBackend};

const TMP_SUFFIX: &str = "tmp";

/// Stores each ledger as an XML year-file at a caller-chosen path.
#[derive(Debug, Clone, Copy, Default)]
pub struct XmlStorage;

impl XmlStorage {
    pub fn new() -> Self {
        Self
    }
}

impl StorageBackend for XmlStorage {
    fn load(&self, path: &Path) -> Result<LoadReport> {
        load_ledger_from_path(path)
    }

    fn save(&self, ledger: &MonthlyLedger, path: &Path) -> Result<()> {
        save_ledger_to_path(ledger, path)
    }
}

/// Loads a year-file. A missing file is not an error: the report carries an
/// empty ledger with [`LoadStatus::FileAbsent`].
pub fn load_ledger_from_path(path: &Path) -> Result<LoadReport> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            info!(path = %path.display(), "no ledger file, starting empty");
            return Ok(LoadReport {
                ledger: MonthlyLedger::new(year_label(path)),
                path: path.to_path_buf(),
                status: LoadStatus::FileAbsent,
            });
        }
        Err(err) => return Err(LedgerError::Io(err)),
    };

    let mut ledger = codec::read_ledger(BufReader::new(file)).map_err(|err| {
        warn!(path = %path.display(), error = %err, "ledger load aborted");
        err
    })?;
    ledger.year = year_label(path);
    info!(
        path = %path.display(),
        months = ledger.month_count(),
        bills = ledger.bill_count(),
        "ledger loaded"
    );
    Ok(LoadReport {
        ledger,
        path: path.to_path_buf(),
        status: LoadStatus::Loaded,
    })
}

/// Writes the ledger to a sibling temporary file and renames it into place,
/// so a failed save never leaves a half-written year-file behind.
pub fn save_ledger_to_path(ledger: &MonthlyLedger, path: &Path) -> Result<()> {
    let tmp = tmp_path(path);
    if let Err(err) = write_atomic(&tmp, ledger).and_then(|_| fs::rename(&tmp, path)) {
        let _ = fs::remove_file(&tmp);
        warn!(path = %path.display(), error = %err, "ledger save failed");
        return Err(LedgerError::write(path, err));
    }
    info!(path = %path.display(), bills = ledger.bill_count(), "ledger saved");
    Ok(())
}

fn write_atomic(path: &Path, ledger: &MonthlyLedger) -> io::Result<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    codec::write_ledger(&mut writer, ledger)?;
    writer.flush()?;
    writer.get_ref().sync_all()?;
    debug!(path = %path.display(), "staged ledger file");
    Ok(())
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut tmp = path.to_path_buf();
    let ext = match path.extension().and_then(|ext| ext.to_str()) {
        Some(existing) => format!("{}.{}", existing, TMP_SUFFIX),
        None => TMP_SUFFIX.to_string(),
    };
    tmp.set_extension(ext);
    tmp
}

/// Year label derived from the file stem (`2024.xml` -> `2024`).
fn year_label(path: &Path) -> String {
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or_default()
        .to_string()
}
