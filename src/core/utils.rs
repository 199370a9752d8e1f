use dirs::home_dir;
use std::{
    env, fs, io,
    path::{Path, PathBuf},
};

const DEFAULT_DIR_NAME: &str = ".bill_ledger";
const HOME_ENV: &str = "BILL_LEDGER_HOME";
const LEDGER_DIR: &str = "ledgers";
const CONFIG_FILE: &str = "config.json";
const LEDGER_EXTENSION: &str = "xml";

/// Returns the application-specific data directory, defaulting to `~/.bill_ledger`.
pub fn app_data_dir() -> PathBuf {
    if let Some(custom) = env::var_os(HOME_ENV) {
        return PathBuf::from(custom);
    }
    home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(DEFAULT_DIR_NAME)
}

/// Directory holding year-files under `base`.
pub fn ledgers_dir_in(base: &Path) -> PathBuf {
    base.join(LEDGER_DIR)
}

/// Canonical year-file path for `year` under `base`.
pub fn year_file_in(base: &Path, year: &str) -> PathBuf {
    ledgers_dir_in(base).join(format!("{}.{}", year.trim(), LEDGER_EXTENSION))
}

pub fn config_file_in(base: &Path) -> PathBuf {
    base.join(CONFIG_FILE)
}

pub fn ensure_dir(path: &Path) -> io::Result<()> {
    fs::create_dir_all(path)
}
