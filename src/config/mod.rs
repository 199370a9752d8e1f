use serde::{Deserialize, Serialize};
use std::{
    fs::{self, File},
    io::Write,
    path::{Path, PathBuf},
};
use tracing::debug;

use crate::{
    core::utils::{app_data_dir, config_file_in, ensure_dir},
    errors::LedgerError,
    ledger::NO_ACCOUNT,
};

const TMP_SUFFIX: &str = "tmp";

/// User preferences kept next to the year-files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Year-file opened on startup and targeted by plain saves.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_file: Option<PathBuf>,
    /// Account tags bills may be paid from, besides `"None"`.
    #[serde(default = "Config::default_accounts")]
    pub accounts: Vec<String>,
    #[serde(default = "Config::default_currency_symbol")]
    pub currency_symbol: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_file: None,
            accounts: Self::default_accounts(),
            currency_symbol: Self::default_currency_symbol(),
        }
    }
}

impl Config {
    fn default_accounts() -> Vec<String> {
        vec!["Wayne".into(), "Nicki".into()]
    }

    fn default_currency_symbol() -> String {
        "£".into()
    }

    /// `"None"` is always accepted; other tags must be configured.
    pub fn accepts_account(&self, account: &str) -> bool {
        account == NO_ACCOUNT || self.accounts.iter().any(|known| known == account)
    }

    /// Amount with the configured currency symbol and two decimals.
    pub fn display_amount(&self, amount: f64) -> String {
        format!("{}{:.2}", self.currency_symbol, amount)
    }
}

#[derive(Debug, Clone)]
pub struct ConfigManager {
    path: PathBuf,
}

impl ConfigManager {
    pub fn new() -> Result<Self, LedgerError> {
        Self::with_base_dir(app_data_dir())
    }

    pub fn with_base_dir(base: PathBuf) -> Result<Self, LedgerError> {
        ensure_dir(&base)?;
        Ok(Self {
            path: config_file_in(&base),
        })
    }

    pub fn load(&self) -> Result<Config, LedgerError> {
        if self.path.exists() {
            let data = fs::read_to_string(&self.path)?;
            Ok(serde_json::from_str(&data)?)
        } else {
            Ok(Config::default())
        }
    }

    pub fn save(&self, config: &Config) -> Result<(), LedgerError> {
        if let Some(parent) = self.path.parent() {
            ensure_dir(parent)?;
        }
        let json = serde_json::to_string_pretty(config)?;
        let tmp = tmp_path(&self.path);
        write_atomic(&tmp, &json)?;
        fs::rename(&tmp, &self.path)?;
        debug!(path = %self.path.display(), "configuration saved");
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Directory the config file lives in; year-files are kept beneath it.
    pub fn base_dir(&self) -> &Path {
        self.path.parent().unwrap_or_else(|| Path::new("."))
    }
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

fn write_atomic(path: &Path, data: &str) -> Result<(), LedgerError> {
    let mut file = File::create(path)?;
    file.write_all(data.as_bytes())?;
    file.flush()?;
    Ok(())
}
