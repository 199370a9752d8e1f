#![allow(dead_code)]

use std::{path::PathBuf, sync::Mutex};

use bill_ledger::{config::ConfigManager, storage::XmlStorage, LedgerService};
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use tempfile::TempDir;

/// Holds TempDir guards so temporary folders live for the duration of the test run.
static TEST_DIRS: Lazy<Mutex<Vec<TempDir>>> = Lazy::new(|| Mutex::new(Vec::new()));

pub struct TestEnv {
    pub base: PathBuf,
    pub service: LedgerService,
    pub config_manager: ConfigManager,
}

impl TestEnv {
    /// A year-file next to the config file, outside `ledgers/`.
    pub fn year_file(&self, year: &str) -> PathBuf {
        self.base.join(format!("{}.xml", year))
    }
}

/// Creates a service backed by XML storage and a config file in a unique directory.
pub fn setup_test_env() -> TestEnv {
    let temp = TempDir::new().expect("create temp dir");
    let base = temp.path().to_path_buf();
    TEST_DIRS.lock().expect("lock temp dir registry").push(temp);

    let config_manager =
        ConfigManager::with_base_dir(base.clone()).expect("create config manager for temp dir");
    let service = LedgerService::new(Box::new(XmlStorage::new()))
        .with_config_manager(config_manager.clone())
        .expect("load default config")
        .with_clock(fixed_today);

    TestEnv {
        base,
        service,
        config_manager,
    }
}

pub fn fixed_today() -> NaiveDate {
    date(2024, 2, 20)
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}
