//! Operations the interactive layer calls, one per user action.

use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDate};
use tracing::info;
use uuid::Uuid;

use crate::{
    config::{Config, ConfigManager},
    core::utils::{app_data_dir, ensure_dir, ledgers_dir_in, year_file_in},
    errors::LedgerError,
    ledger::{BillFields, BillRecord, MonthlyLedger},
    storage::{LoadStatus, StorageBackend},
};

use super::{ServiceError, ServiceResult};

/// Owns the open ledger and keeps its year-file in step with it.
///
/// Every mutating call writes the ledger to the current file before
/// returning. When the write fails the change stays in memory, the ledger is
/// marked dirty, and the error is returned so the caller can retry
/// [`LedgerService::save`]. Without a current file, changes stay in memory
/// until [`LedgerService::save_as`] picks one.
pub struct LedgerService {
    ledger: MonthlyLedger,
    current_path: Option<PathBuf>,
    dirty: bool,
    storage: Box<dyn StorageBackend>,
    config: Config,
    config_manager: Option<ConfigManager>,
    data_dir: PathBuf,
    today: fn() -> NaiveDate,
}

fn local_today() -> NaiveDate {
    Local::now().date_naive()
}

impl LedgerService {
    pub fn new(storage: Box<dyn StorageBackend>) -> Self {
        Self {
            ledger: MonthlyLedger::default(),
            current_path: None,
            dirty: false,
            storage,
            config: Config::default(),
            config_manager: None,
            data_dir: app_data_dir(),
            today: local_today,
        }
    }

    /// Loads preferences from `manager` and remembers it for `save_as`.
    pub fn with_config_manager(mut self, manager: ConfigManager) -> ServiceResult<Self> {
        self.config = manager.load()?;
        self.data_dir = manager.base_dir().to_path_buf();
        self.config_manager = Some(manager);
        Ok(self)
    }

    pub fn with_config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Replaces the date source used for `date_started`/`date_changed`.
    pub fn with_clock(mut self, today: fn() -> NaiveDate) -> Self {
        self.today = today;
        self
    }

    pub fn ledger(&self) -> &MonthlyLedger {
        &self.ledger
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn current_path(&self) -> Option<&Path> {
        self.current_path.as_deref()
    }

    /// True when the in-memory ledger holds changes the file does not.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn create_bill(&mut self, month: &str, fields: BillFields) -> ServiceResult<BillRecord> {
        self.validate(&fields)?;
        let record = BillRecord::new(fields, (self.today)());
        let id = self.ledger.add_record(month, record)?;
        let created = self.bill_snapshot(id)?;
        info!(month, bill = %created.name, "bill created");
        self.persist()?;
        Ok(created)
    }

    pub fn edit_bill(&mut self, id: Uuid, fields: BillFields) -> ServiceResult<BillRecord> {
        self.validate(&fields)?;
        let edited = self.ledger.update_record(id, fields, (self.today)())?.clone();
        info!(bill = %edited.name, previous = edited.previous_amount, amount = edited.amount, "bill edited");
        self.persist()?;
        Ok(edited)
    }

    /// Deletes a bill wherever it is filed. Unknown ids are a no-op.
    pub fn delete_bill(&mut self, id: Uuid) -> ServiceResult<Option<BillRecord>> {
        let Some(month) = self.ledger.month_of(id).map(str::to_string) else {
            return Ok(None);
        };
        let removed = self.ledger.remove_record(&month, id);
        if let Some(bill) = removed.as_ref() {
            info!(month = %month, bill = %bill.name, "bill deleted");
            self.persist()?;
        }
        Ok(removed)
    }

    pub fn move_bill(&mut self, id: Uuid, to: &str) -> ServiceResult<BillRecord> {
        let moved = self.ledger.move_record(id, to)?.clone();
        self.persist()?;
        Ok(moved)
    }

    /// Adds `name` and makes it the month being viewed.
    pub fn add_month(&mut self, name: &str) -> ServiceResult<()> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ServiceError::Invalid("Month name cannot be empty".into()));
        }
        self.ledger.add_month(name)?;
        self.ledger.set_current_month(name)?;
        info!(month = name, "month added");
        self.persist()
    }

    /// Removes the month and its bills, returning how many bills went with it.
    /// Deleting the viewed month leaves no month selected.
    pub fn delete_month(&mut self, name: &str) -> ServiceResult<usize> {
        let Some(removed) = self.ledger.remove_month(name) else {
            return Ok(0);
        };
        info!(month = name, bills = removed.len(), "month deleted");
        self.persist()?;
        Ok(removed.len())
    }

    pub fn switch_month(&mut self, name: &str) -> ServiceResult<()> {
        self.ledger.set_current_month(name)?;
        Ok(())
    }

    pub fn current_month(&self) -> Option<&str> {
        self.ledger.current_month()
    }

    /// Bills of the viewed month in display order.
    pub fn current_bills(&self) -> &[BillRecord] {
        match self.ledger.current_month() {
            Some(month) => self.ledger.bills(month),
            None => &[],
        }
    }

    pub fn total_for_current_month(&self) -> f64 {
        self.ledger
            .current_month()
            .map(|month| self.ledger.total(month))
            .unwrap_or(0.0)
    }

    pub fn total_for(&self, month: &str) -> f64 {
        self.ledger.total(month)
    }

    /// Months in calendar order, for month pickers.
    pub fn months(&self) -> Vec<String> {
        self.ledger.months_in_calendar_order()
    }

    pub fn addable_months(&self) -> Vec<&'static str> {
        self.ledger.addable_months()
    }

    /// Opens a year-file. On failure the open ledger and its path are kept.
    pub fn load(&mut self, path: &Path) -> ServiceResult<LoadStatus> {
        let report = self.storage.load(path)?;
        self.ledger = report.ledger;
        self.current_path = Some(report.path);
        self.dirty = false;
        Ok(report.status)
    }

    /// Opens `<data dir>/ledgers/<year>.xml`, starting an empty ledger that
    /// targets it when the file does not exist yet.
    pub fn open_year(&mut self, year: &str) -> ServiceResult<LoadStatus> {
        let year = year.trim();
        if year.is_empty() {
            return Err(ServiceError::Invalid("Year cannot be empty".into()));
        }
        ensure_dir(&ledgers_dir_in(&self.data_dir)).map_err(LedgerError::Io)?;
        let path = year_file_in(&self.data_dir, year);
        let status = self.load(&path)?;
        info!(year, path = %path.display(), ?status, "year opened");
        Ok(status)
    }

    /// Opens the configured default file, if one is set.
    pub fn open_default(&mut self) -> ServiceResult<Option<LoadStatus>> {
        match self.config.default_file.clone() {
            Some(path) => self.load(&path).map(Some),
            None => Ok(None),
        }
    }

    /// Starts a blank ledger for `year` stored at `path`.
    pub fn new_file(&mut self, path: &Path, year: &str) -> ServiceResult<()> {
        self.storage.save(&MonthlyLedger::new(year), path)?;
        self.ledger = MonthlyLedger::new(year);
        self.current_path = Some(path.to_path_buf());
        self.dirty = false;
        info!(path = %path.display(), year, "new year-file created");
        Ok(())
    }

    /// Writes the ledger to the current file.
    pub fn save(&mut self) -> ServiceResult<PathBuf> {
        let path = self.current_path.clone().ok_or(ServiceError::NoTargetPath)?;
        self.storage.save(&self.ledger, &path)?;
        self.dirty = false;
        Ok(path)
    }

    /// Writes the ledger to `path`. With `remember`, `path` becomes the
    /// current file and the configured default file.
    pub fn save_as(&mut self, path: &Path, remember: bool) -> ServiceResult<()> {
        self.storage.save(&self.ledger, path)?;
        if remember {
            self.current_path = Some(path.to_path_buf());
            self.dirty = false;
            self.remember_default(path)?;
        }
        Ok(())
    }

    fn remember_default(&mut self, path: &Path) -> ServiceResult<()> {
        self.config.default_file = Some(path.to_path_buf());
        if let Some(manager) = self.config_manager.as_ref() {
            manager.save(&self.config)?;
        }
        info!(path = %path.display(), "default file updated");
        Ok(())
    }

    fn persist(&mut self) -> ServiceResult<()> {
        self.dirty = true;
        if let Some(path) = self.current_path.as_deref() {
            self.storage.save(&self.ledger, path)?;
            self.dirty = false;
        }
        Ok(())
    }

    fn bill_snapshot(&self, id: Uuid) -> Result<BillRecord, LedgerError> {
        self.ledger
            .bill(id)
            .cloned()
            .ok_or(LedgerError::BillNotFound(id))
    }

    fn validate(&self, fields: &BillFields) -> ServiceResult<()> {
        if fields.name.trim().is_empty() {
            return Err(ServiceError::Invalid("Bill name cannot be empty".into()));
        }
        if !fields.amount.is_finite() || fields.amount < 0.0 {
            return Err(ServiceError::Invalid(format!(
                "Amount must be a non-negative number, got {}",
                fields.amount
            )));
        }
        if !self.config.accepts_account(&fields.account) {
            return Err(ServiceError::Invalid(format!(
                "Unknown account `{}`",
                fields.account
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{LoadReport, Result as StorageResult};
    use std::sync::{Arc, Mutex};

    fn fixed_today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 2, 20).unwrap()
    }

    /// In-memory backend recording every saved snapshot.
    #[derive(Clone, Default)]
    struct MemoryStorage {
        saved: Arc<Mutex<Vec<(PathBuf, MonthlyLedger)>>>,
        fail_writes: bool,
    }

    impl StorageBackend for MemoryStorage {
        fn load(&self, path: &Path) -> StorageResult<LoadReport> {
            let saved = self.saved.lock().unwrap();
            match saved.iter().rev().find(|(p, _)| p == path) {
                Some((_, ledger)) => Ok(LoadReport {
                    ledger: ledger.clone(),
                    path: path.to_path_buf(),
                    status: LoadStatus::Loaded,
                }),
                None => Ok(LoadReport {
                    ledger: MonthlyLedger::default(),
                    path: path.to_path_buf(),
                    status: LoadStatus::FileAbsent,
                }),
            }
        }

        fn save(&self, ledger: &MonthlyLedger, path: &Path) -> StorageResult<()> {
            if self.fail_writes {
                return Err(LedgerError::write(
                    path,
                    std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only"),
                ));
            }
            self.saved
                .lock()
                .unwrap()
                .push((path.to_path_buf(), ledger.clone()));
            Ok(())
        }
    }

    fn service_with(storage: MemoryStorage) -> LedgerService {
        LedgerService::new(Box::new(storage)).with_clock(fixed_today)
    }

    fn rent() -> BillFields {
        BillFields::new("Rent", NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(), 950.0)
            .with_account("Wayne")
    }

    #[test]
    fn mutations_are_saved_to_the_current_file() {
        let storage = MemoryStorage::default();
        let mut service = service_with(storage.clone());
        let path = PathBuf::from("2024.xml");
        service.load(&path).unwrap();

        service.add_month("March").unwrap();
        let bill = service.create_bill("March", rent()).unwrap();
        assert_eq!(bill.month, "March");
        assert_eq!(bill.date_started, fixed_today());

        let saved = storage.saved.lock().unwrap();
        assert_eq!(saved.len(), 2);
        assert_eq!(saved[1].1.total("March"), 950.0);
        assert!(!service.is_dirty());
    }

    #[test]
    fn unsaved_changes_survive_write_failures() {
        let storage = MemoryStorage {
            fail_writes: true,
            ..MemoryStorage::default()
        };
        let mut service = service_with(storage);
        service.load(Path::new("locked.xml")).unwrap();

        let err = service.add_month("April").unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Ledger(LedgerError::WriteError { .. })
        ));
        assert!(service.ledger().contains_month("April"));
        assert!(service.is_dirty());
    }

    #[test]
    fn create_bill_rejects_unknown_month_and_bad_fields() {
        let mut service = service_with(MemoryStorage::default());
        let err = service.create_bill("March", rent()).unwrap_err();
        assert!(matches!(err, ServiceError::Ledger(LedgerError::UnknownMonth(_))));

        service.add_month("March").unwrap();
        let blank = BillFields { name: "  ".into(), ..rent() };
        assert!(matches!(service.create_bill("March", blank), Err(ServiceError::Invalid(_))));
        let negative = BillFields { amount: -1.0, ..rent() };
        assert!(matches!(service.create_bill("March", negative), Err(ServiceError::Invalid(_))));
        let stranger = rent().with_account("Bob");
        assert!(matches!(service.create_bill("March", stranger), Err(ServiceError::Invalid(_))));
        assert_eq!(service.ledger().bill_count(), 0);
    }

    #[test]
    fn save_without_a_file_needs_save_as() {
        let mut service = service_with(MemoryStorage::default());
        service.add_month("May").unwrap();
        assert!(service.is_dirty());
        assert!(matches!(service.save(), Err(ServiceError::NoTargetPath)));

        service.save_as(Path::new("copy.xml"), false).unwrap();
        assert!(service.current_path().is_none());

        service.save_as(Path::new("2024.xml"), true).unwrap();
        assert_eq!(service.current_path(), Some(Path::new("2024.xml")));
        assert_eq!(
            service.config().default_file.as_deref(),
            Some(Path::new("2024.xml"))
        );
        assert_eq!(service.save().unwrap(), PathBuf::from("2024.xml"));
    }

    #[test]
    fn current_month_totals_follow_switches_and_deletes() {
        let mut service = service_with(MemoryStorage::default());
        service.add_month("March").unwrap();
        service.create_bill("March", rent()).unwrap();
        service.add_month("April").unwrap();
        assert_eq!(service.current_month(), Some("April"));
        assert_eq!(service.total_for_current_month(), 0.0);

        service.switch_month("March").unwrap();
        assert_eq!(service.total_for_current_month(), 950.0);
        assert_eq!(service.current_bills().len(), 1);

        assert_eq!(service.delete_month("March").unwrap(), 1);
        assert_eq!(service.current_month(), None);
        assert_eq!(service.total_for_current_month(), 0.0);
        assert_eq!(service.total_for("March"), 0.0);
        assert!(service.current_bills().is_empty());
        assert_eq!(service.delete_month("March").unwrap(), 0);
    }

    #[test]
    fn delete_and_move_bills() {
        let mut service = service_with(MemoryStorage::default());
        service.add_month("March").unwrap();
        service.add_month("April").unwrap();
        let bill = service.create_bill("March", rent()).unwrap();

        let moved = service.move_bill(bill.id, "April").unwrap();
        assert_eq!(moved.month, "April");
        assert_eq!(service.total_for("April"), 950.0);

        let deleted = service.delete_bill(bill.id).unwrap().expect("bill deleted");
        assert_eq!(deleted.name, "Rent");
        assert!(service.delete_bill(bill.id).unwrap().is_none());
    }
}
