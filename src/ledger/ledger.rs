use chrono::NaiveDate;
use tracing::debug;
use uuid::Uuid;

use super::{
    bill::{BillFields, BillRecord},
    month::{in_calendar_order, MONTHS_OF_YEAR},
};
use crate::errors::LedgerError;

/// Bills of one month, kept in insertion (display) order.
#[derive(Debug, Clone, PartialEq)]
struct MonthBills {
    name: String,
    bills: Vec<BillRecord>,
}

/// Bills of one year-file grouped by month name.
///
/// Months keep the order in which they were added, which is also the order
/// they are written to disk. The set of known months is always the set of
/// month keys; removing a month forgets it entirely.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MonthlyLedger {
    months: Vec<MonthBills>,
    current_month: Option<String>,
    /// Label of the year-file this ledger was loaded from. Display only.
    pub year: String,
}

impl MonthlyLedger {
    pub fn new(year: impl Into<String>) -> Self {
        Self {
            months: Vec::new(),
            current_month: None,
            year: year.into(),
        }
    }

    pub fn add_month(&mut self, name: &str) -> Result<(), LedgerError> {
        if self.contains_month(name) {
            return Err(LedgerError::DuplicateMonth(name.to_string()));
        }
        self.months.push(MonthBills {
            name: name.to_string(),
            bills: Vec::new(),
        });
        debug!(month = name, "month added");
        Ok(())
    }

    /// Drops the month and its bills, returning the bills that were removed.
    /// Clears the current month when it is the one being removed.
    pub fn remove_month(&mut self, name: &str) -> Option<Vec<BillRecord>> {
        let index = self.month_index(name)?;
        let removed = self.months.remove(index);
        if self.current_month.as_deref() == Some(name) {
            self.current_month = None;
        }
        debug!(month = name, bills = removed.bills.len(), "month removed");
        Some(removed.bills)
    }

    pub fn set_current_month(&mut self, name: &str) -> Result<(), LedgerError> {
        if !self.contains_month(name) {
            return Err(LedgerError::UnknownMonth(name.to_string()));
        }
        self.current_month = Some(name.to_string());
        Ok(())
    }

    pub fn current_month(&self) -> Option<&str> {
        self.current_month.as_deref()
    }

    /// Appends `record` to `month`, tagging it with the month name.
    pub fn add_record(&mut self, month: &str, mut record: BillRecord) -> Result<Uuid, LedgerError> {
        let entry = self
            .month_mut(month)
            .ok_or_else(|| LedgerError::UnknownMonth(month.to_string()))?;
        record.month = month.to_string();
        let id = record.id;
        entry.bills.push(record);
        Ok(id)
    }

    /// Removes the bill with `id` from `month`. Absent months or bills are a no-op.
    pub fn remove_record(&mut self, month: &str, id: Uuid) -> Option<BillRecord> {
        let entry = self.month_mut(month)?;
        let index = entry.bills.iter().position(|bill| bill.id == id)?;
        Some(entry.bills.remove(index))
    }

    /// Applies `fields` to the bill in place; see [`BillRecord::apply`].
    pub fn update_record(
        &mut self,
        id: Uuid,
        fields: BillFields,
        today: NaiveDate,
    ) -> Result<&BillRecord, LedgerError> {
        let bill = self
            .months
            .iter_mut()
            .flat_map(|entry| entry.bills.iter_mut())
            .find(|bill| bill.id == id)
            .ok_or(LedgerError::BillNotFound(id))?;
        bill.apply(fields, today);
        Ok(bill)
    }

    /// Moves a bill to the end of another month. The ledger is unchanged when
    /// either the bill or the target month is unknown.
    pub fn move_record(&mut self, id: Uuid, to: &str) -> Result<&BillRecord, LedgerError> {
        let target = self
            .month_index(to)
            .ok_or_else(|| LedgerError::UnknownMonth(to.to_string()))?;
        let from = self
            .month_of(id)
            .map(str::to_string)
            .ok_or(LedgerError::BillNotFound(id))?;
        let mut record = self
            .remove_record(&from, id)
            .ok_or(LedgerError::BillNotFound(id))?;
        record.month = to.to_string();
        let bills = &mut self.months[target].bills;
        bills.push(record);
        let last = bills.len() - 1;
        debug!(from = %from, to, "bill moved");
        Ok(&bills[last])
    }

    /// Sum of the amounts stored under `month`; zero for absent or empty months.
    pub fn total(&self, month: &str) -> f64 {
        self.bills(month).iter().map(|bill| bill.amount).sum()
    }

    /// Known months restricted to canonical names, in calendar order.
    pub fn months_in_calendar_order(&self) -> Vec<String> {
        in_calendar_order(self.month_names())
    }

    /// Canonical months that can still be added, in calendar order.
    pub fn addable_months(&self) -> Vec<&'static str> {
        MONTHS_OF_YEAR
            .iter()
            .copied()
            .filter(|month| !self.contains_month(month))
            .collect()
    }

    /// Month keys in insertion order.
    pub fn month_names(&self) -> impl Iterator<Item = &str> {
        self.months.iter().map(|entry| entry.name.as_str())
    }

    pub fn contains_month(&self, name: &str) -> bool {
        self.month_index(name).is_some()
    }

    pub fn bills(&self, month: &str) -> &[BillRecord] {
        self.months
            .iter()
            .find(|entry| entry.name == month)
            .map(|entry| entry.bills.as_slice())
            .unwrap_or(&[])
    }

    pub fn bill(&self, id: Uuid) -> Option<&BillRecord> {
        self.months
            .iter()
            .flat_map(|entry| entry.bills.iter())
            .find(|bill| bill.id == id)
    }

    /// Name of the month holding the bill with `id`.
    pub fn month_of(&self, id: Uuid) -> Option<&str> {
        self.months
            .iter()
            .find(|entry| entry.bills.iter().any(|bill| bill.id == id))
            .map(|entry| entry.name.as_str())
    }

    /// Every month with its bills, in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[BillRecord])> {
        self.months
            .iter()
            .map(|entry| (entry.name.as_str(), entry.bills.as_slice()))
    }

    pub fn month_count(&self) -> usize {
        self.months.len()
    }

    pub fn bill_count(&self) -> usize {
        self.months.iter().map(|entry| entry.bills.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.months.is_empty()
    }

    /// Files a record read from disk under its own month tag, creating the
    /// month on first sight. The first month seen becomes the current month.
    pub(crate) fn place_loaded(&mut self, record: BillRecord) {
        let index = match self.month_index(&record.month) {
            Some(index) => index,
            None => {
                self.months.push(MonthBills {
                    name: record.month.clone(),
                    bills: Vec::new(),
                });
                self.months.len() - 1
            }
        };
        if self.current_month.is_none() {
            self.current_month = Some(record.month.clone());
        }
        self.months[index].bills.push(record);
    }

    fn month_index(&self, name: &str) -> Option<usize> {
        self.months.iter().position(|entry| entry.name == name)
    }

    fn month_mut(&mut self, name: &str) -> Option<&mut MonthBills> {
        self.months.iter_mut().find(|entry| entry.name == name)
    }
}
