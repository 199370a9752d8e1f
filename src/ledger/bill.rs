use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Account tag used when a bill is not paid from a known account.
pub const NO_ACCOUNT: &str = "None";

/// Stored in place of blank notes so the notes element is never empty.
pub const BLANK_NOTES: &str = " ";

/// Field values supplied by the caller when creating or editing a bill.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BillFields {
    pub name: String,
    pub due_date: NaiveDate,
    pub amount: f64,
    pub account: String,
    #[serde(default)]
    pub notes: String,
}

impl BillFields {
    pub fn new(name: impl Into<String>, due_date: NaiveDate, amount: f64) -> Self {
        Self {
            name: name.into(),
            due_date,
            amount,
            account: NO_ACCOUNT.into(),
            notes: String::new(),
        }
    }

    pub fn with_account(mut self, account: impl Into<String>) -> Self {
        self.account = account.into();
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = notes.into();
        self
    }
}

/// A single recurring household bill stored under a month of the ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BillRecord {
    /// Runtime identity; not part of the file format.
    #[serde(skip, default = "Uuid::new_v4")]
    pub id: Uuid,
    pub name: String,
    pub due_date: NaiveDate,
    pub amount: f64,
    pub account: String,
    pub notes: String,
    pub date_started: NaiveDate,
    pub date_changed: NaiveDate,
    pub previous_amount: f64,
    pub month: String,
    #[serde(default = "default_selected")]
    pub selected: bool,
}

fn default_selected() -> bool {
    true
}

impl BillRecord {
    /// Builds a fresh record created on `today`. The month tag is assigned
    /// when the record is placed into a ledger.
    pub fn new(fields: BillFields, today: NaiveDate) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: fields.name,
            due_date: fields.due_date,
            amount: fields.amount,
            account: normalize_account(fields.account),
            notes: normalize_notes(fields.notes),
            date_started: today,
            date_changed: today,
            previous_amount: 0.0,
            month: String::new(),
            selected: true,
        }
    }

    /// Overwrites the editable fields, snapshotting the current amount into
    /// `previous_amount` first. `date_started` is left alone.
    pub fn apply(&mut self, fields: BillFields, today: NaiveDate) {
        self.previous_amount = self.amount;
        self.name = fields.name;
        self.due_date = fields.due_date;
        self.amount = fields.amount;
        self.account = normalize_account(fields.account);
        self.notes = normalize_notes(fields.notes);
        self.date_changed = today.max(self.date_started);
    }

    pub fn fields(&self) -> BillFields {
        BillFields {
            name: self.name.clone(),
            due_date: self.due_date,
            amount: self.amount,
            account: self.account.clone(),
            notes: self.notes.clone(),
        }
    }
}

/// Records compare equal when every persisted field matches; the runtime id
/// and the selection flag are ignored.
impl PartialEq for BillRecord {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.due_date == other.due_date
            && self.amount == other.amount
            && self.account == other.account
            && self.notes == other.notes
            && self.date_started == other.date_started
            && self.date_changed == other.date_changed
            && self.previous_amount == other.previous_amount
            && self.month == other.month
    }
}

impl fmt::Display for BillRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} due {} {} ({})",
            self.name,
            self.due_date.format("%d/%m/%Y"),
            format_amount(self.amount),
            self.account
        )
    }
}

/// Two-decimal rendering used for amounts and totals.
pub fn format_amount(amount: f64) -> String {
    format!("{:.2}", amount)
}

pub(crate) fn normalize_notes(notes: String) -> String {
    if notes.trim().is_empty() {
        BLANK_NOTES.to_string()
    } else {
        notes
    }
}

fn normalize_account(account: String) -> String {
    if account.trim().is_empty() {
        NO_ACCOUNT.to_string()
    } else {
        account
    }
}
