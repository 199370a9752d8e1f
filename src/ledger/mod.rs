//! Bill ledger domain: bill records and their grouping by month.

pub mod bill;
#[allow(clippy::module_inception)]
pub mod ledger;
pub mod month;

pub use bill::{format_amount, BillFields, BillRecord, BLANK_NOTES, NO_ACCOUNT};
pub use ledger::MonthlyLedger;
pub use month::{in_calendar_order, MONTHS_OF_YEAR};
