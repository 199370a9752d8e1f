#![doc(test(attr(deny(warnings))))]

//! Bill Ledger keeps household bills grouped by calendar month inside a
//! year-scoped XML file, with the operations a bill-tracking front end needs.

pub mod config;
pub mod core;
pub mod errors;
pub mod ledger;
pub mod storage;
pub mod utils;

pub use crate::core::services::{LedgerService, ServiceError, ServiceResult};
pub use errors::LedgerError;
pub use ledger::{BillFields, BillRecord, MonthlyLedger};

use std::sync::Once;

static INIT_TRACING: Once = Once::new();

/// Initializes global tracing and emits a startup info log.
pub fn init() {
    INIT_TRACING.call_once(|| {
        utils::init_tracing();
        tracing::info!("Bill Ledger tracing initialized.");
    });
}
