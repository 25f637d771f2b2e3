//! rollcall-store — SQLite persistence for the attendance system.
//!
//! Read access to the externally managed roster, plus the attendance
//! ledger with its insert-if-absent duplicate suppression.

mod schema;
mod store;

pub use store::{AttendanceRecord, AttendanceStatus, RecordOutcome, Store, StoreError};
