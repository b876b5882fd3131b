//! Per-file conversion history: lifecycle records and the ledger that owns them.

pub mod ledger;
pub mod record;

pub use ledger::{HistoryLedger, HistoryListener, NoListener};
pub use record::{ConversionErrorKind, ConversionHistoryEntry, HistoryRecord, RecordKind};
