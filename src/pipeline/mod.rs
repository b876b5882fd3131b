//! Pipeline components: isolated workers and the pool that drives them.

pub mod messages;
pub mod pool;
pub mod worker;

pub use messages::{BatchOutcome, WorkerReply};
pub use pool::{HaltHandle, WorkerPool};
pub use worker::{ConversionWorker, RetiredWorker};
