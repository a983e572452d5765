//! Buffered operational log sink
//!
//! Entries are queued on a bounded channel and written to a [`LogStore`] in
//! batches by a background task. The sink is passed explicitly to the
//! services that use it.

mod entry;
mod sink;
mod store;

pub use entry::{LogEntry, LogLevel};
pub use sink::{LogSink, LogSinkHandle};
pub use store::{LogStore, PgLogStore};
