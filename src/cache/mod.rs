//! Per-repository cache of known processes.
//!
//! `ProcessListCache` is a plain data structure: no I/O, no locking. The
//! engine wraps one per repository in a `ShareLock` and is its only writer.

mod list;
mod state;

pub use list::ProcessListCache;
pub use state::ProcessListState;
