mod record;

pub use record::{ProcessId, ProcessRecord, ProcessState, StackFrame};
