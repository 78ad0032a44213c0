use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumIter};

use crate::Result;

/// Process id, unique within one repository.
pub type ProcessId = i64;

/// Execution state of a remote process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsRefStr, EnumIter)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ProcessState {
    Pending,
    Running,
    Stopped,
    Failed,
    Completed,
    Zombie,
}

impl ProcessState {
    /// No further transition happens from a terminated state.
    pub fn is_terminated(&self) -> bool {
        matches!(self, ProcessState::Stopped | ProcessState::Failed | ProcessState::Completed | ProcessState::Zombie)
    }
}

/// One frame of the operator stack of a running process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackFrame {
    pub operator_name: String,
    pub apply_count: u32,
    /// milliseconds spent in the operator so far
    pub execution_time: i64,
}

/// Snapshot of one remote process as reported by a single detail fetch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessRecord {
    pub id: ProcessId,
    pub state: ProcessState,
    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completion_time: Option<DateTime<Utc>>,
    pub process_location: String,
    #[serde(default)]
    pub stack_trace: Option<Vec<StackFrame>>,
    #[serde(default)]
    pub output_locations: Vec<String>,
    #[serde(default)]
    pub error_message: Option<String>,
}

impl ProcessRecord {
    pub fn new(
        id: ProcessId,
        state: ProcessState,
        process_location: impl Into<String>,
    ) -> Self {
        Self {
            id,
            state,
            start_time: None,
            completion_time: None,
            process_location: process_location.into(),
            stack_trace: None,
            output_locations: Vec::new(),
            error_message: None,
        }
    }

    pub fn from_json(s: &str) -> Result<Self> {
        let record = serde_json::from_str::<ProcessRecord>(s)?;
        Ok(record)
    }

    pub fn is_terminated(&self) -> bool {
        self.state.is_terminated()
    }

    pub fn stack_frames(&self) -> &[StackFrame] {
        self.stack_trace.as_deref().unwrap_or_default()
    }

    /// Wall time between start and completion, or until `now` while still running.
    pub fn duration_millis(
        &self,
        now: DateTime<Utc>,
    ) -> Option<i64> {
        let start = self.start_time?;
        let end = self.completion_time.unwrap_or(now);
        Some((end - start).num_milliseconds())
    }
}

impl fmt::Display for StackFrame {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "{} [{} applies, {} ms]", self.operator_name, self.apply_count, self.execution_time)
    }
}

impl fmt::Display for ProcessRecord {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "#{} [{}] {}", self.id, self.state.as_ref(), self.process_location)
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use strum::IntoEnumIterator;

    use super::*;
    use crate::ProcwatchError;

    #[test]
    fn test_terminated_states() {
        let terminated: Vec<ProcessState> = ProcessState::iter().filter(|s| s.is_terminated()).collect();
        assert_eq!(
            terminated,
            vec![ProcessState::Stopped, ProcessState::Failed, ProcessState::Completed, ProcessState::Zombie]
        );
        assert!(!ProcessState::Pending.is_terminated());
        assert!(!ProcessState::Running.is_terminated());
    }

    #[test]
    fn test_from_json() {
        let json = r#"{
            "id": 42,
            "state": "RUNNING",
            "start_time": "2024-05-01T10:00:00Z",
            "process_location": "//Local/processes/churn",
            "stack_trace": [{"operator_name": "Read CSV", "apply_count": 1, "execution_time": 120}]
        }"#;
        let record = ProcessRecord::from_json(json).unwrap();
        assert_eq!(record.id, 42);
        assert_eq!(record.state, ProcessState::Running);
        assert_eq!(record.stack_frames().len(), 1);
        assert!(record.output_locations.is_empty());
        assert!(record.error_message.is_none());
        assert!(!record.is_terminated());
    }

    #[test]
    fn test_from_json_invalid() {
        let err = ProcessRecord::from_json(r#"{"id": 1}"#).unwrap_err();
        assert!(matches!(err, ProcwatchError::Convert(_)));
    }

    #[test]
    fn test_duration_millis() {
        let mut record = ProcessRecord::new(1, ProcessState::Completed, "//Local/p");
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 10, 5, 0).unwrap();
        assert_eq!(record.duration_millis(now), None);

        record.start_time = Some(Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap());
        assert_eq!(record.duration_millis(now), Some(300_000));

        record.completion_time = Some(Utc.with_ymd_and_hms(2024, 5, 1, 10, 1, 0).unwrap());
        assert_eq!(record.duration_millis(now), Some(60_000));
    }

    #[test]
    fn test_display() {
        let record = ProcessRecord::new(7, ProcessState::Failed, "//Remote/etl");
        assert_eq!(record.to_string(), "#7 [FAILED] //Remote/etl");

        let frame = StackFrame {
            operator_name: "Join".to_string(),
            apply_count: 3,
            execution_time: 15,
        };
        assert_eq!(frame.to_string(), "Join [3 applies, 15 ms]");
    }
}
