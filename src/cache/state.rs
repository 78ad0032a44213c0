use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumIter};

/// Lifecycle of a repository's process list.
///
/// `Pending` until the first successful poll, then `Ready`. A failed poll moves
/// the list to `Error` while keeping the records; the next successful poll
/// brings it back. `Canceled` is entered when the user declines to
/// authenticate and is left only through an explicit reset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, AsRefStr, EnumIter)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ProcessListState {
    #[default]
    Pending,
    Ready,
    Error,
    Canceled,
}
