//! Indexed tree view over repositories and their processes.
//!
//! ```text
//! Root
//! └── Repository
//!     ├── Process ── StackFrame* OutputLocation*   (or a single Error leaf)
//!     └── ...                                      (or one placeholder leaf)
//! ```

mod node;
mod projection;

pub use node::{Placeholder, TreeNode};
pub use projection::ProcessTree;
pub(crate) use projection::repository_children;
