//! Change events for the process tree.
//!
//! Every cache mutation the poller applies is published as a `TreeEvent`
//! wrapped in a `Message`. Events carry their payload, so a consumer can keep
//! its own copy of the tree in sync from the event stream alone.

use serde::Serialize;

use crate::tree::TreeNode;

/// Generic event wrapper.
#[derive(Debug, Clone)]
pub struct Event<T> {
    inner: T,
}

/// Location of a node whose children changed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum TreePath {
    Root,
    Repository(String),
}

/// Structural change below a tree path.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum TreeEvent {
    /// Children added at `indices`, ascending, each relative to the list after
    /// the earlier ones were inserted.
    Inserted {
        parent: TreePath,
        indices: Vec<usize>,
        items: Vec<TreeNode>,
    },
    /// Children removed. `indices` refer to the list before any removal and are
    /// ascending; apply them from the highest index down.
    Removed {
        parent: TreePath,
        indices: Vec<usize>,
        items: Vec<TreeNode>,
    },
    /// Children replaced in place.
    Changed {
        parent: TreePath,
        indices: Vec<usize>,
        items: Vec<TreeNode>,
    },
    /// The whole subtree under `path` was rebuilt; `children` is its new child list.
    StructureChanged {
        path: TreePath,
        children: Vec<TreeNode>,
    },
}

/// Event message with the repository it concerns.
#[derive(Debug, Clone)]
pub struct Message {
    /// Repository name, empty for root level events.
    pub repository: String,
    /// The actual event data.
    pub event: TreeEvent,
    /// Timestamp in milliseconds at emission.
    pub timestamp: i64,
}

impl<T> std::ops::Deref for Event<T>
where
    T: std::fmt::Debug + Clone,
{
    type Target = T;
    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl<T> Event<T>
where
    T: std::fmt::Debug + Clone,
{
    pub fn new(inner: &T) -> Self {
        Self {
            inner: inner.clone(),
        }
    }
}

impl TreeEvent {
    pub fn is_inserted(&self) -> bool {
        matches!(self, TreeEvent::Inserted { .. })
    }

    pub fn is_removed(&self) -> bool {
        matches!(self, TreeEvent::Removed { .. })
    }

    pub fn is_changed(&self) -> bool {
        matches!(self, TreeEvent::Changed { .. })
    }

    pub fn is_structure_changed(&self) -> bool {
        matches!(self, TreeEvent::StructureChanged { .. })
    }

    /// Path of the node whose children this event describes.
    pub fn path(&self) -> &TreePath {
        match self {
            TreeEvent::Inserted {
                parent, ..
            }
            | TreeEvent::Removed {
                parent, ..
            }
            | TreeEvent::Changed {
                parent, ..
            } => parent,
            TreeEvent::StructureChanged {
                path, ..
            } => path,
        }
    }
}
