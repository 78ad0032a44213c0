use std::fmt;

use serde::Serialize;

use crate::{
    cache::{ProcessListCache, ProcessListState},
    model::{ProcessRecord, StackFrame},
};

/// Stand-in child of a repository whose list is empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Placeholder {
    /// No poll has completed yet.
    Pending,
    /// The repository has no processes.
    Empty,
}

impl Placeholder {
    pub fn for_cache(cache: &ProcessListCache) -> Self {
        match cache.state() {
            ProcessListState::Pending => Placeholder::Pending,
            _ => Placeholder::Empty,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum TreeNode {
    Root,
    Repository(String),
    Process(ProcessRecord),
    Placeholder(Placeholder),
    StackFrame(StackFrame),
    OutputLocation(String),
    /// Error message of a failed process, shown instead of its stack and outputs.
    Error(String),
}

impl fmt::Display for TreeNode {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            TreeNode::Root => write!(f, "Processes"),
            TreeNode::Repository(name) => write!(f, "{}", name),
            TreeNode::Process(record) => write!(f, "{}", record),
            TreeNode::Placeholder(Placeholder::Pending) => write!(f, "Loading..."),
            TreeNode::Placeholder(Placeholder::Empty) => write!(f, "No processes"),
            TreeNode::StackFrame(frame) => write!(f, "{}", frame),
            TreeNode::OutputLocation(location) => write!(f, "{}", location),
            TreeNode::Error(message) => write!(f, "Error: {}", message),
        }
    }
}
