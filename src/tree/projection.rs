use std::sync::Arc;

use crate::{
    cache::{ProcessListCache, ProcessListState},
    model::ProcessRecord,
    runtime::Registry,
    tree::{Placeholder, TreeNode},
};

/// Read-only tree view of the engine's repositories.
///
/// Every call takes its own short read lock, so a consumer walking the tree
/// never blocks the poller for longer than one lookup.
#[derive(Clone)]
pub struct ProcessTree {
    registry: Arc<Registry>,
}

impl ProcessTree {
    pub(crate) fn new(registry: Arc<Registry>) -> Self {
        Self {
            registry,
        }
    }

    pub fn root(&self) -> TreeNode {
        TreeNode::Root
    }

    pub fn child_count(
        &self,
        parent: &TreeNode,
    ) -> usize {
        match parent {
            TreeNode::Root => self.registry.repository_count(),
            TreeNode::Repository(name) => self.registry.with_cache(name, |cache| cache.len().max(1)).unwrap_or(0),
            TreeNode::Process(record) => record_child_count(record),
            _ => 0,
        }
    }

    pub fn child(
        &self,
        parent: &TreeNode,
        index: usize,
    ) -> Option<TreeNode> {
        match parent {
            TreeNode::Root => self.registry.repository_name(index).map(TreeNode::Repository),
            TreeNode::Repository(name) => self
                .registry
                .with_cache(name, |cache| {
                    if cache.is_empty() {
                        return (index == 0).then(|| TreeNode::Placeholder(Placeholder::for_cache(cache)));
                    }
                    cache.by_index(index).cloned().map(TreeNode::Process)
                })
                .flatten(),
            TreeNode::Process(record) => record_child(record, index),
            _ => None,
        }
    }

    pub fn children(
        &self,
        parent: &TreeNode,
    ) -> Vec<TreeNode> {
        match parent {
            TreeNode::Root => self.registry.repositories().iter().map(|r| TreeNode::Repository(r.name().to_string())).collect(),
            TreeNode::Repository(name) => self.registry.with_cache(name, repository_children).unwrap_or_default(),
            TreeNode::Process(record) => record_children(record),
            _ => Vec::new(),
        }
    }

    /// Position of `child` under `parent`; `None` for placeholders and pairs
    /// that are not parent and child.
    ///
    /// Leaves carry no identity of their own and are matched by value, so of
    /// two equal stack frames or output locations the first position is returned.
    pub fn index_of(
        &self,
        parent: &TreeNode,
        child: &TreeNode,
    ) -> Option<usize> {
        match (parent, child) {
            (TreeNode::Root, TreeNode::Repository(name)) => self.registry.repository_index(name),
            (TreeNode::Repository(name), TreeNode::Process(record)) => self.registry.with_cache(name, |cache| cache.index_of(record.id)).flatten(),
            (TreeNode::Process(record), TreeNode::Error(message)) => (record.error_message.as_ref() == Some(message)).then_some(0),
            (TreeNode::Process(record), TreeNode::StackFrame(frame)) => {
                if record.error_message.is_some() {
                    return None;
                }
                record.stack_frames().iter().position(|f| f == frame)
            }
            (TreeNode::Process(record), TreeNode::OutputLocation(location)) => {
                if record.error_message.is_some() {
                    return None;
                }
                let offset = record.stack_frames().len();
                record.output_locations.iter().position(|l| l == location).map(|i| offset + i)
            }
            _ => None,
        }
    }

    pub fn is_leaf(
        &self,
        node: &TreeNode,
    ) -> bool {
        match node {
            TreeNode::Root | TreeNode::Repository(_) => false,
            TreeNode::Process(record) => record_child_count(record) == 0,
            _ => true,
        }
    }

    /// State of a repository's list, for labelling its node.
    pub fn list_state(
        &self,
        repository: &str,
    ) -> Option<ProcessListState> {
        self.registry.with_cache(repository, ProcessListCache::state)
    }
}

/// Child list of a repository node, computed from a locked cache.
pub(crate) fn repository_children(cache: &ProcessListCache) -> Vec<TreeNode> {
    if cache.is_empty() {
        return vec![TreeNode::Placeholder(Placeholder::for_cache(cache))];
    }
    cache.iter().cloned().map(TreeNode::Process).collect()
}

fn record_child_count(record: &ProcessRecord) -> usize {
    if record.error_message.is_some() {
        return 1;
    }
    record.stack_frames().len() + record.output_locations.len()
}

fn record_child(
    record: &ProcessRecord,
    index: usize,
) -> Option<TreeNode> {
    if let Some(message) = &record.error_message {
        return (index == 0).then(|| TreeNode::Error(message.clone()));
    }
    let frames = record.stack_frames();
    if index < frames.len() {
        return Some(TreeNode::StackFrame(frames[index].clone()));
    }
    record.output_locations.get(index - frames.len()).cloned().map(TreeNode::OutputLocation)
}

fn record_children(record: &ProcessRecord) -> Vec<TreeNode> {
    if let Some(message) = &record.error_message {
        return vec![TreeNode::Error(message.clone())];
    }
    record
        .stack_frames()
        .iter()
        .cloned()
        .map(TreeNode::StackFrame)
        .chain(record.output_locations.iter().cloned().map(TreeNode::OutputLocation))
        .collect()
}
