use std::collections::{HashMap, HashSet};

use crate::{
    cache::ProcessListState,
    model::{ProcessId, ProcessRecord},
};

/// Known processes of one repository, newest first.
///
/// `known_ids` always holds exactly the keys of `records`, without duplicates,
/// sorted by descending id.
#[derive(Debug, Clone, Default)]
pub struct ProcessListCache {
    known_ids: Vec<ProcessId>,
    records: HashMap<ProcessId, ProcessRecord>,
    state: ProcessListState,
    /// Largest id ever inserted, kept across trims.
    high_water_mark: Option<ProcessId>,
}

impl ProcessListCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or overwrites `record`.
    ///
    /// Returns the insertion index for a new id and `None` when an existing
    /// record was replaced in place. An id above the high-water mark always
    /// lands at index 0.
    pub fn upsert(
        &mut self,
        record: ProcessRecord,
    ) -> Option<usize> {
        self.state = ProcessListState::Ready;

        let id = record.id;
        if let Some(slot) = self.records.get_mut(&id) {
            *slot = record;
            return None;
        }

        let index = match self.high_water_mark {
            Some(mark) if id <= mark => self.known_ids.partition_point(|&known| known > id),
            _ => 0,
        };
        self.high_water_mark = Some(self.high_water_mark.map_or(id, |mark| mark.max(id)));
        self.known_ids.insert(index, id);
        self.records.insert(id, record);

        Some(index)
    }

    /// Drops every known id missing from `live`.
    ///
    /// Removals come back in list order, each paired with its index before
    /// anything was removed. Apply them highest index first.
    pub fn trim(
        &mut self,
        live: &HashSet<ProcessId>,
    ) -> Vec<(usize, ProcessRecord)> {
        let mut removed = Vec::new();
        let records = &mut self.records;
        let mut position = 0;

        self.known_ids.retain(|id| {
            let keep = live.contains(id);
            if !keep {
                if let Some(record) = records.remove(id) {
                    removed.push((position, record));
                }
            }
            position += 1;
            keep
        });

        removed
    }

    /// Returns `true` if the state actually changed.
    pub fn set_state(
        &mut self,
        state: ProcessListState,
    ) -> bool {
        if self.state == state {
            return false;
        }
        self.state = state;
        true
    }

    pub fn state(&self) -> ProcessListState {
        self.state
    }

    pub fn high_water_mark(&self) -> Option<ProcessId> {
        self.high_water_mark
    }

    pub fn len(&self) -> usize {
        self.known_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.known_ids.is_empty()
    }

    pub fn ids(&self) -> &[ProcessId] {
        &self.known_ids
    }

    pub fn by_index(
        &self,
        index: usize,
    ) -> Option<&ProcessRecord> {
        self.known_ids.get(index).and_then(|id| self.records.get(id))
    }

    pub fn by_id(
        &self,
        id: ProcessId,
    ) -> Option<&ProcessRecord> {
        self.records.get(&id)
    }

    pub fn index_of(
        &self,
        id: ProcessId,
    ) -> Option<usize> {
        self.known_ids.binary_search_by(|probe| id.cmp(probe)).ok()
    }

    /// Records in list order.
    pub fn iter(&self) -> impl Iterator<Item = &ProcessRecord> {
        self.known_ids.iter().filter_map(|id| self.records.get(id))
    }
}
