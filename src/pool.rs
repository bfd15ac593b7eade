use std::collections::HashMap;

use crate::entry::Entry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntryId(u32);

impl EntryId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

// Handles are only meaningful for the pool that issued them.
#[derive(Debug, Default, Clone)]
pub struct EntryPool {
    entries: Vec<Entry>,
    ids: HashMap<Entry, EntryId>,
}

impl EntryPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn intern(&mut self, entry: impl Into<Entry>) -> EntryId {
        let entry = entry.into();
        if let Some(id) = self.ids.get(&entry) {
            return *id;
        }
        let id = EntryId(u32::try_from(self.entries.len()).unwrap_or(u32::MAX));
        self.entries.push(entry.clone());
        self.ids.insert(entry, id);
        id
    }

    pub fn lookup(&self, entry: &Entry) -> Option<EntryId> {
        self.ids.get(entry).copied()
    }

    pub fn get(&self, id: EntryId) -> &Entry {
        &self.entries[id.index()]
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (EntryId, &Entry)> {
        self.entries
            .iter()
            .enumerate()
            .map(|(i, e)| (EntryId(i as u32), e))
    }
}
