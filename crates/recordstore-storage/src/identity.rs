//! Adapter-owned memo of identifiers per record instance.
//!
//! [`IdentityMap`] maps a [`RecordHandle`] to the identifier its record was
//! resolved to or inserted as. It detects repeated use of the *same*
//! instance only; equal records built separately have distinct handles and
//! go through a backend lookup.
//!
//! Entries live as long as the map. A long-lived store that adds many
//! distinct instances grows its map accordingly; call [`IdentityMap::forget`]
//! or [`IdentityMap::clear`] (exposed on the stores) to release them.
//!
//! A journal can be opened around a unit of work so that entries recorded
//! during it can be discarded if the work is rolled back.

use std::collections::HashMap;

use recordstore_core::RecordHandle;

/// Memoized identifiers keyed by record handle.
#[derive(Debug)]
pub struct IdentityMap<I> {
    ids: HashMap<RecordHandle, I>,
    journal: Option<Vec<RecordHandle>>,
}

impl<I: Clone> IdentityMap<I> {
    pub fn new() -> Self {
        IdentityMap {
            ids: HashMap::new(),
            journal: None,
        }
    }

    /// Returns the memoized identifier for `handle`, if any.
    pub fn get(&self, handle: RecordHandle) -> Option<I> {
        self.ids.get(&handle).cloned()
    }

    /// Memoizes `id` for `handle`.
    pub fn remember(&mut self, handle: RecordHandle, id: I) {
        if self.ids.insert(handle, id).is_none() {
            if let Some(journal) = self.journal.as_mut() {
                journal.push(handle);
            }
        }
    }

    /// Removes the identifier memoized for `handle`, returning it.
    pub fn forget(&mut self, handle: RecordHandle) -> Option<I> {
        self.ids.remove(&handle)
    }

    /// Removes every memoized identifier.
    pub fn clear(&mut self) {
        self.ids.clear();
        if let Some(journal) = self.journal.as_mut() {
            journal.clear();
        }
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Starts recording newly memoized handles.
    pub fn begin_journal(&mut self) {
        self.journal = Some(Vec::new());
    }

    /// Stops recording and keeps everything memoized since `begin_journal`.
    pub fn commit_journal(&mut self) {
        self.journal = None;
    }

    /// Stops recording and forgets everything memoized since `begin_journal`.
    pub fn rollback_journal(&mut self) {
        if let Some(journal) = self.journal.take() {
            for handle in journal {
                self.ids.remove(&handle);
            }
        }
    }
}

impl<I: Clone> Default for IdentityMap<I> {
    fn default() -> Self {
        Self::new()
    }
}
