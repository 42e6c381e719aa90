//! Selection tracker.
//!
//! Holds the ids marked for bulk action. Selection is independent of
//! paging, sorting and filtering; ids are only dropped when explicitly
//! cleared, when a bulk action succeeds for them, or when the record left
//! the source (pruned on the next read).

use std::collections::{BTreeSet, HashSet};

use crate::types::RecordId;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionTracker {
    selected: BTreeSet<RecordId>,
}

impl SelectionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flip one id. Returns whether it is selected afterwards.
    pub fn toggle(&mut self, id: RecordId) -> bool {
        if self.selected.remove(&id) {
            false
        } else {
            self.selected.insert(id);
            true
        }
    }

    /// Select every id on the visible page.
    pub fn select_all<'a>(&mut self, visible: impl IntoIterator<Item = &'a RecordId>) {
        self.selected.extend(visible.into_iter().cloned());
    }

    /// Select every id of the full filtered set, regardless of page.
    pub fn select_all_filtered<'a>(&mut self, filtered: impl IntoIterator<Item = &'a RecordId>) {
        self.select_all(filtered);
    }

    /// Page header checkbox: deselect the page if it is fully selected,
    /// otherwise select all of it. Returns whether the page ends selected.
    pub fn toggle_all(&mut self, visible: &[RecordId]) -> bool {
        if !visible.is_empty() && self.all_selected(visible) {
            self.deselect(visible);
            false
        } else {
            self.select_all(visible);
            !visible.is_empty()
        }
    }

    pub fn deselect<'a>(&mut self, ids: impl IntoIterator<Item = &'a RecordId>) {
        for id in ids {
            self.selected.remove(id);
        }
    }

    pub fn clear(&mut self) {
        self.selected.clear();
    }

    pub fn is_selected(&self, id: &RecordId) -> bool {
        self.selected.contains(id)
    }

    pub fn all_selected(&self, ids: &[RecordId]) -> bool {
        ids.iter().all(|id| self.selected.contains(id))
    }

    /// Drop ids that are no longer present in the source. Returns how many
    /// were pruned.
    pub fn prune(&mut self, present: &HashSet<RecordId>) -> usize {
        let before = self.selected.len();
        self.selected.retain(|id| present.contains(id));
        before - self.selected.len()
    }

    /// Prune against `present`, then return the surviving selection.
    pub fn selected_ids(&mut self, present: &HashSet<RecordId>) -> &BTreeSet<RecordId> {
        self.prune(present);
        &self.selected
    }

    /// The raw selection without pruning.
    pub fn raw(&self) -> &BTreeSet<RecordId> {
        &self.selected
    }

    pub fn len(&self) -> usize {
        self.selected.len()
    }

    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(values: &[i64]) -> Vec<RecordId> {
        values.iter().copied().map(RecordId::Int).collect()
    }

    fn set(values: &[i64]) -> BTreeSet<RecordId> {
        ids(values).into_iter().collect()
    }

    #[test]
    fn toggle_flips() {
        let mut sel = SelectionTracker::new();
        assert!(sel.toggle(RecordId::Int(1)));
        assert!(sel.is_selected(&RecordId::Int(1)));
        assert!(!sel.toggle(RecordId::Int(1)));
        assert!(sel.is_empty());
    }

    #[test]
    fn select_all_adds_to_existing_selection() {
        let mut sel = SelectionTracker::new();
        sel.toggle(RecordId::Int(9));
        sel.select_all(&ids(&[1, 2]));
        assert_eq!(sel.raw(), &set(&[1, 2, 9]));
    }

    #[test]
    fn toggle_all_deselects_fully_selected_page() {
        let mut sel = SelectionTracker::new();
        let page = ids(&[1, 2]);
        sel.toggle(RecordId::Int(5));
        assert!(sel.toggle_all(&page));
        assert!(!sel.toggle_all(&page));
        assert_eq!(sel.raw(), &set(&[5]));
    }

    #[test]
    fn toggle_all_on_partial_page_selects_rest() {
        let mut sel = SelectionTracker::new();
        sel.toggle(RecordId::Int(1));
        assert!(sel.toggle_all(&ids(&[1, 2, 3])));
        assert_eq!(sel.raw(), &set(&[1, 2, 3]));
    }

    #[test]
    fn toggle_all_on_empty_page_is_harmless() {
        let mut sel = SelectionTracker::new();
        assert!(!sel.toggle_all(&[]));
        assert!(sel.is_empty());
    }

    #[test]
    fn prune_drops_only_missing_ids() {
        let mut sel = SelectionTracker::new();
        sel.select_all(&ids(&[1, 2, 3]));
        let present: HashSet<RecordId> = ids(&[1, 3, 4]).into_iter().collect();
        assert_eq!(sel.selected_ids(&present), &set(&[1, 3]));
        assert_eq!(sel.len(), 2);
    }

    #[test]
    fn deselect_and_clear() {
        let mut sel = SelectionTracker::new();
        sel.select_all_filtered(&ids(&[1, 2, 3]));
        sel.deselect(&ids(&[2]));
        assert_eq!(sel.raw(), &set(&[1, 3]));
        sel.clear();
        assert!(sel.is_empty());
    }
}
