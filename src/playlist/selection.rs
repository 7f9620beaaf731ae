//! Selection tracker keyed by `order` value.
//!
//! Any mutation that removes or renumbers entries must be followed by a
//! remap (`after_remove`, `after_move`, `after_multi_move`) and then
//! [`Selection::reconcile`] in the same step, so the set never refers to an
//! entry that no longer exists.

use std::collections::BTreeSet;

use log::trace;

use crate::playlist::ordering::{self, OrderingError};
use crate::playlist::TrackEntry;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    orders: BTreeSet<usize>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_orders<I: IntoIterator<Item = usize>>(orders: I) -> Self {
        Self {
            orders: orders.into_iter().collect(),
        }
    }

    /// Every entry of `entries`.
    pub fn select_all(entries: &[TrackEntry]) -> Self {
        Self::from_orders(entries.iter().map(|entry| entry.order))
    }

    /// Adds `order` if absent, removes it if present.
    pub fn toggle(&mut self, order: usize) {
        if !self.orders.remove(&order) {
            self.orders.insert(order);
        }
    }

    pub fn clear(&mut self) {
        self.orders.clear();
    }

    pub fn contains(&self, order: usize) -> bool {
        self.orders.contains(&order)
    }

    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    pub fn orders(&self) -> &BTreeSet<usize> {
        &self.orders
    }

    /// Ascending list positions; valid because `order` equals position.
    pub fn indices(&self) -> Vec<usize> {
        self.orders.iter().copied().collect()
    }

    /// Drives the "select all" checkbox.
    pub fn all_selected(&self, entries: &[TrackEntry]) -> bool {
        self.orders.len() == entries.len()
    }

    /// Drops every value that no longer names an entry.
    pub fn reconcile(&mut self, entries: &[TrackEntry]) {
        let existing: BTreeSet<usize> = entries.iter().map(|entry| entry.order).collect();
        let before = self.orders.len();
        self.orders.retain(|order| existing.contains(order));
        if self.orders.len() != before {
            trace!(
                "Selection reconcile dropped {} stale order(s)",
                before - self.orders.len()
            );
        }
    }

    /// Follows surviving entries through [`ordering::remove_by_order`].
    pub fn after_remove(&mut self, removed: &BTreeSet<usize>) {
        self.orders = self
            .orders
            .iter()
            .filter(|order| !removed.contains(order))
            .map(|&order| order - removed.range(..order).count())
            .collect();
    }

    /// Shifts selected rows at or after `gap` past `count` inserted rows.
    pub fn after_insert(&mut self, gap: usize, count: usize) {
        self.orders = self
            .orders
            .iter()
            .map(|&order| if order >= gap { order + count } else { order })
            .collect();
    }

    /// Follows the selected entries through [`ordering::move_entry`].
    pub fn after_move(&mut self, len: usize, from: usize, to: usize) -> Result<(), OrderingError> {
        let permutation = ordering::move_permutation(len, from, to)?;
        self.remap(&permutation);
        Ok(())
    }

    /// Follows the selected entries through [`ordering::move_entries`].
    pub fn after_multi_move(
        &mut self,
        len: usize,
        indices: &[usize],
        gap: usize,
    ) -> Result<(), OrderingError> {
        let permutation = ordering::multi_move_permutation(len, indices, gap)?;
        self.remap(&permutation);
        Ok(())
    }

    fn remap(&mut self, permutation: &[usize]) {
        self.orders = permutation
            .iter()
            .enumerate()
            .filter(|(_, old_position)| self.orders.contains(old_position))
            .map(|(new_position, _)| new_position)
            .collect();
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::Selection;
    use crate::playlist::ordering::{move_entry, remove_by_order, renumber};
    use crate::playlist::{TrackDetails, TrackEntry};

    fn playlist(titles: &[&str]) -> Vec<TrackEntry> {
        renumber(
            titles
                .iter()
                .map(|title| TrackEntry {
                    details: TrackDetails {
                        title: Some(title.to_string()),
                        ..TrackDetails::default()
                    },
                    ..TrackEntry::default()
                })
                .collect(),
        )
    }

    #[test]
    fn test_toggle_adds_then_removes() {
        let mut selection = Selection::new();
        selection.toggle(3);
        assert!(selection.contains(3));
        selection.toggle(3);
        assert!(selection.is_empty());
    }

    #[test]
    fn test_select_all_and_all_selected() {
        let entries = playlist(&["A", "B"]);
        let mut selection = Selection::select_all(&entries);
        assert!(selection.all_selected(&entries));
        selection.toggle(0);
        assert!(!selection.all_selected(&entries));
        selection.clear();
        assert!(selection.is_empty());
    }

    #[test]
    fn test_remove_remaps_and_reconciles_selection() {
        let entries = playlist(&["A", "B", "C"]);
        let mut selection = Selection::from_orders([0, 2]);
        let removed = BTreeSet::from([1]);

        let remaining = remove_by_order(&entries, &removed);
        selection.after_remove(&removed);
        selection.reconcile(&remaining);

        assert_eq!(selection.indices(), vec![0, 1]);
        assert_eq!(remaining[1].title(), Some("C"));
    }

    #[test]
    fn test_removing_selected_entry_drops_it() {
        let mut selection = Selection::from_orders([1, 2]);
        selection.after_remove(&BTreeSet::from([1]));
        assert_eq!(selection.indices(), vec![1]);
    }

    #[test]
    fn test_move_keeps_selection_on_the_same_track() {
        let entries = playlist(&["A", "B", "C"]);
        let mut selection = Selection::from_orders([2]);

        let moved = move_entry(&entries, 2, 0).expect("in range");
        selection.after_move(entries.len(), 2, 0).expect("in range");
        selection.reconcile(&moved);

        assert_eq!(selection.indices(), vec![0]);
        assert_eq!(moved[0].title(), Some("C"));
    }

    #[test]
    fn test_multi_move_keeps_selection_on_the_same_tracks() {
        let mut selection = Selection::from_orders([1, 3]);
        selection
            .after_multi_move(5, &[1, 3], 5)
            .expect("in range");
        assert_eq!(selection.indices(), vec![3, 4]);
    }

    #[test]
    fn test_insert_shifts_rows_after_the_gap() {
        let mut selection = Selection::from_orders([0, 2]);
        selection.after_insert(1, 2);
        assert_eq!(selection.indices(), vec![0, 4]);
    }

    #[test]
    fn test_reconcile_drops_values_past_the_end() {
        let entries = playlist(&["A"]);
        let mut selection = Selection::from_orders([0, 4]);
        selection.reconcile(&entries);
        assert_eq!(selection.indices(), vec![0]);
    }
}
