//! Selection state for bulk actions.
//!
//! A `SelectionSet` tracks which item identifiers the user has currently
//! marked, decoupled from any list rendering. Ids are opaque and compared by
//! string equality; insertion order is preserved so a bulk request sends ids
//! in the order the user picked them. Stale ids can persist if the backing
//! list changes; reconciling is the caller's responsibility.

use tokio::sync::watch;

/// Set of identifiers currently marked for a bulk action.
#[derive(Debug)]
pub struct SelectionSet {
    ids: Vec<String>,
    total_available: usize,
    changed: watch::Sender<usize>,
}

impl SelectionSet {
    /// Empty selection, created on page/component mount.
    pub fn new() -> Self {
        Self {
            ids: Vec::new(),
            total_available: 0,
            changed: watch::channel(0).0,
        }
    }

    /// Count of selectable items in the current view (for "N of M" labels
    /// and select-all toggles at the call site).
    pub fn total_available(&self) -> usize {
        self.total_available
    }

    pub fn set_total_available(&mut self, total: usize) {
        self.total_available = total;
    }

    /// Adds `id` if absent, removes it if present.
    pub fn toggle(&mut self, id: impl Into<String>) {
        let id = id.into();
        match self.ids.iter().position(|existing| *existing == id) {
            Some(pos) => {
                self.ids.remove(pos);
            }
            None => self.ids.push(id),
        }
        self.notify();
    }

    /// Replaces the selection with `ids`, deduplicated, order preserved.
    ///
    /// Call sites that want toggle semantics ("select all" on a fully
    /// selected list clears it) implement that themselves; this always
    /// replaces.
    pub fn select_all<I, S>(&mut self, ids: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ids.clear();
        for id in ids {
            let id = id.into();
            if !self.ids.contains(&id) {
                self.ids.push(id);
            }
        }
        self.notify();
    }

    pub fn clear(&mut self) {
        self.ids.clear();
        self.notify();
    }

    pub fn is_selected(&self, id: &str) -> bool {
        self.ids.iter().any(|existing| existing == id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Snapshot of the selected ids in selection order.
    pub fn to_vec(&self) -> Vec<String> {
        self.ids.clone()
    }

    /// Observe selection size changes (checkbox counters, button enablement).
    pub fn subscribe(&self) -> watch::Receiver<usize> {
        self.changed.subscribe()
    }

    fn notify(&self) {
        // Receivers may all be gone; that is fine.
        let _ = self.changed.send(self.ids.len());
    }
}

impl Default for SelectionSet {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn toggle_adds_then_removes() {
        let mut sel = SelectionSet::new();
        sel.toggle("7");
        assert!(sel.is_selected("7"));
        assert_eq!(sel.len(), 1);
        sel.toggle("7");
        assert!(!sel.is_selected("7"));
        assert!(sel.is_empty());
    }

    #[test]
    fn toggle_twice_is_identity() {
        let mut sel = SelectionSet::new();
        sel.toggle("1");
        sel.toggle("2");
        let before = sel.to_vec();
        sel.toggle("9");
        sel.toggle("9");
        assert_eq!(sel.to_vec(), before);
    }

    #[test]
    fn select_all_deduplicates() {
        let mut sel = SelectionSet::new();
        sel.select_all(["1", "2", "2", "3", "1"]);
        assert_eq!(sel.len(), 3);
        assert_eq!(sel.to_vec(), vec!["1", "2", "3"]);
    }

    #[test]
    fn select_all_then_clear_is_empty() {
        let mut sel = SelectionSet::new();
        sel.select_all(["1", "2", "3"]);
        assert_eq!(sel.len(), 3);
        sel.clear();
        assert_eq!(sel.len(), 0);
        assert!(sel.is_empty());
    }

    #[test]
    fn select_all_replaces_existing_selection() {
        let mut sel = SelectionSet::new();
        sel.toggle("99");
        sel.select_all(["1", "2"]);
        assert!(!sel.is_selected("99"));
        assert_eq!(sel.to_vec(), vec!["1", "2"]);
    }

    #[test]
    fn preserves_selection_order() {
        let mut sel = SelectionSet::new();
        sel.toggle("3");
        sel.toggle("1");
        sel.toggle("2");
        assert_eq!(sel.to_vec(), vec!["3", "1", "2"]);
    }

    #[test]
    fn subscribe_sees_size_changes() {
        let mut sel = SelectionSet::new();
        let rx = sel.subscribe();
        sel.toggle("a");
        sel.toggle("b");
        assert_eq!(*rx.borrow(), 2);
        sel.clear();
        assert_eq!(*rx.borrow(), 0);
    }

    proptest! {
        #[test]
        fn size_never_exceeds_distinct_ids(ops in proptest::collection::vec(0u8..20, 0..60)) {
            let mut sel = SelectionSet::new();
            for id in &ops {
                sel.toggle(id.to_string());
            }
            let distinct: std::collections::HashSet<_> = ops.iter().collect();
            prop_assert!(sel.len() <= distinct.len());
            // Each id present iff toggled an odd number of times.
            for id in &distinct {
                let count = ops.iter().filter(|o| o == id).count();
                prop_assert_eq!(sel.is_selected(&id.to_string()), count % 2 == 1);
            }
        }
    }
}
