//! Page and batch-selection state
//!
//! Purely local: never persisted, only sent to the server as the `ids` of a
//! batch delete.

use std::collections::BTreeSet;

use crate::admin::types::CredentialsStatusResponse;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionState {
    /// 1-indexed
    page: u32,
    page_size: u32,
    selected: BTreeSet<u64>,
}

impl SelectionState {
    pub fn new(page_size: u32) -> Self {
        Self {
            page: 1,
            page_size: page_size.max(1),
            selected: BTreeSet::new(),
        }
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Jump to `page`; selection is page-local so it is cleared on change
    pub fn set_page(&mut self, page: u32) {
        let page = page.max(1);
        if page != self.page {
            self.page = page;
            self.selected.clear();
        }
    }

    pub fn next_page(&mut self, total_pages: u32) {
        if self.page < total_pages {
            self.set_page(self.page + 1);
        }
    }

    pub fn prev_page(&mut self) {
        if self.page > 1 {
            self.set_page(self.page - 1);
        }
    }

    /// Clamp into `[1, max(1, total_pages)]`; returns whether the page moved
    pub fn clamp_page(&mut self, total_pages: u32) -> bool {
        let clamped = self.page.clamp(1, total_pages.max(1));
        let moved = clamped != self.page;
        self.set_page(clamped);
        moved
    }

    pub fn is_selected(&self, id: u64) -> bool {
        self.selected.contains(&id)
    }

    pub fn set_selected(&mut self, id: u64, selected: bool) {
        if selected {
            self.selected.insert(id);
        } else {
            self.selected.remove(&id);
        }
    }

    /// Select every visible ID, or clear if they are all selected already
    pub fn toggle_all(&mut self, visible: &[u64]) {
        let all_selected = !visible.is_empty()
            && self.selected.len() == visible.len()
            && visible.iter().all(|id| self.selected.contains(id));

        if all_selected {
            self.selected.clear();
        } else {
            self.selected = visible.iter().copied().collect();
        }
    }

    pub fn clear(&mut self) {
        self.selected.clear();
    }

    /// Selected IDs in ascending order
    pub fn selected_ids(&self) -> Vec<u64> {
        self.selected.iter().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.selected.len()
    }

    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }

    /// Reconcile with a freshly fetched listing
    ///
    /// Clamps the page to the listing's page count and drops selected IDs the
    /// listing no longer shows. Returns `true` if the page moved, in which
    /// case the caller should fetch the new page.
    pub fn sync_with(&mut self, listing: &CredentialsStatusResponse) -> bool {
        if self.clamp_page(listing.total_pages) {
            return true;
        }
        let visible: BTreeSet<u64> = listing.credentials.iter().map(|c| c.id).collect();
        self.selected.retain(|id| visible.contains(id));
        false
    }
}
