//! Page cursor over a result list.
//!
//! Pages are 0-indexed. Whenever there is at least one page the cursor stays
//! within `[0, total_pages - 1]`; an empty list has zero pages and the cursor
//! rests at 0.

use std::ops::Range;

/// Default number of catalog cards per page.
pub const DEFAULT_PAGE_SIZE: usize = 12;

/// Maximum number of page buttons shown at once.
pub const DEFAULT_WINDOW: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pager {
    total_items: usize,
    page_size: usize,
    current_page: usize,
}

impl Pager {
    pub fn new(total_items: usize, page_size: usize) -> Self {
        Self {
            total_items,
            page_size: page_size.max(1),
            current_page: 0,
        }
    }

    pub fn total_pages(&self) -> usize {
        self.total_items.div_ceil(self.page_size)
    }

    pub fn current_page(&self) -> usize {
        self.current_page
    }

    pub fn total_items(&self) -> usize {
        self.total_items
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    fn last_page(&self) -> usize {
        self.total_pages().saturating_sub(1)
    }

    pub fn has_next(&self) -> bool {
        self.current_page < self.last_page()
    }

    pub fn has_previous(&self) -> bool {
        self.current_page > 0
    }

    pub fn next(&mut self) -> usize {
        self.current_page = (self.current_page + 1).min(self.last_page());
        self.current_page
    }

    pub fn previous(&mut self) -> usize {
        self.current_page = self.current_page.saturating_sub(1);
        self.current_page
    }

    /// Jump to `page`, clamped to the last page.
    pub fn go_to(&mut self, page: usize) -> usize {
        self.current_page = page.min(self.last_page());
        self.current_page
    }

    pub fn reset(&mut self) {
        self.current_page = 0;
    }

    /// Change the item count (e.g. after filtering) and return to page 0.
    pub fn set_total_items(&mut self, total_items: usize) {
        self.total_items = total_items;
        self.current_page = 0;
    }

    /// Consecutive page indices around the current page, at most `max_buttons` long.
    pub fn window(&self, max_buttons: usize) -> Vec<usize> {
        let total = self.total_pages();
        let len = max_buttons.min(total);
        if len == 0 {
            return Vec::new();
        }
        let start = self
            .current_page
            .saturating_sub(len / 2)
            .min(total - len);
        (start..start + len).collect()
    }

    /// Item index range of the current page.
    pub fn range(&self) -> Range<usize> {
        let start = (self.current_page * self.page_size).min(self.total_items);
        let end = (start + self.page_size).min(self.total_items);
        start..end
    }

    pub fn slice<'a, T>(&self, items: &'a [T]) -> &'a [T] {
        let range = self.range();
        let end = range.end.min(items.len());
        let start = range.start.min(end);
        &items[start..end]
    }
}
