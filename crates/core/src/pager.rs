//! Fixed-size pagination over an already filtered and sorted sequence.
//!
//! The current page is clamped into `[1, total_pages]` whenever it is read,
//! so deleting records or narrowing filters never strands the view on an
//! empty out-of-range page.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

/// Default number of records per page.
pub const DEFAULT_PAGE_SIZE: usize = 10;

/// Largest page size a view may configure.
pub const MAX_PAGE_SIZE: usize = 500;

/// Number of pages needed for `count` items. Never less than one.
pub fn total_pages(count: usize, page_size: usize) -> usize {
    let page_size = page_size.max(1);
    count.div_ceil(page_size).max(1)
}

/// Page size and requested page of a view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageState {
    page_size: usize,
    current_page: usize,
}

impl PageState {
    pub fn new(page_size: usize) -> CoreResult<Self> {
        if page_size == 0 {
            return Err(CoreError::Validation("Page size must be at least 1".into()));
        }
        Ok(Self {
            page_size,
            current_page: 1,
        })
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// The requested page as stored, before clamping.
    pub fn requested_page(&self) -> usize {
        self.current_page
    }

    /// The page that is actually shown for `count` items.
    pub fn current_page(&self, count: usize) -> usize {
        self.current_page.clamp(1, total_pages(count, self.page_size))
    }

    /// Persist the clamped page, e.g. after filters narrowed the set.
    pub fn clamp_to(&mut self, count: usize) {
        self.current_page = self.current_page(count);
    }

    /// Jump to page `n`. Returns `false` (and does nothing) when out of range.
    pub fn go_to(&mut self, n: usize, count: usize) -> bool {
        if n < 1 || n > total_pages(count, self.page_size) {
            return false;
        }
        self.current_page = n;
        true
    }

    pub fn next(&mut self, count: usize) -> bool {
        let current = self.current_page(count);
        self.go_to(current + 1, count)
    }

    pub fn prev(&mut self, count: usize) -> bool {
        let current = self.current_page(count);
        current > 1 && self.go_to(current - 1, count)
    }

    /// Force the stored page without range checks. Reads still clamp.
    pub fn request_page(&mut self, n: usize) {
        self.current_page = n.max(1);
    }

    pub fn reset(&mut self) {
        self.current_page = 1;
    }
}

/// One rendered page.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<'a, T> {
    pub items: &'a [T],
    pub current_page: usize,
    pub total_pages: usize,
    pub total_items: usize,
    pub page_size: usize,
}

impl<T> Page<'_, T> {
    pub fn has_next(&self) -> bool {
        self.current_page < self.total_pages
    }

    pub fn has_prev(&self) -> bool {
        self.current_page > 1
    }

    /// 1-based index of the first item on this page, 0 when empty.
    pub fn first_item_number(&self) -> usize {
        if self.items.is_empty() {
            0
        } else {
            (self.current_page - 1) * self.page_size + 1
        }
    }
}

/// Slice `items` to the page described by `state`, clamping the page.
pub fn paginate<'a, T>(items: &'a [T], state: &PageState) -> Page<'a, T> {
    let total_items = items.len();
    let total_pages = total_pages(total_items, state.page_size);
    let current_page = state.current_page(total_items);
    let start = ((current_page - 1) * state.page_size).min(total_items);
    let end = (start + state.page_size).min(total_items);

    Page {
        items: &items[start..end],
        current_page,
        total_pages,
        total_items,
        page_size: state.page_size,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
