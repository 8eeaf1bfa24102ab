//! Pure page derivation over the in-memory container list.

use serde::Serialize;

/// Number of pages needed for `total` items at `page_size` per page.
/// An empty list still has one (empty) page so the frontend always has
/// a valid current page to render.
pub fn page_count(total: usize, page_size: usize) -> usize {
    let page_size = page_size.max(1);
    if total == 0 {
        1
    } else {
        total.div_ceil(page_size)
    }
}

/// The slice of `items` belonging to 1-based `page`. Pages past the end
/// are empty rather than an error.
pub fn page_slice<T>(items: &[T], page: usize, page_size: usize) -> &[T] {
    let page = page.max(1);
    let page_size = page_size.max(1);
    let start = (page - 1).saturating_mul(page_size);
    if start >= items.len() {
        return &[];
    }
    let end = (start + page_size).min(items.len());
    &items[start..end]
}

/// One rendered page plus the derived totals the table footer needs.
#[derive(Serialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct PageView<T> {
    pub items: Vec<T>,
    pub page: usize,
    pub page_size: usize,
    pub total_items: usize,
    pub total_pages: usize,
}

pub fn page_view<T: Clone>(items: &[T], page: usize, page_size: usize) -> PageView<T> {
    PageView {
        items: page_slice(items, page, page_size).to_vec(),
        page: page.max(1),
        page_size: page_size.max(1),
        total_items: items.len(),
        total_pages: page_count(items.len(), page_size),
    }
}
