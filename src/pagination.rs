use serde::{Deserialize, Serialize};
use ts_rs::TS;
use utoipa::ToSchema;

/// Page
///
/// A single page cut from a larger result set, along with the metadata a
/// client needs to render pagination controls. A request past the last page
/// is not an error: it yields an empty `items` list while `total` and `pages`
/// still describe the full result set.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// 1-based index of this page.
    pub page: i64,
    pub per_page: i64,
    /// Number of rows in the whole result set, not just this page.
    pub total: i64,
    /// Number of pages the result set spans. Zero when the set is empty.
    pub pages: i64,
}

impl<T> Page<T> {
    /// new
    ///
    /// Assembles a page from items already narrowed to the requested window.
    /// `pages` is derived as ceil(total / per_page).
    pub fn new(items: Vec<T>, page: i64, per_page: i64, total: i64) -> Self {
        let per_page = per_page.max(1);
        Self {
            items,
            page: page.max(1),
            per_page,
            total,
            pages: (total + per_page - 1) / per_page,
        }
    }

    /// paginate
    ///
    /// Cuts the requested window out of a fully materialized result set.
    /// Used by in-memory backends; SQL backends narrow with LIMIT/OFFSET
    /// instead and call [`Page::new`].
    pub fn paginate(all: Vec<T>, page: i64, per_page: i64) -> Self {
        let page = page.max(1);
        let per_page = per_page.max(1);
        let total = all.len() as i64;
        let items = all
            .into_iter()
            .skip(((page - 1) * per_page) as usize)
            .take(per_page as usize)
            .collect();
        Self::new(items, page, per_page, total)
    }

    /// map
    ///
    /// Converts the item type while keeping every piece of page metadata
    /// intact. Lets repositories return raw rows and handlers decorate them
    /// into view models without re-counting.
    pub fn map<U, F>(self, f: F) -> Page<U>
    where
        F: FnMut(T) -> U,
    {
        Page {
            items: self.items.into_iter().map(f).collect(),
            page: self.page,
            per_page: self.per_page,
            total: self.total,
            pages: self.pages,
        }
    }
}

/// clamp_page
///
/// Normalizes the `page` query parameter: absent values default to the first
/// page and zero or negative values are clamped up to 1.
pub fn clamp_page(page: Option<i64>) -> i64 {
    page.unwrap_or(1).max(1)
}

/// offset
///
/// Row offset of the first item on `page`, for LIMIT/OFFSET queries.
pub fn offset(page: i64, per_page: i64) -> i64 {
    (page.max(1) - 1) * per_page
}
