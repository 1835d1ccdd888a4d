// ============================================================================
// Cursor Pagination
// ============================================================================
//
// Forward-only pages over the ordered `_id` space. The cursor is the last id
// of the previous page; the next page starts strictly after it.
//
// ============================================================================

use crate::core::ObjectId;
use serde::{Deserialize, Serialize};

/// One page of results plus the cursor for the next one
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CursorPage<T> {
    pub data: Vec<T>,
    /// Absent when this page is the last one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

impl<T> CursorPage<T> {
    pub fn new(data: Vec<T>, next_cursor: Option<String>) -> Self {
        Self { data, next_cursor }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new(), None)
    }

    /// Build a page from a query result of at most `size` items.
    ///
    /// A full page carries the id of its last item as cursor; a short or
    /// empty page has none.
    pub fn from_results<F>(data: Vec<T>, size: usize, id_of: F) -> Self
    where
        F: Fn(&T) -> Option<ObjectId>,
    {
        let next_cursor = if !data.is_empty() && data.len() >= size {
            data.last().and_then(&id_of).map(|id| id.to_hex())
        } else {
            None
        };
        Self::new(data, next_cursor)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn has_next(&self) -> bool {
        self.next_cursor.is_some()
    }

    pub fn map<U, F: FnMut(T) -> U>(self, f: F) -> CursorPage<U> {
        CursorPage {
            data: self.data.into_iter().map(f).collect(),
            next_cursor: self.next_cursor,
        }
    }
}

impl<T> Default for CursorPage<T> {
    fn default() -> Self {
        Self::empty()
    }
}
