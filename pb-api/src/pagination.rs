//! Pagination utilities for history queries
//!
//! History pages are addressed by `skip`/`limit` rather than page numbers.

/// Records returned when the caller does not pass `limit`
pub const DEFAULT_LIMIT: u32 = 10;

/// Upper bound on `limit`
pub const MAX_LIMIT: u32 = 100;

/// Sanitized skip/limit window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryWindow {
    /// Records to skip from the newest
    pub skip: u32,
    /// Maximum records to return, within [1, MAX_LIMIT]
    pub limit: u32,
}

impl HistoryWindow {
    /// Build a window from optional query parameters
    ///
    /// # Examples
    /// ```
    /// use pb_api::pagination::HistoryWindow;
    ///
    /// let w = HistoryWindow::new(None, None);
    /// assert_eq!((w.skip, w.limit), (0, 10));
    ///
    /// // Oversized limit gets clamped
    /// let w = HistoryWindow::new(Some(500), Some(20));
    /// assert_eq!((w.skip, w.limit), (20, 100));
    /// ```
    pub fn new(limit: Option<u32>, skip: Option<u32>) -> Self {
        Self {
            skip: skip.unwrap_or(0),
            limit: limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT),
        }
    }

    /// Whether more records exist past this page
    pub fn has_more(&self, total: u64, returned: usize) -> bool {
        total > u64::from(self.skip) + returned as u64
    }
}

impl Default for HistoryWindow {
    fn default() -> Self {
        Self::new(None, None)
    }
}
