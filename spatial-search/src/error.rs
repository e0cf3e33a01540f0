use thiserror::Error;

/// Everything that can make a public operation on [`crate::Searcher`] or
/// [`crate::PointSet`] fail.
///
/// Contract violations that spec.md classifies as programming errors
/// (out-of-range indices, a non-positive radius, a non-square activation
/// matrix) are never represented here — they are caught by
/// `debug_assert!` at the call site instead, and are not recoverable.
#[derive(Debug, Error)]
pub enum SearchError {
    /// An internal allocation failed while growing `what`.
    #[error("allocation failed while growing {what}")]
    AllocFailure {
        /// Name of the structure that failed to grow (for diagnostics only).
        what: &'static str,
    },

    /// `resize_point_set` was called while a `refresh` was still pending.
    #[error("resize_point_set called while a refresh is pending")]
    InvalidState,

    /// `sort` was called without a prior `zort`, or on an empty array.
    #[error("sort() called without a prior zort() or with an empty array")]
    InvalidOrMissingTable,
}

/// Convenience alias used throughout this crate.
pub type Result<T, E = SearchError> = std::result::Result<T, E>;

pub(crate) fn try_reserve<T>(v: &mut Vec<T>, additional: usize, what: &'static str) -> Result<()> {
    v.try_reserve(additional).map_err(|_| {
        log::warn!("allocation failed reserving {additional} more slot(s) for {what}");
        SearchError::AllocFailure { what }
    })
}
