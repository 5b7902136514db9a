//! Store errors.

/// Persistence-layer failures.
///
/// These are the "fatal for this request" class of the error taxonomy:
/// constraint violations never travel through here, and a stock race has its
/// own typed outcome (`InsertOutcome::StockConflict`) so it cannot be folded
/// into a generic failure.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("query failed: {0}")]
    QueryFailed(String),

    #[error("row not found")]
    NotFound,

    #[error("failed to begin transaction: {0}")]
    BeginFailed(String),

    #[error("failed to commit transaction: {0}")]
    CommitFailed(String),

    #[error("failed to rollback transaction: {0}")]
    RollbackFailed(String),

    #[error("stored row could not be decoded: {0}")]
    Decode(String),

    #[error("backend error: {0}")]
    Backend(String),
}
