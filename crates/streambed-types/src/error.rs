//! The typed error surface shared by every crate in the workspace.

use thiserror::Error;

/// The kinds of failure a key's processing can surface. Per the recovery policy, only
/// [`CoreError::LateElement`] is handled internally (dropped, counted); every other variant
/// aborts the current `processElement`/`onTimer` call and is the host's to decide whether to
/// retry.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("watermark for domain {domain:?} cannot move backwards: {from} -> {to}")]
    InvalidWatermark {
        domain: &'static str,
        from: i64,
        to: i64,
    },

    #[error("state cell {cell_id:?} accessed as {expected} but was created as {actual}")]
    StateTypeMismatch {
        cell_id: String,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("trigger machine reached an impossible state: {0}")]
    TriggerContract(String),

    #[error("user code failed: {0}")]
    UserCodeFailure(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("element at {timestamp}ms for window {window:?} arrived after its allowed lateness expired at {expiration}ms")]
    LateElement {
        timestamp: i64,
        window: String,
        expiration: i64,
    },

    #[error("window merge proposed on a non-mergeable window function")]
    MergeConflict,

    #[error("state codec error: {0}")]
    Codec(String),
}

pub type Result<T> = std::result::Result<T, CoreError>;

/// Converts the core's typed `Result` into `anyhow::Result`, the single catch-all boundary a host
/// can wrap the core's own `Result` in when it would rather propagate failures with `?` than match
/// on every `CoreError` variant itself (§7).
pub fn into_anyhow<T>(result: Result<T>) -> anyhow::Result<T> {
    result.map_err(anyhow::Error::from)
}
