//! Error types for the storage engine (spec §7).
//!
//! Every fatal and non-fatal condition the engine can hit lives in one enum,
//! the same way the teacher's `fsqlite-error` crate centralizes
//! `FrankenError` for its whole workspace.

use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, StoreError>;

/// All error conditions the storage engine can surface.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Unrecoverable file I/O: open, write, flush, or read during recovery
    /// or checkpoint. The engine cannot guarantee consistency after this and
    /// should be considered dead.
    #[error("fatal I/O on {path}: {source}")]
    FatalIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A short write: fewer bytes were written than requested. Always
    /// fatal, since the file is now in an unknown state.
    #[error("short write to {path}: wrote {wrote} of {expected} bytes")]
    ShortWrite {
        path: PathBuf,
        wrote: usize,
        expected: usize,
    },

    /// A WAL record was truncated mid-structure, or carried a commit marker
    /// with the wrong magic. Not fatal: the affected transaction is simply
    /// treated as uncommitted, or the scan stops at the last good offset.
    #[error("corrupt WAL record at offset {offset}: {reason}")]
    Corrupt { offset: u64, reason: &'static str },

    /// The page cache has no room for a new entry and every resident entry
    /// is dirty (pinned until its owner commits or aborts).
    #[error("page cache full: no clean entry available to evict")]
    CacheFull,

    /// Too many live readers for a bounded reader registry. The dynamic
    /// registry used by `ledgerstore` never returns this, but a
    /// bounded-capacity configuration may.
    #[error("reader registry full: cannot register a new snapshot")]
    ReaderRegistryFull,

    /// A hash-join row was missing its key field.
    #[error("row missing key field {field:?}")]
    KeyMissing { field: String },

    /// A hash-join row could not be decoded, or its key field was not a
    /// scalar value.
    #[error("malformed row: {reason}")]
    MalformedRow { reason: String },

    /// A write transaction was requested while another is already active.
    /// Only reachable when the writer mutex is bypassed (e.g. a `try_`
    /// variant); the blocking `begin_write` path never surfaces this.
    #[error("a write transaction is already active")]
    Busy,

    /// An internal invariant was violated. Indicates a bug in this crate,
    /// not a caller error.
    #[error("internal invariant violated: {0}")]
    Internal(String),
}

impl StoreError {
    #[must_use]
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Whether this error leaves the engine in a state it cannot recover
    /// from within the current process (spec §7: `FatalIO` "terminates the
    /// engine").
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::FatalIo { .. } | Self::ShortWrite { .. })
    }
}
