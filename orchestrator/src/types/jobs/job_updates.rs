use serde::Serialize;

/// A single-field mutation of a [`JobRecord`](super::record::JobRecord).
///
/// The ledger applies each update atomically and checks it against the record's current
/// state, so callers never touch records directly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum LedgerUpdate {
    /// Sets `name` and `submitted` together.
    Submitted { name: String, array_index: Option<u32> },
    /// Clears the submission ahead of a repost. The repost counter is kept.
    Unsubmitted,
    Retrieved,
    RepostCount(u32),
}

impl LedgerUpdate {
    pub fn submitted(name: impl Into<String>) -> Self {
        LedgerUpdate::Submitted { name: name.into(), array_index: None }
    }

    pub fn submitted_in_array(name: impl Into<String>, array_index: u32) -> Self {
        LedgerUpdate::Submitted { name: name.into(), array_index: Some(array_index) }
    }

    /// Name of the mutated field, for logs.
    pub fn field(&self) -> &'static str {
        match self {
            LedgerUpdate::Submitted { .. } | LedgerUpdate::Unsubmitted => "submitted",
            LedgerUpdate::Retrieved => "retrieved",
            LedgerUpdate::RepostCount(_) => "repost_count",
        }
    }
}
