#![forbid(unsafe_code)]

//! Transactional write contract for values whose edits must be committed.
//!
//! Some owners only accept edits of a nested value between an explicit
//! begin and commit (think of a setter that validates a whole object).
//! The finalization step commits the transaction when the nested edit is
//! accepted and rolls it back when it is rejected.

use std::fmt;

use super::modification::ModificationResult;

/// An open commit/rollback bracket around edits of a value.
///
/// The owner begins the transaction before handing the value out for
/// editing; the history engine only ever closes it.
pub trait ValueTransaction: Send + Sync {
    /// Make the edits permanent.
    fn commit(&self) -> ModificationResult<()>;

    /// Discard the edits.
    fn rollback(&self) -> ModificationResult<()>;

    /// Short label for logs.
    fn label(&self) -> &str {
        "value transaction"
    }
}

impl fmt::Debug for dyn ValueTransaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValueTransaction")
            .field("label", &self.label())
            .finish()
    }
}
