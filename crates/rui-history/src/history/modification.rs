#![forbid(unsafe_code)]

//! Reversible modifications.
//!
//! A [`Modification`] is an atomic, reversible unit of change. Its single
//! operation, [`apply_and_get_opposite`](Modification::apply_and_get_opposite),
//! mutates the target state and hands back a *new* modification that exactly
//! undoes it. Modifications are immutable value objects shared through
//! [`Arc`], so the same record can sit in a local history and be wrapped into
//! an owner's history at the same time.
//!
//! # Invariants
//!
//! - Applying `m` and then the modification it returns restores the prior
//!   observable state.
//! - A modification with `is_null() == true` must never be pushed.
//! - A modification is never applied again once its opposite was produced;
//!   the opposite is a distinct object.
//!
//! # Failure Modes
//!
//! - **Accessor failure**: the underlying `set` refuses the value. The
//!   modification returns an error and is assumed to have left the state
//!   untouched.
//! - **Partial composite**: one sub-modification fails midway. The already
//!   applied ones are rolled back in reverse order before the error is
//!   returned, so a composite is all-or-nothing.

use std::fmt;
use std::sync::Arc;

/// Shared handle to a modification.
pub type ModificationRef = Arc<dyn Modification>;

/// Result of applying a modification.
pub type ModificationResult<T> = Result<T, ModificationError>;

/// Errors raised while applying a modification or merging histories.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModificationError {
    /// The value accessor rejected a read or write.
    AccessorFailed(String),
    /// An index does not address an item of the list.
    IndexOutOfBounds { index: usize, length: usize },
    /// The target does not support the requested operation.
    Unsupported { operation: &'static str },
    /// The master history was dropped or is busy.
    MasterUnavailable,
    /// A sub-modification of a composite failed; the composite was rolled back.
    CompositeFailed {
        title: Option<String>,
        index: usize,
        source: Box<ModificationError>,
    },
    /// A value transaction could not be committed or rolled back.
    TransactionFailed(String),
    /// Generic error with message.
    Other(String),
}

impl fmt::Display for ModificationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AccessorFailed(msg) => write!(f, "value accessor failed: {msg}"),
            Self::IndexOutOfBounds { index, length } => {
                write!(f, "index {index} out of bounds (length {length})")
            }
            Self::Unsupported { operation } => write!(f, "operation not supported: {operation}"),
            Self::MasterUnavailable => write!(f, "master modification stack is unavailable"),
            Self::CompositeFailed {
                title,
                index,
                source,
            } => write!(
                f,
                "composite '{}' failed at step {index}: {source}",
                title.as_deref().unwrap_or("<untitled>")
            ),
            Self::TransactionFailed(msg) => write!(f, "value transaction failed: {msg}"),
            Self::Other(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for ModificationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::CompositeFailed { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }
}

/// An atomic, reversible change.
///
/// Implementations capture everything needed to perform the change; the
/// opposite returned by [`apply_and_get_opposite`](Self::apply_and_get_opposite)
/// captures everything needed to revert it.
pub trait Modification: Send + Sync {
    /// Perform the change and return the modification that undoes it.
    fn apply_and_get_opposite(&self) -> ModificationResult<ModificationRef>;

    /// Human-readable title for menus ("Set name").
    fn title(&self) -> Option<&str>;

    /// True when applying this modification does nothing.
    fn is_null(&self) -> bool {
        false
    }

    /// True when this modification records no real state change.
    ///
    /// Fake modifications exist to re-trigger reads (e.g. after an error
    /// clears) and do not count as edits for the state version.
    fn is_fake(&self) -> bool {
        false
    }

    /// Debug name of the concrete modification type.
    fn debug_name(&self) -> &'static str {
        "Modification"
    }
}

impl fmt::Debug for dyn Modification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(self.debug_name())
            .field("title", &self.title())
            .field("null", &self.is_null())
            .field("fake", &self.is_fake())
            .finish()
    }
}

// ============================================================================
// Null
// ============================================================================

/// A modification that does nothing. Stacks refuse to record it.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullModification;

impl NullModification {
    /// Shared null modification.
    #[must_use]
    pub fn shared() -> ModificationRef {
        Arc::new(Self)
    }
}

impl Modification for NullModification {
    fn apply_and_get_opposite(&self) -> ModificationResult<ModificationRef> {
        Ok(Self::shared())
    }

    fn title(&self) -> Option<&str> {
        None
    }

    fn is_null(&self) -> bool {
        true
    }

    fn debug_name(&self) -> &'static str {
        "NullModification"
    }
}

// ============================================================================
// Skipped
// ============================================================================

/// Placeholder recorded in place of an entry whose application failed.
///
/// Applying it changes nothing and yields the original entry back, so that
/// moving the cursor in the opposite direction re-aligns the history with
/// the (unchanged) live state.
pub struct SkippedModification {
    pending: ModificationRef,
}

impl SkippedModification {
    /// Wrap the entry that failed to apply.
    #[must_use]
    pub fn new(pending: ModificationRef) -> Self {
        Self { pending }
    }

    /// The entry that will come back when this placeholder is applied.
    #[must_use]
    pub fn pending(&self) -> &ModificationRef {
        &self.pending
    }
}

impl Modification for SkippedModification {
    fn apply_and_get_opposite(&self) -> ModificationResult<ModificationRef> {
        Ok(Arc::clone(&self.pending))
    }

    fn title(&self) -> Option<&str> {
        self.pending.title()
    }

    fn is_fake(&self) -> bool {
        true
    }

    fn debug_name(&self) -> &'static str {
        "SkippedModification"
    }
}

// ============================================================================
// Composite
// ============================================================================

/// Several modifications applied and reverted as one unit.
///
/// Entries are stored in application order. The opposite holds the
/// opposites of the entries in reverse order, so undoing a composite walks
/// its steps backwards.
pub struct CompositeModification {
    title: Option<String>,
    entries: Vec<ModificationRef>,
    fake: bool,
}

impl fmt::Debug for CompositeModification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositeModification")
            .field("title", &self.title)
            .field("entries", &self.entries.len())
            .field("fake", &self.fake)
            .finish()
    }
}

impl CompositeModification {
    /// Create a composite from entries in application order.
    #[must_use]
    pub fn new(title: Option<String>, entries: Vec<ModificationRef>, fake: bool) -> Self {
        Self {
            title,
            entries,
            fake,
        }
    }

    /// Create a composite from undo records collected in the order they were
    /// pushed: the last pushed record is applied first.
    #[must_use]
    pub fn from_undo_records(
        title: Option<String>,
        mut records: Vec<ModificationRef>,
        fake: bool,
    ) -> Self {
        records.reverse();
        Self::new(title, records, fake)
    }

    /// Entries in application order.
    #[must_use]
    pub fn entries(&self) -> &[ModificationRef] {
        &self.entries
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the composite has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Modification for CompositeModification {
    fn apply_and_get_opposite(&self) -> ModificationResult<ModificationRef> {
        let mut opposites: Vec<ModificationRef> = Vec::with_capacity(self.entries.len());
        for (i, entry) in self.entries.iter().enumerate() {
            match entry.apply_and_get_opposite() {
                Ok(opposite) => opposites.push(opposite),
                Err(e) => {
                    // Roll back executed steps on failure
                    for done in opposites.iter().rev() {
                        if let Err(rollback) = done.apply_and_get_opposite() {
                            tracing::warn!(
                                target: "rui.history",
                                title = ?self.title,
                                error = %rollback,
                                "composite rollback step failed"
                            );
                        }
                    }
                    return Err(ModificationError::CompositeFailed {
                        title: self.title.clone(),
                        index: i,
                        source: Box::new(e),
                    });
                }
            }
        }
        opposites.reverse();
        Ok(Arc::new(Self::new(self.title.clone(), opposites, self.fake)))
    }

    fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    fn is_null(&self) -> bool {
        self.entries.iter().all(|e| e.is_null())
    }

    fn is_fake(&self) -> bool {
        self.fake
    }

    fn debug_name(&self) -> &'static str {
        "CompositeModification"
    }
}

// ============================================================================
// Value set
// ============================================================================

/// Read/write access to a single value owned by someone else.
///
/// This is the only thing the history engine knows about fields: it can
/// ask for the current value and ask to store a new one.
pub trait ValueAccessor<T>: Send + Sync {
    /// Read the current value.
    fn get(&self) -> T;

    /// Store a new value.
    fn set(&self, value: T) -> ModificationResult<()>;
}

/// Replace a value through a [`ValueAccessor`].
///
/// The opposite is built from the value read just before the write.
pub struct ValueModification<T> {
    accessor: Arc<dyn ValueAccessor<T>>,
    new_value: T,
    title: Option<String>,
}

impl<T: fmt::Debug> fmt::Debug for ValueModification<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValueModification")
            .field("new_value", &self.new_value)
            .field("title", &self.title)
            .finish()
    }
}

impl<T> ValueModification<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Create a modification that stores `new_value` through `accessor`.
    #[must_use]
    pub fn new(accessor: Arc<dyn ValueAccessor<T>>, new_value: T) -> Self {
        Self {
            accessor,
            new_value,
            title: None,
        }
    }

    /// Set the title.
    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// The value this modification stores.
    #[must_use]
    pub fn new_value(&self) -> &T {
        &self.new_value
    }
}

impl<T> Modification for ValueModification<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn apply_and_get_opposite(&self) -> ModificationResult<ModificationRef> {
        let old_value = self.accessor.get();
        self.accessor.set(self.new_value.clone())?;
        Ok(Arc::new(Self {
            accessor: Arc::clone(&self.accessor),
            new_value: old_value,
            title: self.title.clone(),
        }))
    }

    fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    fn debug_name(&self) -> &'static str {
        "ValueModification"
    }
}
