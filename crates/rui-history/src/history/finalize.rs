#![forbid(unsafe_code)]

//! Merging a nested value's local history into its owner's history.
//!
//! When a value held by an owner (a field of an object, an item of a list)
//! is edited with its own [`ModificationStack`], the owner's history must
//! still be able to undo the edit. How depends on aliasing:
//!
//! | Return mode      | Master records                                   |
//! |------------------|--------------------------------------------------|
//! | `DirectOrProxy`  | the value's undo records (in-place edits)        |
//! | `Indeterminate`  | the committing set and the value's undo records   |
//! | `Calculated`     | the committing set only (a detached copy)         |
//!
//! A replaced value (`value_replaced`) always records the committing set
//! when one is given. Everything recorded for one finalization lands in a
//! single master-level composite.

use std::fmt;
use std::sync::Arc;

use super::modification::{ModificationRef, ModificationResult};
use super::return_mode::ValueReturnMode;
use super::stack::{ModificationHistory, ModificationStack};
use super::transaction::ValueTransaction;

/// Policy inputs of one finalization.
#[derive(Clone)]
pub struct SubModificationParams {
    /// Whether the owner accepts the nested edit.
    pub value_modif_accepted: bool,
    /// Aliasing of the edited value with the owner's storage.
    pub value_return_mode: ValueReturnMode,
    /// Whether the value was replaced wholesale rather than edited in place.
    pub value_replaced: bool,
    /// Ongoing transaction to close.
    pub value_transaction: Option<Arc<dyn ValueTransaction>>,
    /// Modification storing the edited value back into the owner.
    pub committing_modification: Option<ModificationRef>,
    /// Title of the master-level entry.
    pub title: Option<String>,
    /// Whether the master-level entry is fake.
    pub fake: bool,
}

impl fmt::Debug for SubModificationParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubModificationParams")
            .field("value_modif_accepted", &self.value_modif_accepted)
            .field("value_return_mode", &self.value_return_mode)
            .field("value_replaced", &self.value_replaced)
            .field("has_transaction", &self.value_transaction.is_some())
            .field("has_committing_modification", &self.committing_modification.is_some())
            .field("title", &self.title)
            .field("fake", &self.fake)
            .finish()
    }
}

impl Default for SubModificationParams {
    fn default() -> Self {
        Self {
            value_modif_accepted: true,
            value_return_mode: ValueReturnMode::DirectOrProxy,
            value_replaced: false,
            value_transaction: None,
            committing_modification: None,
            title: None,
            fake: false,
        }
    }
}

/// What a finalization did to the master.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Finalization {
    /// One composite entry was recorded on the master.
    Merged,
    /// The master was invalidated.
    Invalidated,
    /// Nothing needed recording.
    Skipped,
    /// The nested edit was rejected and reverted.
    RolledBack,
}

/// Join an owner's title and a nested edit's title.
#[must_use]
pub fn compose_title(prefix: Option<&str>, title: Option<&str>, separator: &str) -> Option<String> {
    match (prefix, title) {
        (Some(p), Some(t)) => Some(format!("{p}{separator}{t}")),
        (Some(p), None) => Some(p.to_string()),
        (None, Some(t)) => Some(t.to_string()),
        (None, None) => None,
    }
}

/// Merge `value_stack` into `master` according to `params`.
///
/// # Errors
///
/// Fails when the value transaction cannot be committed or rolled back,
/// or when the committing modification fails to apply on the master. In
/// the latter case the master-level composite is aborted and nothing is
/// recorded on the master.
pub fn finalize_sub_modifications(
    master: &mut dyn ModificationHistory,
    value_stack: &mut ModificationStack,
    params: &SubModificationParams,
) -> ModificationResult<Finalization> {
    let _span = tracing::debug_span!(
        "history.finalize",
        master = %master.name(),
        mode = ?params.value_return_mode,
        accepted = params.value_modif_accepted,
        replaced = params.value_replaced,
    )
    .entered();

    if !params.value_modif_accepted {
        if let Some(tx) = &params.value_transaction {
            tx.rollback()?;
            return Ok(Finalization::RolledBack);
        }
        if value_stack.can_undo() && params.value_return_mode.may_alias() {
            value_stack.undo_all();
            return Ok(Finalization::RolledBack);
        }
        return Ok(Finalization::Skipped);
    }

    if let Some(tx) = &params.value_transaction {
        tx.commit()?;
    }

    if value_stack.was_invalidated() {
        master.invalidate();
        return Ok(Finalization::Invalidated);
    }

    if !value_stack.can_undo() && !params.value_replaced {
        return Ok(Finalization::Skipped);
    }

    let title = params.title.as_deref();
    master.begin_composite();
    // The committing write goes first so a refusal leaves nothing to roll back.
    if let Some(committing) = &params.committing_modification {
        if params.value_return_mode != ValueReturnMode::DirectOrProxy || params.value_replaced {
            if let Err(e) = master.try_apply(Arc::clone(committing)) {
                master.abort_composite();
                return Err(e);
            }
        }
    }
    if params.value_return_mode.may_alias() {
        if let Some(undo) = value_stack.to_composite_undo_modification(title) {
            master.push(undo);
        }
    }
    let merged = master.end_composite(title, params.fake);

    tracing::debug!(
        target: "rui.history",
        master = %master.name(),
        title = ?title,
        merged,
        "sub-modifications finalized"
    );
    Ok(if merged {
        Finalization::Merged
    } else {
        Finalization::Skipped
    })
}
