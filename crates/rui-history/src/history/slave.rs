#![forbid(unsafe_code)]

//! Slave modification stacks.
//!
//! A [`SlaveModificationStack`] is the local history of a nested value (an
//! object held by a field of another object). It behaves like a
//! [`ModificationStack`] for local undo/redo, but every top-level push or
//! invalidation is also merged into the **master** history of the owning
//! object, through [`finalize_sub_modifications`]. Undoing on the master
//! therefore undoes nested edits too.
//!
//! ```text
//!   owner editor                     nested value editor
//! ┌──────────────────┐  forward   ┌─────────────────────────┐
//! │ master stack     │ ◄───────── │ SlaveModificationStack  │
//! │  "Edit person:   │   (weak)   │  base: ModificationStack│
//! │   Set name"      │            │  link: SlaveLink        │
//! └──────────────────┘            └─────────────────────────┘
//! ```
//!
//! The link to the master is a [`WeakHistory`]: the slave lives as long as
//! the edit session of its value and never keeps the master alive. When the
//! master is gone, local edits are kept and forwarding is skipped.
//!
//! Listener registration and the event-firing flag belong to the master, so
//! a UI only has to watch the root-most history to see every nested edit.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use super::config::HistoryConfig;
use super::finalize::{Finalization, SubModificationParams, compose_title, finalize_sub_modifications};
use super::modification::{ModificationError, ModificationRef};
use super::return_mode::ValueReturnMode;
use super::stack::{
    ErrorHandler, ListenerId, ModificationHistory, ModificationStack, SharedHistory, StackListener,
    WeakHistory,
};
use super::transaction::ValueTransaction;

type Getter<T> = Box<dyn Fn() -> T>;

/// How a slave merges into its master.
///
/// Policy inputs are getters evaluated at forwarding time, since they
/// usually depend on the live state of the editor (was the value replaced,
/// is the edit accepted, ...).
pub struct SlaveLink {
    master: WeakHistory,
    exclusive: bool,
    value_modif_accepted: Getter<bool>,
    value_return_mode: Getter<ValueReturnMode>,
    value_replaced: Getter<bool>,
    value_transaction: Getter<Option<Arc<dyn ValueTransaction>>>,
    committing_modification: Getter<Option<ModificationRef>>,
    title_prefix: Option<Getter<Option<String>>>,
    fake: Getter<bool>,
    exception_handler: Option<ErrorHandler>,
}

impl fmt::Debug for SlaveLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SlaveLink")
            .field("master_alive", &(self.master.strong_count() > 0))
            .field("exclusive", &self.exclusive)
            .field("has_title_prefix", &self.title_prefix.is_some())
            .field("has_exception_handler", &self.exception_handler.is_some())
            .finish()
    }
}

impl SlaveLink {
    /// Link to `master` with default policy: accepted, direct, not replaced,
    /// no transaction, no committing modification, not fake, titled by the
    /// master's name.
    #[must_use]
    pub fn new(master: WeakHistory) -> Self {
        Self {
            master,
            exclusive: false,
            value_modif_accepted: Box::new(|| true),
            value_return_mode: Box::new(|| ValueReturnMode::DirectOrProxy),
            value_replaced: Box::new(|| false),
            value_transaction: Box::new(|| None),
            committing_modification: Box::new(|| None),
            title_prefix: None,
            fake: Box::new(|| false),
            exception_handler: None,
        }
    }

    /// A `forget()` on the slave forgets the master too.
    #[must_use]
    pub fn exclusive(mut self, exclusive: bool) -> Self {
        self.exclusive = exclusive;
        self
    }

    pub fn with_value_modif_accepted<F>(mut self, f: F) -> Self
    where
        F: Fn() -> bool + 'static,
    {
        self.value_modif_accepted = Box::new(f);
        self
    }

    pub fn with_value_return_mode<F>(mut self, f: F) -> Self
    where
        F: Fn() -> ValueReturnMode + 'static,
    {
        self.value_return_mode = Box::new(f);
        self
    }

    pub fn with_value_replaced<F>(mut self, f: F) -> Self
    where
        F: Fn() -> bool + 'static,
    {
        self.value_replaced = Box::new(f);
        self
    }

    pub fn with_value_transaction<F>(mut self, f: F) -> Self
    where
        F: Fn() -> Option<Arc<dyn ValueTransaction>> + 'static,
    {
        self.value_transaction = Box::new(f);
        self
    }

    /// Modification storing the edited value back into its owner.
    pub fn with_committing_modification<F>(mut self, f: F) -> Self
    where
        F: Fn() -> Option<ModificationRef> + 'static,
    {
        self.committing_modification = Box::new(f);
        self
    }

    /// Prefix of master-level titles. Defaults to the master's name.
    pub fn with_title_prefix<F>(mut self, f: F) -> Self
    where
        F: Fn() -> Option<String> + 'static,
    {
        self.title_prefix = Some(Box::new(f));
        self
    }

    pub fn with_fake<F>(mut self, f: F) -> Self
    where
        F: Fn() -> bool + 'static,
    {
        self.fake = Box::new(f);
        self
    }

    /// Receives failures to merge into the master.
    pub fn with_exception_handler<F>(mut self, f: F) -> Self
    where
        F: Fn(&ModificationError) + 'static,
    {
        self.exception_handler = Some(Rc::new(f));
        self
    }

    #[must_use]
    pub fn is_exclusive(&self) -> bool {
        self.exclusive
    }

    /// The master, if still alive.
    #[must_use]
    pub fn master(&self) -> Option<SharedHistory> {
        self.master.upgrade()
    }
}

/// Local history of a nested value, merged into its owner's history.
pub struct SlaveModificationStack {
    base: ModificationStack,
    link: SlaveLink,
}

impl fmt::Debug for SlaveModificationStack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SlaveModificationStack")
            .field("base", &self.base)
            .field("link", &self.link)
            .finish()
    }
}

impl SlaveModificationStack {
    #[must_use]
    pub fn new(name: impl Into<String>, link: SlaveLink) -> Self {
        Self::with_config(name, HistoryConfig::default(), link)
    }

    #[must_use]
    pub fn with_config(name: impl Into<String>, config: HistoryConfig, link: SlaveLink) -> Self {
        Self {
            base: ModificationStack::with_config(name, config),
            link,
        }
    }

    /// Wrap into a shared handle.
    #[must_use]
    pub fn shared(self) -> Rc<RefCell<Self>> {
        Rc::new(RefCell::new(self))
    }

    /// The local history.
    #[must_use]
    pub fn base(&self) -> &ModificationStack {
        &self.base
    }

    #[must_use]
    pub fn link(&self) -> &SlaveLink {
        &self.link
    }

    /// Install the callback receiving local apply failures.
    pub fn set_error_handler(&mut self, handler: impl Fn(&ModificationError) + 'static) {
        self.base.set_error_handler(handler);
    }

    fn fresh_value_stack(&self) -> ModificationStack {
        ModificationStack::with_config(self.base.name(), self.base.config().clone())
    }

    /// Merge a one-entry value stack into the master.
    fn forward(&mut self, mut value_stack: ModificationStack, entry_title: Option<&str>) {
        let Some(master) = self.link.master() else {
            tracing::debug!(
                target: "rui.history",
                stack = %self.base.name(),
                "master dropped; slave edit kept locally"
            );
            return;
        };

        // Getters may look at the master; evaluate them before borrowing it mutably.
        let explicit_prefix = self.link.title_prefix.as_ref().map(|prefix| prefix());
        let mut params = SubModificationParams {
            value_modif_accepted: (self.link.value_modif_accepted)(),
            value_return_mode: (self.link.value_return_mode)(),
            value_replaced: (self.link.value_replaced)(),
            value_transaction: (self.link.value_transaction)(),
            committing_modification: (self.link.committing_modification)(),
            title: None,
            fake: (self.link.fake)(),
        };

        let outcome = match master.try_borrow_mut() {
            Ok(mut master) => {
                let prefix = explicit_prefix.unwrap_or_else(|| {
                    Some(master.name().to_string()).filter(|name| !name.is_empty())
                });
                params.title = compose_title(
                    prefix.as_deref(),
                    entry_title,
                    &self.base.config().title_separator,
                );
                finalize_sub_modifications(&mut *master, &mut value_stack, &params)
            }
            Err(_) => Err(ModificationError::MasterUnavailable),
        };
        match outcome {
            Ok(Finalization::RolledBack) => {
                // The rejected entry was reverted; earlier accepted ones stay.
                self.base.discard_last_undo();
            }
            Ok(_) => {}
            Err(e) => self.report_master_failure(&e),
        }
    }

    fn forward_entry(&mut self, entry: ModificationRef) {
        let title = entry.title().map(str::to_string);
        let mut value_stack = self.fresh_value_stack();
        value_stack.push(entry);
        self.forward(value_stack, title.as_deref());
    }

    fn forward_invalidation(&mut self) {
        let mut value_stack = self.fresh_value_stack();
        value_stack.invalidate();
        self.forward(value_stack, None);
    }

    fn with_master<R>(&self, f: impl FnOnce(&mut dyn ModificationHistory) -> R) -> Option<R> {
        let master = self.link.master()?;
        match master.try_borrow_mut() {
            Ok(mut master) => Some(f(&mut *master)),
            Err(_) => {
                self.report_master_failure(&ModificationError::MasterUnavailable);
                None
            }
        }
    }

    fn report_master_failure(&self, error: &ModificationError) {
        tracing::warn!(
            target: "rui.history",
            stack = %self.base.name(),
            error = %error,
            "failed to merge slave history into master"
        );
        if let Some(handler) = &self.link.exception_handler {
            handler(error);
        }
    }
}

impl ModificationHistory for SlaveModificationStack {
    fn name(&self) -> &str {
        self.base.name()
    }

    fn config(&self) -> &HistoryConfig {
        self.base.config()
    }

    fn push(&mut self, modification: ModificationRef) -> bool {
        if !self.base.push(Arc::clone(&modification)) {
            return false;
        }
        if self.base.is_in_composite() {
            return true;
        }
        self.forward_entry(modification);
        true
    }

    fn apply(&mut self, modification: ModificationRef) -> bool {
        if modification.is_null() {
            return false;
        }
        match modification.apply_and_get_opposite() {
            Ok(opposite) => self.push(opposite),
            Err(e) => {
                tracing::warn!(
                    target: "rui.history",
                    stack = %self.base.name(),
                    title = ?modification.title(),
                    error = %e,
                    "modification failed to apply"
                );
                self.base.report(&e);
                false
            }
        }
    }

    fn undo(&mut self) {
        self.base.undo();
        self.with_master(|m| m.invalidate());
    }

    fn redo(&mut self) {
        self.base.redo();
        self.with_master(|m| m.invalidate());
    }

    fn forget(&mut self) {
        self.base.forget();
        if self.link.exclusive {
            self.with_master(|m| m.forget());
        } else {
            self.forward_invalidation();
        }
    }

    fn invalidate(&mut self) {
        self.base.invalidate();
        self.forward_invalidation();
    }

    fn begin_composite(&mut self) {
        self.base.begin_composite();
    }

    fn end_composite(&mut self, title: Option<&str>, fake: bool) -> bool {
        let Some(entry) = self.base.end_composite_entry(title, fake) else {
            return false;
        };
        if !self.base.is_in_composite() {
            self.forward_entry(entry);
        }
        true
    }

    fn abort_composite(&mut self) {
        self.base.abort_composite();
    }

    fn composite_depth(&self) -> usize {
        self.base.composite_depth()
    }

    fn undo_size(&self) -> usize {
        self.base.undo_size()
    }

    fn redo_size(&self) -> usize {
        self.base.redo_size()
    }

    fn state_version(&self) -> u64 {
        self.base.state_version()
    }

    fn was_invalidated(&self) -> bool {
        self.base.was_invalidated()
    }

    fn is_event_firing_enabled(&self) -> bool {
        match self.link.master() {
            Some(master) => master
                .try_borrow()
                .map(|m| m.is_event_firing_enabled())
                .unwrap_or(true),
            None => self.base.is_event_firing_enabled(),
        }
    }

    fn set_event_firing_enabled(&mut self, enabled: bool) {
        if self.link.master().is_some() {
            self.with_master(|m| m.set_event_firing_enabled(enabled));
        } else {
            self.base.set_event_firing_enabled(enabled);
        }
    }

    fn add_listener(&mut self, listener: Rc<dyn StackListener>) -> ListenerId {
        if self.link.master().is_some() {
            let forwarded = Rc::clone(&listener);
            if let Some(id) = self.with_master(move |m| m.add_listener(forwarded)) {
                return id;
            }
        }
        self.base.add_listener(listener)
    }

    fn remove_listener(&mut self, id: ListenerId) -> bool {
        if self.link.master().is_some() {
            if let Some(removed) = self.with_master(|m| m.remove_listener(id)) {
                return removed;
            }
        }
        self.base.remove_listener(id)
    }
}
