#![forbid(unsafe_code)]

//! Modification stack: linear undo/redo history with composite transactions.
//!
//! The stack keeps one list of undo records and a cursor. Entries below the
//! cursor are undoable, entries at or above it are redoable. Undoing applies
//! the entry below the cursor and stores its opposite in the same slot, so
//! the slot always holds the record for the *next* move across it.
//!
//! ```text
//! apply(m1), apply(m2), apply(m3)
//! ┌───────────────────────────────────────┐
//! │ entries: [u1, u2, u3]    cursor: 3    │
//! └───────────────────────────────────────┘
//!
//! undo()                      (u3 applied, replaced by its opposite r3)
//! ┌───────────────────────────────────────┐
//! │ entries: [u1, u2, r3]    cursor: 2    │
//! └───────────────────────────────────────┘
//!
//! push(u4)                    <-- new branch, truncates redo side
//! ┌───────────────────────────────────────┐
//! │ entries: [u1, u2, u4]    cursor: 3    │
//! └───────────────────────────────────────┘
//! ```
//!
//! # Invariants
//!
//! 1. `cursor <= entries.len()`.
//! 2. Null modifications are never recorded and never move the version.
//! 3. While a composite is open, pushes land in the innermost frame and the
//!    top-level cursor does not move.
//! 4. Listeners see one event per top-level operation, never one per
//!    sub-modification of a composite.
//! 5. The state version never decreases.
//!
//! # Failure Modes
//!
//! - **Contract violation**: undo/redo with nothing available, or while a
//!   composite is open, panics. The caller gates these with
//!   [`can_undo`](ModificationHistory::can_undo) /
//!   [`can_redo`](ModificationHistory::can_redo).
//! - **Apply failure**: the cursor still moves, the slot receives a
//!   [`SkippedModification`], and the error goes to the error handler.
//! - **Re-entrant listener**: listeners receive a [`StackEvent`] snapshot and
//!   must not call back into the stack (the stack is mutably borrowed while
//!   notifying).

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::Arc;

use super::config::HistoryConfig;
use super::modification::{
    CompositeModification, ModificationError, ModificationRef, ModificationResult,
    SkippedModification,
};

/// Shared, single-threaded handle to any history.
pub type SharedHistory = Rc<RefCell<dyn ModificationHistory>>;

/// Non-owning handle to a history.
pub type WeakHistory = Weak<RefCell<dyn ModificationHistory>>;

/// Callback receiving apply failures.
pub type ErrorHandler = Rc<dyn Fn(&ModificationError)>;

/// Make a [`WeakHistory`] out of a concretely typed shared history.
#[must_use]
pub fn downgrade_history<H: ModificationHistory + 'static>(history: &Rc<RefCell<H>>) -> WeakHistory {
    let shared: SharedHistory = history.clone();
    Rc::downgrade(&shared)
}

// ============================================================================
// Events
// ============================================================================

/// Identifier returned by listener registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

impl ListenerId {
    /// Get the raw ID value.
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

/// Kind of top-level operation a listener is told about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StackEventKind {
    Pushed,
    Undone,
    Redone,
    Invalidated,
    Forgotten,
}

/// Snapshot of a stack right after a top-level operation.
#[derive(Debug, Clone, Copy)]
pub struct StackEvent<'a> {
    /// What happened.
    pub kind: StackEventKind,
    /// Name of the stack.
    pub stack: &'a str,
    /// Title of the entry involved, if any.
    pub title: Option<&'a str>,
    /// State version after the operation.
    pub state_version: u64,
    /// Number of undoable entries after the operation.
    pub undo_size: usize,
    /// Number of redoable entries after the operation.
    pub redo_size: usize,
}

/// Observer of a modification stack.
///
/// Callbacks run synchronously on the thread that changed the stack.
pub trait StackListener {
    fn on_push(&self, _event: &StackEvent<'_>) {}
    fn on_undo(&self, _event: &StackEvent<'_>) {}
    fn on_redo(&self, _event: &StackEvent<'_>) {}
    fn on_invalidate(&self, _event: &StackEvent<'_>) {}
    fn on_forget(&self, _event: &StackEvent<'_>) {}
}

/// A plain closure listens to every kind of event.
impl<F> StackListener for F
where
    F: Fn(&StackEvent<'_>),
{
    fn on_push(&self, event: &StackEvent<'_>) {
        self(event)
    }

    fn on_undo(&self, event: &StackEvent<'_>) {
        self(event)
    }

    fn on_redo(&self, event: &StackEvent<'_>) {
        self(event)
    }

    fn on_invalidate(&self, event: &StackEvent<'_>) {
        self(event)
    }

    fn on_forget(&self, event: &StackEvent<'_>) {
        self(event)
    }
}

// ============================================================================
// History contract
// ============================================================================

/// Operations shared by plain and slave modification stacks.
pub trait ModificationHistory {
    /// Name of the history (usually the title of the edited object).
    fn name(&self) -> &str;

    /// Configuration in effect.
    fn config(&self) -> &HistoryConfig;

    /// Record an undo record. Returns false for null modifications.
    fn push(&mut self, modification: ModificationRef) -> bool;

    /// Apply `modification` and record its opposite.
    ///
    /// Returns false if the modification is null or failed to apply (the
    /// failure goes to the error handler).
    fn apply(&mut self, modification: ModificationRef) -> bool;

    /// Like [`apply`](Self::apply), but hands a failure back to the caller
    /// instead of reporting it to the error handler.
    ///
    /// # Errors
    ///
    /// The error of the failed modification; nothing is recorded.
    fn try_apply(&mut self, modification: ModificationRef) -> ModificationResult<bool> {
        if modification.is_null() {
            return Ok(false);
        }
        let opposite = modification.apply_and_get_opposite()?;
        Ok(self.push(opposite))
    }

    /// Revert the entry below the cursor.
    ///
    /// # Panics
    ///
    /// If nothing is undoable or a composite is open.
    fn undo(&mut self);

    /// Reapply the entry above the cursor.
    ///
    /// # Panics
    ///
    /// If nothing is redoable or a composite is open.
    fn redo(&mut self);

    /// Undo every undoable entry.
    fn undo_all(&mut self) {
        while self.can_undo() {
            self.undo();
        }
    }

    /// Drop the history without undoing anything.
    fn forget(&mut self);

    /// Declare the recorded history inconsistent with the live state.
    fn invalidate(&mut self);

    /// Open a composite frame.
    fn begin_composite(&mut self);

    /// Close the innermost composite frame and record its content as one
    /// entry. Returns false (and records nothing) if the frame is empty.
    ///
    /// # Panics
    ///
    /// If no composite is open.
    fn end_composite(&mut self, title: Option<&str>, fake: bool) -> bool;

    /// Roll back and discard the innermost composite frame.
    ///
    /// # Panics
    ///
    /// If no composite is open.
    fn abort_composite(&mut self);

    /// Number of open composite frames.
    fn composite_depth(&self) -> usize;

    fn is_in_composite(&self) -> bool {
        self.composite_depth() > 0
    }

    fn can_undo(&self) -> bool {
        self.undo_size() > 0 && !self.is_in_composite()
    }

    fn can_redo(&self) -> bool {
        self.redo_size() > 0 && !self.is_in_composite()
    }

    fn undo_size(&self) -> usize;

    fn redo_size(&self) -> usize;

    /// Monotonic counter advanced by every state-changing operation.
    fn state_version(&self) -> u64;

    /// Whether the live state moved away from `version`.
    fn has_changed_since(&self, version: u64) -> bool {
        self.state_version() != version
    }

    /// Set by [`invalidate`](Self::invalidate), cleared by [`forget`](Self::forget).
    fn was_invalidated(&self) -> bool;

    /// Nothing recorded and not invalidated.
    fn is_null(&self) -> bool {
        self.undo_size() == 0 && self.redo_size() == 0 && !self.was_invalidated()
    }

    fn is_event_firing_enabled(&self) -> bool;

    fn set_event_firing_enabled(&mut self, enabled: bool);

    fn add_listener(&mut self, listener: Rc<dyn StackListener>) -> ListenerId;

    fn remove_listener(&mut self, id: ListenerId) -> bool;

    /// Run `action` inside a composite.
    ///
    /// `Ok(true)` closes the composite under `title`; `Ok(false)` and `Err`
    /// abort it (rolling back whatever was recorded). Frames the action
    /// opened and left open are aborted too.
    fn inside_composite<F, E>(&mut self, title: Option<&str>, fake: bool, action: F) -> Result<bool, E>
    where
        Self: Sized,
        F: FnOnce(&mut Self) -> Result<bool, E>,
    {
        self.begin_composite();
        let depth = self.composite_depth();
        let result = action(self);
        while self.composite_depth() > depth {
            tracing::warn!(
                target: "rui.history",
                stack = %self.name(),
                "composite action left a nested frame open; aborting it"
            );
            self.abort_composite();
        }
        match result {
            Ok(true) => {
                self.end_composite(title, fake);
                Ok(true)
            }
            Ok(false) => {
                self.abort_composite();
                Ok(false)
            }
            Err(e) => {
                self.abort_composite();
                Err(e)
            }
        }
    }
}

// ============================================================================
// ModificationStack
// ============================================================================

/// Buffer of an open composite transaction.
#[derive(Default)]
struct CompositeFrame {
    /// Undo records in push order.
    records: Vec<ModificationRef>,
}

/// Undo/redo history of one editable scope.
pub struct ModificationStack {
    name: String,
    /// Undo records below the cursor, redo records at or above it.
    entries: Vec<ModificationRef>,
    cursor: usize,
    /// Open composite frames, innermost last.
    frames: Vec<CompositeFrame>,
    state_version: u64,
    invalidated: bool,
    event_firing: bool,
    listeners: Vec<(ListenerId, Rc<dyn StackListener>)>,
    next_listener_id: u64,
    error_handler: Option<ErrorHandler>,
    config: HistoryConfig,
}

impl fmt::Debug for ModificationStack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModificationStack")
            .field("name", &self.name)
            .field("undo_size", &self.undo_size())
            .field("redo_size", &self.redo_size())
            .field("composite_depth", &self.frames.len())
            .field("state_version", &self.state_version)
            .field("invalidated", &self.invalidated)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl Default for ModificationStack {
    fn default() -> Self {
        Self::new("")
    }
}

impl ModificationStack {
    /// Create a stack with the default configuration.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_config(name, HistoryConfig::default())
    }

    /// Create a stack with the given configuration.
    #[must_use]
    pub fn with_config(name: impl Into<String>, config: HistoryConfig) -> Self {
        Self {
            name: name.into(),
            entries: Vec::new(),
            cursor: 0,
            frames: Vec::new(),
            state_version: 0,
            invalidated: false,
            event_firing: true,
            listeners: Vec::new(),
            next_listener_id: 0,
            error_handler: None,
            config,
        }
    }

    /// Wrap into a shared handle.
    #[must_use]
    pub fn shared(self) -> Rc<RefCell<Self>> {
        Rc::new(RefCell::new(self))
    }

    /// Install the callback receiving apply failures.
    pub fn set_error_handler(&mut self, handler: impl Fn(&ModificationError) + 'static) {
        self.error_handler = Some(Rc::new(handler));
    }

    // ========================================================================
    // Info
    // ========================================================================

    /// Titles of undoable entries (most recent first).
    pub fn undo_titles(&self, limit: usize) -> Vec<Option<&str>> {
        self.entries[..self.cursor]
            .iter()
            .rev()
            .take(limit)
            .map(|m| m.title())
            .collect()
    }

    /// Titles of redoable entries (next redo first).
    pub fn redo_titles(&self, limit: usize) -> Vec<Option<&str>> {
        self.entries[self.cursor..]
            .iter()
            .take(limit)
            .map(|m| m.title())
            .collect()
    }

    /// Title of the entry the next undo would revert.
    #[must_use]
    pub fn next_undo_title(&self) -> Option<&str> {
        self.cursor
            .checked_sub(1)
            .and_then(|i| self.entries[i].title())
    }

    /// Title of the entry the next redo would reapply.
    #[must_use]
    pub fn next_redo_title(&self) -> Option<&str> {
        self.entries.get(self.cursor).and_then(|m| m.title())
    }

    /// Undoable entries folded into one composite whose application reverts
    /// them all, most recent first. `None` if nothing is undoable.
    #[must_use]
    pub fn to_composite_undo_modification(&self, title: Option<&str>) -> Option<ModificationRef> {
        if self.cursor == 0 {
            return None;
        }
        let records = self.entries[..self.cursor].to_vec();
        let fake = records.iter().all(|m| m.is_fake());
        Some(Arc::new(CompositeModification::from_undo_records(
            title.map(str::to_string),
            records,
            fake,
        )))
    }

    /// Close the innermost composite and return the entry it recorded.
    ///
    /// # Panics
    ///
    /// If no composite is open.
    pub fn end_composite_entry(&mut self, title: Option<&str>, fake: bool) -> Option<ModificationRef> {
        let Some(frame) = self.frames.pop() else {
            panic!("end_composite() without begin_composite() on '{}'", self.name);
        };
        if frame.records.is_empty() {
            tracing::trace!(
                target: "rui.history",
                stack = %self.name,
                title = ?title,
                "empty composite discarded"
            );
            return None;
        }
        let composite: ModificationRef = Arc::new(CompositeModification::from_undo_records(
            title.map(str::to_string),
            frame.records,
            fake,
        ));
        self.push(Arc::clone(&composite)).then_some(composite)
    }

    /// Drop the most recent undo record without applying it.
    ///
    /// Used when the edit it describes was reverted by other means.
    pub(crate) fn discard_last_undo(&mut self) -> Option<ModificationRef> {
        self.assert_top_level("discard_last_undo");
        let index = self.cursor.checked_sub(1)?;
        let record = self.entries.remove(index);
        self.cursor = index;
        self.bump_version(record.is_fake());
        tracing::trace!(
            target: "rui.history",
            stack = %self.name,
            title = ?record.title(),
            "undo record discarded"
        );
        Some(record)
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn record(&mut self, modification: ModificationRef) {
        self.entries.truncate(self.cursor);
        self.bump_version(modification.is_fake());
        self.entries.push(modification);
        self.cursor += 1;
        self.enforce_depth();
    }

    fn enforce_depth(&mut self) {
        if self.cursor > self.config.max_depth {
            let excess = self.cursor - self.config.max_depth;
            self.entries.drain(..excess);
            self.cursor -= excess;
        }
    }

    fn bump_version(&mut self, fake: bool) {
        if !fake || self.config.fake_bumps_version {
            self.state_version += 1;
        }
    }

    /// Apply `entry`, substituting a placeholder when it fails.
    fn apply_entry(&self, entry: ModificationRef, operation: &'static str) -> ModificationRef {
        match entry.apply_and_get_opposite() {
            Ok(opposite) => opposite,
            Err(e) => {
                tracing::warn!(
                    target: "rui.history",
                    stack = %self.name,
                    operation,
                    title = ?entry.title(),
                    error = %e,
                    "modification failed to apply"
                );
                self.report(&e);
                Arc::new(SkippedModification::new(entry))
            }
        }
    }

    pub(crate) fn report(&self, error: &ModificationError) {
        if let Some(handler) = &self.error_handler {
            handler(error);
        }
    }

    fn fire(&self, kind: StackEventKind, title: Option<&str>) {
        tracing::debug!(
            target: "rui.history",
            stack = %self.name,
            event = ?kind,
            title = ?title,
            state_version = self.state_version,
            undo_size = self.undo_size(),
            redo_size = self.redo_size(),
            "modification stack changed"
        );
        if !self.event_firing {
            return;
        }
        let event = StackEvent {
            kind,
            stack: &self.name,
            title,
            state_version: self.state_version,
            undo_size: self.undo_size(),
            redo_size: self.redo_size(),
        };
        for (_, listener) in &self.listeners {
            match kind {
                StackEventKind::Pushed => listener.on_push(&event),
                StackEventKind::Undone => listener.on_undo(&event),
                StackEventKind::Redone => listener.on_redo(&event),
                StackEventKind::Invalidated => listener.on_invalidate(&event),
                StackEventKind::Forgotten => listener.on_forget(&event),
            }
        }
    }

    fn assert_top_level(&self, operation: &str) {
        assert!(
            self.frames.is_empty(),
            "{operation}() while a composite is open on '{}'",
            self.name
        );
    }
}

impl ModificationHistory for ModificationStack {
    fn name(&self) -> &str {
        &self.name
    }

    fn config(&self) -> &HistoryConfig {
        &self.config
    }

    fn push(&mut self, modification: ModificationRef) -> bool {
        if modification.is_null() {
            return false;
        }
        if let Some(frame) = self.frames.last_mut() {
            frame.records.push(modification);
            return true;
        }
        let title = modification.title().map(str::to_string);
        self.record(modification);
        self.fire(StackEventKind::Pushed, title.as_deref());
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
                    stack = %self.name,
                    title = ?modification.title(),
                    error = %e,
                    "modification failed to apply"
                );
                self.report(&e);
                false
            }
        }
    }

    fn undo(&mut self) {
        self.assert_top_level("undo");
        assert!(self.cursor > 0, "undo() with nothing to undo on '{}'", self.name);
        let index = self.cursor - 1;
        let entry = Arc::clone(&self.entries[index]);
        let fake = entry.is_fake();
        let opposite = self.apply_entry(entry, "undo");
        self.entries[index] = opposite;
        self.cursor = index;
        self.bump_version(fake);
        let title = self.entries[index].title().map(str::to_string);
        self.fire(StackEventKind::Undone, title.as_deref());
    }

    fn redo(&mut self) {
        self.assert_top_level("redo");
        assert!(
            self.cursor < self.entries.len(),
            "redo() with nothing to redo on '{}'",
            self.name
        );
        let index = self.cursor;
        let entry = Arc::clone(&self.entries[index]);
        let fake = entry.is_fake();
        let opposite = self.apply_entry(entry, "redo");
        self.entries[index] = opposite;
        self.cursor = index + 1;
        self.bump_version(fake);
        let title = self.entries[index].title().map(str::to_string);
        self.fire(StackEventKind::Redone, title.as_deref());
    }

    fn forget(&mut self) {
        self.entries.clear();
        self.cursor = 0;
        self.invalidated = false;
        self.fire(StackEventKind::Forgotten, None);
    }

    fn invalidate(&mut self) {
        self.entries.clear();
        self.cursor = 0;
        self.invalidated = true;
        self.state_version += 1;
        self.fire(StackEventKind::Invalidated, None);
    }

    fn begin_composite(&mut self) {
        self.frames.push(CompositeFrame::default());
    }

    fn end_composite(&mut self, title: Option<&str>, fake: bool) -> bool {
        self.end_composite_entry(title, fake).is_some()
    }

    fn abort_composite(&mut self) {
        let Some(frame) = self.frames.pop() else {
            panic!("abort_composite() without begin_composite() on '{}'", self.name);
        };
        tracing::debug!(
            target: "rui.history",
            stack = %self.name,
            records = frame.records.len(),
            "composite aborted; rolling back"
        );
        for record in frame.records.into_iter().rev() {
            if let Err(e) = record.apply_and_get_opposite() {
                tracing::warn!(
                    target: "rui.history",
                    stack = %self.name,
                    title = ?record.title(),
                    error = %e,
                    "composite rollback step failed"
                );
                self.report(&e);
            }
        }
    }

    fn composite_depth(&self) -> usize {
        self.frames.len()
    }

    fn undo_size(&self) -> usize {
        self.cursor
    }

    fn redo_size(&self) -> usize {
        self.entries.len() - self.cursor
    }

    fn state_version(&self) -> u64 {
        self.state_version
    }

    fn was_invalidated(&self) -> bool {
        self.invalidated
    }

    fn is_event_firing_enabled(&self) -> bool {
        self.event_firing
    }

    fn set_event_firing_enabled(&mut self, enabled: bool) {
        self.event_firing = enabled;
    }

    fn add_listener(&mut self, listener: Rc<dyn StackListener>) -> ListenerId {
        let id = ListenerId(self.next_listener_id);
        self.next_listener_id += 1;
        self.listeners.push((id, listener));
        id
    }

    fn remove_listener(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(lid, _)| *lid != id);
        self.listeners.len() != before
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::history::modification::tests::{Slot, set_value};
    use crate::history::modification::{Modification, NullModification};
    use std::cell::Cell;

    /// Listener counting events per kind.
    #[derive(Default)]
    pub(crate) struct CountingListener {
        pub(crate) events: RefCell<Vec<(StackEventKind, Option<String>, u64)>>,
    }

    impl CountingListener {
        pub(crate) fn kinds(&self) -> Vec<StackEventKind> {
            self.events.borrow().iter().map(|(k, _, _)| *k).collect()
        }

        fn record(&self, event: &StackEvent<'_>) {
            self.events.borrow_mut().push((
                event.kind,
                event.title.map(str::to_string),
                event.state_version,
            ));
        }
    }

    impl StackListener for CountingListener {
        fn on_push(&self, event: &StackEvent<'_>) {
            self.record(event);
        }
        fn on_undo(&self, event: &StackEvent<'_>) {
            self.record(event);
        }
        fn on_redo(&self, event: &StackEvent<'_>) {
            self.record(event);
        }
        fn on_invalidate(&self, event: &StackEvent<'_>) {
            self.record(event);
        }
        fn on_forget(&self, event: &StackEvent<'_>) {
            self.record(event);
        }
    }

    /// Fake modification that does nothing.
    struct Touch;

    impl Modification for Touch {
        fn apply_and_get_opposite(&self) -> ModificationResult<ModificationRef> {
            Ok(Arc::new(Touch))
        }
        fn title(&self) -> Option<&str> {
            Some("Refresh")
        }
        fn is_fake(&self) -> bool {
            true
        }
    }

    #[test]
    fn new_stack_is_null() {
        let stack = ModificationStack::new("Person");
        assert!(stack.is_null());
        assert!(!stack.can_undo());
        assert!(!stack.can_redo());
        assert_eq!(stack.state_version(), 0);
        assert_eq!(stack.name(), "Person");
    }

    #[test]
    fn apply_undo_redo_cycle() {
        let slot = Slot::new(0);
        let mut stack = ModificationStack::new("x");
        assert!(stack.apply(set_value(&slot, 1, "Set 1")));
        assert!(stack.apply(set_value(&slot, 2, "Set 2")));
        assert_eq!(slot.value(), 2);
        assert_eq!(stack.undo_size(), 2);
        assert_eq!(stack.state_version(), 2);

        stack.undo();
        assert_eq!(slot.value(), 1);
        stack.undo();
        assert_eq!(slot.value(), 0);
        assert_eq!(stack.redo_size(), 2);

        stack.redo();
        stack.redo();
        assert_eq!(slot.value(), 2);
        assert_eq!(stack.undo_size(), 2);
        assert_eq!(stack.state_version(), 6);
    }

    #[test]
    fn null_push_is_ignored() {
        let mut stack = ModificationStack::new("x");
        assert!(!stack.push(NullModification::shared()));
        assert!(!stack.apply(NullModification::shared()));
        assert_eq!(stack.state_version(), 0);
        assert!(stack.is_null());
    }

    #[test]
    fn push_truncates_redo() {
        let slot = Slot::new(0);
        let mut stack = ModificationStack::new("x");
        stack.apply(set_value(&slot, 1, "a"));
        stack.apply(set_value(&slot, 2, "b"));
        stack.undo();
        assert!(stack.can_redo());

        stack.apply(set_value(&slot, 3, "c"));
        assert!(!stack.can_redo());
        assert_eq!(stack.undo_titles(5), vec![Some("c"), Some("a")]);
    }

    #[test]
    #[should_panic(expected = "nothing to undo")]
    fn undo_on_empty_panics() {
        ModificationStack::new("x").undo();
    }

    #[test]
    #[should_panic(expected = "nothing to redo")]
    fn redo_on_empty_panics() {
        ModificationStack::new("x").redo();
    }

    #[test]
    #[should_panic(expected = "while a composite is open")]
    fn undo_inside_composite_panics() {
        let slot = Slot::new(0);
        let mut stack = ModificationStack::new("x");
        stack.apply(set_value(&slot, 1, "a"));
        stack.begin_composite();
        stack.undo();
    }

    #[test]
    #[should_panic(expected = "without begin_composite")]
    fn end_without_begin_panics() {
        ModificationStack::new("x").end_composite(None, false);
    }

    #[test]
    fn composite_is_invisible_until_closed() {
        let slot = Slot::new(0);
        let mut stack = ModificationStack::new("x");
        stack.begin_composite();
        stack.apply(set_value(&slot, 1, "a"));
        stack.apply(set_value(&slot, 2, "b"));
        assert_eq!(stack.undo_size(), 0);
        assert_eq!(stack.state_version(), 0);

        assert!(stack.end_composite(Some("Both"), false));
        assert_eq!(stack.undo_size(), 1);
        assert_eq!(stack.next_undo_title(), Some("Both"));

        stack.undo();
        assert_eq!(slot.value(), 0);
        stack.redo();
        assert_eq!(slot.value(), 2);
    }

    #[test]
    fn empty_composite_is_null_push() {
        let mut stack = ModificationStack::new("x");
        stack.begin_composite();
        assert!(!stack.end_composite(Some("Nothing"), false));
        assert_eq!(stack.state_version(), 0);
        assert!(stack.is_null());
    }

    #[test]
    fn nested_composites() {
        let slot = Slot::new(0);
        let mut stack = ModificationStack::new("x");
        stack.begin_composite();
        stack.apply(set_value(&slot, 1, "a"));
        stack.begin_composite();
        stack.apply(set_value(&slot, 2, "b"));
        stack.apply(set_value(&slot, 3, "c"));
        assert!(stack.end_composite(Some("inner"), false));
        assert_eq!(stack.composite_depth(), 1);
        assert!(stack.end_composite(Some("outer"), false));

        assert_eq!(stack.undo_size(), 1);
        stack.undo();
        assert_eq!(slot.value(), 0);
        stack.redo();
        assert_eq!(slot.value(), 3);
    }

    #[test]
    fn abort_composite_rolls_back() {
        let slot = Slot::new(0);
        let mut stack = ModificationStack::new("x");
        stack.begin_composite();
        stack.apply(set_value(&slot, 1, "a"));
        stack.apply(set_value(&slot, 2, "b"));
        stack.abort_composite();
        assert_eq!(slot.value(), 0);
        assert!(stack.is_null());
        assert!(!stack.is_in_composite());
    }

    #[test]
    fn inside_composite_commits_on_true() {
        let slot = Slot::new(0);
        let mut stack = ModificationStack::new("x");
        let result: Result<bool, ModificationError> =
            stack.inside_composite(Some("Scoped"), false, |s| {
                s.apply(set_value(&slot, 5, "five"));
                Ok(true)
            });
        assert_eq!(result, Ok(true));
        assert_eq!(stack.next_undo_title(), Some("Scoped"));
        assert_eq!(slot.value(), 5);
    }

    #[test]
    fn inside_composite_discards_on_error() {
        let slot = Slot::new(0);
        let mut stack = ModificationStack::new("x");
        let result = stack.inside_composite(Some("Scoped"), false, |s| {
            s.apply(set_value(&slot, 5, "five"));
            s.begin_composite();
            s.apply(set_value(&slot, 6, "six"));
            Err(ModificationError::Other("boom".into()))
        });
        assert!(result.is_err());
        assert_eq!(slot.value(), 0);
        assert!(!stack.is_in_composite());
        assert!(stack.is_null());
    }

    #[test]
    fn inside_composite_discards_on_false() {
        let slot = Slot::new(0);
        let mut stack = ModificationStack::new("x");
        let result: Result<bool, ModificationError> = stack.inside_composite(None, false, |s| {
            s.apply(set_value(&slot, 5, "five"));
            Ok(false)
        });
        assert_eq!(result, Ok(false));
        assert_eq!(slot.value(), 0);
    }

    #[test]
    fn listeners_see_one_event_per_composite() {
        let slot = Slot::new(0);
        let listener = Rc::new(CountingListener::default());
        let mut stack = ModificationStack::new("x");
        stack.add_listener(listener.clone());

        stack.begin_composite();
        stack.apply(set_value(&slot, 1, "a"));
        stack.apply(set_value(&slot, 2, "b"));
        stack.end_composite(Some("ab"), false);
        stack.undo();
        stack.redo();
        stack.invalidate();
        stack.forget();

        assert_eq!(
            listener.kinds(),
            vec![
                StackEventKind::Pushed,
                StackEventKind::Undone,
                StackEventKind::Redone,
                StackEventKind::Invalidated,
                StackEventKind::Forgotten,
            ]
        );
        let events = listener.events.borrow();
        assert_eq!(events[0].1.as_deref(), Some("ab"));
        assert_eq!(events[0].2, 1);
    }

    #[test]
    fn closure_listener_and_removal() {
        let count = Rc::new(Cell::new(0));
        let counter = count.clone();
        let mut stack = ModificationStack::new("x");
        let id = stack.add_listener(Rc::new(move |_: &StackEvent<'_>| counter.set(counter.get() + 1)));
        let slot = Slot::new(0);
        stack.apply(set_value(&slot, 1, "a"));
        assert_eq!(count.get(), 1);

        assert!(stack.remove_listener(id));
        assert!(!stack.remove_listener(id));
        stack.undo();
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn event_firing_can_be_disabled() {
        let listener = Rc::new(CountingListener::default());
        let mut stack = ModificationStack::new("x");
        stack.add_listener(listener.clone());
        stack.set_event_firing_enabled(false);
        let slot = Slot::new(0);
        stack.apply(set_value(&slot, 1, "a"));
        assert!(listener.kinds().is_empty());
        assert_eq!(stack.state_version(), 1);
    }

    #[test]
    fn forget_keeps_state_and_version() {
        let slot = Slot::new(0);
        let mut stack = ModificationStack::new("x");
        stack.apply(set_value(&slot, 1, "a"));
        let version = stack.state_version();
        stack.forget();
        assert!(stack.is_null());
        assert_eq!(slot.value(), 1);
        assert!(!stack.has_changed_since(version));
    }

    #[test]
    fn invalidate_clears_and_bumps() {
        let slot = Slot::new(0);
        let mut stack = ModificationStack::new("x");
        stack.apply(set_value(&slot, 1, "a"));
        stack.invalidate();
        assert!(stack.was_invalidated());
        assert!(!stack.is_null());
        assert!(!stack.can_undo());
        assert_eq!(stack.state_version(), 2);

        stack.forget();
        assert!(!stack.was_invalidated());
    }

    #[test]
    fn max_depth_evicts_oldest() {
        let slot = Slot::new(0);
        let mut stack = ModificationStack::with_config("x", HistoryConfig::new(3));
        for i in 1..=5 {
            stack.apply(set_value(&slot, i, &format!("set {i}")));
        }
        assert_eq!(stack.undo_size(), 3);
        stack.undo_all();
        assert_eq!(slot.value(), 2);
    }

    #[test]
    fn fake_modifications_do_not_bump_version() {
        let mut stack = ModificationStack::new("x");
        assert!(stack.push(Arc::new(Touch)));
        assert_eq!(stack.state_version(), 0);
        stack.undo();
        assert_eq!(stack.state_version(), 0);

        let mut bumping =
            ModificationStack::with_config("y", HistoryConfig::default().with_fake_bumps_version(true));
        bumping.push(Arc::new(Touch));
        assert_eq!(bumping.state_version(), 1);
    }

    #[test]
    fn failed_undo_moves_cursor_and_reports() {
        let slot = Slot::new(0);
        let errors = Rc::new(RefCell::new(Vec::new()));
        let sink = errors.clone();
        let mut stack = ModificationStack::new("x");
        stack.set_error_handler(move |e| sink.borrow_mut().push(e.clone()));

        stack.apply(set_value(&slot, 1, "a"));
        slot.reject(0);
        stack.undo();
        assert_eq!(errors.borrow().len(), 1);
        assert_eq!(slot.value(), 1);
        assert_eq!(stack.undo_size(), 0);
        assert_eq!(stack.redo_size(), 1);
        assert_eq!(stack.state_version(), 2);

        // Redo re-aligns without touching the value; undo is available again.
        stack.redo();
        assert_eq!(slot.value(), 1);
        assert!(stack.can_undo());
        assert_eq!(stack.next_undo_title(), Some("a"));
    }

    #[test]
    fn failed_apply_records_nothing() {
        let slot = Slot::new(0);
        slot.reject(7);
        let mut stack = ModificationStack::new("x");
        assert!(!stack.apply(set_value(&slot, 7, "seven")));
        assert!(stack.is_null());
    }

    #[test]
    fn to_composite_undo_modification_reverts_all() {
        let slot = Slot::new(0);
        let mut stack = ModificationStack::new("x");
        assert!(stack.to_composite_undo_modification(None).is_none());
        stack.apply(set_value(&slot, 1, "a"));
        stack.apply(set_value(&slot, 2, "b"));
        let composite = stack.to_composite_undo_modification(Some("all")).unwrap();
        assert_eq!(composite.title(), Some("all"));
        composite.apply_and_get_opposite().unwrap();
        assert_eq!(slot.value(), 0);
    }

    #[test]
    fn discard_last_undo_keeps_older_entries() {
        let slot = Slot::new(0);
        let mut stack = ModificationStack::new("x");
        assert!(stack.discard_last_undo().is_none());
        stack.apply(set_value(&slot, 1, "a"));
        stack.apply(set_value(&slot, 2, "b"));

        let dropped = stack.discard_last_undo().unwrap();
        assert_eq!(dropped.title(), Some("b"));
        assert_eq!(slot.value(), 2);
        assert_eq!(stack.undo_size(), 1);
        assert!(!stack.can_redo());
        assert_eq!(stack.state_version(), 3);

        stack.undo();
        assert_eq!(slot.value(), 0);
    }

    #[test]
    fn try_apply_hands_back_failure() {
        let slot = Slot::new(0);
        slot.reject(7);
        let errors = Rc::new(RefCell::new(Vec::new()));
        let sink = errors.clone();
        let mut stack = ModificationStack::new("x");
        stack.set_error_handler(move |e| sink.borrow_mut().push(e.clone()));

        assert!(stack.try_apply(set_value(&slot, 7, "seven")).is_err());
        assert!(errors.borrow().is_empty());
        assert!(stack.is_null());
        assert_eq!(stack.try_apply(set_value(&slot, 1, "one")), Ok(true));
        assert_eq!(stack.try_apply(NullModification::shared()), Ok(false));
    }

    #[test]
    fn titles() {
        let slot = Slot::new(0);
        let mut stack = ModificationStack::new("x");
        stack.apply(set_value(&slot, 1, "a"));
        stack.apply(set_value(&slot, 2, "b"));
        stack.undo();
        assert_eq!(stack.next_undo_title(), Some("a"));
        assert_eq!(stack.next_redo_title(), Some("b"));
        assert_eq!(stack.redo_titles(5), vec![Some("b")]);
    }

    #[test]
    fn debug_impl() {
        let stack = ModificationStack::new("Person");
        let debug = format!("{stack:?}");
        assert!(debug.contains("ModificationStack"));
        assert!(debug.contains("Person"));
    }
}
