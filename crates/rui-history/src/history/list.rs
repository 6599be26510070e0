#![forbid(unsafe_code)]

//! Whole-list modifications for list-editing controls.
//!
//! Every list edit (insert, remove, replace, reorder, clear) is expressed as
//! "replace the whole contents". The inverse is then always "replace with
//! the previous contents", so no per-operation diff logic exists, at the
//! cost of O(n) storage per edit.
//!
//! Two flavours differ in *when* the previous contents are captured:
//!
//! | Type                          | Previous contents read   |
//! |-------------------------------|--------------------------|
//! | [`ListModification`]          | when the edit is created |
//! | [`BufferedListModification`]  | right before it applies  |
//!
//! The buffered flavour is for containers whose item positions are buffered
//! or rebuilt between the moment an edit is created and the moment its
//! inverse is needed (a sibling edit may have changed the list meanwhile).

use std::fmt;
use std::sync::Arc;

use super::modification::{Modification, ModificationError, ModificationRef, ModificationResult};

/// Read/replace access to an ordered collection owned by someone else.
pub trait ListAccessor<T>: Send + Sync {
    /// Current contents.
    fn read(&self) -> Vec<T>;

    /// Replace the contents wholesale.
    fn write(&self, contents: Vec<T>) -> ModificationResult<()>;

    fn can_add(&self) -> bool {
        true
    }

    fn can_remove(&self) -> bool {
        true
    }

    fn can_set(&self) -> bool {
        true
    }
}

// ============================================================================
// Modifications
// ============================================================================

/// Replace the contents of a list, remembering the contents seen at creation.
pub struct ListModification<T> {
    accessor: Arc<dyn ListAccessor<T>>,
    new_contents: Vec<T>,
    old_contents: Vec<T>,
    title: Option<String>,
}

impl<T: fmt::Debug> fmt::Debug for ListModification<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListModification")
            .field("new_contents", &self.new_contents)
            .field("old_contents", &self.old_contents)
            .field("title", &self.title)
            .finish()
    }
}

impl<T> ListModification<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Snapshot the current contents and target `new_contents`.
    #[must_use]
    pub fn new(accessor: Arc<dyn ListAccessor<T>>, new_contents: Vec<T>) -> Self {
        let old_contents = accessor.read();
        Self {
            accessor,
            new_contents,
            old_contents,
            title: None,
        }
    }

    /// Set the title.
    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    #[must_use]
    pub fn new_contents(&self) -> &[T] {
        &self.new_contents
    }

    #[must_use]
    pub fn old_contents(&self) -> &[T] {
        &self.old_contents
    }
}

impl<T> Modification for ListModification<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn apply_and_get_opposite(&self) -> ModificationResult<ModificationRef> {
        self.accessor.write(self.new_contents.clone())?;
        Ok(Arc::new(Self {
            accessor: Arc::clone(&self.accessor),
            new_contents: self.old_contents.clone(),
            old_contents: self.new_contents.clone(),
            title: self.title.clone(),
        }))
    }

    fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    fn debug_name(&self) -> &'static str {
        "ListModification"
    }
}

/// Replace the contents of a list; the inverse is built from the live
/// contents read at application time.
pub struct BufferedListModification<T> {
    accessor: Arc<dyn ListAccessor<T>>,
    new_contents: Vec<T>,
    title: Option<String>,
}

impl<T: fmt::Debug> fmt::Debug for BufferedListModification<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BufferedListModification")
            .field("new_contents", &self.new_contents)
            .field("title", &self.title)
            .finish()
    }
}

impl<T> BufferedListModification<T>
where
    T: Clone + Send + Sync + 'static,
{
    #[must_use]
    pub fn new(accessor: Arc<dyn ListAccessor<T>>, new_contents: Vec<T>) -> Self {
        Self {
            accessor,
            new_contents,
            title: None,
        }
    }

    /// Set the title.
    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    #[must_use]
    pub fn new_contents(&self) -> &[T] {
        &self.new_contents
    }
}

impl<T> Modification for BufferedListModification<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn apply_and_get_opposite(&self) -> ModificationResult<ModificationRef> {
        let live = self.accessor.read();
        self.accessor.write(self.new_contents.clone())?;
        Ok(Arc::new(Self {
            accessor: Arc::clone(&self.accessor),
            new_contents: live,
            title: self.title.clone(),
        }))
    }

    fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    fn debug_name(&self) -> &'static str {
        "BufferedListModification"
    }
}

// ============================================================================
// Factories
// ============================================================================

/// List edits expressed as whole-list replacements.
///
/// Implementors only decide which modification type carries the new
/// contents; the editing operations are shared.
pub trait ListEditor<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// The list being edited.
    fn accessor(&self) -> &Arc<dyn ListAccessor<T>>;

    /// Build a modification replacing the contents with `new_contents`.
    fn create_titled_list_modification(&self, new_contents: Vec<T>, title: &str) -> ModificationRef;

    fn create_list_modification(&self, new_contents: Vec<T>) -> ModificationRef {
        self.create_titled_list_modification(new_contents, "Edit list")
    }

    fn can_add(&self, index: usize) -> bool {
        self.accessor().can_add() && index <= self.accessor().read().len()
    }

    fn can_remove(&self, index: usize) -> bool {
        self.accessor().can_remove() && index < self.accessor().read().len()
    }

    fn can_set(&self, index: usize) -> bool {
        self.accessor().can_set() && index < self.accessor().read().len()
    }

    fn can_move(&self, index: usize, offset: isize) -> bool {
        let len = self.accessor().read().len();
        self.accessor().can_add()
            && self.accessor().can_remove()
            && index < len
            && index
                .checked_add_signed(offset)
                .is_some_and(|target| target < len)
    }

    /// Insert `item` at `index`.
    fn add(&self, index: usize, item: T) -> ModificationResult<ModificationRef> {
        if !self.accessor().can_add() {
            return Err(ModificationError::Unsupported { operation: "add" });
        }
        let mut contents = self.accessor().read();
        check_index(index, contents.len() + 1, contents.len())?;
        contents.insert(index, item);
        Ok(self.create_titled_list_modification(contents, "Add item"))
    }

    /// Remove the item at `index`.
    fn remove(&self, index: usize) -> ModificationResult<ModificationRef> {
        if !self.accessor().can_remove() {
            return Err(ModificationError::Unsupported { operation: "remove" });
        }
        let mut contents = self.accessor().read();
        check_index(index, contents.len(), contents.len())?;
        contents.remove(index);
        Ok(self.create_titled_list_modification(contents, "Remove item"))
    }

    /// Replace the item at `index`.
    fn set(&self, index: usize, item: T) -> ModificationResult<ModificationRef> {
        if !self.accessor().can_set() {
            return Err(ModificationError::Unsupported { operation: "set" });
        }
        let mut contents = self.accessor().read();
        check_index(index, contents.len(), contents.len())?;
        contents[index] = item;
        Ok(self.create_titled_list_modification(contents, "Edit item"))
    }

    /// Move the item at `index` by `offset` positions.
    fn move_item(&self, index: usize, offset: isize) -> ModificationResult<ModificationRef> {
        if !(self.accessor().can_add() && self.accessor().can_remove()) {
            return Err(ModificationError::Unsupported { operation: "move" });
        }
        let mut contents = self.accessor().read();
        let len = contents.len();
        check_index(index, len, len)?;
        let target = index
            .checked_add_signed(offset)
            .filter(|t| *t < len)
            .ok_or(ModificationError::IndexOutOfBounds {
                index: index.saturating_add_signed(offset),
                length: len,
            })?;
        let item = contents.remove(index);
        contents.insert(target, item);
        Ok(self.create_titled_list_modification(contents, "Move item"))
    }

    /// Remove every item.
    fn clear(&self) -> ModificationResult<ModificationRef> {
        if !self.accessor().can_remove() {
            return Err(ModificationError::Unsupported { operation: "clear" });
        }
        Ok(self.create_titled_list_modification(Vec::new(), "Clear"))
    }
}

fn check_index(index: usize, bound: usize, length: usize) -> ModificationResult<()> {
    if index < bound {
        Ok(())
    } else {
        Err(ModificationError::IndexOutOfBounds { index, length })
    }
}

/// Builds [`ListModification`]s for one list.
pub struct ListModificationFactory<T> {
    accessor: Arc<dyn ListAccessor<T>>,
}

impl<T> ListModificationFactory<T> {
    #[must_use]
    pub fn new(accessor: Arc<dyn ListAccessor<T>>) -> Self {
        Self { accessor }
    }
}

impl<T> ListEditor<T> for ListModificationFactory<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn accessor(&self) -> &Arc<dyn ListAccessor<T>> {
        &self.accessor
    }

    fn create_titled_list_modification(&self, new_contents: Vec<T>, title: &str) -> ModificationRef {
        Arc::new(ListModification::new(Arc::clone(&self.accessor), new_contents).with_title(title))
    }
}

/// Builds [`BufferedListModification`]s for one list.
pub struct BufferedListModificationFactory<T> {
    accessor: Arc<dyn ListAccessor<T>>,
}

impl<T> BufferedListModificationFactory<T> {
    #[must_use]
    pub fn new(accessor: Arc<dyn ListAccessor<T>>) -> Self {
        Self { accessor }
    }
}

impl<T> ListEditor<T> for BufferedListModificationFactory<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn accessor(&self) -> &Arc<dyn ListAccessor<T>> {
        &self.accessor
    }

    fn create_titled_list_modification(&self, new_contents: Vec<T>, title: &str) -> ModificationRef {
        Arc::new(BufferedListModification::new(Arc::clone(&self.accessor), new_contents).with_title(title))
    }
}
