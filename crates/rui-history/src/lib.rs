#![forbid(unsafe_code)]

//! rui-history
//!
//! Undo/redo engine for editors generated over arbitrary object graphs.
//!
//! # Key Components
//!
//! - [`Modification`] - Reversible unit of change ("apply and return the inverse")
//! - [`ModificationStack`] - Linear history with composite transactions and listeners
//! - [`ListModificationFactory`] - Whole-list edits for list controls
//! - [`SlaveModificationStack`] - Nested history merged into an owner's history
//! - [`ValueReturnMode`] - Aliasing classification driving how nested edits merge
//!
//! # Role
//! The engine knows nothing about fields or widgets. Values are reached
//! through [`ValueAccessor`] / [`ListAccessor`], and UIs observe stacks
//! through [`StackListener`].

pub mod history;

pub use history::{
    BufferedListModificationFactory, CompositeModification, HistoryConfig, ListAccessor,
    ListEditor, ListModificationFactory, Modification, ModificationError, ModificationHistory,
    ModificationRef, ModificationResult, ModificationStack, SlaveLink, SlaveModificationStack,
    StackEvent, StackEventKind, StackListener, ValueAccessor, ValueModification, ValueReturnMode,
    ValueTransaction,
};
