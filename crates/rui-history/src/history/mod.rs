#![forbid(unsafe_code)]

//! Hierarchical transactional undo/redo history.
//!
//! This module implements the command pattern for editable object graphs:
//!
//! - **Reversibility**: every [`Modification`] applies and hands back its opposite
//! - **Transactions**: composite frames turn several edits into one entry
//! - **Hierarchy**: a nested value's history merges into its owner's through
//!   [`SlaveModificationStack`]
//! - **Change tracking**: a monotonic state version tells persistence layers
//!   whether anything changed since a checkpoint
//!
//! # Architecture
//!
//! ```text
//!  control ──► Modification ──apply──► opposite ──push──► ModificationStack
//!                                                           │   ▲
//!                                                 listeners ◄┘   │ finalize
//!                                                                │
//!  nested control ──► ... ──push──► SlaveModificationStack ──────┘
//! ```
//!
//! # Quick Start
//!
//! ```ignore
//! use rui_history::history::{ModificationHistory, ModificationStack, ValueModification};
//!
//! let mut stack = ModificationStack::new("Person");
//! stack.apply(Arc::new(ValueModification::new(name_accessor, "Bob".to_string()).with_title("Set name")));
//! stack.undo();
//! ```
//!
//! # Threading
//!
//! A stack is owned by the thread that owns the edited object graph (it is
//! `!Send`). Modifications are `Send + Sync`, so slow work may build them
//! elsewhere, but pushing must happen on the owning thread.

pub mod config;
pub mod finalize;
pub mod list;
pub mod modification;
pub mod return_mode;
pub mod slave;
pub mod stack;
pub mod transaction;

// Re-export commonly used types
pub use config::{HistoryConfig, HistoryConfigError};
pub use finalize::{Finalization, SubModificationParams, compose_title, finalize_sub_modifications};
pub use list::{
    BufferedListModification, BufferedListModificationFactory, ListAccessor, ListEditor,
    ListModification, ListModificationFactory,
};
pub use modification::{
    CompositeModification, Modification, ModificationError, ModificationRef, ModificationResult,
    NullModification, SkippedModification, ValueAccessor, ValueModification,
};
pub use return_mode::ValueReturnMode;
pub use slave::{SlaveLink, SlaveModificationStack};
pub use stack::{
    ErrorHandler, ListenerId, ModificationHistory, ModificationStack, SharedHistory, StackEvent,
    StackEventKind, StackListener, WeakHistory, downgrade_history,
};
pub use transaction::ValueTransaction;
