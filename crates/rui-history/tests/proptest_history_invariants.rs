#![forbid(unsafe_code)]

//! Property tests for modification stack invariants.
//!
//! Validates:
//! - Applying a modification and then its opposite restores the prior value.
//! - n undos followed by n redos reproduce the final state, cursor at n.
//! - Null pushes never move the version and never appear in the history.
//! - Pushes inside an open composite are invisible until it closes.
//! - The state version never decreases.
//! - `ValueReturnMode::combine` laws.

use proptest::prelude::*;
use std::sync::{Arc, Mutex};

use rui_history::history::{
    Modification, ModificationHistory, ModificationResult, ModificationStack, NullModification,
    ValueAccessor, ValueModification, ValueReturnMode,
};
use rui_history::{HistoryConfig, ModificationRef};

// ============================================================================
// Fixtures
// ============================================================================

#[derive(Default)]
struct Cell {
    value: Mutex<i64>,
}

impl Cell {
    fn get_value(&self) -> i64 {
        *self.value.lock().unwrap()
    }
}

impl ValueAccessor<i64> for Cell {
    fn get(&self) -> i64 {
        self.get_value()
    }

    fn set(&self, value: i64) -> ModificationResult<()> {
        *self.value.lock().unwrap() = value;
        Ok(())
    }
}

fn set(cell: &Arc<Cell>, value: i64) -> ModificationRef {
    Arc::new(ValueModification::new(cell.clone() as Arc<dyn ValueAccessor<i64>>, value).with_title("Set"))
}

#[derive(Debug, Clone)]
enum Op {
    Apply(i64),
    Null,
    Undo,
    Redo,
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => any::<i64>().prop_map(Op::Apply),
        1 => Just(Op::Null),
        2 => Just(Op::Undo),
        2 => Just(Op::Redo),
    ]
}

fn mode_strategy() -> impl Strategy<Value = ValueReturnMode> {
    prop_oneof![
        Just(ValueReturnMode::DirectOrProxy),
        Just(ValueReturnMode::Indeterminate),
        Just(ValueReturnMode::Calculated),
    ]
}

// ============================================================================
// Round trips
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn apply_then_opposite_restores(start in any::<i64>(), target in any::<i64>()) {
        let cell = Arc::new(Cell::default());
        cell.set(start).unwrap();
        let opposite = set(&cell, target).apply_and_get_opposite().unwrap();
        prop_assert_eq!(cell.get_value(), target);
        opposite.apply_and_get_opposite().unwrap();
        prop_assert_eq!(cell.get_value(), start);
    }

    #[test]
    fn undo_all_then_redo_all_round_trip(values in prop::collection::vec(any::<i64>(), 1..40)) {
        let cell = Arc::new(Cell::default());
        let mut stack = ModificationStack::with_config("cell", HistoryConfig::unlimited());
        for v in &values {
            stack.apply(set(&cell, *v));
        }
        let n = values.len();

        for _ in 0..n {
            stack.undo();
        }
        prop_assert_eq!(cell.get_value(), 0);
        prop_assert!(!stack.can_undo());

        for _ in 0..n {
            stack.redo();
        }
        prop_assert_eq!(cell.get_value(), *values.last().unwrap());
        prop_assert_eq!(stack.undo_size(), n);
        prop_assert!(!stack.can_redo());
    }
}

// ============================================================================
// Version and null pushes
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn version_monotonic_and_null_pushes_invisible(ops in prop::collection::vec(op_strategy(), 1..80)) {
        let cell = Arc::new(Cell::default());
        let mut stack = ModificationStack::with_config("cell", HistoryConfig::unlimited());
        let mut last_version = stack.state_version();

        for op in &ops {
            let before = (stack.undo_size(), stack.redo_size(), stack.state_version());
            match op {
                Op::Apply(v) => { stack.apply(set(&cell, *v)); }
                Op::Null => {
                    prop_assert!(!stack.push(NullModification::shared()));
                    prop_assert_eq!(before, (stack.undo_size(), stack.redo_size(), stack.state_version()));
                }
                Op::Undo => if stack.can_undo() { stack.undo(); },
                Op::Redo => if stack.can_redo() { stack.redo(); },
            }
            prop_assert!(stack.state_version() >= last_version);
            last_version = stack.state_version();
        }
    }

    #[test]
    fn composite_pushes_invisible_until_closed(values in prop::collection::vec(any::<i64>(), 0..20)) {
        let cell = Arc::new(Cell::default());
        let mut stack = ModificationStack::new("cell");
        stack.begin_composite();
        for v in &values {
            stack.apply(set(&cell, *v));
            prop_assert_eq!(stack.undo_size(), 0);
            prop_assert_eq!(stack.state_version(), 0);
        }
        let recorded = stack.end_composite(Some("batch"), false);
        prop_assert_eq!(recorded, !values.is_empty());
        prop_assert_eq!(stack.undo_size(), usize::from(recorded));

        if recorded {
            stack.undo();
            prop_assert_eq!(cell.get_value(), 0);
        }
    }
}

// ============================================================================
// Return mode combination
// ============================================================================

proptest! {
    #[test]
    fn combine_laws(a in mode_strategy(), b in mode_strategy(), c in mode_strategy()) {
        prop_assert_eq!(ValueReturnMode::combine(a, b), ValueReturnMode::combine(b, a));
        prop_assert_eq!(
            ValueReturnMode::combine(ValueReturnMode::combine(a, b), c),
            ValueReturnMode::combine(a, ValueReturnMode::combine(b, c))
        );
        prop_assert_eq!(ValueReturnMode::combine(a, ValueReturnMode::Calculated), ValueReturnMode::Calculated);
        prop_assert_eq!(ValueReturnMode::combine(a, ValueReturnMode::DirectOrProxy), a);
    }
}
