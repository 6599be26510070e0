#![forbid(unsafe_code)]

//! Aliasing classification for values obtained through accessors.

#[cfg(feature = "history-config")]
use serde::{Deserialize, Serialize};

/// Whether a value returned by an accessor aliases its source's storage.
///
/// Variants are declared from the least to the most conservative; the
/// derived ordering is the one [`combine`](Self::combine) takes the maximum
/// of.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "history-config", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "history-config", serde(rename_all = "snake_case"))]
pub enum ValueReturnMode {
    /// The value is the source's storage (or a proxy to it): mutating it
    /// mutates the source.
    #[default]
    DirectOrProxy,
    /// Whether the value aliases the source cannot be determined.
    Indeterminate,
    /// The value is a detached copy or a computation result.
    Calculated,
}

impl ValueReturnMode {
    /// Mode of a value reached through `parent` and then `child`.
    ///
    /// A single detachment anywhere in the chain makes the whole chain
    /// detached; uncertainty dominates aliasing.
    #[must_use]
    pub fn combine(parent: Self, child: Self) -> Self {
        parent.max(child)
    }

    /// Mode of a whole accessor chain. An empty chain aliases trivially.
    #[must_use]
    pub fn combine_all(modes: impl IntoIterator<Item = Self>) -> Self {
        modes
            .into_iter()
            .fold(Self::DirectOrProxy, Self::combine)
    }

    /// True when in-place edits of the value reach the source.
    #[must_use]
    pub fn may_alias(self) -> bool {
        self != Self::Calculated
    }
}
