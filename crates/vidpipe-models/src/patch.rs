//! Discriminated update descriptors.
//!
//! Partial updates distinguish "leave the column alone" from "set it to
//! NULL"; an `Option` alone cannot express both.

use serde::{Deserialize, Serialize};

/// A single-field update instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "op", content = "value")]
pub enum Patch<T> {
    /// Leave the stored value untouched
    #[default]
    Keep,
    /// Overwrite with a new value
    Set(T),
    /// Clear to NULL
    Clear,
}

impl<T> Patch<T> {
    pub fn is_keep(&self) -> bool {
        matches!(self, Patch::Keep)
    }

    /// Resolve against the current value.
    pub fn apply(self, current: Option<T>) -> Option<T> {
        match self {
            Patch::Keep => current,
            Patch::Set(v) => Some(v),
            Patch::Clear => None,
        }
    }

    pub fn as_ref(&self) -> Patch<&T> {
        match self {
            Patch::Keep => Patch::Keep,
            Patch::Set(v) => Patch::Set(v),
            Patch::Clear => Patch::Clear,
        }
    }
}

impl<T> From<Option<T>> for Patch<T> {
    /// `Some` sets, `None` clears. For "keep", construct `Patch::Keep`
    /// explicitly.
    fn from(opt: Option<T>) -> Self {
        match opt {
            Some(v) => Patch::Set(v),
            None => Patch::Clear,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply() {
        assert_eq!(Patch::Keep.apply(Some(1)), Some(1));
        assert_eq!(Patch::Set(2).apply(Some(1)), Some(2));
        assert_eq!(Patch::<i32>::Clear.apply(Some(1)), None);
        assert_eq!(Patch::<i32>::Keep.apply(None), None);
    }
}
