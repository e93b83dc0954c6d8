//! Incremental, invertible deltas carried by `update` operations
//!
//! A diff always carries the data it removes, so its inverse can be computed
//! without looking at the document it was applied to.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum DiffError {
    #[error("Position {pos} out of range (length {len})")]
    OutOfRange { pos: usize, len: usize },

    #[error("Expected {expected} value")]
    TypeMismatch { expected: &'static str },

    #[error("Content mismatch at {pos}: expected {expected:?}")]
    ContentMismatch { pos: usize, expected: String },

    #[error("Coordinate offset would become negative")]
    NegativeOffset,

    #[error("Coordinate offset overflows")]
    OffsetOverflow,
}

/// A type-specific delta applied at a path
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Diff {
    /// Insert text at a char position
    InsertText { pos: usize, text: String },

    /// Delete the given text starting at a char position
    DeleteText { pos: usize, text: String },

    /// Splice a value into an array
    InsertItem { pos: usize, value: Value },

    /// Remove the given value from an array
    DeleteItem { pos: usize, value: Value },

    /// Move a coordinate's offset
    Shift { delta: i64 },
}

impl Diff {
    pub fn insert_text(pos: usize, text: impl Into<String>) -> Self {
        Diff::InsertText {
            pos,
            text: text.into(),
        }
    }

    pub fn delete_text(pos: usize, text: impl Into<String>) -> Self {
        Diff::DeleteText {
            pos,
            text: text.into(),
        }
    }

    pub fn insert_item(pos: usize, value: Value) -> Self {
        Diff::InsertItem { pos, value }
    }

    pub fn delete_item(pos: usize, value: Value) -> Self {
        Diff::DeleteItem { pos, value }
    }

    pub fn shift(delta: i64) -> Self {
        Diff::Shift { delta }
    }

    /// The delta that undoes this one.
    ///
    /// A shift by `i64::MIN` has no exact inverse and saturates; operations
    /// refuse to carry such a diff (see [`Diff::is_invertible`]).
    pub fn invert(&self) -> Diff {
        match self {
            Diff::InsertText { pos, text } => Diff::DeleteText {
                pos: *pos,
                text: text.clone(),
            },
            Diff::DeleteText { pos, text } => Diff::InsertText {
                pos: *pos,
                text: text.clone(),
            },
            Diff::InsertItem { pos, value } => Diff::DeleteItem {
                pos: *pos,
                value: value.clone(),
            },
            Diff::DeleteItem { pos, value } => Diff::InsertItem {
                pos: *pos,
                value: value.clone(),
            },
            Diff::Shift { delta } => Diff::Shift {
                delta: delta.saturating_neg(),
            },
        }
    }

    pub fn is_invertible(&self) -> bool {
        match self {
            Diff::Shift { delta } => delta.checked_neg().is_some(),
            _ => true,
        }
    }

    /// A diff that changes nothing when applied
    pub fn is_noop(&self) -> bool {
        match self {
            Diff::InsertText { text, .. } | Diff::DeleteText { text, .. } => text.is_empty(),
            Diff::Shift { delta } => *delta == 0,
            Diff::InsertItem { .. } | Diff::DeleteItem { .. } => false,
        }
    }

    /// Apply the delta to a value in place
    pub fn apply(&self, target: &mut Value) -> Result<(), DiffError> {
        match self {
            Diff::InsertText { pos, text } => {
                let current = target
                    .as_str()
                    .ok_or(DiffError::TypeMismatch { expected: "string" })?;
                let len = current.chars().count();
                if *pos > len {
                    return Err(DiffError::OutOfRange { pos: *pos, len });
                }
                let at = byte_offset(current, *pos);
                let mut next = String::with_capacity(current.len() + text.len());
                next.push_str(&current[..at]);
                next.push_str(text);
                next.push_str(&current[at..]);
                *target = Value::String(next);
            }
            Diff::DeleteText { pos, text } => {
                let current = target
                    .as_str()
                    .ok_or(DiffError::TypeMismatch { expected: "string" })?;
                let len = current.chars().count();
                let count = text.chars().count();
                let end_pos = pos
                    .checked_add(count)
                    .filter(|end| *end <= len)
                    .ok_or(DiffError::OutOfRange {
                        pos: pos.saturating_add(count),
                        len,
                    })?;
                let start = byte_offset(current, *pos);
                let end = byte_offset(current, end_pos);
                if &current[start..end] != text.as_str() {
                    return Err(DiffError::ContentMismatch {
                        pos: *pos,
                        expected: text.clone(),
                    });
                }
                let mut next = String::with_capacity(current.len() - text.len());
                next.push_str(&current[..start]);
                next.push_str(&current[end..]);
                *target = Value::String(next);
            }
            Diff::InsertItem { pos, value } => {
                let items = target
                    .as_array_mut()
                    .ok_or(DiffError::TypeMismatch { expected: "array" })?;
                if *pos > items.len() {
                    return Err(DiffError::OutOfRange {
                        pos: *pos,
                        len: items.len(),
                    });
                }
                items.insert(*pos, value.clone());
            }
            Diff::DeleteItem { pos, value } => {
                let items = target
                    .as_array_mut()
                    .ok_or(DiffError::TypeMismatch { expected: "array" })?;
                let len = items.len();
                let existing = items
                    .get(*pos)
                    .ok_or(DiffError::OutOfRange { pos: *pos, len })?;
                if existing != value {
                    return Err(DiffError::ContentMismatch {
                        pos: *pos,
                        expected: value.to_string(),
                    });
                }
                items.remove(*pos);
            }
            Diff::Shift { delta } => {
                // Coordinates are either a bare offset or `{ path, offset }`
                let offset = match target {
                    Value::Object(map) => map
                        .get_mut("offset")
                        .ok_or(DiffError::TypeMismatch { expected: "coordinate" })?,
                    other => other,
                };
                let current = offset
                    .as_i64()
                    .ok_or(DiffError::TypeMismatch { expected: "integer offset" })?;
                let next = current
                    .checked_add(*delta)
                    .ok_or(DiffError::OffsetOverflow)?;
                if next < 0 {
                    return Err(DiffError::NegativeOffset);
                }
                *offset = Value::from(next);
            }
        }
        Ok(())
    }
}

fn byte_offset(s: &str, char_pos: usize) -> usize {
    s.char_indices()
        .nth(char_pos)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}
