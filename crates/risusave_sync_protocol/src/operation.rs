//! JSON Patch operations (RFC 6902).
//!
//! [`PatchOperation`] mirrors `json_patch::PatchOperation` variant for
//! variant and carries snapshot values instead of `serde_json` values.

use risusave_codec::Value;
use serde::{Deserialize, Serialize};

/// A single patch operation.
///
/// Serializes as the RFC 6902 object form, e.g.
/// `{"op":"add","path":"/b","value":2}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum PatchOperation {
    /// Insert or overwrite a value.
    Add {
        /// Target location.
        path: String,
        /// Value to insert.
        value: Value,
    },
    /// Remove an existing value.
    Remove {
        /// Target location.
        path: String,
    },
    /// Overwrite an existing value.
    Replace {
        /// Target location.
        path: String,
        /// New value.
        value: Value,
    },
    /// Remove a value and add it elsewhere.
    Move {
        /// Source location.
        from: String,
        /// Target location.
        path: String,
    },
    /// Add a deep copy of a value elsewhere.
    Copy {
        /// Source location.
        from: String,
        /// Target location.
        path: String,
    },
    /// Require the value at a location to equal `value`.
    Test {
        /// Tested location.
        path: String,
        /// Expected value.
        value: Value,
    },
}

impl PatchOperation {
    /// Creates an `add` operation.
    pub fn add(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Add {
            path: path.into(),
            value: value.into(),
        }
    }

    /// Creates a `remove` operation.
    pub fn remove(path: impl Into<String>) -> Self {
        Self::Remove { path: path.into() }
    }

    /// Creates a `replace` operation.
    pub fn replace(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Replace {
            path: path.into(),
            value: value.into(),
        }
    }

    /// Creates a `move` operation.
    pub fn move_from(from: impl Into<String>, path: impl Into<String>) -> Self {
        Self::Move {
            from: from.into(),
            path: path.into(),
        }
    }

    /// Creates a `copy` operation.
    pub fn copy_from(from: impl Into<String>, path: impl Into<String>) -> Self {
        Self::Copy {
            from: from.into(),
            path: path.into(),
        }
    }

    /// Creates a `test` operation.
    pub fn test(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Test {
            path: path.into(),
            value: value.into(),
        }
    }

    /// The operation name as it appears in the `op` field.
    pub fn name(&self) -> &'static str {
        match self {
            PatchOperation::Add { .. } => "add",
            PatchOperation::Remove { .. } => "remove",
            PatchOperation::Replace { .. } => "replace",
            PatchOperation::Move { .. } => "move",
            PatchOperation::Copy { .. } => "copy",
            PatchOperation::Test { .. } => "test",
        }
    }

    /// The target path.
    pub fn path(&self) -> &str {
        match self {
            PatchOperation::Add { path, .. }
            | PatchOperation::Remove { path }
            | PatchOperation::Replace { path, .. }
            | PatchOperation::Move { path, .. }
            | PatchOperation::Copy { path, .. }
            | PatchOperation::Test { path, .. } => path,
        }
    }
}
