//! Property-based test generators using proptest.
//!
//! Floats are generated as multiples of 1/8 so that every value survives a
//! trip through JSON text unchanged.

use proptest::prelude::*;
use risusave_codec::Value;

/// Strategy for map keys, including characters that need pointer escaping.
pub fn key_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        4 => prop::string::string_regex("[a-zA-Z][a-zA-Z0-9_]{0,11}").expect("Invalid regex"),
        1 => prop::string::string_regex("[a-z~/]{1,6}").expect("Invalid regex"),
        1 => prop::string::string_regex("[0-9]{1,3}").expect("Invalid regex"),
    ]
}

/// Strategy for scalar values.
pub fn scalar_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i32>().prop_map(|n| Value::Integer(i64::from(n))),
        any::<i64>().prop_map(Value::Integer),
        (-1_000_000i32..1_000_000).prop_map(|n| Value::Float(f64::from(n) / 8.0)),
        ".{0,24}".prop_map(Value::Text),
    ]
}

/// Strategy for arbitrary values nested up to `depth` levels.
pub fn value_strategy(depth: u32) -> impl Strategy<Value = Value> {
    scalar_strategy().prop_recursive(depth, 64, 6, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..6).prop_map(Value::Array),
            prop::collection::vec((key_strategy(), inner), 0..6).prop_map(Value::map),
        ]
    })
}

/// Strategy for database snapshots. The root is always a map.
pub fn snapshot_strategy() -> impl Strategy<Value = Value> {
    prop::collection::vec((key_strategy(), value_strategy(3)), 0..8).prop_map(Value::map)
}

/// A single edit to a snapshot.
#[derive(Debug, Clone)]
pub enum Edit {
    /// Set a top-level key.
    Set {
        /// Key
        key: String,
        /// New value
        value: Value,
    },
    /// Remove a top-level key.
    Remove {
        /// Key
        key: String,
    },
    /// Push onto a top-level array, creating it if needed.
    Push {
        /// Key of the array
        key: String,
        /// Pushed value
        value: Value,
    },
    /// Drop the last element of a top-level array.
    Pop {
        /// Key of the array
        key: String,
    },
}

impl Edit {
    /// Applies the edit to a snapshot in place.
    pub fn apply(&self, snapshot: &mut Value) {
        match self {
            Edit::Set { key, value } => {
                snapshot.insert(key.clone(), value.clone());
            }
            Edit::Remove { key } => {
                snapshot.remove(key);
            }
            Edit::Push { key, value } => match snapshot.get_mut(key) {
                Some(Value::Array(items)) => items.push(value.clone()),
                _ => {
                    snapshot.insert(key.clone(), Value::Array(vec![value.clone()]));
                }
            },
            Edit::Pop { key } => {
                if let Some(Value::Array(items)) = snapshot.get_mut(key) {
                    items.pop();
                }
            }
        }
    }
}

/// Strategy for snapshot edits.
pub fn edit_strategy() -> impl Strategy<Value = Edit> {
    let key = || prop::sample::select(vec!["characters", "settings", "presets", "misc"]);
    prop_oneof![
        3 => (key(), value_strategy(2))
            .prop_map(|(key, value)| Edit::Set { key: key.to_string(), value }),
        1 => key().prop_map(|key| Edit::Remove { key: key.to_string() }),
        3 => (key(), value_strategy(2))
            .prop_map(|(key, value)| Edit::Push { key: key.to_string(), value }),
        1 => key().prop_map(|key| Edit::Pop { key: key.to_string() }),
    ]
}

/// Strategy for a sequence of edits.
pub fn edit_sequence_strategy(
    min_edits: usize,
    max_edits: usize,
) -> impl Strategy<Value = Vec<Edit>> {
    prop::collection::vec(edit_strategy(), min_edits..max_edits)
}

/// Configuration for property tests.
#[derive(Debug, Clone)]
pub struct PropTestConfig {
    /// Number of test cases to run.
    pub cases: u32,
    /// Maximum shrink iterations.
    pub max_shrink_iters: u32,
}

impl Default for PropTestConfig {
    fn default() -> Self {
        Self {
            cases: 256,
            max_shrink_iters: 1000,
        }
    }
}

impl PropTestConfig {
    /// Creates a configuration for quick tests.
    #[must_use]
    pub fn quick() -> Self {
        Self {
            cases: 32,
            max_shrink_iters: 100,
        }
    }

    /// Creates a configuration for thorough tests.
    #[must_use]
    pub fn thorough() -> Self {
        Self {
            cases: 1024,
            max_shrink_iters: 10000,
        }
    }

    /// Converts to proptest config.
    #[must_use]
    pub fn to_proptest_config(&self) -> ProptestConfig {
        ProptestConfig {
            cases: self.cases,
            max_shrink_iters: self.max_shrink_iters,
            ..ProptestConfig::default()
        }
    }
}
