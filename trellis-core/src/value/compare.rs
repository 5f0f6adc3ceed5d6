//! Depth-limited value comparison.
//!
//! A depth of `0` compares by identity (primitives and strings by value,
//! containers by allocation), `1` additionally looks at the direct children
//! of a container by identity, and so on. A negative depth recurses fully.

use std::rc::Rc;

use serde::Deserialize;

use super::{Value, ValueMap};

/// How thoroughly two props/state snapshots are compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(from = "DepthRepr")]
pub enum CompareDepth {
    /// Never counts as changed.
    Never,
    /// Always counts as changed.
    Always,
    /// Identity of the bag itself.
    Reference,
    /// Each entry by identity.
    Shallow,
    /// Each entry's direct children by identity.
    DoubleShallow,
    /// Full structural equality.
    Deep,
    /// Explicit recursion depth; negative means [`CompareDepth::Deep`].
    Levels(i32),
}

impl CompareDepth {
    /// Recursion depth, or `None` for the fixed modes.
    pub fn levels(self) -> Option<i32> {
        match self {
            CompareDepth::Never | CompareDepth::Always => None,
            CompareDepth::Reference => Some(0),
            CompareDepth::Shallow => Some(1),
            CompareDepth::DoubleShallow => Some(2),
            CompareDepth::Deep => Some(-1),
            CompareDepth::Levels(n) => Some(if n < 0 { -1 } else { n }),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum DepthRepr {
    Named(NamedDepth),
    Levels(i32),
}

#[derive(Deserialize)]
#[serde(rename_all = "kebab-case")]
enum NamedDepth {
    Never,
    Always,
    Reference,
    Shallow,
    DoubleShallow,
    Deep,
}

impl From<DepthRepr> for CompareDepth {
    fn from(repr: DepthRepr) -> Self {
        match repr {
            DepthRepr::Named(NamedDepth::Never) => CompareDepth::Never,
            DepthRepr::Named(NamedDepth::Always) => CompareDepth::Always,
            DepthRepr::Named(NamedDepth::Reference) => CompareDepth::Reference,
            DepthRepr::Named(NamedDepth::Shallow) => CompareDepth::Shallow,
            DepthRepr::Named(NamedDepth::DoubleShallow) => CompareDepth::DoubleShallow,
            DepthRepr::Named(NamedDepth::Deep) => CompareDepth::Deep,
            DepthRepr::Levels(n) => CompareDepth::Levels(n),
        }
    }
}

/// Compare two values down to `levels` container levels.
pub fn values_equal(a: &Value, b: &Value, levels: i32) -> bool {
    match (a, b) {
        (Value::Null, Value::Null) => true,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::Int(x), Value::Int(y)) => x == y,
        (Value::Float(x), Value::Float(y)) => x == y || (x.is_nan() && y.is_nan()),
        (Value::Str(x), Value::Str(y)) => x == y,
        (Value::List(x), Value::List(y)) => {
            if Rc::ptr_eq(x, y) {
                return true;
            }
            if levels == 0 || x.len() != y.len() {
                return false;
            }
            let next = if levels < 0 { -1 } else { levels - 1 };
            x.iter().zip(y.iter()).all(|(p, q)| values_equal(p, q, next))
        }
        (Value::Map(x), Value::Map(y)) => maps_equal(x, y, levels),
        (Value::Opaque(x), Value::Opaque(y)) => x.same(y),
        _ => false,
    }
}

/// Compare two maps, treating the maps themselves as level zero.
pub(crate) fn maps_equal(a: &Rc<ValueMap>, b: &Rc<ValueMap>, levels: i32) -> bool {
    if Rc::ptr_eq(a, b) {
        return true;
    }
    if levels == 0 || a.len() != b.len() {
        return false;
    }
    let next = if levels < 0 { -1 } else { levels - 1 };
    a.iter().all(|(key, x)| b.get(key).is_some_and(|y| values_equal(x, y, next)))
}
