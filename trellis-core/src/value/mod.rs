//! Prop Values
//!
//! Props and component state are bags of [`Value`]s. Containers (strings aside)
//! are reference counted so that "reference equality" is meaningful: a value
//! that was carried over untouched from the previous render is the *same*
//! allocation, while a freshly built list is not, even if it holds the same
//! items.
//!
//! # Comparison
//!
//! Whether a prop bag "changed" is decided by [`CompareDepth`], a pure
//! recursive comparison that knows nothing about boundaries or output nodes.
//! The same function drives the should-update decision of a boundary and the
//! prop diff applied to a real output node.

mod compare;

pub use compare::{values_equal, CompareDepth};

use std::any::Any;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Map type used for props, state, and map values.
pub type ValueMap = IndexMap<Rc<str>, Value>;

/// A dynamically typed prop or state value.
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Rc<str>),
    List(Rc<Vec<Value>>),
    Map(Rc<ValueMap>),
    /// An opaque host value (callbacks, handles). Compared by identity only.
    #[serde(skip)]
    Opaque(Opaque),
}

impl Value {
    /// Build a list value.
    pub fn list<I, V>(items: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Value::List(Rc::new(items.into_iter().map(Into::into).collect()))
    }

    /// Wrap an arbitrary Rust value; equality is by allocation identity.
    pub fn opaque<T: Any>(value: T) -> Self {
        Value::Opaque(Opaque(Rc::new(value)))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    /// Render a primitive as display text; containers and opaque values yield `None`.
    pub fn to_text(&self) -> Option<String> {
        match self {
            Value::Null => None,
            Value::Bool(b) => Some(b.to_string()),
            Value::Int(i) => Some(i.to_string()),
            Value::Float(f) => Some(f.to_string()),
            Value::Str(s) => Some(s.to_string()),
            Value::List(_) | Value::Map(_) | Value::Opaque(_) => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        values_equal(self, other, -1)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Str(s) => write!(f, "{s:?}"),
            Value::List(items) => f.debug_list().entries(items.iter()).finish(),
            Value::Map(map) => f.debug_map().entries(map.iter()).finish(),
            Value::Opaque(o) => write!(f, "Opaque({:p})", Rc::as_ptr(&o.0)),
        }
    }
}

/// Reference-counted opaque payload.
#[derive(Clone)]
pub struct Opaque(pub Rc<dyn Any>);

impl Opaque {
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref()
    }

    pub(crate) fn same(&self, other: &Opaque) -> bool {
        std::ptr::eq(
            Rc::as_ptr(&self.0) as *const (),
            Rc::as_ptr(&other.0) as *const (),
        )
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<usize> for Value {
    fn from(i: usize) -> Self {
        Value::Int(i as i64)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(Rc::from(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(Rc::from(s))
    }
}

impl From<Props> for Value {
    fn from(props: Props) -> Self {
        Value::Map(props.0)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

// ----------------------------------------------------------------------------
// Props
// ----------------------------------------------------------------------------

/// An ordered, copy-on-write bag of named values.
///
/// Cloning is cheap; the first mutation of a shared bag copies it. Two bags
/// that were never mutated since they were cloned compare equal at
/// [`CompareDepth::Reference`].
#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Props(Rc<ValueMap>);

impl Props {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.set(key, value);
        self
    }

    /// Parse a JSON object into props.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn set(&mut self, key: &str, value: impl Into<Value>) {
        Rc::make_mut(&mut self.0).insert(Rc::from(key), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        if !self.0.contains_key(key) {
            return None;
        }
        Rc::make_mut(&mut self.0).shift_remove(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Rc<str>, &Value)> {
        self.0.iter()
    }

    /// Merge `patch` on top of these props (patch wins).
    pub fn merge(&mut self, patch: &Props) {
        if patch.is_empty() {
            return;
        }
        let map = Rc::make_mut(&mut self.0);
        for (k, v) in patch.0.iter() {
            map.insert(Rc::clone(k), v.clone());
        }
    }

    /// Whether both bags are the same allocation.
    pub fn same(&self, other: &Props) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Whether these props differ from `other` at the given depth.
    ///
    /// The bag itself is level zero, so [`CompareDepth::Shallow`] compares
    /// each prop by identity.
    pub fn changed(&self, other: &Props, depth: CompareDepth) -> bool {
        match depth.levels() {
            None => depth == CompareDepth::Always,
            Some(levels) => !compare::maps_equal(&self.0, &other.0, levels),
        }
    }

    /// Compute the prop writes needed to turn `self` into `next`.
    ///
    /// Individual values are compared at `depth - 1`, mirroring how
    /// [`Props::changed`] treats the bag as the outermost level.
    pub fn diff(&self, next: &Props, depth: CompareDepth) -> PropsDiff {
        let mut diff = PropsDiff::default();
        if self.same(next) {
            return diff;
        }
        let levels = depth.levels().unwrap_or(-1);
        let inner = if levels < 0 { -1 } else { (levels - 1).max(0) };
        for (key, value) in next.iter() {
            match self.get(key) {
                Some(old) if depth != CompareDepth::Always && values_equal(old, value, inner) => {}
                _ => diff.set.push((Rc::clone(key), value.clone())),
            }
        }
        for key in self.0.keys() {
            if !next.contains(key) {
                diff.removed.push(Rc::clone(key));
            }
        }
        diff
    }
}

impl fmt::Debug for Props {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.0.iter()).finish()
    }
}

impl FromIterator<(Rc<str>, Value)> for Props {
    fn from_iter<I: IntoIterator<Item = (Rc<str>, Value)>>(iter: I) -> Self {
        Props(Rc::new(iter.into_iter().collect()))
    }
}

/// Prop writes for one output node.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PropsDiff {
    /// Props added or changed, with their new value.
    pub set: Vec<(Rc<str>, Value)>,
    /// Props that no longer exist.
    pub removed: Vec<Rc<str>>,
}

impl PropsDiff {
    pub fn is_empty(&self) -> bool {
        self.set.is_empty() && self.removed.is_empty()
    }
}
