//! Runtime values and observations.

use std::{collections::BTreeMap, fmt};

use crate::analysis::{ConstValue, Token};

/// A value held in an SSA variable, a field or an array element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Value {
    /// Integer of any width, widened to 64 bits.
    Int(i64),
    /// Boolean.
    Bool(bool),
    /// The null reference.
    Null,
    /// Reference to a heap object, by allocation index.
    Ref(usize),
}

impl Value {
    /// The value of a field or element that was never written.
    pub const ZERO: Value = Value::Int(0);

    /// Returns the integer value, treating booleans as 0/1.
    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            Value::Bool(b) => Some(i64::from(*b)),
            Value::Null | Value::Ref(_) => None,
        }
    }

    /// Returns the truth value used by branches.
    #[must_use]
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Int(v) => *v != 0,
            Value::Bool(b) => *b,
            Value::Null => false,
            Value::Ref(_) => true,
        }
    }
}

impl From<ConstValue> for Value {
    fn from(value: ConstValue) -> Self {
        match value {
            ConstValue::I32(v) => Value::Int(i64::from(v)),
            ConstValue::I64(v) => Value::Int(v),
            ConstValue::Bool(b) => Value::Bool(b),
            ConstValue::Null => Value::Null,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(v) => write!(f, "{v}"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Null => f.write_str("null"),
            Value::Ref(id) => write!(f, "@{id}"),
        }
    }
}

/// A value as seen by an observer: references are replaced by the index of
/// the object in discovery order, so two runs that allocate differently
/// still compare equal if they built the same object graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ObservedValue {
    /// Integer.
    Int(i64),
    /// Boolean.
    Bool(bool),
    /// Null.
    Null,
    /// The n-th object reached from the roots.
    Object(usize),
}

/// The contents of a reachable object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObservedObject {
    /// Instance fields holding anything but the zero default.
    Instance(BTreeMap<Token, ObservedValue>),
    /// Array elements.
    Array(Vec<ObservedValue>),
}

/// Everything an execution makes visible to its caller.
///
/// The roots are the outcome, the static fields in token order and then the
/// arguments; every object reachable from them is listed in discovery order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Observation {
    /// Returned value, or `None` for a void return.
    pub returned: Option<ObservedValue>,
    /// Thrown value, if the method ended in a throw.
    pub thrown: Option<ObservedValue>,
    /// Final static fields.
    pub statics: BTreeMap<Token, ObservedValue>,
    /// Final values of the arguments.
    pub arguments: Vec<ObservedValue>,
    /// Reachable objects, indexed by [`ObservedValue::Object`].
    pub objects: Vec<ObservedObject>,
}
