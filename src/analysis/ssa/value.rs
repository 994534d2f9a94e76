//! Compile-time constant values.

use std::fmt;

/// A constant produced by [`crate::analysis::SsaOp::Const`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConstValue {
    /// 32-bit signed integer.
    I32(i32),
    /// 64-bit signed integer.
    I64(i64),
    /// Boolean.
    Bool(bool),
    /// The null reference.
    Null,
}

impl ConstValue {
    /// The value a freshly allocated field or array element holds.
    pub const DEFAULT: ConstValue = ConstValue::I32(0);

    /// Returns the value widened to `i64`; `Null` and `false` are zero.
    #[must_use]
    pub fn as_i64(&self) -> i64 {
        match self {
            ConstValue::I32(v) => i64::from(*v),
            ConstValue::I64(v) => *v,
            ConstValue::Bool(b) => i64::from(*b),
            ConstValue::Null => 0,
        }
    }

    /// Returns `true` if the value is an integer usable as a constant array index.
    #[must_use]
    pub fn is_integer(&self) -> bool {
        matches!(self, ConstValue::I32(_) | ConstValue::I64(_))
    }

    /// Returns `true` if this value is the zero of its kind.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.as_i64() == 0
    }
}

impl fmt::Display for ConstValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstValue::I32(v) => write!(f, "{v}"),
            ConstValue::I64(v) => write!(f, "{v}L"),
            ConstValue::Bool(b) => write!(f, "{b}"),
            ConstValue::Null => f.write_str("null"),
        }
    }
}
