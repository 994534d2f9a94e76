//! Abstract heap locations.
//!
//! A [`HeapLocation`] names the storage touched by a memory operation: a
//! base (an object reference or the global scope of static fields) paired
//! with a descriptor (instance field, static field or array element).
//! [`HeapLocationModel`] maps operations to locations and answers whether two
//! locations are definitely the same storage, definitely different storage,
//! or possibly overlapping.
//!
//! # Relations
//!
//! | Descriptors                    | Bases                     | Relation   |
//! |--------------------------------|---------------------------|------------|
//! | different kind or field        | any                       | `Distinct` |
//! | element, unequal constants     | any                       | `Distinct` |
//! | equal                          | same value or both global | `Same`     |
//! | equal or possibly equal        | different, one singleton  | `Distinct` |
//! | anything else                  |                           | `MayAlias` |
//!
//! Constant element indices are resolved through the `Const` definitions of
//! the function, so `a[i]` and `a[j]` with `i = 1` and `j = 1` are the same
//! location even though `i` and `j` are different variables.

use std::{collections::HashMap, fmt};

use strum::Display;

use crate::analysis::{
    escape::EscapeAnalysis,
    ssa::{ConstValue, SsaFunction, SsaOp, SsaVarId, Token},
};

/// The object part of a heap location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LocationBase {
    /// An object or array reference.
    Object(SsaVarId),
    /// The global scope holding static fields.
    Global,
}

/// Array element index of a location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum IndexKind {
    /// Index known at compile time.
    Constant(i64),
    /// Index held in a variable whose value is unknown.
    Variable(SsaVarId),
}

/// The field-or-index part of a heap location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LocationDescriptor {
    /// Instance field.
    Field(Token),
    /// Static field.
    StaticField(Token),
    /// Array element.
    Element(IndexKind),
}

/// Canonical identity of a piece of heap storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HeapLocation {
    /// Object (or global scope) holding the storage.
    pub base: LocationBase,
    /// Which field or element of the base.
    pub descriptor: LocationDescriptor,
}

impl HeapLocation {
    /// Creates a new location.
    #[must_use]
    pub const fn new(base: LocationBase, descriptor: LocationDescriptor) -> Self {
        Self { base, descriptor }
    }

    /// Returns the base object, or `None` for static fields.
    #[must_use]
    pub const fn object(&self) -> Option<SsaVarId> {
        match self.base {
            LocationBase::Object(var) => Some(var),
            LocationBase::Global => None,
        }
    }

    /// Returns `true` for element locations whose index is a variable.
    #[must_use]
    pub const fn has_variable_index(&self) -> bool {
        matches!(
            self.descriptor,
            LocationDescriptor::Element(IndexKind::Variable(_))
        )
    }
}

impl fmt::Display for HeapLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.base {
            LocationBase::Object(var) => write!(f, "{var}")?,
            LocationBase::Global => f.write_str("<global>")?,
        }
        match self.descriptor {
            LocationDescriptor::Field(token) | LocationDescriptor::StaticField(token) => {
                write!(f, ".field#{}", token.row())
            }
            LocationDescriptor::Element(IndexKind::Constant(c)) => write!(f, "[{c}]"),
            LocationDescriptor::Element(IndexKind::Variable(var)) => write!(f, "[{var}]"),
        }
    }
}

/// How two heap locations relate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum Relation {
    /// Provably the same storage.
    Same,
    /// Provably different storage.
    Distinct,
    /// Possibly the same storage.
    MayAlias,
}

/// Location queries for one function.
///
/// Borrows the function's escape results; base objects that are singleton
/// allocations cannot alias any other reference.
#[derive(Debug)]
pub struct HeapLocationModel<'a> {
    escape: &'a EscapeAnalysis,
    constants: HashMap<SsaVarId, i64>,
}

impl<'a> HeapLocationModel<'a> {
    /// Creates the model for `ssa` with precomputed escape results.
    #[must_use]
    pub fn new(ssa: &SsaFunction, escape: &'a EscapeAnalysis) -> Self {
        let constants = ssa
            .constants()
            .into_iter()
            .filter(|(_, value)| value.is_integer())
            .map(|(var, value)| (var, value.as_i64()))
            .collect();
        Self { escape, constants }
    }

    /// Returns the escape results the model was built with.
    #[must_use]
    pub fn escape(&self) -> &EscapeAnalysis {
        self.escape
    }

    /// Returns the location read or written by `op`, or `None` if the
    /// operation does not access a heap location.
    #[must_use]
    pub fn location_of(&self, op: &SsaOp) -> Option<HeapLocation> {
        let (base, descriptor) = match op {
            SsaOp::LoadField { object, field, .. } | SsaOp::StoreField { object, field, .. } => (
                LocationBase::Object(*object),
                LocationDescriptor::Field(field.token()),
            ),
            SsaOp::LoadStaticField { field, .. } | SsaOp::StoreStaticField { field, .. } => (
                LocationBase::Global,
                LocationDescriptor::StaticField(field.token()),
            ),
            SsaOp::LoadElement { array, index, .. } | SsaOp::StoreElement { array, index, .. } => {
                (
                    LocationBase::Object(*array),
                    LocationDescriptor::Element(self.index_kind(*index)),
                )
            }
            _ => return None,
        };
        Some(HeapLocation::new(base, descriptor))
    }

    /// Returns how `a` and `b` relate.
    #[must_use]
    pub fn relation_of(&self, a: &HeapLocation, b: &HeapLocation) -> Relation {
        match (
            descriptor_relation(&a.descriptor, &b.descriptor),
            self.base_relation(&a.base, &b.base),
        ) {
            (Relation::Distinct, _) | (_, Relation::Distinct) => Relation::Distinct,
            (Relation::Same, Relation::Same) => Relation::Same,
            _ => Relation::MayAlias,
        }
    }

    /// Returns `true` if the storage of `location` may be visible to other
    /// methods or threads.
    #[must_use]
    pub fn is_escaping(&self, location: &HeapLocation) -> bool {
        match location.base {
            LocationBase::Object(var) => !self.escape.is_singleton(var),
            LocationBase::Global => true,
        }
    }

    fn index_kind(&self, index: SsaVarId) -> IndexKind {
        self.constants
            .get(&index)
            .map_or(IndexKind::Variable(index), |c| IndexKind::Constant(*c))
    }

    fn base_relation(&self, a: &LocationBase, b: &LocationBase) -> Relation {
        match (a, b) {
            (LocationBase::Global, LocationBase::Global) => Relation::Same,
            (LocationBase::Object(x), LocationBase::Object(y)) if x == y => Relation::Same,
            (LocationBase::Object(x), LocationBase::Object(y)) => {
                if self.escape.is_singleton(*x) || self.escape.is_singleton(*y) {
                    Relation::Distinct
                } else {
                    Relation::MayAlias
                }
            }
            _ => Relation::Distinct,
        }
    }
}

fn descriptor_relation(a: &LocationDescriptor, b: &LocationDescriptor) -> Relation {
    match (a, b) {
        (LocationDescriptor::Field(x), LocationDescriptor::Field(y))
        | (LocationDescriptor::StaticField(x), LocationDescriptor::StaticField(y)) => {
            if x == y {
                Relation::Same
            } else {
                Relation::Distinct
            }
        }
        (LocationDescriptor::Element(x), LocationDescriptor::Element(y)) => match (x, y) {
            (IndexKind::Constant(i), IndexKind::Constant(j)) if i != j => Relation::Distinct,
            _ if x == y => Relation::Same,
            _ => Relation::MayAlias,
        },
        _ => Relation::Distinct,
    }
}

/// Returns `true` if `value` equals the default content of fresh storage.
///
/// Only integer zero qualifies; `false` and `null` are different values to
/// the interpreter even though they share a bit pattern.
pub(crate) fn is_default_value(value: &ConstValue) -> bool {
    value.is_integer() && value.is_zero()
}
