//! SSA operations.
//!
//! `SsaOp` is the `result = op(operands)` form consumed by every analysis in
//! this crate. Memory is touched only by the explicit field, static field and
//! array element operations, and memory ordering is expressed only by volatile
//! field flags, monitor operations and [`SsaOp::MemoryBarrier`].
//!
//! # Field Documentation
//!
//! - `dest`: the destination SSA variable
//! - `left`, `right`: binary operands
//! - `value`: a value being stored, returned or used
//! - `object`: the object instance for field and monitor operations
//! - `array`, `index`: array and index for element operations
//! - `target`, `true_target`, `false_target`: branch targets (block indices)

#![allow(missing_docs)]

use std::fmt;

use strum::{Display, EnumIter};

use super::types::{FieldRef, MethodRef, Token};
use super::value::ConstValue;
use super::SsaVarId;

/// A decomposed SSA operation.
///
/// Phi nodes are not operations; they live in [`crate::analysis::SsaBlock::phi_nodes`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SsaOp {
    // ========================================================================
    // Constants
    // ========================================================================
    /// `dest = const value`
    Const { dest: SsaVarId, value: ConstValue },

    // ========================================================================
    // Arithmetic and comparison
    // ========================================================================
    /// `dest = left + right`
    Add {
        dest: SsaVarId,
        left: SsaVarId,
        right: SsaVarId,
    },

    /// `dest = left - right`
    Sub {
        dest: SsaVarId,
        left: SsaVarId,
        right: SsaVarId,
    },

    /// `dest = left * right`
    Mul {
        dest: SsaVarId,
        left: SsaVarId,
        right: SsaVarId,
    },

    /// `dest = (left == right)`
    Ceq {
        dest: SsaVarId,
        left: SsaVarId,
        right: SsaVarId,
    },

    /// `dest = (left < right)`
    Clt {
        dest: SsaVarId,
        left: SsaVarId,
        right: SsaVarId,
    },

    /// `dest = src`
    Copy { dest: SsaVarId, src: SsaVarId },

    // ========================================================================
    // Field Operations
    // ========================================================================
    /// `dest = object.field`
    LoadField {
        dest: SsaVarId,
        object: SsaVarId,
        field: FieldRef,
    },

    /// `object.field = value`
    StoreField {
        object: SsaVarId,
        field: FieldRef,
        value: SsaVarId,
    },

    /// `dest = Class.field`
    LoadStaticField { dest: SsaVarId, field: FieldRef },

    /// `Class.field = value`
    StoreStaticField { field: FieldRef, value: SsaVarId },

    // ========================================================================
    // Array Operations
    // ========================================================================
    /// `dest = array[index]`
    LoadElement {
        dest: SsaVarId,
        array: SsaVarId,
        index: SsaVarId,
    },

    /// `array[index] = value`
    StoreElement {
        array: SsaVarId,
        index: SsaVarId,
        value: SsaVarId,
    },

    // ========================================================================
    // Allocation
    // ========================================================================
    /// `dest = new Class` (fields start out zeroed)
    NewObj { dest: SsaVarId, class: Token },

    /// `dest = new [length]` (elements start out zeroed)
    NewArr { dest: SsaVarId, length: SsaVarId },

    // ========================================================================
    // Calls
    // ========================================================================
    /// `dest = call method(args)`
    Call {
        dest: Option<SsaVarId>,
        method: MethodRef,
        args: Vec<SsaVarId>,
    },

    // ========================================================================
    // Synchronization
    // ========================================================================
    /// Acquire the monitor of `object`.
    MonitorEnter { object: SsaVarId },

    /// Release the monitor of `object`.
    MonitorExit { object: SsaVarId },

    /// Full two-way memory fence.
    MemoryBarrier,

    // ========================================================================
    // Control Flow
    // ========================================================================
    /// Unconditional branch.
    Jump { target: usize },

    /// Two-way branch on a boolean condition.
    Branch {
        condition: SsaVarId,
        true_target: usize,
        false_target: usize,
    },

    /// Return from the method.
    Return { value: Option<SsaVarId> },

    /// Throw `exception`.
    Throw { exception: SsaVarId },

    // ========================================================================
    // Misc
    // ========================================================================
    /// Placeholder for a removed instruction.
    Nop,
}

/// Coarse instruction kinds, named as they appear in checker output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, Display)]
pub enum OpKind {
    IntConstant,
    Add,
    Sub,
    Mul,
    Equal,
    LessThan,
    Copy,
    InstanceFieldGet,
    InstanceFieldSet,
    StaticFieldGet,
    StaticFieldSet,
    ArrayGet,
    ArraySet,
    NewInstance,
    NewArray,
    InvokeStaticOrDirect,
    MonitorOperation,
    MemoryBarrier,
    Goto,
    If,
    Return,
    Throw,
    Nop,
    Phi,
}

impl SsaOp {
    /// Returns the destination variable if this operation produces one.
    #[must_use]
    pub fn dest(&self) -> Option<SsaVarId> {
        match self {
            Self::Const { dest, .. }
            | Self::Add { dest, .. }
            | Self::Sub { dest, .. }
            | Self::Mul { dest, .. }
            | Self::Ceq { dest, .. }
            | Self::Clt { dest, .. }
            | Self::Copy { dest, .. }
            | Self::LoadField { dest, .. }
            | Self::LoadStaticField { dest, .. }
            | Self::LoadElement { dest, .. }
            | Self::NewObj { dest, .. }
            | Self::NewArr { dest, .. } => Some(*dest),

            Self::Call { dest, .. } => *dest,

            Self::StoreField { .. }
            | Self::StoreStaticField { .. }
            | Self::StoreElement { .. }
            | Self::MonitorEnter { .. }
            | Self::MonitorExit { .. }
            | Self::MemoryBarrier
            | Self::Jump { .. }
            | Self::Branch { .. }
            | Self::Return { .. }
            | Self::Throw { .. }
            | Self::Nop => None,
        }
    }

    /// Replaces the destination variable, if the operation has one.
    pub fn set_dest(&mut self, new_dest: SsaVarId) {
        match self {
            Self::Const { dest, .. }
            | Self::Add { dest, .. }
            | Self::Sub { dest, .. }
            | Self::Mul { dest, .. }
            | Self::Ceq { dest, .. }
            | Self::Clt { dest, .. }
            | Self::Copy { dest, .. }
            | Self::LoadField { dest, .. }
            | Self::LoadStaticField { dest, .. }
            | Self::LoadElement { dest, .. }
            | Self::NewObj { dest, .. }
            | Self::NewArr { dest, .. } => *dest = new_dest,
            Self::Call { dest, .. } => *dest = Some(new_dest),
            _ => {}
        }
    }

    /// Returns all variables used by this operation, in operand order.
    #[must_use]
    pub fn uses(&self) -> Vec<SsaVarId> {
        match self {
            Self::Const { .. }
            | Self::LoadStaticField { .. }
            | Self::NewObj { .. }
            | Self::MemoryBarrier
            | Self::Jump { .. }
            | Self::Nop => vec![],

            Self::Add { left, right, .. }
            | Self::Sub { left, right, .. }
            | Self::Mul { left, right, .. }
            | Self::Ceq { left, right, .. }
            | Self::Clt { left, right, .. } => vec![*left, *right],

            Self::Copy { src, .. } => vec![*src],
            Self::LoadField { object, .. } => vec![*object],
            Self::StoreField { object, value, .. } => vec![*object, *value],
            Self::StoreStaticField { value, .. } => vec![*value],
            Self::LoadElement { array, index, .. } => vec![*array, *index],
            Self::StoreElement {
                array,
                index,
                value,
            } => vec![*array, *index, *value],
            Self::NewArr { length, .. } => vec![*length],
            Self::Call { args, .. } => args.clone(),
            Self::MonitorEnter { object } | Self::MonitorExit { object } => vec![*object],
            Self::Branch { condition, .. } => vec![*condition],
            Self::Return { value } => value.iter().copied().collect(),
            Self::Throw { exception } => vec![*exception],
        }
    }

    /// Replaces every use of `old` with `new`, returning how many operands changed.
    pub fn replace_uses(&mut self, old: SsaVarId, new: SsaVarId) -> usize {
        let mut count = 0;
        self.map_uses(|var| {
            if var == old {
                count += 1;
                new
            } else {
                var
            }
        });
        count
    }

    /// Rewrites every used variable through `f`. All operands are renamed at
    /// once, so `f` may map variables onto each other.
    pub fn map_uses<F>(&mut self, mut f: F)
    where
        F: FnMut(SsaVarId) -> SsaVarId,
    {
        let mut swap = |var: &mut SsaVarId| *var = f(*var);

        match self {
            Self::Const { .. }
            | Self::LoadStaticField { .. }
            | Self::NewObj { .. }
            | Self::MemoryBarrier
            | Self::Jump { .. }
            | Self::Nop => {}

            Self::Add { left, right, .. }
            | Self::Sub { left, right, .. }
            | Self::Mul { left, right, .. }
            | Self::Ceq { left, right, .. }
            | Self::Clt { left, right, .. } => {
                swap(left);
                swap(right);
            }
            Self::Copy { src, .. } => swap(src),
            Self::LoadField { object, .. } => swap(object),
            Self::StoreField { object, value, .. } => {
                swap(object);
                swap(value);
            }
            Self::StoreStaticField { value, .. } => swap(value),
            Self::LoadElement { array, index, .. } => {
                swap(array);
                swap(index);
            }
            Self::StoreElement {
                array,
                index,
                value,
            } => {
                swap(array);
                swap(index);
                swap(value);
            }
            Self::NewArr { length, .. } => swap(length),
            Self::Call { args, .. } => args.iter_mut().for_each(swap),
            Self::MonitorEnter { object } | Self::MonitorExit { object } => swap(object),
            Self::Branch { condition, .. } => swap(condition),
            Self::Return { value } => {
                if let Some(v) = value {
                    swap(v);
                }
            }
            Self::Throw { exception } => swap(exception),
        }
    }

    /// Returns `true` if this operation ends a basic block.
    #[must_use]
    pub const fn is_terminator(&self) -> bool {
        matches!(
            self,
            Self::Jump { .. } | Self::Branch { .. } | Self::Return { .. } | Self::Throw { .. }
        )
    }

    /// Returns the successor block indices of a terminator.
    #[must_use]
    pub fn successors(&self) -> Vec<usize> {
        match self {
            Self::Jump { target } => vec![*target],
            Self::Branch {
                true_target,
                false_target,
                ..
            } => {
                if true_target == false_target {
                    vec![*true_target]
                } else {
                    vec![*true_target, *false_target]
                }
            }
            _ => vec![],
        }
    }

    /// Returns `true` if the operation has no side effects and can be removed
    /// when its result is unused.
    ///
    /// Loads are not pure: a load of a volatile field is a synchronization
    /// point even when its value is discarded.
    #[must_use]
    pub const fn is_pure(&self) -> bool {
        matches!(
            self,
            Self::Const { .. }
                | Self::Add { .. }
                | Self::Sub { .. }
                | Self::Mul { .. }
                | Self::Ceq { .. }
                | Self::Clt { .. }
                | Self::Copy { .. }
                | Self::Nop
        )
    }

    /// Returns `true` if the operation reads heap memory.
    #[must_use]
    pub const fn is_load(&self) -> bool {
        matches!(
            self,
            Self::LoadField { .. } | Self::LoadStaticField { .. } | Self::LoadElement { .. }
        )
    }

    /// Returns `true` if the operation writes heap memory.
    #[must_use]
    pub const fn is_store(&self) -> bool {
        matches!(
            self,
            Self::StoreField { .. } | Self::StoreStaticField { .. } | Self::StoreElement { .. }
        )
    }

    /// Returns the field accessed by a field operation.
    #[must_use]
    pub const fn field(&self) -> Option<FieldRef> {
        match self {
            Self::LoadField { field, .. }
            | Self::StoreField { field, .. }
            | Self::LoadStaticField { field, .. }
            | Self::StoreStaticField { field, .. } => Some(*field),
            _ => None,
        }
    }

    /// Returns the coarse kind of the operation.
    #[must_use]
    pub const fn kind(&self) -> OpKind {
        match self {
            Self::Const { .. } => OpKind::IntConstant,
            Self::Add { .. } => OpKind::Add,
            Self::Sub { .. } => OpKind::Sub,
            Self::Mul { .. } => OpKind::Mul,
            Self::Ceq { .. } => OpKind::Equal,
            Self::Clt { .. } => OpKind::LessThan,
            Self::Copy { .. } => OpKind::Copy,
            Self::LoadField { .. } => OpKind::InstanceFieldGet,
            Self::StoreField { .. } => OpKind::InstanceFieldSet,
            Self::LoadStaticField { .. } => OpKind::StaticFieldGet,
            Self::StoreStaticField { .. } => OpKind::StaticFieldSet,
            Self::LoadElement { .. } => OpKind::ArrayGet,
            Self::StoreElement { .. } => OpKind::ArraySet,
            Self::NewObj { .. } => OpKind::NewInstance,
            Self::NewArr { .. } => OpKind::NewArray,
            Self::Call { .. } => OpKind::InvokeStaticOrDirect,
            Self::MonitorEnter { .. } | Self::MonitorExit { .. } => OpKind::MonitorOperation,
            Self::MemoryBarrier => OpKind::MemoryBarrier,
            Self::Jump { .. } => OpKind::Goto,
            Self::Branch { .. } => OpKind::If,
            Self::Return { .. } => OpKind::Return,
            Self::Throw { .. } => OpKind::Throw,
            Self::Nop => OpKind::Nop,
        }
    }
}

impl fmt::Display for SsaOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Const { dest, value } => write!(f, "{dest} = {value}"),
            Self::Add { dest, left, right } => write!(f, "{dest} = add {left}, {right}"),
            Self::Sub { dest, left, right } => write!(f, "{dest} = sub {left}, {right}"),
            Self::Mul { dest, left, right } => write!(f, "{dest} = mul {left}, {right}"),
            Self::Ceq { dest, left, right } => write!(f, "{dest} = ceq {left}, {right}"),
            Self::Clt { dest, left, right } => write!(f, "{dest} = clt {left}, {right}"),
            Self::Copy { dest, src } => write!(f, "{dest} = {src}"),
            Self::LoadField {
                dest,
                object,
                field,
            } => write!(f, "{dest} = ldfld {object}.{field}"),
            Self::StoreField {
                object,
                field,
                value,
            } => write!(f, "stfld {object}.{field} = {value}"),
            Self::LoadStaticField { dest, field } => write!(f, "{dest} = ldsfld {field}"),
            Self::StoreStaticField { field, value } => write!(f, "stsfld {field} = {value}"),
            Self::LoadElement { dest, array, index } => {
                write!(f, "{dest} = ldelem {array}[{index}]")
            }
            Self::StoreElement {
                array,
                index,
                value,
            } => write!(f, "stelem {array}[{index}] = {value}"),
            Self::NewObj { dest, class } => write!(f, "{dest} = newobj class#{}", class.row()),
            Self::NewArr { dest, length } => write!(f, "{dest} = newarr [{length}]"),
            Self::Call { dest, method, args } => {
                if let Some(dest) = dest {
                    write!(f, "{dest} = ")?;
                }
                write!(f, "call {method}(")?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{arg}")?;
                }
                f.write_str(")")
            }
            Self::MonitorEnter { object } => write!(f, "monitor.enter {object}"),
            Self::MonitorExit { object } => write!(f, "monitor.exit {object}"),
            Self::MemoryBarrier => f.write_str("fence"),
            Self::Jump { target } => write!(f, "jump B{target}"),
            Self::Branch {
                condition,
                true_target,
                false_target,
            } => write!(f, "branch {condition}, B{true_target}, B{false_target}"),
            Self::Return { value: Some(v) } => write!(f, "ret {v}"),
            Self::Return { value: None } => f.write_str("ret"),
            Self::Throw { exception } => write!(f, "throw {exception}"),
            Self::Nop => f.write_str("nop"),
        }
    }
}
