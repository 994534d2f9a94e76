//! Builder pattern for programmatic SSA construction.
//!
//! The builder uses a closure-based API where all blocks are defined within a
//! single expression, making the CFG structure visually clear:
//!
//! ```rust,ignore
//! let ssa = SsaFunctionBuilder::new(1).build_with(|f| {
//!     let cond = f.arg(0);
//!
//!     f.block(0, |b| b.branch(cond, 1, 2));
//!     let one = f.block(1, |b| { let v = b.const_i32(1); b.jump(3); v });
//!     let two = f.block(2, |b| { let v = b.const_i32(2); b.jump(3); v });
//!     f.block(3, |b| {
//!         let merged = b.phi(&[(1, one), (2, two)]);
//!         b.ret_val(merged);
//!     });
//! });
//! ```
//!
//! Block closures may return a value, which is handy for threading variables
//! defined in one block into the phi nodes of another.

use std::collections::BTreeMap;

use crate::analysis::ssa::{
    ConstValue, DefSite, FieldRef, MethodRef, PhiNode, PhiOperand, SsaBlock, SsaFunction,
    SsaInstruction, SsaOp, SsaVarId, Token, VariableOrigin,
};

/// Builder for constructing SSA functions programmatically.
#[derive(Debug)]
pub struct SsaFunctionBuilder {
    func: SsaFunction,
    blocks: BTreeMap<usize, SsaBlock>,
}

impl SsaFunctionBuilder {
    /// Creates a builder for a function with `num_args` arguments
    /// (including the receiver of instance methods).
    #[must_use]
    pub fn new(num_args: usize) -> Self {
        Self {
            func: SsaFunction::new(num_args),
            blocks: BTreeMap::new(),
        }
    }

    /// Builds the function from a closure that defines all blocks.
    ///
    /// Block ids that were never defined become empty blocks.
    pub fn build_with<F>(mut self, f: F) -> SsaFunction
    where
        F: FnOnce(&mut SsaFunctionContext<'_>),
    {
        let mut ctx = SsaFunctionContext { builder: &mut self };
        f(&mut ctx);
        self.build()
    }

    fn build(mut self) -> SsaFunction {
        let max_id = self.blocks.keys().next_back().copied();
        if let Some(max_id) = max_id {
            for id in 0..=max_id {
                let block = self.blocks.remove(&id).unwrap_or_else(|| SsaBlock::new(id));
                self.func.add_block(block);
            }
        }
        self.func
    }
}

/// Context passed to the build closure for defining blocks.
pub struct SsaFunctionContext<'a> {
    builder: &'a mut SsaFunctionBuilder,
}

impl SsaFunctionContext<'_> {
    /// Returns the variable bound to argument `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index >= num_args`.
    #[must_use]
    pub fn arg(&self, index: usize) -> SsaVarId {
        assert!(index < self.builder.func.num_args(), "argument out of range");
        SsaVarId::new(index)
    }

    /// Allocates a variable without defining it, e.g. for a phi whose
    /// operands are only known later.
    #[must_use]
    pub fn var(&mut self) -> SsaVarId {
        self.builder
            .func
            .create_variable(VariableOrigin::Local, DefSite::entry())
    }

    /// Defines block `id`, returning whatever the closure returns.
    pub fn block<F, R>(&mut self, id: usize, f: F) -> R
    where
        F: FnOnce(&mut SsaBlockBuilder<'_>) -> R,
    {
        let mut block = SsaBlock::new(id);
        let result = {
            let mut block_builder = SsaBlockBuilder {
                func: &mut self.builder.func,
                block: &mut block,
            };
            f(&mut block_builder)
        };
        self.builder.blocks.insert(id, block);
        result
    }
}

/// Builder for constructing individual SSA blocks.
///
/// Operations that produce values return the allocated [`SsaVarId`].
pub struct SsaBlockBuilder<'a> {
    func: &'a mut SsaFunction,
    block: &'a mut SsaBlock,
}

impl SsaBlockBuilder<'_> {
    fn alloc(&mut self) -> SsaVarId {
        let site = DefSite::instruction(self.block.id(), self.block.instruction_count());
        self.func.create_variable(VariableOrigin::Local, site)
    }

    fn emit(&mut self, op: SsaOp) {
        self.block.add_instruction(SsaInstruction::synthetic(op));
    }

    fn emit_value<F>(&mut self, make: F) -> SsaVarId
    where
        F: FnOnce(SsaVarId) -> SsaOp,
    {
        let dest = self.alloc();
        self.emit(make(dest));
        dest
    }

    /// Adds: `dest = const value`
    pub fn const_val(&mut self, value: ConstValue) -> SsaVarId {
        self.emit_value(|dest| SsaOp::Const { dest, value })
    }

    /// Adds: `dest = const i32`
    pub fn const_i32(&mut self, value: i32) -> SsaVarId {
        self.const_val(ConstValue::I32(value))
    }

    /// Adds: `dest = const i64`
    pub fn const_i64(&mut self, value: i64) -> SsaVarId {
        self.const_val(ConstValue::I64(value))
    }

    /// Adds: `dest = const bool`
    pub fn const_bool(&mut self, value: bool) -> SsaVarId {
        self.const_val(ConstValue::Bool(value))
    }

    /// Adds: `dest = null`
    pub fn const_null(&mut self) -> SsaVarId {
        self.const_val(ConstValue::Null)
    }

    /// Adds: `dest = left + right`
    pub fn add(&mut self, left: SsaVarId, right: SsaVarId) -> SsaVarId {
        self.emit_value(|dest| SsaOp::Add { dest, left, right })
    }

    /// Adds: `dest = left - right`
    pub fn sub(&mut self, left: SsaVarId, right: SsaVarId) -> SsaVarId {
        self.emit_value(|dest| SsaOp::Sub { dest, left, right })
    }

    /// Adds: `dest = left * right`
    pub fn mul(&mut self, left: SsaVarId, right: SsaVarId) -> SsaVarId {
        self.emit_value(|dest| SsaOp::Mul { dest, left, right })
    }

    /// Adds: `dest = left == right`
    pub fn ceq(&mut self, left: SsaVarId, right: SsaVarId) -> SsaVarId {
        self.emit_value(|dest| SsaOp::Ceq { dest, left, right })
    }

    /// Adds: `dest = left < right`
    pub fn clt(&mut self, left: SsaVarId, right: SsaVarId) -> SsaVarId {
        self.emit_value(|dest| SsaOp::Clt { dest, left, right })
    }

    /// Adds: `dest = src`
    pub fn copy(&mut self, src: SsaVarId) -> SsaVarId {
        self.emit_value(|dest| SsaOp::Copy { dest, src })
    }

    /// Adds: `dest = object.field`
    pub fn load_field(&mut self, object: SsaVarId, field: FieldRef) -> SsaVarId {
        self.emit_value(|dest| SsaOp::LoadField {
            dest,
            object,
            field,
        })
    }

    /// Adds: `object.field = value`
    pub fn store_field(&mut self, object: SsaVarId, field: FieldRef, value: SsaVarId) {
        self.emit(SsaOp::StoreField {
            object,
            field,
            value,
        });
    }

    /// Adds: `dest = Class.field`
    pub fn load_static(&mut self, field: FieldRef) -> SsaVarId {
        self.emit_value(|dest| SsaOp::LoadStaticField { dest, field })
    }

    /// Adds: `Class.field = value`
    pub fn store_static(&mut self, field: FieldRef, value: SsaVarId) {
        self.emit(SsaOp::StoreStaticField { field, value });
    }

    /// Adds: `dest = array[index]`
    pub fn load_element(&mut self, array: SsaVarId, index: SsaVarId) -> SsaVarId {
        self.emit_value(|dest| SsaOp::LoadElement { dest, array, index })
    }

    /// Adds: `array[index] = value`
    pub fn store_element(&mut self, array: SsaVarId, index: SsaVarId, value: SsaVarId) {
        self.emit(SsaOp::StoreElement {
            array,
            index,
            value,
        });
    }

    /// Adds: `dest = new class`
    pub fn new_obj(&mut self, class: Token) -> SsaVarId {
        self.emit_value(|dest| SsaOp::NewObj { dest, class })
    }

    /// Adds: `dest = new [length]`
    pub fn new_arr(&mut self, length: SsaVarId) -> SsaVarId {
        self.emit_value(|dest| SsaOp::NewArr { dest, length })
    }

    /// Adds: `dest = call method(args)`
    pub fn call(&mut self, method: MethodRef, args: &[SsaVarId]) -> SsaVarId {
        let args = args.to_vec();
        self.emit_value(|dest| SsaOp::Call {
            dest: Some(dest),
            method,
            args,
        })
    }

    /// Adds: `call method(args)` with no result.
    pub fn call_void(&mut self, method: MethodRef, args: &[SsaVarId]) {
        self.emit(SsaOp::Call {
            dest: None,
            method,
            args: args.to_vec(),
        });
    }

    /// Adds: `monitor.enter object`
    pub fn monitor_enter(&mut self, object: SsaVarId) {
        self.emit(SsaOp::MonitorEnter { object });
    }

    /// Adds: `monitor.exit object`
    pub fn monitor_exit(&mut self, object: SsaVarId) {
        self.emit(SsaOp::MonitorExit { object });
    }

    /// Adds a full memory fence.
    pub fn fence(&mut self) {
        self.emit(SsaOp::MemoryBarrier);
    }

    /// Adds: `jump target`
    pub fn jump(&mut self, target: usize) {
        self.emit(SsaOp::Jump { target });
    }

    /// Adds: `branch condition, true_target, false_target`
    pub fn branch(&mut self, condition: SsaVarId, true_target: usize, false_target: usize) {
        self.emit(SsaOp::Branch {
            condition,
            true_target,
            false_target,
        });
    }

    /// Adds: `ret`
    pub fn ret(&mut self) {
        self.emit(SsaOp::Return { value: None });
    }

    /// Adds: `ret value`
    pub fn ret_val(&mut self, value: SsaVarId) {
        self.emit(SsaOp::Return { value: Some(value) });
    }

    /// Adds: `throw exception`
    pub fn throw(&mut self, exception: SsaVarId) {
        self.emit(SsaOp::Throw { exception });
    }

    /// Adds a phi node and returns its result.
    ///
    /// # Arguments
    ///
    /// * `operands` - Pairs of (predecessor_block_id, value) for each incoming edge
    pub fn phi(&mut self, operands: &[(usize, SsaVarId)]) -> SsaVarId {
        let result = self
            .func
            .create_variable(VariableOrigin::Phi, DefSite::phi(self.block.id()));
        let mut phi = PhiNode::new(result, VariableOrigin::Phi);
        for &(pred, value) in operands {
            phi.add_operand(PhiOperand::new(value, pred));
        }
        self.block.add_phi(phi);
        result
    }

    /// Adds a raw operation.
    pub fn op(&mut self, op: SsaOp) {
        self.emit(op);
    }

    /// Adds a `Nop`.
    pub fn nop(&mut self) {
        self.emit(SsaOp::Nop);
    }
}
