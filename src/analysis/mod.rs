//! Program analysis infrastructure.
//!
//! This module provides the IR and the memory analyses that the optimization
//! passes in [`crate::compiler`] are built on. It builds upon the generic graph
//! infrastructure in [`crate::utils::graph`].
//!
//! # Architecture
//!
//! - [`ssa`] - SSA form, the builder and the control flow graph view
//! - `heap` - Abstract heap locations and how two locations relate
//! - `escape` - Which allocations stay private to the method
//! - `barrier` - Memory-ordering effect of each operation
//!
//! # Usage
//!
//! ```rust
//! use lsekit::analysis::{
//!     EscapeAnalysis, FieldFlags, FieldRef, HeapLocationModel, Relation, SsaFunctionBuilder,
//!     Token,
//! };
//!
//! let field = FieldRef::new(Token::from_parts(Token::FIELD, 1), FieldFlags::empty());
//! let ssa = SsaFunctionBuilder::new(1).build_with(|f| {
//!     let param = f.arg(0);
//!     f.block(0, |b| {
//!         let obj = b.new_obj(Token::from_parts(Token::CLASS, 1));
//!         let v = b.load_field(obj, field);
//!         let w = b.load_field(param, field);
//!         let sum = b.add(v, w);
//!         b.ret_val(sum);
//!     });
//! });
//!
//! let escape = EscapeAnalysis::compute(&ssa);
//! let model = HeapLocationModel::new(&ssa, &escape);
//! let locs: Vec<_> = ssa
//!     .iter_instructions()
//!     .filter_map(|(_, _, instr)| model.location_of(instr.op()))
//!     .collect();
//! assert_eq!(model.relation_of(&locs[0], &locs[1]), Relation::Distinct);
//! ```

mod barrier;
mod escape;
mod heap;
pub mod ssa;

// Re-export primary types at module level
pub use barrier::{barrier_of, barrier_subject, BarrierKind};
pub use escape::{EscapeAnalysis, EscapeStatus};
pub(crate) use heap::is_default_value;
pub use heap::{
    HeapLocation, HeapLocationModel, IndexKind, LocationBase, LocationDescriptor, Relation,
};
pub use ssa::{
    ConstValue, DefSite, FieldFlags, FieldRef, MethodRef, OpKind, PhiNode, PhiOperand, SsaBlock,
    SsaBlockBuilder, SsaCfg, SsaFunction, SsaFunctionBuilder, SsaFunctionContext, SsaInstruction,
    SsaOp, SsaVarId, SsaVariable, Token, VariableOrigin,
};
