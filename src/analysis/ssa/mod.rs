//! Static Single Assignment (SSA) form for method bodies.
//!
//! Every variable is assigned exactly once, control flow joins merge values
//! through phi nodes, and heap memory is only touched by explicit field,
//! static field and array element operations. That last property is what the
//! memory analyses in [`crate::analysis`] build on.
//!
//! # Architecture
//!
//! The SSA module is organized into focused sub-modules:
//!
//! - `variable` - SSA variable identifiers and definition sites
//! - `phi` - Phi node representation for control flow merges
//! - `instruction` - Instructions wrapping a decomposed [`SsaOp`]
//! - `block` - Basic blocks containing phi nodes and instructions
//! - `function` - A complete method body with validation
//! - `builder` - Closure-based construction of functions for passes and tests
//! - `cfg` - Control flow graph snapshot implementing the graph traits
//! - `types` - Tokens and field/method references
//! - `value` - Compile-time constants
//! - `ops` - Decomposed SSA operations
//!
//! # Usage
//!
//! ```rust
//! use lsekit::analysis::{SsaCfg, SsaFunctionBuilder};
//!
//! let ssa = SsaFunctionBuilder::new(1).build_with(|f| {
//!     let cond = f.arg(0);
//!     f.block(0, |b| b.branch(cond, 1, 2));
//!     let one = f.block(1, |b| {
//!         let v = b.const_i32(1);
//!         b.jump(3);
//!         v
//!     });
//!     let two = f.block(2, |b| {
//!         let v = b.const_i32(2);
//!         b.jump(3);
//!         v
//!     });
//!     f.block(3, |b| {
//!         let merged = b.phi(&[(1, one), (2, two)]);
//!         b.ret_val(merged);
//!     });
//! });
//!
//! let cfg = SsaCfg::from_ssa(&ssa);
//! assert_eq!(cfg.block_predecessors(3), &[1, 2]);
//! assert!(ssa.validate().is_ok());
//! ```

mod block;
mod builder;
mod cfg;
mod function;
mod instruction;
mod ops;
mod phi;
mod types;
mod value;
mod variable;

// Re-export primary types at module level
pub use block::SsaBlock;
pub use builder::{SsaBlockBuilder, SsaFunctionBuilder, SsaFunctionContext};
pub use cfg::SsaCfg;
pub use function::SsaFunction;
pub use instruction::SsaInstruction;
pub use ops::{OpKind, SsaOp};
pub use phi::{PhiNode, PhiOperand};
pub use types::{FieldFlags, FieldRef, MethodRef, Token};
pub use value::ConstValue;
pub use variable::{DefSite, SsaVarId, SsaVariable, VariableOrigin};
