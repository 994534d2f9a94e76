//! Reference execution of SSA functions.
//!
//! This module provides a small single-threaded interpreter for the SSA form
//! in [`crate::analysis`]. It is the oracle for checking optimizations: a
//! method and its optimized version, run on the same inputs, must produce
//! the same [`Observation`].
//!
//! # Key Components
//!
//! - [`Interpreter`] - Executes a function, resolving calls through an optional unit
//! - [`Heap`] - Instances, zeroed arrays and static fields
//! - [`Value`] - Runtime values
//! - [`Observation`] - Returned value, statics, arguments and reachable objects,
//!   independent of allocation order
//!
//! # Usage
//!
//! ```rust
//! use lsekit::analysis::{FieldFlags, FieldRef, SsaFunction, SsaFunctionBuilder, Token};
//! use lsekit::compiler::{passes::eliminate, EventLog, LseConfig};
//! use lsekit::emulation::Interpreter;
//!
//! let field = FieldRef::new(Token::from_parts(Token::FIELD, 1), FieldFlags::empty());
//! let original = SsaFunctionBuilder::new(1).build_with(|f| {
//!     let obj = f.arg(0);
//!     f.block(0, |b| {
//!         let one = b.const_i32(1);
//!         let two = b.const_i32(2);
//!         b.store_field(obj, field, one);
//!         b.store_field(obj, field, two);
//!         let v = b.load_field(obj, field);
//!         b.ret_val(v);
//!     });
//! });
//!
//! let mut optimized = original.clone();
//! let method = Token::from_parts(Token::METHOD, 1);
//! eliminate(&mut optimized, method, &LseConfig::default(), &EventLog::new()).unwrap();
//!
//! let observe = |ssa: &SsaFunction| {
//!     let mut interp = Interpreter::default();
//!     let obj = interp.alloc_instance(Token::from_parts(Token::CLASS, 1)).unwrap();
//!     interp.observe(ssa, &[obj]).unwrap()
//! };
//! assert_eq!(observe(&original), observe(&optimized));
//! ```

mod heap;
mod interpreter;
mod value;

pub use heap::{Heap, HeapObject};
pub use interpreter::{ExecutionLimits, Interpreter, Outcome};
pub use value::{Observation, ObservedObject, ObservedValue, Value};
