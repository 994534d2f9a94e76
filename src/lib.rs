// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
#![deny(unsafe_code)]

//! # lsekit
//!
//! Barrier-aware load/store elimination for an SSA intermediate
//! representation, together with the analyses it is built on and a pass
//! pipeline to run it.
//!
//! The pass removes heap loads whose value is already known, stores that are
//! overwritten or never observed, and monitor operations on objects that
//! never leave the method. It does so without breaking the ordering that
//! volatile accesses, monitors and fences promise to other threads: an
//! acquire forgets what is known about shared memory, and no store to shared
//! memory is dropped across a release.
//!
//! ## Features
//!
//! - **🧱 SSA IR** - Blocks, phis and decomposed operations with validation and a builder
//! - **🔍 Escape analysis** - Allocations that stay private to a method are singletons
//! - **📍 Heap locations** - Field and element identity with same/distinct/may-alias queries
//! - **🔒 Barrier classification** - Acquire, release and full fences per operation
//! - **⚡ Load/store elimination** - Forwarding, dead store removal, phi insertion, lock elision
//! - **🧩 Pipeline** - Inlining, elimination and dead code removal run to fixpoint in parallel
//! - **✅ Checker** - `CHECK` directives against IR snapshots taken before and after each pass
//!
//! ## Quick Start
//!
//! ```rust
//! use lsekit::analysis::{FieldFlags, SsaFunctionBuilder, Token};
//! use lsekit::compiler::{compile, PipelineConfig};
//! use lsekit::{CompilationUnit, MethodFlags};
//!
//! let mut unit = CompilationUnit::new();
//! let class = unit.add_class("TestClass");
//! let j = unit.add_field(class, "j", FieldFlags::empty());
//!
//! // synchronized (obj) { obj.j = 1; obj.j = 2; } on a fresh object
//! let body = SsaFunctionBuilder::new(0).build_with(|f| {
//!     f.block(0, |b| {
//!         let obj = b.new_obj(class);
//!         b.monitor_enter(obj);
//!         let one = b.const_i32(1);
//!         let two = b.const_i32(2);
//!         b.store_field(obj, j, one);
//!         b.store_field(obj, j, two);
//!         b.monitor_exit(obj);
//!         let v = b.load_field(obj, j);
//!         b.ret_val(v);
//!     });
//! });
//! unit.add_method("Main.locked", MethodFlags::STATIC, body);
//!
//! let result = compile(unit, &PipelineConfig::default())?;
//! result.checker().run_script(
//!     "CHECK-START: Main.locked load_store_elimination (after)
//!      CHECK-NOT: MonitorOperation
//!      CHECK-NOT: InstanceFieldSet
//!      CHECK-NOT: InstanceFieldGet",
//! )?;
//! # Ok::<(), lsekit::Error>(())
//! ```
//!
//! ## Architecture
//!
//! - [`analysis`] - SSA form, heap location model, escape analysis, barrier classifier
//! - [`compiler`] - Passes, scheduler, events, configuration and the checker
//! - [`emulation`] - Reference interpreter used to check that optimizations preserve behavior
//! - [`utils`] - Generic graph traits and algorithms
//! - [`Error`] and [`Result`] - Error handling

#[macro_use]
pub(crate) mod error;

pub mod analysis;
pub mod compiler;
pub mod emulation;
pub mod utils;

mod unit;

/// `lsekit` Result type
///
/// A type alias for `std::result::Result<T, Error>` where the error type is
/// always [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// `lsekit` Error type
///
/// The main error type for all operations in this crate: malformed input
/// IR, pass failures, checker mismatches and interpreter faults.
///
/// # Examples
///
/// ```rust
/// use lsekit::{analysis::SsaFunctionBuilder, Error};
///
/// // A block without a terminator is rejected
/// let ssa = SsaFunctionBuilder::new(0).build_with(|f| {
///     f.block(0, |b| {
///         let _ = b.const_i32(1);
///     });
/// });
/// match ssa.validate() {
///     Err(Error::Malformed { message, .. }) => println!("Malformed: {}", message),
///     other => panic!("unexpected {other:?}"),
/// }
/// ```
pub use error::Error;

/// The symbol tables a pipeline run works on.
///
/// See [`CompilationUnit`] for building classes, fields and methods.
pub use unit::{ClassDef, CompilationUnit, FieldDef, MethodDef, MethodFlags};
