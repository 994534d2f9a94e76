//! SSA interpreter.
//!
//! Executes an [`SsaFunction`] on a single thread. Monitor operations and
//! fences order nothing on one thread and are no-ops; volatile accesses
//! behave like plain ones.

use std::collections::HashMap;

use log::trace;

use crate::{
    analysis::{SsaFunction, SsaOp, SsaVarId, Token},
    emulation::{
        heap::Heap,
        value::{Observation, ObservedValue, Value},
    },
    unit::CompilationUnit,
    Error, Result,
};

/// Execution limits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionLimits {
    /// Maximum instructions executed across all frames (default: 100,000).
    pub max_steps: usize,

    /// Maximum call depth (default: 64).
    pub max_call_depth: usize,

    /// Maximum number of heap objects (default: 10,000).
    pub max_heap_objects: usize,
}

impl Default for ExecutionLimits {
    fn default() -> Self {
        Self {
            max_steps: 100_000,
            max_call_depth: 64,
            max_heap_objects: 10_000,
        }
    }
}

/// How a method finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The method returned, with a value unless it is void.
    Returned(Option<Value>),
    /// The method threw.
    Threw(Value),
}

/// Interpreter for SSA functions.
///
/// Calls are resolved through the compilation unit when one is given. A
/// call to a method without a body, or any call without a unit, is opaque:
/// it has no effect and returns zero.
///
/// # Example
///
/// ```rust
/// use lsekit::analysis::{FieldFlags, FieldRef, SsaFunctionBuilder, Token};
/// use lsekit::emulation::{Interpreter, Outcome, Value};
///
/// let field = FieldRef::new(Token::from_parts(Token::FIELD, 1), FieldFlags::empty());
/// let ssa = SsaFunctionBuilder::new(1).build_with(|f| {
///     let obj = f.arg(0);
///     f.block(0, |b| {
///         let two = b.const_i32(2);
///         b.store_field(obj, field, two);
///         let v = b.load_field(obj, field);
///         b.ret_val(v);
///     });
/// });
///
/// let mut interp = Interpreter::default();
/// let obj = interp.alloc_instance(Token::from_parts(Token::CLASS, 1)).unwrap();
/// let outcome = interp.run(&ssa, &[obj]).unwrap();
/// assert_eq!(outcome, Outcome::Returned(Some(Value::Int(2))));
/// ```
#[derive(Debug)]
pub struct Interpreter<'a> {
    unit: Option<&'a CompilationUnit>,
    limits: ExecutionLimits,
    heap: Heap,
    steps: usize,
}

impl Default for Interpreter<'_> {
    fn default() -> Self {
        Self::new(ExecutionLimits::default())
    }
}

impl<'a> Interpreter<'a> {
    /// Creates an interpreter without a unit; every call is opaque.
    #[must_use]
    pub fn new(limits: ExecutionLimits) -> Self {
        Self {
            unit: None,
            heap: Heap::new(limits.max_heap_objects),
            limits,
            steps: 0,
        }
    }

    /// Creates an interpreter that resolves calls through `unit`.
    #[must_use]
    pub fn with_unit(unit: &'a CompilationUnit, limits: ExecutionLimits) -> Self {
        Self {
            unit: Some(unit),
            ..Self::new(limits)
        }
    }

    /// Returns the heap.
    #[must_use]
    pub fn heap(&self) -> &Heap {
        &self.heap
    }

    /// Returns the number of instructions executed so far.
    #[must_use]
    pub fn steps(&self) -> usize {
        self.steps
    }

    /// Allocates an object, e.g. to pass as an argument.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Interpreter`] when the heap is full.
    pub fn alloc_instance(&mut self, class: Token) -> Result<Value> {
        self.heap.alloc_instance(class)
    }

    /// Allocates a zeroed array, e.g. to pass as an argument.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Interpreter`] for a negative length or a full heap.
    pub fn alloc_array(&mut self, length: i64) -> Result<Value> {
        self.heap.alloc_array(length)
    }

    /// Executes `ssa` with `args`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Interpreter`] on a null dereference, an out-of-bounds
    /// index, a type mismatch, an undefined variable or an exceeded limit.
    pub fn run(&mut self, ssa: &SsaFunction, args: &[Value]) -> Result<Outcome> {
        self.execute(ssa, args, 0)
    }

    /// Executes `ssa` and returns what the caller can observe afterwards.
    ///
    /// # Errors
    ///
    /// See [`run`](Self::run).
    pub fn observe(&mut self, ssa: &SsaFunction, args: &[Value]) -> Result<Observation> {
        let outcome = self.run(ssa, args)?;
        Ok(self.observation(outcome, args))
    }

    /// Canonicalizes the state after `outcome` as seen from the caller.
    #[must_use]
    pub fn observation(&self, outcome: Outcome, args: &[Value]) -> Observation {
        let statics: Vec<_> = self
            .heap
            .statics()
            .iter()
            .filter(|(_, value)| **value != Value::ZERO)
            .map(|(field, value)| (*field, *value))
            .collect();

        let mut roots = Vec::with_capacity(1 + statics.len() + args.len());
        roots.push(match outcome {
            Outcome::Returned(value) => value.unwrap_or(Value::Null),
            Outcome::Threw(value) => value,
        });
        roots.extend(statics.iter().map(|(_, value)| *value));
        roots.extend_from_slice(args);

        let (observed, objects) = self.heap.observe(&roots);
        let first = observed.first().copied().unwrap_or(ObservedValue::Null);
        let (returned, thrown) = match outcome {
            Outcome::Returned(Some(_)) => (Some(first), None),
            Outcome::Returned(None) => (None, None),
            Outcome::Threw(_) => (None, Some(first)),
        };

        Observation {
            returned,
            thrown,
            statics: statics
                .iter()
                .map(|(field, _)| *field)
                .zip(observed.iter().skip(1).copied())
                .collect(),
            arguments: observed.iter().skip(1 + statics.len()).copied().collect(),
            objects,
        }
    }

    fn execute(&mut self, ssa: &SsaFunction, args: &[Value], depth: usize) -> Result<Outcome> {
        if depth > self.limits.max_call_depth {
            return Err(Error::Interpreter(format!(
                "call depth limit of {} exceeded",
                self.limits.max_call_depth
            )));
        }
        if args.len() != ssa.num_args() {
            return Err(Error::Interpreter(format!(
                "expected {} arguments, got {}",
                ssa.num_args(),
                args.len()
            )));
        }

        let mut frame = Frame::default();
        for (index, value) in args.iter().enumerate() {
            frame.set(SsaVarId::new(index), *value);
        }

        let mut current = 0;
        let mut previous: Option<usize> = None;

        loop {
            let block = ssa
                .block(current)
                .ok_or_else(|| Error::Interpreter(format!("missing block B{current}")))?;

            if let Some(pred) = previous {
                // Phis read their operands before any of them is written
                let mut incoming = Vec::with_capacity(block.phi_count());
                for phi in block.phi_nodes() {
                    let operand = phi.operand_from(pred).ok_or_else(|| {
                        Error::Interpreter(format!("{} has no operand from B{pred}", phi.result()))
                    })?;
                    incoming.push((phi.result(), frame.get(operand.value())?));
                }
                for (var, value) in incoming {
                    frame.set(var, value);
                }
            }

            let mut next = None;
            for instr in block.instructions() {
                self.steps += 1;
                if self.steps > self.limits.max_steps {
                    return Err(Error::Interpreter(format!(
                        "step limit of {} exceeded",
                        self.limits.max_steps
                    )));
                }

                match self.step(instr.op(), &mut frame, depth)? {
                    Flow::Continue => {}
                    Flow::Goto(target) => {
                        next = Some(target);
                        break;
                    }
                    Flow::Exit(outcome) => return Ok(outcome),
                }
            }

            let Some(target) = next else {
                return Err(Error::Interpreter(format!("fell off the end of B{current}")));
            };
            previous = Some(current);
            current = target;
        }
    }

    fn step(&mut self, op: &SsaOp, frame: &mut Frame, depth: usize) -> Result<Flow> {
        match op {
            SsaOp::Const { dest, value } => frame.set(*dest, (*value).into()),
            SsaOp::Add { dest, left, right } => {
                let value = frame.int(*left)?.wrapping_add(frame.int(*right)?);
                frame.set(*dest, Value::Int(value));
            }
            SsaOp::Sub { dest, left, right } => {
                let value = frame.int(*left)?.wrapping_sub(frame.int(*right)?);
                frame.set(*dest, Value::Int(value));
            }
            SsaOp::Mul { dest, left, right } => {
                let value = frame.int(*left)?.wrapping_mul(frame.int(*right)?);
                frame.set(*dest, Value::Int(value));
            }
            SsaOp::Ceq { dest, left, right } => {
                let (l, r) = (frame.get(*left)?, frame.get(*right)?);
                let equal = match (l.as_int(), r.as_int()) {
                    (Some(a), Some(b)) => a == b,
                    _ => l == r,
                };
                frame.set(*dest, Value::Bool(equal));
            }
            SsaOp::Clt { dest, left, right } => {
                let less = frame.int(*left)? < frame.int(*right)?;
                frame.set(*dest, Value::Bool(less));
            }
            SsaOp::Copy { dest, src } => {
                let value = frame.get(*src)?;
                frame.set(*dest, value);
            }

            SsaOp::LoadField {
                dest,
                object,
                field,
            } => {
                let value = self.heap.load_field(frame.get(*object)?, field.token())?;
                frame.set(*dest, value);
            }
            SsaOp::StoreField {
                object,
                field,
                value,
            } => {
                self.heap
                    .store_field(frame.get(*object)?, field.token(), frame.get(*value)?)?;
            }
            SsaOp::LoadStaticField { dest, field } => {
                frame.set(*dest, self.heap.load_static(field.token()));
            }
            SsaOp::StoreStaticField { field, value } => {
                self.heap.store_static(field.token(), frame.get(*value)?);
            }
            SsaOp::LoadElement { dest, array, index } => {
                let value = self
                    .heap
                    .load_element(frame.get(*array)?, frame.get(*index)?)?;
                frame.set(*dest, value);
            }
            SsaOp::StoreElement {
                array,
                index,
                value,
            } => {
                self.heap
                    .store_element(frame.get(*array)?, frame.get(*index)?, frame.get(*value)?)?;
            }

            SsaOp::NewObj { dest, class } => {
                let reference = self.heap.alloc_instance(*class)?;
                frame.set(*dest, reference);
            }
            SsaOp::NewArr { dest, length } => {
                let reference = self.heap.alloc_array(frame.int(*length)?)?;
                frame.set(*dest, reference);
            }

            SsaOp::Call { dest, method, args } => {
                let values = args
                    .iter()
                    .map(|arg| frame.get(*arg))
                    .collect::<Result<Vec<_>>>()?;
                let body = self
                    .unit
                    .and_then(|unit| unit.method(method.token()))
                    .and_then(|def| def.body.as_ref());

                let result = match body {
                    Some(body) => match self.execute(body, &values, depth + 1)? {
                        Outcome::Returned(value) => value,
                        thrown @ Outcome::Threw(_) => return Ok(Flow::Exit(thrown)),
                    },
                    None => {
                        trace!("opaque call to {method}");
                        Some(Value::ZERO)
                    }
                };
                if let Some(dest) = dest {
                    frame.set(*dest, result.unwrap_or(Value::ZERO));
                }
            }

            SsaOp::MonitorEnter { object } | SsaOp::MonitorExit { object } => {
                if frame.get(*object)? == Value::Null {
                    return Err(Error::Interpreter("monitor on null".to_string()));
                }
            }
            SsaOp::MemoryBarrier | SsaOp::Nop => {}

            SsaOp::Jump { target } => return Ok(Flow::Goto(*target)),
            SsaOp::Branch {
                condition,
                true_target,
                false_target,
            } => {
                let target = if frame.get(*condition)?.is_truthy() {
                    *true_target
                } else {
                    *false_target
                };
                return Ok(Flow::Goto(target));
            }
            SsaOp::Return { value } => {
                let value = value.map(|v| frame.get(v)).transpose()?;
                return Ok(Flow::Exit(Outcome::Returned(value)));
            }
            SsaOp::Throw { exception } => {
                return Ok(Flow::Exit(Outcome::Threw(frame.get(*exception)?)));
            }
        }
        Ok(Flow::Continue)
    }
}

/// What to do after an instruction.
enum Flow {
    Continue,
    Goto(usize),
    Exit(Outcome),
}

/// Variable values of one activation.
#[derive(Default)]
struct Frame {
    values: HashMap<SsaVarId, Value>,
}

impl Frame {
    fn get(&self, var: SsaVarId) -> Result<Value> {
        self.values
            .get(&var)
            .copied()
            .ok_or_else(|| Error::Interpreter(format!("{var} read before definition")))
    }

    fn int(&self, var: SsaVarId) -> Result<i64> {
        let value = self.get(var)?;
        value
            .as_int()
            .ok_or_else(|| Error::Interpreter(format!("{var} = {value} is not an integer")))
    }

    fn set(&mut self, var: SsaVarId, value: Value) {
        self.values.insert(var, value);
    }
}
