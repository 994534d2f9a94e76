//! Phi nodes for SSA form.
//!
//! A phi node selects a value based on the predecessor block control arrived
//! from: `v3 = phi(v1 from B1, v2 from B2)`. Phi nodes sit at the head of a
//! block and conceptually execute simultaneously on block entry.

use std::fmt;

use crate::analysis::ssa::{SsaVarId, VariableOrigin};

/// One incoming value of a phi node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PhiOperand {
    value: SsaVarId,
    predecessor: usize,
}

impl PhiOperand {
    /// Creates an operand flowing in from `predecessor`.
    #[must_use]
    pub const fn new(value: SsaVarId, predecessor: usize) -> Self {
        Self { value, predecessor }
    }

    /// Returns the incoming value.
    #[must_use]
    pub const fn value(&self) -> SsaVarId {
        self.value
    }

    /// Returns the predecessor block index.
    #[must_use]
    pub const fn predecessor(&self) -> usize {
        self.predecessor
    }
}

impl fmt::Display for PhiOperand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} from B{}", self.value, self.predecessor)
    }
}

/// A phi node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhiNode {
    result: SsaVarId,
    origin: VariableOrigin,
    operands: Vec<PhiOperand>,
}

impl PhiNode {
    /// Creates a phi node with no operands.
    #[must_use]
    pub fn new(result: SsaVarId, origin: VariableOrigin) -> Self {
        Self {
            result,
            origin,
            operands: Vec::new(),
        }
    }

    /// Returns the variable the phi defines.
    #[must_use]
    pub const fn result(&self) -> SsaVarId {
        self.result
    }

    /// Returns the origin of the result variable.
    #[must_use]
    pub const fn origin(&self) -> VariableOrigin {
        self.origin
    }

    /// Returns the incoming operands.
    #[must_use]
    pub fn operands(&self) -> &[PhiOperand] {
        &self.operands
    }

    /// Returns the number of operands.
    #[must_use]
    pub fn operand_count(&self) -> usize {
        self.operands.len()
    }

    /// Appends an operand.
    pub fn add_operand(&mut self, operand: PhiOperand) {
        self.operands.push(operand);
    }

    /// Returns the operand flowing in from `predecessor`.
    #[must_use]
    pub fn operand_from(&self, predecessor: usize) -> Option<&PhiOperand> {
        self.operands
            .iter()
            .find(|op| op.predecessor == predecessor)
    }

    /// Returns the variables this phi reads.
    #[must_use]
    pub fn used_variables(&self) -> Vec<SsaVarId> {
        self.operands.iter().map(PhiOperand::value).collect()
    }

    /// Replaces incoming uses of `old` with `new`, returning the number replaced.
    pub fn replace_uses(&mut self, old: SsaVarId, new: SsaVarId) -> usize {
        let mut count = 0;
        for operand in &mut self.operands {
            if operand.value == old {
                operand.value = new;
                count += 1;
            }
        }
        count
    }

    /// Returns the single distinct incoming value ignoring self references,
    /// if the phi is trivial.
    #[must_use]
    pub fn trivial_value(&self) -> Option<SsaVarId> {
        let mut unique = None;
        for operand in &self.operands {
            if operand.value == self.result {
                continue;
            }
            match unique {
                None => unique = Some(operand.value),
                Some(v) if v == operand.value => {}
                Some(_) => return None,
            }
        }
        unique
    }
}

impl fmt::Display for PhiNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} = phi(", self.result)?;
        for (i, operand) in self.operands.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{operand}")?;
        }
        f.write_str(")")
    }
}
