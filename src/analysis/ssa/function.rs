//! SSA function representation.
//!
//! An [`SsaFunction`] owns its blocks and its variable table. Block `0` is the
//! entry. Variable ids are indices into the table, so two clones of the same
//! function produce identical ids for identical rewrites, which keeps pass
//! output deterministic.

use std::{
    collections::{BTreeSet, HashMap, HashSet},
    fmt,
};

use crate::{
    analysis::ssa::{
        ConstValue, DefSite, SsaBlock, SsaInstruction, SsaOp, SsaVarId, SsaVariable,
        VariableOrigin,
    },
    Result,
};

/// A method body in SSA form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SsaFunction {
    blocks: Vec<SsaBlock>,
    variables: Vec<SsaVariable>,
    num_args: usize,
}

impl SsaFunction {
    /// Creates an empty function whose first `num_args` variables are its arguments.
    #[must_use]
    pub fn new(num_args: usize) -> Self {
        let mut func = Self {
            blocks: Vec::new(),
            variables: Vec::with_capacity(num_args),
            num_args,
        };
        for i in 0..num_args {
            // Argument counts are bounded by method signatures
            #[allow(clippy::cast_possible_truncation)]
            let idx = i as u16;
            func.create_variable(VariableOrigin::Argument(idx), DefSite::entry());
        }
        func
    }

    /// Returns the number of arguments.
    #[must_use]
    pub fn num_args(&self) -> usize {
        self.num_args
    }

    /// Returns the variable bound to argument `index`.
    #[must_use]
    pub fn argument(&self, index: usize) -> Option<SsaVarId> {
        (index < self.num_args).then(|| SsaVarId::new(index))
    }

    /// Returns the blocks.
    #[must_use]
    pub fn blocks(&self) -> &[SsaBlock] {
        &self.blocks
    }

    /// Returns the blocks mutably.
    pub fn blocks_mut(&mut self) -> &mut [SsaBlock] {
        &mut self.blocks
    }

    /// Returns block `index`.
    #[must_use]
    pub fn block(&self, index: usize) -> Option<&SsaBlock> {
        self.blocks.get(index)
    }

    /// Returns block `index` mutably.
    pub fn block_mut(&mut self, index: usize) -> Option<&mut SsaBlock> {
        self.blocks.get_mut(index)
    }

    /// Returns the number of blocks.
    #[must_use]
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Appends a block. Its id should equal its index.
    pub fn add_block(&mut self, block: SsaBlock) {
        self.blocks.push(block);
    }

    /// Returns the variable table.
    #[must_use]
    pub fn variables(&self) -> &[SsaVariable] {
        &self.variables
    }

    /// Returns the metadata of `id`.
    #[must_use]
    pub fn variable(&self, id: SsaVarId) -> Option<&SsaVariable> {
        self.variables.get(id.index())
    }

    /// Returns the number of variables.
    #[must_use]
    pub fn variable_count(&self) -> usize {
        self.variables.len()
    }

    /// Allocates a new variable.
    pub fn create_variable(&mut self, origin: VariableOrigin, def_site: DefSite) -> SsaVarId {
        let id = SsaVarId::new(self.variables.len());
        self.variables.push(SsaVariable::new(id, origin, def_site));
        id
    }

    /// Iterates over `(block, index, instruction)` for every instruction.
    pub fn iter_instructions(&self) -> impl Iterator<Item = (usize, usize, &SsaInstruction)> {
        self.blocks.iter().enumerate().flat_map(|(b, block)| {
            block
                .instructions()
                .iter()
                .enumerate()
                .map(move |(i, instr)| (b, i, instr))
        })
    }

    /// Returns the number of non-`Nop` instructions.
    #[must_use]
    pub fn instruction_count(&self) -> usize {
        self.iter_instructions()
            .filter(|(_, _, instr)| !instr.is_nop())
            .count()
    }

    /// Returns the current definition site of every defined variable.
    #[must_use]
    pub fn definitions(&self) -> HashMap<SsaVarId, DefSite> {
        let mut defs = HashMap::new();
        for i in 0..self.num_args {
            defs.insert(SsaVarId::new(i), DefSite::entry());
        }
        for (b, block) in self.blocks.iter().enumerate() {
            for phi in block.phi_nodes() {
                defs.insert(phi.result(), DefSite::phi(b));
            }
            for (i, instr) in block.instructions().iter().enumerate() {
                if let Some(dest) = instr.def() {
                    defs.insert(dest, DefSite::instruction(b, i));
                }
            }
        }
        defs
    }

    /// Returns the value of every variable defined by a `Const`.
    #[must_use]
    pub fn constants(&self) -> HashMap<SsaVarId, ConstValue> {
        self.iter_instructions()
            .filter_map(|(_, _, instr)| match instr.op() {
                SsaOp::Const { dest, value } => Some((*dest, *value)),
                _ => None,
            })
            .collect()
    }

    /// Counts how many times each variable is read, phi operands included.
    #[must_use]
    pub fn count_uses(&self) -> HashMap<SsaVarId, usize> {
        let mut counts = HashMap::new();
        for block in &self.blocks {
            for phi in block.phi_nodes() {
                for operand in phi.operands() {
                    *counts.entry(operand.value()).or_insert(0) += 1;
                }
            }
            for instr in block.instructions() {
                for var in instr.uses() {
                    *counts.entry(var).or_insert(0) += 1;
                }
            }
        }
        counts
    }

    /// Replaces every use of `old_var` with `new_var`, phi operands included.
    pub fn replace_uses(&mut self, old_var: SsaVarId, new_var: SsaVarId) -> usize {
        self.blocks
            .iter_mut()
            .map(|block| block.replace_uses(old_var, new_var))
            .sum()
    }

    /// Replaces the operation of an instruction in place.
    pub fn replace_instruction_op(&mut self, block: usize, index: usize, op: SsaOp) -> bool {
        match self
            .blocks
            .get_mut(block)
            .and_then(|b| b.instructions_mut().get_mut(index))
        {
            Some(instr) => {
                instr.set_op(op);
                true
            }
            None => false,
        }
    }

    /// Turns an instruction into a `Nop`. Indices of other instructions are unchanged.
    pub fn remove_instruction(&mut self, block: usize, index: usize) -> bool {
        self.replace_instruction_op(block, index, SsaOp::Nop)
    }

    /// Strips all `Nop` instructions, returning how many were removed.
    pub fn canonicalize(&mut self) -> usize {
        self.blocks.iter_mut().map(SsaBlock::strip_nops).sum()
    }

    /// Checks structural well-formedness.
    ///
    /// - block ids match their index
    /// - every non-empty block ends in exactly one terminator
    /// - branch targets exist
    /// - every variable is defined at most once and every used variable is defined
    /// - phi nodes have exactly one operand per distinct predecessor
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] describing the first violation found.
    pub fn validate(&self) -> Result<()> {
        let block_count = self.blocks.len();
        let mut preds: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); block_count];

        for (index, block) in self.blocks.iter().enumerate() {
            if block.id() != index {
                return Err(malformed_error!(
                    "block at index {} has id {}",
                    index,
                    block.id()
                ));
            }
            let instrs = block.instructions();
            for (i, instr) in instrs.iter().enumerate() {
                if instr.is_terminator() && i + 1 != instrs.len() {
                    return Err(malformed_error!(
                        "terminator in the middle of B{} at {}",
                        index,
                        i
                    ));
                }
            }
            if !instrs.is_empty() && block.terminator().is_none() {
                return Err(malformed_error!("B{} does not end in a terminator", index));
            }
            for succ in block.successors() {
                if succ >= block_count {
                    return Err(malformed_error!(
                        "B{} branches to missing block B{}",
                        index,
                        succ
                    ));
                }
                preds[succ].insert(index);
            }
        }

        let mut defined: HashSet<SsaVarId> = (0..self.num_args).map(SsaVarId::new).collect();
        for block in &self.blocks {
            for var in block.defined_variables() {
                if var.index() >= self.variables.len() {
                    return Err(malformed_error!("{} is not in the variable table", var));
                }
                if !defined.insert(var) {
                    return Err(malformed_error!("{} is defined more than once", var));
                }
            }
        }

        for (index, block) in self.blocks.iter().enumerate() {
            for phi in block.phi_nodes() {
                let incoming: BTreeSet<usize> =
                    phi.operands().iter().map(|o| o.predecessor()).collect();
                if incoming != preds[index] || phi.operand_count() != incoming.len() {
                    return Err(malformed_error!(
                        "phi {} in B{} does not match predecessors {:?}",
                        phi.result(),
                        index,
                        preds[index]
                    ));
                }
                for var in phi.used_variables() {
                    if !defined.contains(&var) {
                        return Err(malformed_error!("phi in B{} uses undefined {}", index, var));
                    }
                }
            }
            for instr in block.instructions() {
                for var in instr.uses() {
                    if !defined.contains(&var) {
                        return Err(malformed_error!(
                            "'{}' in B{} uses undefined {}",
                            instr,
                            index,
                            var
                        ));
                    }
                }
            }
        }

        Ok(())
    }

    /// Returns `true` if [`validate`](Self::validate) succeeds.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }
}

impl fmt::Display for SsaFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for block in &self.blocks {
            write!(f, "{block}")?;
        }
        Ok(())
    }
}
