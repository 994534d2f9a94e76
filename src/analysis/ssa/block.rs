//! SSA basic blocks.

use std::fmt;

use crate::analysis::ssa::{PhiNode, SsaInstruction, SsaVarId};

/// A basic block in SSA form: phi nodes followed by instructions, the last
/// of which is a terminator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SsaBlock {
    id: usize,
    phi_nodes: Vec<PhiNode>,
    instructions: Vec<SsaInstruction>,
}

impl SsaBlock {
    /// Creates an empty block.
    #[must_use]
    pub fn new(id: usize) -> Self {
        Self {
            id,
            phi_nodes: Vec::new(),
            instructions: Vec::new(),
        }
    }

    /// Returns the block index.
    #[must_use]
    pub const fn id(&self) -> usize {
        self.id
    }

    /// Returns the phi nodes.
    #[must_use]
    pub fn phi_nodes(&self) -> &[PhiNode] {
        &self.phi_nodes
    }

    /// Returns the phi nodes mutably.
    pub fn phi_nodes_mut(&mut self) -> &mut Vec<PhiNode> {
        &mut self.phi_nodes
    }

    /// Returns the instructions.
    #[must_use]
    pub fn instructions(&self) -> &[SsaInstruction] {
        &self.instructions
    }

    /// Returns the instructions mutably.
    pub fn instructions_mut(&mut self) -> &mut Vec<SsaInstruction> {
        &mut self.instructions
    }

    /// Appends a phi node.
    pub fn add_phi(&mut self, phi: PhiNode) {
        self.phi_nodes.push(phi);
    }

    /// Appends an instruction.
    pub fn add_instruction(&mut self, instr: SsaInstruction) {
        self.instructions.push(instr);
    }

    /// Returns the number of phi nodes.
    #[must_use]
    pub fn phi_count(&self) -> usize {
        self.phi_nodes.len()
    }

    /// Returns the number of instructions, `Nop`s included.
    #[must_use]
    pub fn instruction_count(&self) -> usize {
        self.instructions.len()
    }

    /// Returns the terminating instruction, if the block has one.
    #[must_use]
    pub fn terminator(&self) -> Option<&SsaInstruction> {
        self.instructions.last().filter(|i| i.is_terminator())
    }

    /// Returns the successor block indices named by the terminator.
    #[must_use]
    pub fn successors(&self) -> Vec<usize> {
        self.terminator()
            .map(|t| t.op().successors())
            .unwrap_or_default()
    }

    /// Returns all variables defined in this block (phi results first).
    #[must_use]
    pub fn defined_variables(&self) -> Vec<SsaVarId> {
        self.phi_nodes
            .iter()
            .map(PhiNode::result)
            .chain(self.instructions.iter().filter_map(SsaInstruction::def))
            .collect()
    }

    /// Replaces every use of `old` with `new` in this block.
    pub fn replace_uses(&mut self, old: SsaVarId, new: SsaVarId) -> usize {
        let phis: usize = self
            .phi_nodes
            .iter_mut()
            .map(|phi| phi.replace_uses(old, new))
            .sum();
        let instrs: usize = self
            .instructions
            .iter_mut()
            .map(|instr| instr.op_mut().replace_uses(old, new))
            .sum();
        phis + instrs
    }

    /// Removes `Nop` instructions, returning how many were dropped.
    pub fn strip_nops(&mut self) -> usize {
        let before = self.instructions.len();
        self.instructions.retain(|i| !i.is_nop());
        before - self.instructions.len()
    }
}

impl fmt::Display for SsaBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "B{}:", self.id)?;
        for phi in &self.phi_nodes {
            writeln!(f, "  {phi}")?;
        }
        for instr in &self.instructions {
            writeln!(f, "  {instr}")?;
        }
        Ok(())
    }
}
