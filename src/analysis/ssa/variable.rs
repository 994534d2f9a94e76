//! SSA variable representation and identifiers.
//!
//! Each SSA variable is assigned exactly once. Variables are identified by an
//! index ([`SsaVarId`]) into the owning function's variable table, so ids are
//! dense, deterministic and stable across clones of the same function.
//!
//! # Variable Origins
//!
//! - **Arguments** - method parameters, defined at function entry
//! - **Locals** - values produced by instructions
//! - **Phi** - merge values created at control flow joins
//! - **Inlined** - values copied out of an inlined callee

use std::fmt;

/// Identifier of an SSA variable: its index in [`crate::analysis::SsaFunction`].
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SsaVarId(usize);

impl SsaVarId {
    /// Creates a variable id from its table index.
    #[must_use]
    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    /// Returns the table index.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Debug for SsaVarId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

impl fmt::Display for SsaVarId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// Where a variable came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VariableOrigin {
    /// Method argument with the given index.
    Argument(u16),
    /// Result of an ordinary instruction.
    Local,
    /// Result of a phi node.
    Phi,
    /// Copied from the body of the inlined method.
    Inlined(u32),
}

/// The program point that defines a variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DefSite {
    /// Block containing the definition.
    pub block: usize,
    /// Instruction index within the block, or `None` for phi nodes and arguments.
    pub instruction: Option<usize>,
}

impl DefSite {
    /// Definition by an instruction.
    #[must_use]
    pub const fn instruction(block: usize, instruction: usize) -> Self {
        Self {
            block,
            instruction: Some(instruction),
        }
    }

    /// Definition by a phi node at the head of `block`.
    #[must_use]
    pub const fn phi(block: usize) -> Self {
        Self {
            block,
            instruction: None,
        }
    }

    /// Definition at function entry (arguments).
    #[must_use]
    pub const fn entry() -> Self {
        Self::phi(0)
    }
}

/// Metadata for one SSA variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SsaVariable {
    id: SsaVarId,
    origin: VariableOrigin,
    def_site: DefSite,
}

impl SsaVariable {
    /// Creates variable metadata.
    #[must_use]
    pub const fn new(id: SsaVarId, origin: VariableOrigin, def_site: DefSite) -> Self {
        Self {
            id,
            origin,
            def_site,
        }
    }

    /// Returns the variable's id.
    #[must_use]
    pub const fn id(&self) -> SsaVarId {
        self.id
    }

    /// Returns where the variable came from.
    #[must_use]
    pub const fn origin(&self) -> VariableOrigin {
        self.origin
    }

    /// Returns the recorded definition site.
    ///
    /// Sites are recorded at creation time and are not updated when
    /// instructions move; use [`crate::analysis::SsaFunction::definitions`]
    /// for an exact map.
    #[must_use]
    pub const fn def_site(&self) -> DefSite {
        self.def_site
    }

    /// Returns `true` if this variable is a method argument.
    #[must_use]
    pub const fn is_argument(&self) -> bool {
        matches!(self.origin, VariableOrigin::Argument(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_var_id_display() {
        let id = SsaVarId::new(7);
        assert_eq!(id.index(), 7);
        assert_eq!(format!("{id}"), "v7");
        assert_eq!(format!("{id:?}"), "v7");
    }

    #[test]
    fn test_def_sites() {
        assert_eq!(DefSite::entry(), DefSite::phi(0));
        assert_eq!(DefSite::instruction(2, 5).instruction, Some(5));
    }

    #[test]
    fn test_argument_variable() {
        let var = SsaVariable::new(
            SsaVarId::new(0),
            VariableOrigin::Argument(0),
            DefSite::entry(),
        );
        assert!(var.is_argument());
        assert_eq!(var.origin(), VariableOrigin::Argument(0));
    }
}
