//! Symbol references carried by SSA operations.
//!
//! Operations never embed names; they refer to fields, methods and classes of
//! the [`crate::CompilationUnit`] through compact [`Token`]s. Field references
//! additionally carry their static [`FieldFlags`], which is everything the
//! heap model and barrier classifier need to know about a field.

use std::fmt;

use bitflags::bitflags;

/// Identifies a class, field or method within a compilation unit.
///
/// The high byte holds the table kind, the low 24 bits the 1-based row.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Token(pub u32);

impl Token {
    /// Table kind for class definitions.
    pub const CLASS: u8 = 0x02;
    /// Table kind for field definitions.
    pub const FIELD: u8 = 0x04;
    /// Table kind for method definitions.
    pub const METHOD: u8 = 0x06;

    /// Creates a token from its raw value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Token(value)
    }

    /// Creates a token for `row` of `table`.
    #[must_use]
    pub const fn from_parts(table: u8, row: u32) -> Self {
        Token(((table as u32) << 24) | (row & 0x00FF_FFFF))
    }

    /// Returns the raw token value.
    #[must_use]
    pub const fn value(&self) -> u32 {
        self.0
    }

    /// Returns the table kind (high byte).
    #[must_use]
    pub const fn table(&self) -> u8 {
        (self.0 >> 24) as u8
    }

    /// Returns the row within the table (low 24 bits).
    #[must_use]
    pub const fn row(&self) -> u32 {
        self.0 & 0x00FF_FFFF
    }

    /// Returns `true` for the null token.
    #[must_use]
    pub const fn is_null(&self) -> bool {
        self.0 == 0
    }
}

impl From<u32> for Token {
    fn from(value: u32) -> Self {
        Token(value)
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Token(0x{:08x}, table: 0x{:02x}, row: {})",
            self.0,
            self.table(),
            self.row()
        )
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08x}", self.0)
    }
}

bitflags! {
    /// Static attributes of a field that affect memory ordering and location identity.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
    pub struct FieldFlags: u8 {
        /// The field belongs to the class, not to an instance.
        const STATIC = 0x01;
        /// Accesses to the field are synchronization points.
        const VOLATILE = 0x02;
    }
}

/// A field as referenced by a load or store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FieldRef {
    token: Token,
    flags: FieldFlags,
}

impl FieldRef {
    /// Creates a field reference.
    #[must_use]
    pub const fn new(token: Token, flags: FieldFlags) -> Self {
        Self { token, flags }
    }

    /// Returns the field's token.
    #[must_use]
    pub const fn token(&self) -> Token {
        self.token
    }

    /// Returns the field's flags.
    #[must_use]
    pub const fn flags(&self) -> FieldFlags {
        self.flags
    }

    /// Returns `true` if the field is declared volatile.
    #[must_use]
    pub const fn is_volatile(&self) -> bool {
        self.flags.contains(FieldFlags::VOLATILE)
    }

    /// Returns `true` if the field is static.
    #[must_use]
    pub const fn is_static(&self) -> bool {
        self.flags.contains(FieldFlags::STATIC)
    }
}

impl fmt::Display for FieldRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "field#{}", self.token.row())?;
        if self.is_volatile() {
            f.write_str(" volatile")?;
        }
        Ok(())
    }
}

/// A call target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MethodRef(Token);

impl MethodRef {
    /// Creates a method reference from its token.
    #[must_use]
    pub const fn new(token: Token) -> Self {
        Self(token)
    }

    /// Returns the method's token.
    #[must_use]
    pub const fn token(&self) -> Token {
        self.0
    }
}

impl fmt::Display for MethodRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "method#{}", self.0.row())
    }
}
