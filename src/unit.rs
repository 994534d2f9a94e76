//! Compilation units.
//!
//! A [`CompilationUnit`] is the input of the pipeline: a set of classes, the
//! fields they declare and the methods to compile. Tokens are allocated by
//! the unit, so every field and method reference used in SSA bodies resolves
//! back to a named definition here. Names are only used for diagnostics and
//! checker output.
//!
//! # Usage
//!
//! ```rust
//! use lsekit::{CompilationUnit, MethodFlags, analysis::{FieldFlags, SsaFunctionBuilder}};
//!
//! let mut unit = CompilationUnit::new();
//! let class = unit.add_class("Point");
//! let x = unit.add_field(class, "x", FieldFlags::empty());
//!
//! let body = SsaFunctionBuilder::new(1).build_with(|f| {
//!     let this = f.arg(0);
//!     f.block(0, |b| {
//!         let v = b.load_field(this, x);
//!         b.ret_val(v);
//!     });
//! });
//! let getter = unit.add_method("Point.getX", MethodFlags::empty(), body);
//!
//! assert_eq!(unit.method(getter.token()).map(|m| m.name.as_str()), Some("Point.getX"));
//! assert_eq!(unit.field(x.token()).map(|f| f.full_name()), Some("Point.x".to_string()));
//! ```

use std::collections::BTreeMap;

use bitflags::bitflags;

use crate::analysis::{FieldFlags, FieldRef, MethodRef, SsaFunction, Token};

bitflags! {
    /// Method attributes relevant to the pipeline.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct MethodFlags: u8 {
        /// Static method (no receiver argument).
        const STATIC = 0x01;
        /// The whole body runs under the monitor of the receiver.
        const SYNCHRONIZED = 0x02;
        /// Never inline this method.
        const NO_INLINE = 0x04;
    }
}

/// A class definition.
#[derive(Debug, Clone)]
pub struct ClassDef {
    /// Class token.
    pub token: Token,
    /// Simple class name.
    pub name: String,
}

/// A field definition.
#[derive(Debug, Clone)]
pub struct FieldDef {
    /// Field token.
    pub token: Token,
    /// Declaring class.
    pub class: Token,
    /// Simple field name.
    pub name: String,
    /// Field attributes.
    pub flags: FieldFlags,
    class_name: String,
}

impl FieldDef {
    /// Returns the `Class.field` name.
    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{}.{}", self.class_name, self.name)
    }

    /// Returns a reference to this field for use in SSA operations.
    #[must_use]
    pub fn reference(&self) -> FieldRef {
        FieldRef::new(self.token, self.flags)
    }
}

/// A method definition.
#[derive(Debug, Clone)]
pub struct MethodDef {
    /// Method token.
    pub token: Token,
    /// Qualified method name.
    pub name: String,
    /// Method attributes.
    pub flags: MethodFlags,
    /// SSA body, `None` for methods without code.
    pub body: Option<SsaFunction>,
}

impl MethodDef {
    /// Returns `true` if the method is declared `synchronized`.
    #[must_use]
    pub fn is_synchronized(&self) -> bool {
        self.flags.contains(MethodFlags::SYNCHRONIZED)
    }
}

/// Classes, fields and methods compiled together.
#[derive(Debug, Clone, Default)]
pub struct CompilationUnit {
    classes: BTreeMap<Token, ClassDef>,
    fields: BTreeMap<Token, FieldDef>,
    methods: BTreeMap<Token, MethodDef>,
}

impl CompilationUnit {
    /// Creates an empty unit.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a class and returns its token.
    pub fn add_class(&mut self, name: impl Into<String>) -> Token {
        let token = next_token(Token::CLASS, self.classes.len());
        self.classes.insert(
            token,
            ClassDef {
                token,
                name: name.into(),
            },
        );
        token
    }

    /// Declares a field of `class` and returns a reference to it.
    ///
    /// Unknown classes are accepted; the field is then named `?.name`.
    pub fn add_field(
        &mut self,
        class: Token,
        name: impl Into<String>,
        flags: FieldFlags,
    ) -> FieldRef {
        let token = next_token(Token::FIELD, self.fields.len());
        let class_name = self
            .classes
            .get(&class)
            .map_or_else(|| "?".to_string(), |c| c.name.clone());
        self.fields.insert(
            token,
            FieldDef {
                token,
                class,
                name: name.into(),
                flags,
                class_name,
            },
        );
        FieldRef::new(token, flags)
    }

    /// Declares a method without a body.
    ///
    /// Used to obtain a [`MethodRef`] before the bodies that call it are built.
    pub fn declare_method(&mut self, name: impl Into<String>, flags: MethodFlags) -> MethodRef {
        let token = next_token(Token::METHOD, self.methods.len());
        self.methods.insert(
            token,
            MethodDef {
                token,
                name: name.into(),
                flags,
                body: None,
            },
        );
        MethodRef::new(token)
    }

    /// Attaches a body to a declared method. Returns `false` for unknown methods.
    pub fn set_body(&mut self, method: MethodRef, body: SsaFunction) -> bool {
        match self.methods.get_mut(&method.token()) {
            Some(def) => {
                def.body = Some(body);
                true
            }
            None => false,
        }
    }

    /// Declares a method together with its body.
    pub fn add_method(
        &mut self,
        name: impl Into<String>,
        flags: MethodFlags,
        body: SsaFunction,
    ) -> MethodRef {
        let method = self.declare_method(name, flags);
        self.set_body(method, body);
        method
    }

    /// Returns the method definition for `token`.
    #[must_use]
    pub fn method(&self, token: Token) -> Option<&MethodDef> {
        self.methods.get(&token)
    }

    /// Looks a method up by its name.
    #[must_use]
    pub fn method_by_name(&self, name: &str) -> Option<&MethodDef> {
        self.methods.values().find(|m| m.name == name)
    }

    /// Returns the field definition for `token`.
    #[must_use]
    pub fn field(&self, token: Token) -> Option<&FieldDef> {
        self.fields.get(&token)
    }

    /// Returns the class definition for `token`.
    #[must_use]
    pub fn class(&self, token: Token) -> Option<&ClassDef> {
        self.classes.get(&token)
    }

    /// Iterates over all methods in token order.
    pub fn methods(&self) -> impl Iterator<Item = &MethodDef> {
        self.methods.values()
    }

    /// Iterates over all fields in token order.
    pub fn fields(&self) -> impl Iterator<Item = &FieldDef> {
        self.fields.values()
    }
}

fn next_token(table: u8, count: usize) -> Token {
    // Table rows are 24 bits wide
    #[allow(clippy::cast_possible_truncation)]
    let row = (count + 1) as u32;
    Token::from_parts(table, row)
}
