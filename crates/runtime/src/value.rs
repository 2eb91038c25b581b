//! Runtime values passed between functions.

use crate::program::FunctionDecl;
use coeffects::CapabilitySet;
use std::fmt;

/// A first-class function value.
///
/// Borrows its declaration; the capability set it exposes is the callee's
/// requirement, never an ambient context for whoever calls it.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct FunctionRef<'p>(&'p FunctionDecl);

impl<'p> FunctionRef<'p> {
    pub fn new(decl: &'p FunctionDecl) -> Self {
        Self(decl)
    }

    pub fn decl(&self) -> &'p FunctionDecl {
        self.0
    }

    pub fn name(&self) -> &'p str {
        self.0.name()
    }

    pub fn capabilities(&self) -> &'p CapabilitySet {
        self.0.capabilities()
    }
}

impl fmt::Debug for FunctionRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FunctionRef({}{})", self.name(), self.capabilities())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Value<'p> {
    Null,
    Function(FunctionRef<'p>),
}

impl<'p> Value<'p> {
    pub fn as_function(&self) -> Option<FunctionRef<'p>> {
        match self {
            Value::Function(f) => Some(*f),
            Value::Null => None,
        }
    }
}

impl<'p> From<&'p FunctionDecl> for Value<'p> {
    fn from(decl: &'p FunctionDecl) -> Self {
        Value::Function(FunctionRef::new(decl))
    }
}
