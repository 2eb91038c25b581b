//! Declared capability sets and the subsumption order over them.

use crate::{Capabilities, Context, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// The capability set of one function.
///
/// Built once from the contexts in the annotation; the provided atoms are the
/// union of those contexts. An empty annotation is `pure`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CapabilitySet {
    contexts: Vec<Context>,
    provides: Capabilities,
}

impl CapabilitySet {
    pub fn new(contexts: impl IntoIterator<Item = Context>) -> Self {
        let mut contexts: Vec<Context> = contexts.into_iter().collect();
        contexts.sort();
        contexts.dedup();
        // `pure` adds nothing once anything else is present.
        if contexts.len() > 1 {
            contexts.retain(|c| *c != Context::Pure);
        }
        let provides = contexts
            .iter()
            .fold(Capabilities::empty(), |acc, c| acc | c.capabilities());
        Self { contexts, provides }
    }

    pub fn pure() -> Self {
        Self::new([Context::Pure])
    }

    /// What an unannotated function gets.
    pub fn defaults() -> Self {
        Self::new([Context::Defaults])
    }

    /// Parse a list of context names, e.g. `["policied", "write_props"]`.
    pub fn parse<S: AsRef<str>>(names: &[S]) -> Result<Self> {
        let contexts = names
            .iter()
            .map(|n| n.as_ref().trim().parse())
            .collect::<Result<Vec<Context>>>()?;
        Ok(Self::new(contexts))
    }

    pub fn contexts(&self) -> &[Context] {
        &self.contexts
    }

    pub fn provides(&self) -> Capabilities {
        self.provides
    }

    pub fn is_pure(&self) -> bool {
        self.provides.is_empty()
    }

    /// True if a caller holding `self` may call a callee requiring `required`.
    pub fn satisfies(&self, required: &CapabilitySet) -> bool {
        leq(required, self)
    }

    /// Atoms `required` needs that `self` does not hold.
    pub fn missing(&self, required: &CapabilitySet) -> Capabilities {
        required.provides.difference(self.provides)
    }

    /// Contexts of `required` that `self` does not cover on their own.
    pub fn unmet(&self, required: &CapabilitySet) -> Vec<Context> {
        required
            .contexts
            .iter()
            .copied()
            .filter(|c| !self.provides.contains(c.capabilities()))
            .collect()
    }
}

/// `a ⊑ b`: everything `a` needs is contained in `b`.
///
/// `pure` is the bottom element and `defaults` the top.
pub fn leq(a: &CapabilitySet, b: &CapabilitySet) -> bool {
    b.provides.contains(a.provides)
}

impl From<Context> for CapabilitySet {
    fn from(ctx: Context) -> Self {
        Self::new([ctx])
    }
}

impl fmt::Display for CapabilitySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, ctx) in self.contexts.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{ctx}")?;
        }
        f.write_str("]")
    }
}

impl Serialize for CapabilitySet {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.contexts.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for CapabilitySet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        Vec::<Context>::deserialize(deserializer).map(Self::new)
    }
}
