//! Capability atoms and the named contexts built from them.

use crate::Error;
use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

bitflags! {
    /// Primitive capabilities. Contexts are unions of these.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
    pub struct Capabilities: u16 {
        const WRITE_PROPERTY = 1 << 0;
        const POLICY_LOCAL = 1 << 1;
        const POLICY_SHALLOW = 1 << 2;
        const POLICY = 1 << 3;
        const POLICY_OF_LOCAL = 1 << 4;
        const POLICY_OF_SHALLOW = 1 << 5;
        const POLICY_OF = 1 << 6;
        const ACCESS_GLOBALS = 1 << 7;
        const IO = 1 << 8;
    }
}

impl fmt::Display for Capabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("none");
        }
        let mut first = true;
        for (name, _) in self.iter_names() {
            if !first {
                f.write_str(", ")?;
            }
            f.write_str(name)?;
            first = false;
        }
        Ok(())
    }
}

/// A named coeffect context, as written in a function annotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Context {
    Pure,
    WriteProps,
    PoliciedLocal,
    PoliciedShallow,
    Policied,
    PoliciedOfLocal,
    PoliciedOfShallow,
    PoliciedOf,
    Defaults,
}

const LOCAL: Capabilities = Capabilities::WRITE_PROPERTY.union(Capabilities::POLICY_LOCAL);
const SHALLOW: Capabilities = LOCAL.union(Capabilities::POLICY_SHALLOW);
const FULL: Capabilities = SHALLOW.union(Capabilities::POLICY);
const OF_LOCAL: Capabilities = LOCAL.union(Capabilities::POLICY_OF_LOCAL);
const OF_SHALLOW: Capabilities = SHALLOW
    .union(OF_LOCAL)
    .union(Capabilities::POLICY_OF_SHALLOW);
const OF_FULL: Capabilities = FULL.union(OF_SHALLOW).union(Capabilities::POLICY_OF);

/// The whole vocabulary. Every partial-order fact lives in this table.
static TABLE: [(Context, &str, Capabilities); 9] = [
    (Context::Pure, "pure", Capabilities::empty()),
    (Context::WriteProps, "write_props", Capabilities::WRITE_PROPERTY),
    (Context::PoliciedLocal, "policied_local", LOCAL),
    (Context::PoliciedShallow, "policied_shallow", SHALLOW),
    (Context::Policied, "policied", FULL),
    (Context::PoliciedOfLocal, "policied_of_local", OF_LOCAL),
    (Context::PoliciedOfShallow, "policied_of_shallow", OF_SHALLOW),
    (Context::PoliciedOf, "policied_of", OF_FULL),
    (Context::Defaults, "defaults", Capabilities::all()),
];

impl Context {
    /// Every context, bottom first.
    pub const ALL: [Context; 9] = [
        Context::Pure,
        Context::WriteProps,
        Context::PoliciedLocal,
        Context::PoliciedShallow,
        Context::Policied,
        Context::PoliciedOfLocal,
        Context::PoliciedOfShallow,
        Context::PoliciedOf,
        Context::Defaults,
    ];

    fn entry(self) -> &'static (Context, &'static str, Capabilities) {
        // TABLE is indexed in declaration order of the enum.
        &TABLE[self as usize]
    }

    /// Snake-case name used in annotations.
    pub fn name(self) -> &'static str {
        self.entry().1
    }

    /// Capabilities this context provides (and therefore requires of callers).
    pub fn capabilities(self) -> Capabilities {
        self.entry().2
    }
}

impl fmt::Display for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Context {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TABLE
            .iter()
            .find(|(_, name, _)| *name == s)
            .map(|(ctx, _, _)| *ctx)
            .ok_or_else(|| Error::UnknownContext(s.to_string()))
    }
}
