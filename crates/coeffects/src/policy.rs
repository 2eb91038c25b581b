//! Enforcement configuration and per-call decisions.

use crate::{CapabilitySet, Error, Result, Violation};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Outcome of comparing a caller's set with a callee's requirement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verdict {
    Allowed,
    Rejected,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Allowed => f.write_str("ALLOWED"),
            Verdict::Rejected => f.write_str("REJECTED"),
        }
    }
}

/// The enforcement rule itself. Depends on nothing but the two sets.
pub fn check(caller: &CapabilitySet, callee: &CapabilitySet) -> Verdict {
    if caller.satisfies(callee) {
        Verdict::Allowed
    } else {
        Verdict::Rejected
    }
}

/// How violations are treated by whoever runs the calls.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnforcementLevel {
    /// Calls are not checked at all.
    Off,
    /// Violations are reported, the callee is skipped, execution continues.
    #[default]
    Warn,
    /// The first violation aborts the run.
    Fatal,
}

impl fmt::Display for EnforcementLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EnforcementLevel::Off => "off",
            EnforcementLevel::Warn => "warn",
            EnforcementLevel::Fatal => "fatal",
        })
    }
}

impl std::str::FromStr for EnforcementLevel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "off" => Ok(EnforcementLevel::Off),
            "warn" => Ok(EnforcementLevel::Warn),
            "fatal" => Ok(EnforcementLevel::Fatal),
            other => Err(Error::Parse(format!("unknown enforcement level '{other}'"))),
        }
    }
}

/// Policy configuration loaded from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Policy {
    #[serde(default)]
    pub level: EnforcementLevel,
}

/// Result of a checked call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny { violation: Violation },
    /// Enforcement is off; nothing was compared.
    Unchecked,
}

impl Decision {
    /// True when the callee may run.
    pub fn is_allowed(&self) -> bool {
        !matches!(self, Decision::Deny { .. })
    }

    pub fn verdict(&self) -> Option<Verdict> {
        match self {
            Decision::Allow => Some(Verdict::Allowed),
            Decision::Deny { .. } => Some(Verdict::Rejected),
            Decision::Unchecked => None,
        }
    }
}

impl Policy {
    pub fn new(level: EnforcementLevel) -> Self {
        Self { level }
    }

    /// Load policy from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::parse(&content)
    }

    /// Parse policy from TOML string.
    pub fn parse(toml: &str) -> Result<Self> {
        toml::from_str(toml).map_err(|e| Error::Parse(e.to_string()))
    }

    /// Check a call from `caller` to `callee` against the caller's set at
    /// the call site.
    pub fn check(
        &self,
        caller: &str,
        provided: &CapabilitySet,
        callee: &str,
        required: &CapabilitySet,
    ) -> Decision {
        if self.level == EnforcementLevel::Off {
            tracing::trace!(caller, callee, "enforcement off");
            return Decision::Unchecked;
        }

        match check(provided, required) {
            Verdict::Allowed => {
                tracing::debug!(caller, callee, %provided, %required, "call allowed");
                Decision::Allow
            }
            Verdict::Rejected => {
                tracing::debug!(caller, callee, %provided, %required, "call rejected");
                Decision::Deny {
                    violation: Violation {
                        caller: caller.to_string(),
                        callee: callee.to_string(),
                        provided: provided.clone(),
                        required: required.clone(),
                        unmet: provided.unmet(required),
                        missing: provided.missing(required),
                    },
                }
            }
        }
    }

    /// Like [`Policy::check`], but a denial becomes an error.
    pub fn require(
        &self,
        caller: &str,
        provided: &CapabilitySet,
        callee: &str,
        required: &CapabilitySet,
    ) -> Result<()> {
        match self.check(caller, provided, callee, required) {
            Decision::Allow | Decision::Unchecked => Ok(()),
            Decision::Deny { violation } => Err(Error::Violation(violation)),
        }
    }
}
