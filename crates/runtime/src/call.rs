//! Call sites and their lifecycle.

use crate::program::{FunctionDecl, Program, Stmt, Target};
use crate::value::FunctionRef;
use crate::{Error, Result};
use coeffects::{Decision, Policy};
use serde::{Deserialize, Serialize};

/// How the callee was named at the call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallKind {
    /// Named in the caller's body.
    Direct,
    /// Reached through a function value.
    Indirect,
}

/// Lifecycle of a single call.
///
/// `Pending -> Allowed -> Executed`, `Pending -> Rejected -> Aborted`, and
/// `Pending -> Unchecked -> Executed` when enforcement is off. `Failed` ends
/// a call that passed enforcement but hit a runtime error: from `Pending` when
/// arity or depth checks fail before the callee starts, from `Allowed` or
/// `Unchecked` when its body returns an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallState {
    Pending,
    Allowed,
    Rejected,
    Unchecked,
    Executed,
    Aborted,
    Failed,
}

impl CallState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            CallState::Executed | CallState::Aborted | CallState::Failed
        )
    }

    /// Move to `to`, or fail if that edge does not exist.
    pub fn advance(self, to: CallState) -> Result<CallState> {
        use CallState::*;
        match (self, to) {
            (Pending, Allowed | Rejected | Unchecked | Failed)
            | (Allowed | Unchecked, Executed | Failed)
            | (Rejected, Aborted) => Ok(to),
            (from, to) => Err(Error::InvalidTransition { from, to }),
        }
    }

    /// The state a fresh call moves to after its check.
    pub fn after(decision: &Decision) -> CallState {
        match decision {
            Decision::Allow => CallState::Allowed,
            Decision::Deny { .. } => CallState::Rejected,
            Decision::Unchecked => CallState::Unchecked,
        }
    }
}

/// The unit of enforcement: who calls whom.
#[derive(Debug, Clone, Copy)]
pub struct CallSite<'a> {
    pub caller: &'a FunctionDecl,
    pub callee: FunctionRef<'a>,
    pub kind: CallKind,
}

impl<'a> CallSite<'a> {
    pub fn new(caller: &'a FunctionDecl, callee: FunctionRef<'a>, kind: CallKind) -> Self {
        Self {
            caller,
            callee,
            kind,
        }
    }

    /// Check this site against the caller's own set.
    pub fn check(&self, policy: &Policy) -> Decision {
        policy.check(
            self.caller.name(),
            self.caller.capabilities(),
            self.callee.name(),
            self.callee.capabilities(),
        )
    }
}

/// Every direct call site in the program, in declaration order.
///
/// Indirect sites depend on argument values and are only found while running.
pub fn direct_sites(program: &Program) -> Result<Vec<CallSite<'_>>> {
    let mut sites = Vec::new();
    for caller in program.functions() {
        for stmt in caller.body() {
            if let Stmt::Call {
                call: Target::Function(name),
                ..
            } = stmt
            {
                let callee = FunctionRef::new(program.resolve(name)?);
                sites.push(CallSite::new(caller, callee, CallKind::Direct));
            }
        }
    }
    Ok(sites)
}

#[cfg(test)]
mod tests {
    use super::*;
    use coeffects::{CapabilitySet, Context, Verdict};

    #[test]
    fn test_valid_lifecycles() {
        let executed = CallState::Pending
            .advance(CallState::Allowed)
            .and_then(|s| s.advance(CallState::Executed))
            .unwrap();
        assert!(executed.is_terminal());

        let aborted = CallState::Pending
            .advance(CallState::Rejected)
            .and_then(|s| s.advance(CallState::Aborted))
            .unwrap();
        assert!(aborted.is_terminal());

        let failed = CallState::Pending
            .advance(CallState::Allowed)
            .and_then(|s| s.advance(CallState::Failed))
            .unwrap();
        assert!(failed.is_terminal());
        assert!(CallState::Pending.advance(CallState::Failed).is_ok());
    }

    #[test]
    fn test_invalid_transitions() {
        assert!(CallState::Rejected.advance(CallState::Executed).is_err());
        assert!(CallState::Pending.advance(CallState::Executed).is_err());
        assert!(CallState::Executed.advance(CallState::Aborted).is_err());
        assert!(CallState::Aborted.advance(CallState::Pending).is_err());
        assert!(CallState::Rejected.advance(CallState::Failed).is_err());
        assert!(CallState::Failed.advance(CallState::Executed).is_err());
    }

    #[test]
    fn test_direct_sites_checked_statically() {
        let program = Program::parse(
            r#"
[[function]]
name = "helper"
contexts = ["policied"]

[[function]]
name = "caller"
contexts = ["policied_local"]
body = [{ call = { function = "helper" } }, { echo = "x" }, { call = { function = "helper" } }]
"#,
        )
        .unwrap();

        let sites = direct_sites(&program).unwrap();
        assert_eq!(sites.len(), 2);
        for site in &sites {
            assert_eq!(site.caller.name(), "caller");
            assert_eq!(site.callee.name(), "helper");
            assert_eq!(site.kind, CallKind::Direct);
            assert_eq!(site.check(&Policy::default()).verdict(), Some(Verdict::Rejected));
        }
    }

    #[test]
    fn test_site_uses_callers_set() {
        let caller = FunctionDecl::new("p", CapabilitySet::pure(), 1, vec![]);
        let callee = FunctionDecl::new("q", Context::Policied.into(), 1, vec![]);
        let site = CallSite::new(&caller, FunctionRef::new(&callee), CallKind::Indirect);
        assert!(!site.check(&Policy::default()).is_allowed());
    }
}
