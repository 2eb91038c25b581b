//! Executes function bodies, enforcing every call on the way.

use crate::call::{CallKind, CallSite, CallState};
use crate::program::{Arg, FunctionDecl, Program, Stmt, Target};
use crate::trace::{EventKind, SiteId, Trace};
use crate::value::{FunctionRef, Value};
use crate::{Error, Result};
use coeffects::{Decision, EnforcementLevel, Policy, Violation};

/// Default limit on nested calls.
pub const DEFAULT_MAX_DEPTH: usize = 256;

/// Highest accepted limit. Bodies are walked recursively on the native
/// stack, so deeper limits would overflow it before `DepthExceeded` fires.
pub const MAX_DEPTH_LIMIT: usize = 512;

/// How a single enforced call ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallOutcome {
    Executed,
    /// Rejected under `warn`; the callee did not run.
    Aborted(Violation),
}

/// Runs a program under a policy.
pub struct Interpreter<'p> {
    program: &'p Program,
    policy: Policy,
    max_depth: usize,
    next_site: SiteId,
    trace: Trace,
    output: String,
}

impl<'p> Interpreter<'p> {
    pub fn new(program: &'p Program, policy: Policy) -> Self {
        Self {
            program,
            policy,
            max_depth: DEFAULT_MAX_DEPTH,
            next_site: 0,
            trace: Trace::new(),
            output: String::new(),
        }
    }

    /// Set the nested call limit, clamped to `1..=MAX_DEPTH_LIMIT`.
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth.clamp(1, MAX_DEPTH_LIMIT);
        self
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    pub fn program(&self) -> &'p Program {
        self.program
    }

    pub fn trace(&self) -> &Trace {
        &self.trace
    }

    /// Text written by `echo` statements so far.
    pub fn output(&self) -> &str {
        &self.output
    }

    /// Run the program's entry function with no arguments.
    ///
    /// The entry itself is not a call site; calls made from its body are.
    pub fn run_entry(&mut self) -> Result<()> {
        let name = self
            .program
            .entry()
            .ok_or_else(|| Error::UnknownFunction("<entry>".to_string()))?;
        let entry = self.program.resolve(name)?;
        if entry.params() != 0 {
            return Err(Error::Arity {
                function: entry.name().to_string(),
                expected: entry.params(),
                got: 0,
            });
        }
        tracing::debug!(entry = entry.name(), "running entry");
        self.exec_body(entry, &[], 0)
    }

    /// Enforce and, if allowed, run a call from `caller` to `callee`.
    ///
    /// `caller` supplies the capability context; where `callee` came from
    /// does not matter. Under `fatal`, a rejection is returned as an error.
    pub fn invoke(
        &mut self,
        caller: &FunctionDecl,
        callee: FunctionRef<'p>,
        args: Vec<Value<'p>>,
        kind: CallKind,
        depth: usize,
    ) -> Result<CallOutcome> {
        let site_id = self.next_site;
        self.next_site += 1;

        let site = CallSite::new(caller, callee, kind);
        self.trace.record(
            depth,
            EventKind::Call {
                site: site_id,
                caller: caller.name().to_string(),
                callee: callee.name().to_string(),
                call: kind,
            },
        );
        let mut state = CallState::Pending;
        self.set_state(site_id, depth, &mut state, CallState::Pending)?;

        let decision = site.check(&self.policy);
        let next = CallState::after(&decision);

        if let Decision::Deny { violation } = decision {
            self.set_state(site_id, depth, &mut state, next)?;
            self.trace.record(
                depth,
                EventKind::Violation {
                    site: site_id,
                    violation: violation.clone(),
                },
            );
            self.set_state(site_id, depth, &mut state, CallState::Aborted)?;

            if self.policy.level == EnforcementLevel::Fatal {
                return Err(violation.into());
            }
            tracing::warn!("{violation}");
            return Ok(CallOutcome::Aborted(violation));
        }

        let decl = callee.decl();
        if let Err(e) = self.admit(decl, args.len(), depth) {
            self.set_state(site_id, depth, &mut state, CallState::Failed)?;
            return Err(e);
        }
        self.set_state(site_id, depth, &mut state, next)?;

        // The callee started, so a failure below still ends this site.
        let result = self.exec_body(decl, &args, depth + 1);
        let end = if result.is_ok() {
            CallState::Executed
        } else {
            CallState::Failed
        };
        self.set_state(site_id, depth, &mut state, end)?;
        result.map(|()| CallOutcome::Executed)
    }

    /// Arity and depth checks for a call that passed enforcement.
    fn admit(&self, decl: &FunctionDecl, got: usize, depth: usize) -> Result<()> {
        if got != decl.params() {
            return Err(Error::Arity {
                function: decl.name().to_string(),
                expected: decl.params(),
                got,
            });
        }
        if depth + 1 > self.max_depth {
            return Err(Error::DepthExceeded {
                function: decl.name().to_string(),
                limit: self.max_depth,
            });
        }
        Ok(())
    }

    fn set_state(
        &mut self,
        site: SiteId,
        depth: usize,
        state: &mut CallState,
        to: CallState,
    ) -> Result<()> {
        if to != CallState::Pending {
            *state = state.advance(to)?;
        }
        self.trace.record(depth, EventKind::State { site, state: to });
        Ok(())
    }

    fn exec_body(&mut self, decl: &'p FunctionDecl, args: &[Value<'p>], depth: usize) -> Result<()> {
        for stmt in decl.body() {
            match stmt {
                Stmt::Echo { echo } => {
                    self.output.push_str(echo);
                    self.trace.record(depth, EventKind::Echo { text: echo.clone() });
                }
                Stmt::Call { call, args: exprs } => {
                    let (target, kind) = match call {
                        Target::Function(name) => {
                            (Value::from(self.program.resolve(name)?), CallKind::Direct)
                        }
                        Target::Param(i) => (param(decl, args, *i)?, CallKind::Indirect),
                    };
                    let Some(callee) = target.as_function() else {
                        tracing::trace!(function = decl.name(), "skipping call through null");
                        continue;
                    };
                    let values = exprs
                        .iter()
                        .map(|arg| self.eval(decl, args, arg))
                        .collect::<Result<Vec<_>>>()?;
                    self.invoke(decl, callee, values, kind, depth)?;
                }
            }
        }
        Ok(())
    }

    fn eval(&self, decl: &FunctionDecl, args: &[Value<'p>], arg: &Arg) -> Result<Value<'p>> {
        match arg {
            Arg::Null => Ok(Value::Null),
            Arg::Function(name) => Ok(Value::from(self.program.resolve(name)?)),
            Arg::Param(i) => param(decl, args, *i),
        }
    }
}

fn param<'p>(decl: &FunctionDecl, args: &[Value<'p>], index: usize) -> Result<Value<'p>> {
    args.get(index).copied().ok_or_else(|| Error::MissingArgument {
        function: decl.name().to_string(),
        index,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use coeffects::Context;

    const PROGRAM: &str = r#"
entry = "main"

[[function]]
name = "main"
body = [
    { echo = "a" },
    { call = { function = "apply_pure" }, args = [{ function = "leaky" }] },
    { echo = "b" },
    { call = { function = "apply_pure" }, args = [{ function = "quiet" }] },
    { echo = "c" },
]

[[function]]
name = "apply_pure"
contexts = []
params = 1
body = [{ call = { param = 0 } }]

[[function]]
name = "leaky"
contexts = ["policied"]
body = [{ echo = "LEAK" }]

[[function]]
name = "quiet"
contexts = []
body = [{ echo = "q" }]
"#;

    fn open_sites(trace: &Trace) -> Vec<SiteId> {
        trace
            .events()
            .iter()
            .filter_map(|e| match e.kind {
                EventKind::Call { site, .. } => Some(site),
                _ => None,
            })
            .filter(|site| trace.final_state(*site).is_none())
            .collect()
    }

    const RECURSIVE: &str = r#"
entry = "main"

[[function]]
name = "main"
body = [{ call = { function = "main" } }]
"#;

    #[test]
    fn test_indirect_call_checked_against_current_caller() {
        let program = Program::parse(PROGRAM).unwrap();
        let mut interp = Interpreter::new(&program, Policy::default());
        interp.run_entry().unwrap();

        // leaky never runs; quiet does.
        assert_eq!(interp.output(), "abqc");
        let violations: Vec<_> = interp.trace().violations().collect();
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].caller, "apply_pure");
        assert_eq!(violations[0].callee, "leaky");
        assert_eq!(violations[0].unmet, vec![Context::Policied]);
    }

    #[test]
    fn test_fatal_stops_run() {
        let program = Program::parse(PROGRAM).unwrap();
        let mut interp = Interpreter::new(&program, Policy::new(EnforcementLevel::Fatal));
        let err = interp.run_entry().unwrap_err();
        assert_eq!(err.violation().map(|v| v.callee.as_str()), Some("leaky"));
        assert_eq!(interp.output(), "a");
    }

    #[test]
    fn test_off_runs_everything() {
        let program = Program::parse(PROGRAM).unwrap();
        let mut interp = Interpreter::new(&program, Policy::new(EnforcementLevel::Off));
        interp.run_entry().unwrap();
        assert_eq!(interp.output(), "aLEAKbqc");
        assert_eq!(interp.trace().violations().count(), 0);
    }

    #[test]
    fn test_rejected_call_ends_aborted() {
        let program = Program::parse(PROGRAM).unwrap();
        let mut interp = Interpreter::new(&program, Policy::default());
        interp.run_entry().unwrap();

        let aborted: Vec<_> = interp
            .trace()
            .events()
            .iter()
            .filter_map(|e| match e.kind {
                EventKind::Violation { site, .. } => Some(site),
                _ => None,
            })
            .collect();
        assert_eq!(aborted.len(), 1);
        assert_eq!(interp.trace().final_state(aborted[0]), Some(CallState::Aborted));
    }

    #[test]
    fn test_recursion_limit() {
        let program = Program::parse(RECURSIVE).unwrap();
        let mut interp = Interpreter::new(&program, Policy::default()).with_max_depth(8);
        let err = interp.run_entry().unwrap_err();
        assert!(matches!(err, Error::DepthExceeded { limit: 8, .. }));

        // The site that hit the limit and every enclosing one end as Failed.
        assert!(open_sites(interp.trace()).is_empty());
        assert_eq!(interp.trace().final_state(0), Some(CallState::Failed));
        assert_eq!(interp.trace().final_state(8), Some(CallState::Failed));
    }

    #[test]
    fn test_large_depth_is_clamped() {
        let interp_depth = |depth| {
            let program = Program::default();
            Interpreter::new(&program, Policy::default())
                .with_max_depth(depth)
                .max_depth()
        };
        assert_eq!(interp_depth(50_000), MAX_DEPTH_LIMIT);
        assert_eq!(interp_depth(0), 1);
        assert_eq!(interp_depth(64), 64);
    }

    #[test]
    fn test_large_depth_reports_error_instead_of_overflowing() {
        // Same stack size as the main thread of the binary.
        let handle = std::thread::Builder::new()
            .stack_size(8 << 20)
            .spawn(|| {
                let program = Program::parse(RECURSIVE).unwrap();
                let mut interp =
                    Interpreter::new(&program, Policy::default()).with_max_depth(50_000);
                interp.run_entry().unwrap_err()
            })
            .unwrap();
        let err = handle.join().unwrap();
        assert!(matches!(err, Error::DepthExceeded { limit: MAX_DEPTH_LIMIT, .. }));
    }

    #[test]
    fn test_arity_mismatch() {
        let program = Program::parse(
            r#"
entry = "main"

[[function]]
name = "main"
body = [{ call = { function = "one" } }]

[[function]]
name = "one"
params = 1
"#,
        )
        .unwrap();
        let mut interp = Interpreter::new(&program, Policy::default());
        let err = interp.run_entry().unwrap_err();
        assert!(matches!(err, Error::Arity { expected: 1, got: 0, .. }));

        // Never marked Allowed; ends Failed.
        let states: Vec<CallState> = interp
            .trace()
            .events()
            .iter()
            .filter_map(|e| match e.kind {
                EventKind::State { site: 0, state } => Some(state),
                _ => None,
            })
            .collect();
        assert_eq!(states, vec![CallState::Pending, CallState::Failed]);
    }

    #[test]
    fn test_fatal_leaves_no_open_sites() {
        let program = Program::parse(PROGRAM).unwrap();
        let mut interp = Interpreter::new(&program, Policy::new(EnforcementLevel::Fatal));
        interp.run_entry().unwrap_err();

        assert!(open_sites(interp.trace()).is_empty());
        // main -> apply_pure started and failed; apply_pure -> leaky was aborted.
        assert_eq!(interp.trace().final_state(0), Some(CallState::Failed));
        assert_eq!(interp.trace().final_state(1), Some(CallState::Aborted));
    }
}
