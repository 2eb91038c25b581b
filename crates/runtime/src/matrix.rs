//! All-pairs call matrix: every function is handed every other function and
//! asked to call it.

use crate::call::CallKind;
use crate::interpreter::{CallOutcome, Interpreter};
use crate::program::FunctionDecl;
use crate::trace;
use crate::value::{FunctionRef, Value};
use crate::{Error, Result};
use coeffects::{CapabilitySet, Verdict, Violation};
use serde::Serialize;
use std::fmt;

/// Name given to the synthetic function driving the matrix.
pub const DRIVER: &str = "main";

/// Result of one `caller -> callee` pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Pair {
    pub caller: String,
    pub callee: String,
    pub verdict: Verdict,
    /// The first rejection seen while running the pair.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub violation: Option<Violation>,
}

impl fmt::Display for Pair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}:", self.caller, self.callee)?;
        match &self.violation {
            None => write!(f, " ok"),
            Some(v) => write!(f, " violation: {v}"),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Report {
    pub pairs: Vec<Pair>,
    /// Set when a violation under `fatal` stopped the run.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aborted: Option<Violation>,
}

impl Report {
    pub fn verdict(&self, caller: &str, callee: &str) -> Option<Verdict> {
        self.pairs
            .iter()
            .find(|p| p.caller == caller && p.callee == callee)
            .map(|p| p.verdict)
    }

    pub fn allowed(&self) -> usize {
        self.pairs
            .iter()
            .filter(|p| p.verdict == Verdict::Allowed)
            .count()
    }

    pub fn rejected(&self) -> usize {
        self.pairs.len() - self.allowed()
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for pair in &self.pairs {
            writeln!(f, "{pair}")?;
        }
        Ok(())
    }
}

/// Drives `caller(callee)` for every ordered pair of the chosen functions.
pub struct Matrix<'p> {
    functions: Vec<&'p FunctionDecl>,
    driver: FunctionDecl,
}

impl<'p> Matrix<'p> {
    /// `entry` is the context the driver calls each caller from.
    pub fn new(functions: Vec<&'p FunctionDecl>, entry: CapabilitySet) -> Self {
        Self {
            functions,
            driver: FunctionDecl::new(DRIVER, entry, 0, Vec::new()),
        }
    }

    /// Every function of the interpreter's program, driven from `defaults`.
    pub fn all(interp: &Interpreter<'p>) -> Self {
        let functions = interp.program().functions().iter().collect();
        Self::new(functions, CapabilitySet::defaults())
    }

    /// Pick functions by name, in the given order.
    pub fn select(
        interp: &Interpreter<'p>,
        names: &[impl AsRef<str>],
        entry: CapabilitySet,
    ) -> Result<Self> {
        let program = interp.program();
        let functions = names
            .iter()
            .map(|n| program.resolve(n.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(functions, entry))
    }

    /// Run the pairs in caller-major order.
    ///
    /// A rejection under `fatal` ends the run early and is reported in
    /// [`Report::aborted`]; any other error is returned.
    pub fn run(&self, interp: &mut Interpreter<'p>) -> Result<Report> {
        let mut report = Report::default();

        for caller in &self.functions {
            for callee in &self.functions {
                let mark = interp.trace().mark();
                let outcome = interp.invoke(
                    &self.driver,
                    FunctionRef::new(*caller),
                    vec![Value::from(*callee)],
                    CallKind::Direct,
                    0,
                );

                let violation = match outcome {
                    Ok(CallOutcome::Executed | CallOutcome::Aborted(_)) => {
                        trace::violations(interp.trace().since(mark)).next().cloned()
                    }
                    Err(Error::Policy(coeffects::Error::Violation(v))) => {
                        report.pairs.push(pair(caller, callee, Some(v.clone())));
                        report.aborted = Some(v);
                        return Ok(report);
                    }
                    Err(e) => return Err(e),
                };
                report.pairs.push(pair(caller, callee, violation));
            }
        }

        tracing::debug!(
            allowed = report.allowed(),
            rejected = report.rejected(),
            "matrix complete"
        );
        Ok(report)
    }
}

fn pair(caller: &FunctionDecl, callee: &FunctionDecl, violation: Option<Violation>) -> Pair {
    Pair {
        caller: caller.name().to_string(),
        callee: callee.name().to_string(),
        verdict: if violation.is_some() {
            Verdict::Rejected
        } else {
            Verdict::Allowed
        },
        violation,
    }
}
