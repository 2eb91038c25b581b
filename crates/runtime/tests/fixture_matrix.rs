//! The 8x8 call-enforcement matrix, pinned pair by pair.

use coeffects::{CapabilitySet, Context, EnforcementLevel, Policy, Verdict};
use runtime::{CallState, EventKind, FIXTURE, Interpreter, Matrix, Program};

// Rows are callers, columns callees, both in FIXTURE order:
// non_policied, policied_local, policied_shallow, policied,
// policied_of_local, policied_of_shallow, policied_of, pure
const EXPECTED: [[bool; 8]; 8] = [
    [true, true, true, true, true, true, true, true],
    [false, true, false, false, false, false, false, true],
    [false, true, true, false, false, false, false, true],
    [false, true, true, true, false, false, false, true],
    [false, true, false, false, true, false, false, true],
    [false, true, true, false, true, true, false, true],
    [false, true, true, true, true, true, true, true],
    [false, false, false, false, false, false, false, true],
];

fn names() -> Vec<&'static str> {
    FIXTURE.iter().map(|(name, _)| *name).collect()
}

fn run(level: EnforcementLevel) -> runtime::Report {
    let program = Program::fixture().unwrap();
    let mut interp = Interpreter::new(&program, Policy::new(level));
    Matrix::all(&interp).run(&mut interp).unwrap()
}

#[test]
fn every_pair_matches_the_lattice() {
    let report = run(EnforcementLevel::Warn);
    assert_eq!(report.pairs.len(), 64);
    assert!(report.aborted.is_none());

    for (i, caller) in names().into_iter().enumerate() {
        for (j, callee) in names().into_iter().enumerate() {
            let expected = if EXPECTED[i][j] {
                Verdict::Allowed
            } else {
                Verdict::Rejected
            };
            assert_eq!(
                report.verdict(caller, callee),
                Some(expected),
                "{caller} -> {callee}"
            );
        }
    }
    assert_eq!(report.allowed(), 33);
    assert_eq!(report.rejected(), 31);
}

#[test]
fn matrix_agrees_with_direct_check() {
    let report = run(EnforcementLevel::Warn);
    for (caller, caller_ctx) in FIXTURE {
        for (callee, callee_ctx) in FIXTURE {
            let direct = coeffects::check(&caller_ctx.into(), &callee_ctx.into());
            assert_eq!(report.verdict(caller, callee), Some(direct));
        }
    }
}

#[test]
fn pairs_enumerate_in_declared_order() {
    let report = run(EnforcementLevel::Warn);
    let order: Vec<(String, String)> = report
        .pairs
        .iter()
        .map(|p| (p.caller.clone(), p.callee.clone()))
        .collect();
    let expected: Vec<(String, String)> = names()
        .into_iter()
        .flat_map(|a| names().into_iter().map(move |b| (a.to_string(), b.to_string())))
        .collect();
    assert_eq!(order, expected);
}

#[test]
fn violations_name_the_inner_call() {
    let report = run(EnforcementLevel::Warn);
    for pair in &report.pairs {
        if let Some(v) = &pair.violation {
            assert_eq!(v.caller, pair.caller);
            assert_eq!(v.callee, pair.callee);
            assert!(!v.unmet.is_empty());
            assert!(!v.missing.is_empty());
        }
    }
}

#[test]
fn repeating_the_matrix_is_idempotent() {
    let program = Program::fixture().unwrap();
    let mut interp = Interpreter::new(&program, Policy::default());
    let matrix = Matrix::all(&interp);
    let first = matrix.run(&mut interp).unwrap();
    let second = matrix.run(&mut interp).unwrap();
    assert_eq!(first.pairs, second.pairs);
}

#[test]
fn fatal_stops_at_first_violation() {
    let report = run(EnforcementLevel::Fatal);
    // non_policied row is all allowed; the first rejection is
    // policied_local -> non_policied.
    assert_eq!(report.pairs.len(), 9);
    let aborted = report.aborted.as_ref().unwrap();
    assert_eq!(aborted.caller, "policied_local");
    assert_eq!(aborted.callee, "non_policied");
    assert_eq!(report.pairs.last().unwrap().verdict, Verdict::Rejected);
}

#[test]
fn fatal_run_leaves_no_call_site_unfinished() {
    let program = Program::fixture().unwrap();
    let mut interp = Interpreter::new(&program, Policy::new(EnforcementLevel::Fatal));
    let report = Matrix::all(&interp).run(&mut interp).unwrap();
    assert!(report.aborted.is_some());

    let trace = interp.trace();
    let sites: Vec<_> = trace
        .events()
        .iter()
        .filter_map(|e| match e.kind {
            EventKind::Call { site, .. } => Some(site),
            _ => None,
        })
        .collect();
    for site in &sites {
        assert!(trace.final_state(*site).is_some(), "site {site} has no final state");
    }

    // The outer main -> policied_local call started, then its body failed.
    let last = *sites.last().unwrap();
    assert_eq!(trace.final_state(last), Some(CallState::Aborted));
    assert_eq!(trace.final_state(last - 1), Some(CallState::Failed));
}

#[test]
fn off_allows_everything() {
    let report = run(EnforcementLevel::Off);
    assert_eq!(report.allowed(), 64);
}

#[test]
fn fixture_entry_context_rejects_outer_calls() {
    let program = Program::fixture().unwrap();
    let mut interp = Interpreter::new(&program, Policy::default());
    let matrix =
        Matrix::select(&interp, names().as_slice(), Context::PoliciedOfLocal.into()).unwrap();
    let report = matrix.run(&mut interp).unwrap();

    // The driver can only reach callers below policied_of_local.
    let entry = CapabilitySet::from(Context::PoliciedOfLocal);
    for pair in &report.pairs {
        let caller = program.function(&pair.caller).unwrap();
        if !entry.satisfies(caller.capabilities()) {
            let v = pair.violation.as_ref().unwrap();
            assert_eq!(v.caller, runtime::DRIVER);
            assert_eq!(v.callee, pair.caller);
        }
    }
    assert_eq!(report.verdict("policied_of_local", "policied_local"), Some(Verdict::Allowed));
    assert_eq!(report.verdict("policied", "pure"), Some(Verdict::Rejected));
}
