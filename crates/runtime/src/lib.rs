//! Coeffect runtime: declared programs, an enforcing interpreter, and the
//! all-pairs call matrix.
//!
//! # Overview
//!
//! - **Program**: validated [`FunctionDecl`]s, each with a fixed
//!   [`coeffects::CapabilitySet`]. Loaded from TOML or built in code.
//! - **Interpreter**: runs bodies, checking every call site (direct or through
//!   a function value) against the *calling* function's set.
//! - **Matrix**: calls `caller(callee)` for every ordered pair and reports
//!   `caller -> callee: ok` or a violation marker per pair.
//!
//! # Example
//!
//! ```
//! use coeffects::{Policy, Verdict};
//! use runtime::{Interpreter, Matrix, Program};
//!
//! let program = Program::fixture()?;
//! let mut interp = Interpreter::new(&program, Policy::default());
//! let report = Matrix::all(&interp).run(&mut interp)?;
//!
//! assert_eq!(report.verdict("policied", "policied_of_local"), Some(Verdict::Rejected));
//! assert_eq!(report.verdict("policied_of_local", "policied_local"), Some(Verdict::Allowed));
//! # Ok::<(), runtime::Error>(())
//! ```

pub mod call;
mod error;
mod interpreter;
mod matrix;
mod program;
pub mod trace;
mod value;

pub use call::{CallKind, CallSite, CallState, direct_sites};
pub use error::{Error, Result};
pub use interpreter::{CallOutcome, DEFAULT_MAX_DEPTH, Interpreter, MAX_DEPTH_LIMIT};
pub use matrix::{DRIVER, Matrix, Pair, Report};
pub use program::{Arg, FIXTURE, FunctionDecl, Program, Stmt, Target};
pub use trace::{Event, EventKind, Trace};
pub use value::{FunctionRef, Value};
