//! Coeffect lattice and call enforcement.
//!
//! Every function carries a [`CapabilitySet`] built from named [`Context`]s.
//! A call is allowed when the callee's set is below the caller's in the
//! subsumption order ([`leq`]); otherwise it produces a [`Violation`].
//!
//! # Example
//!
//! ```
//! use coeffects::{CapabilitySet, Context, Decision, Policy};
//!
//! let policy = Policy::default();
//! let caller = CapabilitySet::from(Context::Policied);
//! let callee = CapabilitySet::from(Context::PoliciedOfLocal);
//!
//! let decision = policy.check("caller", &caller, "callee", &callee);
//! assert!(matches!(decision, Decision::Deny { .. }));
//! ```

mod capability;
mod error;
mod policy;
mod set;

pub use capability::{Capabilities, Context};
pub use error::{Error, Result, Violation};
pub use policy::{Decision, EnforcementLevel, Policy, Verdict, check};
pub use set::{CapabilitySet, leq};
