//! Coeffect error types.

use crate::{Capabilities, CapabilitySet, Context};
use serde::Serialize;
use thiserror::Error;

/// A call whose callee requires capabilities the caller does not hold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[error(
    "capability violation: {caller}() cannot call {callee}(): requires {required} but {provided} is available (missing {missing})"
)]
pub struct Violation {
    pub caller: String,
    pub callee: String,
    pub provided: CapabilitySet,
    pub required: CapabilitySet,
    /// Contexts of the callee the caller does not cover.
    pub unmet: Vec<Context>,
    #[serde(serialize_with = "serialize_missing")]
    pub missing: Capabilities,
}

fn serialize_missing<S: serde::Serializer>(
    missing: &Capabilities,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.collect_seq(missing.iter_names().map(|(name, _)| name))
}

/// Coeffect errors.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// A call was rejected by enforcement.
    #[error(transparent)]
    Violation(#[from] Violation),

    /// A context name outside the vocabulary.
    #[error("unknown context: {0}")]
    UnknownContext(String),

    /// Failed to parse a policy file.
    #[error("failed to parse policy: {0}")]
    Parse(String),

    /// An I/O error occurred while reading policy.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
