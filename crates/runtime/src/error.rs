use thiserror::Error;

/// Runtime errors.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error("unknown function: {0}")]
    UnknownFunction(String),

    #[error("duplicate function: {0}")]
    DuplicateFunction(String),

    #[error("{function}() has no parameter {index}")]
    MissingArgument { function: String, index: usize },

    #[error("{function}() expects {expected} arguments, got {got}")]
    Arity {
        function: String,
        expected: usize,
        got: usize,
    },

    #[error("call depth exceeded {limit} in {function}()")]
    DepthExceeded { function: String, limit: usize },

    #[error("invalid call state transition: {from:?} -> {to:?}")]
    InvalidTransition {
        from: crate::CallState,
        to: crate::CallState,
    },

    #[error("failed to parse program: {0}")]
    Parse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Policy(#[from] coeffects::Error),
}

impl From<coeffects::Violation> for Error {
    fn from(v: coeffects::Violation) -> Self {
        Error::Policy(coeffects::Error::Violation(v))
    }
}

impl Error {
    /// The violation behind this error, if it is one.
    pub fn violation(&self) -> Option<&coeffects::Violation> {
        match self {
            Error::Policy(coeffects::Error::Violation(v)) => Some(v),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
