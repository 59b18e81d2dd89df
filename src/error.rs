//! Error kinds per §7. `Validation` and `Unsupported` are fatal and should
//! surface a message to the caller; domain conditions (a value outside its
//! support) are never represented as an `Err` — they are `f64::NEG_INFINITY`
//! log-densities.

use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum RbError {
    /// parameter vector length mismatch, missing timeline, duplicate event
    /// time, removing an absent event, a structural violation such as a
    /// non-binary/ternary node reaching the pruning kernel.
    Validation(String),
    /// a method was invoked on a concrete distribution/value type that does
    /// not implement it (e.g. a trace object for an unsupported value tag).
    Unsupported(String),
}

impl fmt::Display for RbError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RbError::Validation(msg) => write!(f, "validation error: {msg}"),
            RbError::Unsupported(msg) => write!(f, "unsupported: {msg}"),
        }
    }
}

impl std::error::Error for RbError {}

pub type RbResult<T> = Result<T, RbError>;
