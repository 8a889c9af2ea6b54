//! Error types for the cycle test driver

use std::time::Duration;

/// Status classes returned by the simulated host stack.
///
/// Mirrors the errno-style codes a native host stack reports, so failure
/// messages can embed the numeric status the way the stack logs do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCode {
    /// The stack is not ready for this operation (not enabled yet).
    NotReady,
    /// No free resource slot (identity table exhausted).
    NoMemory,
    /// The resource is in use and cannot be released.
    Busy,
    /// Invalid parameters or unknown resource.
    Invalid,
    /// The requested state is already active (or already torn down).
    Already,
}

impl StatusCode {
    /// Negative errno-style code for this status.
    pub fn errno(self) -> i32 {
        match self {
            StatusCode::NotReady => -11,
            StatusCode::NoMemory => -12,
            StatusCode::Busy => -16,
            StatusCode::Invalid => -22,
            StatusCode::Already => -120,
        }
    }
}

/// A failed host-stack operation.
///
/// Carries the operation name and the numeric status code so the test
/// verdict can name the failing call and embed the code.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{op} failed (err {code})")]
pub struct StackError {
    /// Name of the failing stack operation
    pub op: &'static str,
    /// Negative errno-style status code
    pub code: i32,
}

impl StackError {
    pub fn new(op: &'static str, status: StatusCode) -> Self {
        Self {
            op,
            code: status.errno(),
        }
    }
}

/// A failure of the test run as a whole.
///
/// Every stack-operation failure is immediately fatal to the entire run;
/// the role drivers format the step message and short-circuit with `?`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TestError {
    /// A step of the procedure failed; the message names the operation
    /// and embeds the status code.
    #[error("{0}")]
    Fail(String),

    /// The wait on the completion flag stalled past the harness budget.
    #[error("timed out after {0:?} waiting for completion signal")]
    WaitTimeout(Duration),
}
