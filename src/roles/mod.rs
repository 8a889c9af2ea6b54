//! The two test roles
//!
//! Each role is a straight-line procedure repeated for a fixed number of
//! enable/operate/disable cycles. Every collaborator call is a fallible
//! step that short-circuits the whole run on error; there is no retry and
//! no partial recovery.

mod advertiser;
mod scanner;

pub use advertiser::Advertiser;
pub use scanner::Scanner;

use crate::error::{StackError, TestError};

/// Per-iteration state of a role, logged at each transition.
///
/// idle → enabled → operating → enabled → idle; any step failure is a
/// terminal failure of the whole run, not just the current cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Enabled,
    Scanning,
    Advertising,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::Idle => write!(f, "idle"),
            Phase::Enabled => write!(f, "enabled"),
            Phase::Scanning => write!(f, "scanning"),
            Phase::Advertising => write!(f, "advertising"),
        }
    }
}

/// Map a stack error onto a step-failure message that names the failing
/// operation and embeds the status code.
pub(crate) fn step_err(msg: &'static str) -> impl Fn(StackError) -> TestError {
    move |err| TestError::Fail(format!("{} (err {})", msg, err.code))
}
