//! Process invocation boundary.
//!
//! A stage tool signals its result only through its exit status and puts
//! its most relevant error on the first line of stderr. [`classify`] turns
//! that convention into an [`Outcome`].

pub mod command;

use std::process::ExitStatus;

use serde::{Deserialize, Serialize};

pub use command::CommandInvoker;

/// Failure text reported when an invocation exceeds its deadline.
pub const TIMEOUT_MESSAGE: &str = "timeout";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "message", rename_all = "snake_case")]
pub enum Outcome {
    Success,
    Failure(String),
}

impl Outcome {
    pub fn failure(message: impl Into<String>) -> Self {
        Outcome::Failure(message.into())
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success)
    }

    pub fn message(&self) -> Option<&str> {
        match self {
            Outcome::Success => None,
            Outcome::Failure(message) => Some(message),
        }
    }
}

/// Runs an external tool to completion.
pub trait ProcessInvoker: Send + Sync {
    fn invoke(&self, tool: &str, args: &[String]) -> Outcome;
}

/// Maps an exit status and the captured stderr lines to an outcome.
///
/// A zero exit is a success regardless of output. A non-zero exit reports
/// the first non-blank diagnostic line, or the generic exit text when the
/// tool wrote nothing.
pub fn classify(status: ExitStatus, diagnostics: &[String]) -> Outcome {
    if status.success() {
        return Outcome::Success;
    }

    match first_line(diagnostics) {
        Some(line) => Outcome::failure(line),
        None => Outcome::failure(exit_message(status)),
    }
}

/// Generic text for a non-zero exit with no diagnostics.
pub fn exit_message(status: ExitStatus) -> String {
    format!("process exited with {}", status)
}

/// Generic text for a tool that could not be started at all.
pub fn spawn_message(err: &std::io::Error) -> String {
    format!("process could not start: {}", err)
}

fn first_line(diagnostics: &[String]) -> Option<&str> {
    diagnostics
        .iter()
        .map(|l| l.trim_end())
        .find(|l| !l.trim().is_empty())
}
