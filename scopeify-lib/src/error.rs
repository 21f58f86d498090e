//! Failures surfaced by the scoping pipeline.

use std::error::Error;
use std::fmt;

/// The scoping engine could not turn the extracted CSS into a scope map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScopeError {
    /// The stylesheet could not be parsed.
    Parse(String),
    /// The stylesheet was parsed but could not be printed back.
    Print(String),
    /// Failure reported by a custom engine.
    Engine(String),
}

impl fmt::Display for ScopeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScopeError::Parse(msg) => write!(f, "failed to parse stylesheet: {msg}"),
            ScopeError::Print(msg) => write!(f, "failed to print stylesheet: {msg}"),
            ScopeError::Engine(msg) => write!(f, "scoping engine failed: {msg}"),
        }
    }
}

impl Error for ScopeError {}

/// One element the DOM walk could not commit a rewrite to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementFailure {
    /// Position of the element in document order.
    pub index: usize,
    pub reason: String,
}

impl fmt::Display for ElementFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "element #{}: {}", self.index, self.reason)
    }
}

/// Rewriting the document failed. Elements committed before the failure stay rewritten.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyError {
    /// A font-face or keyframes key is too long to build its inline-style matcher.
    InvalidPattern { key: String, message: String },
    /// The walk finished but some elements could not be rewritten.
    Elements {
        failures: Vec<ElementFailure>,
        rewritten: usize,
    },
}

impl fmt::Display for ApplyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApplyError::InvalidPattern { key, message } => {
                write!(f, "cannot match `{key}` in inline styles: {message}")
            }
            ApplyError::Elements {
                failures,
                rewritten,
            } => {
                write!(
                    f,
                    "{} element(s) could not be rewritten ({rewritten} rewritten)",
                    failures.len()
                )?;
                if let Some(first) = failures.first() {
                    write!(f, "; first: {first}")?;
                }
                Ok(())
            }
        }
    }
}

impl Error for ApplyError {}

/// Stage of a scoping run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Idle,
    ExtractingStyle,
    Scoping,
    ApplyingToDom,
    Done,
    Failed,
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunPhase::Idle => "idle",
            RunPhase::ExtractingStyle => "extracting style",
            RunPhase::Scoping => "scoping",
            RunPhase::ApplyingToDom => "applying to dom",
            RunPhase::Done => "done",
            RunPhase::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// A scoping run failed, either in the engine or while rewriting the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunError {
    Scoping(ScopeError),
    Apply(ApplyError),
}

impl RunError {
    /// The phase the run was in when it failed.
    pub fn phase(&self) -> RunPhase {
        match self {
            RunError::Scoping(_) => RunPhase::Scoping,
            RunError::Apply(_) => RunPhase::ApplyingToDom,
        }
    }
}

impl fmt::Display for RunError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunError::Scoping(err) => write!(f, "scoping failed: {err}"),
            RunError::Apply(err) => write!(f, "applying scoped names failed: {err}"),
        }
    }
}

impl Error for RunError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            RunError::Scoping(err) => Some(err),
            RunError::Apply(err) => Some(err),
        }
    }
}

impl From<ScopeError> for RunError {
    fn from(err: ScopeError) -> Self {
        RunError::Scoping(err)
    }
}

impl From<ApplyError> for RunError {
    fn from(err: ApplyError) -> Self {
        RunError::Apply(err)
    }
}
