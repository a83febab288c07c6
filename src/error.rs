//! Error types for graph construction, compilation and frame execution.

use thiserror::Error;

use crate::resource::ResourceState;

/// Which declaration list of a pass an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Input,
    Output,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Input => write!(f, "input"),
            Self::Output => write!(f, "output"),
        }
    }
}

/// Errors raised while declaring or compiling a render graph.
///
/// All of these are construction-time failures: the declared topology is
/// invalid and must be fixed by the caller before recompiling. Every variant
/// names the offending pass and/or resource.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CompileError {
    /// The same resource id was declared twice on one pass's input or
    /// output list.
    #[error("pass '{pass}' declares resource '{resource}' twice as an {direction}")]
    DuplicateDeclaration {
        pass: String,
        resource: String,
        direction: Direction,
    },

    /// A declaration used the `Undefined` sentinel state or referenced a
    /// resource id unknown to this graph.
    #[error("invalid declaration on pass '{pass}': {reason}")]
    InvalidDeclaration { pass: String, reason: String },

    /// An input has no producing pass and is not a persistent resource
    /// supplied by the caller.
    #[error("input '{resource}' of pass '{pass}' has no producer and is not persistent")]
    UnresolvedDependency { pass: String, resource: String },

    /// Two passes declare the same resource id as an output. Each resource
    /// has exactly one producer; multiple writers must be modeled as
    /// separate resource ids.
    #[error("resource '{resource}' is produced by both pass '{first}' and pass '{second}'")]
    DuplicateProducer {
        resource: String,
        first: String,
        second: String,
    },

    /// A pass consumes its own output in the same invocation.
    #[error("pass '{pass}' consumes its own output '{resource}'")]
    SelfDependency { pass: String, resource: String },

    /// The dependency graph contains a cycle. The pass names are listed in
    /// cycle order, with the first pass repeated at the end.
    #[error("cyclic dependency: {}", .passes.join(" -> "))]
    CyclicDependency { passes: Vec<String> },

    /// The state tracker encountered a usage mode it cannot transition to.
    #[error("unsupported usage {state:?} for resource '{resource}'")]
    UnsupportedUsage {
        resource: String,
        state: ResourceState,
    },
}

/// Non-fatal diagnostics produced during compilation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompileWarning {
    /// A transient output is never consumed by any pass.
    DeadOutput { pass: String, resource: String },
}

impl std::fmt::Display for CompileWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DeadOutput { pass, resource } => {
                write!(f, "output '{resource}' of pass '{pass}' is never consumed")
            }
        }
    }
}

/// Error returned by a pass's `init` or `execute` hook.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct PassError(pub String);

impl PassError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Errors raised while executing a compiled schedule.
///
/// Any of these is fatal to the current frame; the executor never retries
/// or skips passes.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    /// A pass hook reported failure.
    #[error("pass '{pass}' failed: {source}")]
    PassExecution { pass: String, source: PassError },

    /// No backing handle was supplied for a persistent resource the
    /// schedule touches.
    #[error("no binding supplied for persistent resource '{resource}'")]
    MissingBinding { resource: String },

    /// The backend failed to allocate backing storage for a transient slot.
    #[error("slot allocation failed: {0}")]
    Allocation(#[from] crate::backend::BackendError),

    /// The compiled schedule was built from an older revision of the graph.
    #[error("compiled schedule is stale; recompile the graph")]
    StaleSchedule,
}

pub type CompileResult<T> = Result<T, CompileError>;
pub type FrameResult<T> = Result<T, FrameError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CompileError::UnresolvedDependency {
            pass: "Opaque".to_string(),
            resource: "Depth".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "input 'Depth' of pass 'Opaque' has no producer and is not persistent"
        );

        let err = CompileError::CyclicDependency {
            passes: vec!["A".to_string(), "B".to_string(), "A".to_string()],
        };
        assert_eq!(err.to_string(), "cyclic dependency: A -> B -> A");
    }

    #[test]
    fn test_warning_display() {
        let warn = CompileWarning::DeadOutput {
            pass: "Debug".to_string(),
            resource: "Overlay".to_string(),
        };
        assert_eq!(
            warn.to_string(),
            "output 'Overlay' of pass 'Debug' is never consumed"
        );
    }
}
