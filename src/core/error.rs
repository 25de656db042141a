use std::fmt;
use thiserror::Error;

/// Raised while a task is being defined, when its declared outputs are malformed.
///
/// These are programming mistakes in the task definition and are never retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReturnsCodingError {
    #[error("task '{task}' declares outputs without naming any keys")]
    NoKeys { task: String },

    #[error("task '{task}' declares duplicate output keys: {keys:?}")]
    DuplicateKeys { task: String, keys: Vec<String> },

    #[error(
        "output keys for '{task}' must be declared on the raw implementation, not on the registered task '{registered}'"
    )]
    OutsideRegistration { task: String, registered: String },

    #[error("task '{task}' already declares outputs {existing:?}")]
    AlreadyDeclared { task: String, existing: Vec<String> },
}

/// Raised when a task's actual return value does not fit its declared outputs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReturnsError {
    #[error("task '{task}' returned nothing but declares {expected} output keys")]
    NoReturnValue { task: String, expected: usize },

    #[error("task '{task}' returned {actual} values but declares {expected} output keys")]
    ArityMismatch {
        task: String,
        expected: usize,
        actual: usize,
    },
}

/// The first step of a chain whose inputs cannot all be satisfied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidChainArgs {
    /// Name of the offending task.
    pub task: String,
    /// Zero-based index of the step in the flattened chain.
    pub position: usize,
    /// Required inputs with no satisfying source, in declaration order.
    pub missing: Vec<String>,
    /// Optional or undeclared inputs bound to a name nothing earlier provides.
    ///
    /// Only filled when the verifier checks extra references.
    pub unresolved: Vec<String>,
}

impl fmt::Display for InvalidChainArgs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "chain step {} ('{}')", self.position, self.task)?;
        if !self.missing.is_empty() {
            write!(f, " is missing required arguments: {}", self.missing.join(", "))?;
        }
        if !self.unresolved.is_empty() {
            if !self.missing.is_empty() {
                f.write_str(";")?;
            }
            write!(f, " has unresolved references on: {}", self.unresolved.join(", "))?;
        }
        Ok(())
    }
}

impl std::error::Error for InvalidChainArgs {}

/// Raised when a task is invoked directly.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaskError {
    #[error("task '{task}' called without required argument '{argument}'")]
    MissingArgument { task: String, argument: String },

    #[error(transparent)]
    Returns(#[from] ReturnsError),
}

/// Umbrella error for callers that do not need to tell the layers apart.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Coding(#[from] ReturnsCodingError),

    #[error(transparent)]
    ChainArgs(#[from] InvalidChainArgs),

    #[error(transparent)]
    Task(#[from] TaskError),

    #[error("blocking task '{task}' did not complete: {reason}")]
    Join { task: String, reason: String },
}

pub type Result<T> = std::result::Result<T, Error>;
