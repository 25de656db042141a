//! # taskchain
//!
//! Typed contracts for tasks, and argument verification for the chains built
//! from them.
//!
//! ## Features
//!
//! - **Task Contracts**: every task declares its required inputs, its optional inputs with defaults, and its outputs
//! - **Output Binding**: a task's return value is published under declared names, checked at definition and call time
//! - **Chains**: signatures and injected seeds compose with `|` into flat, ordered pipelines
//! - **Verification**: catch a step that will never receive a required input before the chain runs
//!
//! ## Quick Start
//!
//! ```rust
//! use taskchain::prelude::*;
//! use serde_json::json;
//!
//! let mut registry = TaskRegistry::new();
//!
//! let fetch = registry.task(
//!     TaskDef::new("fetch", |call| Ok(json!(format!("data for {}", call.arg("user")))))
//!         .arg("user")
//!         .returns(["payload"])
//!         .expect("valid output keys"),
//! );
//! let store = registry.task(
//!     TaskDef::new("store", |_| Ok(ArgValue::Null))
//!         .arg("payload")
//!         .arg_default("retries", 3),
//! );
//!
//! let chain = InjectArgs::new().with("user", "ada") | fetch.s() | store.s();
//! assert!(verify_chain_arguments(&chain).is_ok());
//! assert_eq!(chain.get_label(), "fetch|store");
//! ```
//!
//! ## Module Organization
//!
//! - [`prelude`]: Commonly used types and functions (import with `use taskchain::prelude::*`)

// ============================================================================
// Core Module
// ============================================================================

mod core;

// ============================================================================
// Public Re-exports - Granular Imports
// ============================================================================

pub use crate::core::{ArgValue, Kwargs};

// Contracts and tasks
pub use crate::core::contract::{ContractParseError, OptionalArg, TaskContract};
pub use crate::core::registry::TaskRegistry;
pub use crate::core::task::{Invocation, Task, TaskDef, TaskFn};

// Composition
pub use crate::core::chain::{Chain, LABEL_SEPARATOR, Step};
pub use crate::core::signature::{Binding, InjectArgs, Signature};

// Verification
pub use crate::core::validation::{ValidationIssue, ValidationResult};
pub use crate::core::verify::{ChainVerifier, VerifyOptions, verify_chain_arguments};

// Execution
pub use crate::core::apply::{ChainResult, StepRecord};
pub use crate::core::telemetry::{MemoryTelemetry, Telemetry, TraceEntry};

// Errors
pub use crate::core::error::{
    Error, InvalidChainArgs, Result, ReturnsCodingError, ReturnsError, TaskError,
};

// ============================================================================
// Prelude Module - Convenient Bulk Import
// ============================================================================

/// The main prelude: imports everything needed to define tasks and build chains.
///
/// # Example
/// ```rust
/// use taskchain::prelude::*;
/// ```
pub mod prelude {
    pub use super::{
        ArgValue,
        Binding,
        // Composition
        Chain,
        ChainVerifier,
        InjectArgs,
        InvalidChainArgs,
        Invocation,
        Kwargs,
        ReturnsCodingError,
        ReturnsError,
        Signature,
        // Tasks
        Task,
        TaskContract,
        TaskDef,
        TaskError,
        TaskRegistry,
        // Verification
        ValidationIssue,
        ValidationResult,
        VerifyOptions,
        verify_chain_arguments,
    };
}

// ============================================================================
// Library Metadata
// ============================================================================

/// The version of this crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// The name of this crate.
pub const NAME: &str = env!("CARGO_PKG_NAME");
