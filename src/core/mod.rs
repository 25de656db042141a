pub mod apply;
pub mod chain;
pub mod contract;
pub mod error;
pub mod registry;
pub mod signature;
pub mod task;
pub mod telemetry;
pub mod validation;
pub mod verify;

use std::collections::BTreeMap;

/// The Alias for serde_json::Value, the currency of task arguments and results
pub type ArgValue = serde_json::Value;

/// Keyword arguments by name, kept sorted so traces and errors are reproducible.
pub type Kwargs = BTreeMap<String, ArgValue>;
