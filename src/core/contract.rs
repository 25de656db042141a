use crate::core::ArgValue;
use crate::core::error::ReturnsCodingError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::str::FromStr;
use thiserror::Error;

/// An input that may be omitted by callers, together with the value used in its place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionalArg {
    pub name: String,
    pub default: ArgValue,
}

/// The static contract of a task: what it needs, what it can do without, and what it produces.
///
/// Built once while a task is being defined and shared read-only afterwards.
/// Deserialized contracts go through the same checks as built ones.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawContract")]
pub struct TaskContract {
    required: Vec<String>,
    optional: Vec<OptionalArg>,
    returns: Vec<String>,
}

#[derive(Deserialize)]
struct RawContract {
    #[serde(default)]
    required: Vec<String>,
    #[serde(default)]
    optional: Vec<OptionalArg>,
    #[serde(default)]
    returns: Vec<String>,
}

impl TryFrom<RawContract> for TaskContract {
    type Error = ContractParseError;

    fn try_from(raw: RawContract) -> Result<Self, Self::Error> {
        let mut seen = HashSet::new();
        let names = raw
            .required
            .iter()
            .map(String::as_str)
            .chain(raw.optional.iter().map(|o| o.name.as_str()));
        for name in names {
            if !seen.insert(name) {
                return Err(ContractParseError::ConflictingInput(name.to_string()));
            }
        }

        let contract = TaskContract {
            required: raw.required,
            optional: raw.optional,
            returns: Vec::new(),
        };
        if raw.returns.is_empty() {
            return Ok(contract);
        }
        Ok(contract.declare_outputs(DESERIALIZED, raw.returns)?)
    }
}

/// Stands in for the task name in errors raised before a contract belongs to a task.
const DESERIALIZED: &str = "<deserialized contract>";

impl TaskContract {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an input with no default. Re-declaring a name replaces the earlier declaration.
    pub fn required(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.forget_input(&name);
        self.required.push(name);
        self
    }

    /// Adds an input that falls back to `default` when nothing is bound to it.
    pub fn optional(mut self, name: impl Into<String>, default: impl Into<ArgValue>) -> Self {
        let name = name.into();
        self.forget_input(&name);
        self.optional.push(OptionalArg {
            name,
            default: default.into(),
        });
        self
    }

    /// Declares the names under which the task's return value is published.
    ///
    /// `task` only feeds the error message.
    pub fn declare_outputs<I, S>(mut self, task: &str, keys: I) -> Result<Self, ReturnsCodingError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if !self.returns.is_empty() {
            return Err(ReturnsCodingError::AlreadyDeclared {
                task: task.to_string(),
                existing: self.returns.clone(),
            });
        }

        let keys: Vec<String> = keys.into_iter().map(Into::into).collect();
        if keys.is_empty() {
            return Err(ReturnsCodingError::NoKeys {
                task: task.to_string(),
            });
        }

        let duplicates = duplicate_keys(&keys);
        if !duplicates.is_empty() {
            return Err(ReturnsCodingError::DuplicateKeys {
                task: task.to_string(),
                keys: duplicates,
            });
        }

        self.returns = keys;
        Ok(self)
    }

    pub fn required_inputs(&self) -> &[String] {
        &self.required
    }

    pub fn optional_inputs(&self) -> &[OptionalArg] {
        &self.optional
    }

    /// Declared output keys, empty when the task publishes its return value untupled.
    pub fn declared_outputs(&self) -> &[String] {
        &self.returns
    }

    pub fn is_required(&self, name: &str) -> bool {
        self.required.iter().any(|r| r == name)
    }

    /// The default of an optional input.
    ///
    /// `None` means the input is not optional; `Some(&Null)` is a real `null` default.
    pub fn default_for(&self, name: &str) -> Option<&ArgValue> {
        self.optional
            .iter()
            .find(|o| o.name == name)
            .map(|o| &o.default)
    }

    /// Every input name the contract knows about, required first.
    pub fn inputs(&self) -> impl Iterator<Item = &str> {
        self.required
            .iter()
            .map(String::as_str)
            .chain(self.optional.iter().map(|o| o.name.as_str()))
    }

    fn forget_input(&mut self, name: &str) {
        self.required.retain(|r| r != name);
        self.optional.retain(|o| o.name != name);
    }
}

fn duplicate_keys(keys: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut duplicates = Vec::new();
    for key in keys {
        if !seen.insert(key.as_str()) && !duplicates.contains(key) {
            duplicates.push(key.clone());
        }
    }
    duplicates
}

/// Failure to read the `"a, b=default -> out"` shorthand.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContractParseError {
    #[error("contract shorthand must contain exactly one '->': '{0}'")]
    Arrow(String),

    #[error("contract shorthand has an unnamed input: '{0}'")]
    UnnamedInput(String),

    #[error("contract shorthand has an unterminated string or bracket: '{0}'")]
    Unbalanced(String),

    #[error("input '{0}' is declared more than once")]
    ConflictingInput(String),

    #[error(transparent)]
    Returns(#[from] ReturnsCodingError),
}

impl FromStr for TaskContract {
    type Err = ContractParseError;

    /// Parses shorthand syntax: "required, optional=default -> output1, output2"
    ///
    /// Defaults are read as JSON when they parse as JSON and as plain strings otherwise.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let unbalanced = || ContractParseError::Unbalanced(s.to_string());
        let parts = split_top_level(s, "->").ok_or_else(unbalanced)?;
        if parts.len() != 2 {
            return Err(ContractParseError::Arrow(s.to_string()));
        }

        let fields = |part: &str| -> Result<Vec<String>, ContractParseError> {
            Ok(split_top_level(part, ",")
                .ok_or_else(unbalanced)?
                .into_iter()
                .map(str::trim)
                .filter(|f| !f.is_empty())
                .map(str::to_string)
                .collect())
        };

        let mut contract = TaskContract::new();
        let mut seen = HashSet::new();
        for field in fields(parts[0])? {
            let (name, default) = match field.split_once('=') {
                Some((name, default)) => (name.trim(), Some(default.trim())),
                None => (field.as_str(), None),
            };
            if name.is_empty() {
                return Err(ContractParseError::UnnamedInput(s.to_string()));
            }
            if !seen.insert(name.to_string()) {
                return Err(ContractParseError::ConflictingInput(name.to_string()));
            }
            contract = match default {
                Some(default) => {
                    let value = serde_json::from_str(default)
                        .unwrap_or_else(|_| ArgValue::String(default.to_string()));
                    contract.optional(name, value)
                }
                None => contract.required(name),
            };
        }

        let outputs = fields(parts[1])?;
        if !outputs.is_empty() {
            contract = contract.declare_outputs(s.trim(), outputs)?;
        }

        Ok(contract)
    }
}

/// Splits `s` on `sep` wherever it appears outside JSON strings, arrays and objects.
///
/// `None` when a string or bracket is left open.
fn split_top_level<'a>(s: &'a str, sep: &str) -> Option<Vec<&'a str>> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    let mut start = 0;

    for (i, c) in s.char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '[' | '{' => depth += 1,
            ']' | '}' => depth = depth.checked_sub(1)?,
            _ if depth == 0 && i >= start && s[i..].starts_with(sep) => {
                parts.push(&s[start..i]);
                start = i + sep.len();
            }
            _ => {}
        }
    }

    if in_string || depth != 0 {
        return None;
    }
    parts.push(&s[start..]);
    Some(parts)
}

/// Macro for rapid contract creation: contract!("start, retries=3 -> result")
#[macro_export]
macro_rules! contract {
    ($s:expr) => {
        $s.parse::<$crate::TaskContract>()
            .expect("Invalid contract shorthand")
    };
}
