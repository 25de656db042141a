use crate::core::contract::{OptionalArg, TaskContract};
use crate::core::error::{ReturnsCodingError, ReturnsError, TaskError};
use crate::core::signature::Signature;
use crate::core::{ArgValue, Kwargs};
use std::fmt;
use std::sync::Arc;

/// The raw implementation of a task.
pub type TaskFn = Arc<dyn Fn(&Invocation<'_>) -> Result<ArgValue, TaskError> + Send + Sync>;

/// What a task implementation sees when it is called.
#[derive(Debug, Clone, Copy)]
pub struct Invocation<'a> {
    task: &'a str,
    kwargs: &'a Kwargs,
}

impl<'a> Invocation<'a> {
    pub fn new(task: &'a str, kwargs: &'a Kwargs) -> Self {
        Self { task, kwargs }
    }

    /// Name of the task being run.
    pub fn task_name(&self) -> &'a str {
        self.task
    }

    /// Effective keyword arguments, with defaults filled in.
    pub fn kwargs(&self) -> &'a Kwargs {
        self.kwargs
    }

    pub fn get(&self, name: &str) -> Option<&'a ArgValue> {
        self.kwargs.get(name)
    }

    /// The named argument, or `null` when it was not supplied.
    pub fn arg(&self, name: &str) -> ArgValue {
        self.get(name).cloned().unwrap_or(ArgValue::Null)
    }
}

/// A task under construction.
///
/// Inputs and outputs are declared on the definition, which is then registered
/// (see [`TaskRegistry`](crate::TaskRegistry)) to obtain a callable [`Task`].
pub struct TaskDef {
    name: String,
    contract: TaskContract,
    implementation: TaskFn,
    /// Set when the implementation is itself a registered task.
    registered: Option<String>,
}

impl TaskDef {
    pub fn new<F>(name: impl Into<String>, implementation: F) -> Self
    where
        F: Fn(&Invocation<'_>) -> Result<ArgValue, TaskError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            contract: TaskContract::new(),
            implementation: Arc::new(implementation),
            registered: None,
        }
    }

    /// Defines a task whose implementation is an already registered task.
    ///
    /// The inner task's inputs carry over; its declared outputs do not.
    pub fn wrapping(name: impl Into<String>, task: Arc<Task>) -> Self {
        let mut contract = TaskContract::new();
        for required in task.required_args() {
            contract = contract.required(required.clone());
        }
        for optional in task.optional_args() {
            contract = contract.optional(optional.name.clone(), optional.default.clone());
        }

        let registered = Some(task.name().to_string());
        Self {
            name: name.into(),
            contract,
            implementation: Arc::new(move |call: &Invocation<'_>| task.call(call.kwargs().clone())),
            registered,
        }
    }

    pub fn arg(mut self, name: impl Into<String>) -> Self {
        self.contract = self.contract.required(name);
        self
    }

    pub fn arg_default(mut self, name: impl Into<String>, default: impl Into<ArgValue>) -> Self {
        self.contract = self.contract.optional(name, default);
        self
    }

    /// Takes inputs and outputs from a prepared contract, replacing anything declared so far.
    pub fn with_contract(mut self, contract: TaskContract) -> Result<Self, ReturnsCodingError> {
        if let Some(registered) = &self.registered {
            if !contract.declared_outputs().is_empty() {
                return Err(ReturnsCodingError::OutsideRegistration {
                    task: self.name.clone(),
                    registered: registered.clone(),
                });
            }
        }
        self.contract = contract;
        Ok(self)
    }

    /// Declares that the return value is published under `keys`.
    ///
    /// With one key the whole return value is bound to it. With more, the
    /// implementation must return an array with one element per key.
    pub fn returns<I, S>(mut self, keys: I) -> Result<Self, ReturnsCodingError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if let Some(registered) = &self.registered {
            return Err(ReturnsCodingError::OutsideRegistration {
                task: self.name.clone(),
                registered: registered.clone(),
            });
        }
        self.contract = self.contract.declare_outputs(&self.name, keys)?;
        Ok(self)
    }

    /// Wraps the implementation in a pass-through layer; the contract is untouched.
    pub fn decorate<D>(mut self, decorator: D) -> Self
    where
        D: FnOnce(TaskFn) -> TaskFn,
    {
        self.implementation = decorator(self.implementation);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn contract(&self) -> &TaskContract {
        &self.contract
    }
}

impl fmt::Debug for TaskDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskDef")
            .field("name", &self.name)
            .field("contract", &self.contract)
            .field("registered", &self.registered)
            .finish_non_exhaustive()
    }
}

/// A registered task: an implementation with its contract attached.
pub struct Task {
    name: String,
    contract: Arc<TaskContract>,
    implementation: TaskFn,
}

impl Task {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn contract(&self) -> &Arc<TaskContract> {
        &self.contract
    }

    pub fn required_args(&self) -> &[String] {
        self.contract.required_inputs()
    }

    pub fn optional_args(&self) -> &[OptionalArg] {
        self.contract.optional_inputs()
    }

    pub fn return_keys(&self) -> &[String] {
        self.contract.declared_outputs()
    }

    /// Starts a signature for this task with no bindings.
    pub fn s(self: &Arc<Self>) -> Signature {
        Signature::new(Arc::clone(self))
    }

    /// Runs the task.
    ///
    /// Optional inputs missing from `kwargs` get their defaults. When outputs are
    /// declared the result is an object holding them, alongside the caller's
    /// own keyword arguments.
    pub fn call(&self, kwargs: Kwargs) -> Result<ArgValue, TaskError> {
        if let Some(missing) = self
            .contract
            .required_inputs()
            .iter()
            .find(|r| !kwargs.contains_key(r.as_str()))
        {
            return Err(TaskError::MissingArgument {
                task: self.name.clone(),
                argument: missing.clone(),
            });
        }

        let mut effective = kwargs.clone();
        for optional in self.contract.optional_inputs() {
            effective
                .entry(optional.name.clone())
                .or_insert_with(|| optional.default.clone());
        }

        let result = (self.implementation)(&Invocation::new(&self.name, &effective))?;
        Ok(self.bind_outputs(result, kwargs)?)
    }

    fn bind_outputs(&self, result: ArgValue, kwargs: Kwargs) -> Result<ArgValue, ReturnsError> {
        let keys = self.contract.declared_outputs();
        let values = match keys.len() {
            0 => return Ok(result),
            1 => vec![result],
            expected => match result {
                ArgValue::Null => {
                    return Err(ReturnsError::NoReturnValue {
                        task: self.name.clone(),
                        expected,
                    });
                }
                ArgValue::Array(items) if items.len() == expected => items,
                ArgValue::Array(items) => {
                    return Err(ReturnsError::ArityMismatch {
                        task: self.name.clone(),
                        expected,
                        actual: items.len(),
                    });
                }
                _ => {
                    return Err(ReturnsError::ArityMismatch {
                        task: self.name.clone(),
                        expected,
                        actual: 1,
                    });
                }
            },
        };

        let mut out: serde_json::Map<String, ArgValue> = kwargs.into_iter().collect();
        for (key, value) in keys.iter().zip(values) {
            out.insert(key.clone(), value);
        }
        Ok(ArgValue::Object(out))
    }
}

impl From<TaskDef> for Task {
    fn from(def: TaskDef) -> Self {
        Self {
            name: def.name,
            contract: Arc::new(def.contract),
            implementation: def.implementation,
        }
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("name", &self.name)
            .field("contract", &self.contract)
            .finish_non_exhaustive()
    }
}
