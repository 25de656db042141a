use crate::core::contract::TaskContract;
use crate::core::task::Task;
use crate::core::{ArgValue, Kwargs};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use uuid::Uuid;

/// The value bound to a keyword of a [`Signature`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Binding {
    /// A value passed as-is.
    Literal(ArgValue),
    /// The name of an output produced earlier in the chain.
    Reference(String),
}

impl Binding {
    /// Prefix that marks a string as a reference in [`Binding::from_marked`].
    pub const REFERENCE_MARKER: char = '@';

    pub fn literal(value: impl Into<ArgValue>) -> Self {
        Binding::Literal(value.into())
    }

    pub fn reference(name: impl Into<String>) -> Self {
        Binding::Reference(name.into())
    }

    /// Reads a value from an untyped source where `"@name"` strings denote references.
    pub fn from_marked(value: ArgValue) -> Self {
        match value {
            ArgValue::String(s) if s.len() > 1 && s.starts_with(Self::REFERENCE_MARKER) => {
                Binding::Reference(s[Self::REFERENCE_MARKER.len_utf8()..].to_string())
            }
            other => Binding::Literal(other),
        }
    }

    pub fn as_literal(&self) -> Option<&ArgValue> {
        match self {
            Binding::Literal(value) => Some(value),
            Binding::Reference(_) => None,
        }
    }

    pub fn as_reference(&self) -> Option<&str> {
        match self {
            Binding::Reference(name) => Some(name),
            Binding::Literal(_) => None,
        }
    }
}

impl From<ArgValue> for Binding {
    fn from(value: ArgValue) -> Self {
        Binding::Literal(value)
    }
}

/// A task with some of its keyword arguments bound, ready to be placed in a chain.
#[derive(Debug, Clone)]
pub struct Signature {
    id: Uuid,
    task: Arc<Task>,
    kwargs: BTreeMap<String, Binding>,
    label: Option<String>,
}

impl Signature {
    pub fn new(task: Arc<Task>) -> Self {
        Self {
            id: Uuid::new_v4(),
            task,
            kwargs: BTreeMap::new(),
            label: None,
        }
    }

    /// Binds a literal value.
    pub fn with(self, name: impl Into<String>, value: impl Into<ArgValue>) -> Self {
        self.bind(name, Binding::Literal(value.into()))
    }

    /// Binds `name` to whatever an earlier step publishes as `target`.
    pub fn with_ref(self, name: impl Into<String>, target: impl Into<String>) -> Self {
        self.bind(name, Binding::Reference(target.into()))
    }

    pub fn bind(mut self, name: impl Into<String>, binding: Binding) -> Self {
        self.kwargs.insert(name.into(), binding);
        self
    }

    /// Binds every entry of `kwargs` as a literal.
    pub fn with_kwargs(mut self, kwargs: Kwargs) -> Self {
        for (name, value) in kwargs {
            self.kwargs.insert(name, Binding::Literal(value));
        }
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn task(&self) -> &Arc<Task> {
        &self.task
    }

    pub fn task_name(&self) -> &str {
        self.task.name()
    }

    pub fn contract(&self) -> &TaskContract {
        self.task.contract()
    }

    pub fn kwargs(&self) -> &BTreeMap<String, Binding> {
        &self.kwargs
    }

    pub fn binding(&self, name: &str) -> Option<&Binding> {
        self.kwargs.get(name)
    }

    /// Names bound to literal values.
    pub fn literal_keys(&self) -> impl Iterator<Item = &str> {
        self.kwargs
            .iter()
            .filter(|(_, binding)| binding.as_literal().is_some())
            .map(|(name, _)| name.as_str())
    }

    pub fn get_label(&self) -> String {
        self.label
            .clone()
            .unwrap_or_else(|| self.task.name().to_string())
    }

    pub fn set_label(&mut self, label: impl Into<String>) {
        self.label = Some(label.into());
    }

    pub(crate) fn explicit_label(&self) -> Option<&str> {
        self.label.as_deref()
    }
}

/// Starting values injected at the head of (or anywhere in) a chain.
///
/// Requires nothing and makes each of its keys available to later steps.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InjectArgs {
    kwargs: Kwargs,
}

impl InjectArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<ArgValue>) -> Self {
        self.kwargs.insert(name.into(), value.into());
        self
    }

    pub fn kwargs(&self) -> &Kwargs {
        &self.kwargs
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.kwargs.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.kwargs.is_empty()
    }
}

impl From<Kwargs> for InjectArgs {
    fn from(kwargs: Kwargs) -> Self {
        Self { kwargs }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::task::TaskDef;
    use serde_json::json;

    fn task(name: &str) -> Arc<Task> {
        Arc::new(Task::from(TaskDef::new(name, |_| Ok(ArgValue::Null))))
    }

    #[test]
    fn test_marked_strings_become_references() {
        assert_eq!(Binding::from_marked(json!("@stuff")), Binding::reference("stuff"));
        assert_eq!(Binding::from_marked(json!("stuff")), Binding::literal("stuff"));
        assert_eq!(Binding::from_marked(json!("@")), Binding::literal("@"));
        assert_eq!(Binding::from_marked(json!(7)), Binding::literal(7));
    }

    #[test]
    fn test_literal_that_looks_like_a_reference_stays_literal() {
        let sig = task("t").s().with("email", "@someone");

        assert_eq!(sig.binding("email"), Some(&Binding::literal("@someone")));
        assert_eq!(sig.literal_keys().collect::<Vec<_>>(), vec!["email"]);
    }

    #[test]
    fn test_literal_keys_skip_references() {
        let sig = task("t")
            .s()
            .with("a", 1)
            .with_ref("b", "upstream")
            .with_kwargs(Kwargs::from([("c".to_string(), json!(true))]));

        assert_eq!(sig.literal_keys().collect::<Vec<_>>(), vec!["a", "c"]);
        assert_eq!(sig.binding("b").and_then(Binding::as_reference), Some("upstream"));
    }

    #[test]
    fn test_binding_serialization_is_tagged() {
        let value = serde_json::to_value(Binding::reference("stuff")).unwrap();
        assert_eq!(value, json!({"kind": "reference", "value": "stuff"}));

        let back: Binding = serde_json::from_value(json!({"kind": "literal", "value": "@x"})).unwrap();
        assert_eq!(back, Binding::literal("@x"));
    }

    #[test]
    fn test_signature_label() {
        let mut sig = task("task1").s();
        assert_eq!(sig.get_label(), "task1");

        sig.set_label("something");
        assert_eq!(sig.get_label(), "something");
    }

    #[test]
    fn test_inject_args_keys() {
        let seed = InjectArgs::new().with("needed", "thing").with("not_needed", 1);
        assert_eq!(seed.keys().collect::<Vec<_>>(), vec!["needed", "not_needed"]);
        assert!(InjectArgs::new().is_empty());
    }
}
