//! Eager, in-process execution of a verified chain.
//!
//! Steps run one after the other. A running pool of named values starts empty,
//! takes in seed keys and literal bindings, and the declared outputs of every
//! task that publishes some. Each task receives its literal bindings, its
//! references resolved against the pool, and any of its inputs the pool
//! already holds under the same name.

use crate::core::chain::{Chain, Step};
use crate::core::error::{Error, Result};
use crate::core::signature::{Binding, Signature};
use crate::core::telemetry::{Telemetry, TraceEntry};
use crate::core::{ArgValue, Kwargs};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

/// What happened when one task step ran.
#[derive(Debug, Clone, PartialEq)]
pub struct StepRecord {
    pub step_id: Uuid,
    pub position: usize,
    pub task: String,
    pub kwargs: Kwargs,
    pub output: ArgValue,
}

/// The outcome of applying a chain.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChainResult {
    /// Every name available after the last step.
    pub values: Kwargs,
    /// One record per task step, in order.
    pub steps: Vec<StepRecord>,
}

impl ChainResult {
    pub fn get(&self, name: &str) -> Option<&ArgValue> {
        self.values.get(name)
    }

    /// Return value of the final task step.
    pub fn last_output(&self) -> Option<&ArgValue> {
        self.steps.last().map(|record| &record.output)
    }

    fn absorb(
        &mut self,
        position: usize,
        sig: &Signature,
        kwargs: Kwargs,
        output: ArgValue,
    ) -> &StepRecord {
        for (name, binding) in sig.kwargs() {
            if let Binding::Literal(value) = binding {
                self.values.insert(name.clone(), value.clone());
            }
        }

        if !sig.contract().declared_outputs().is_empty() {
            if let ArgValue::Object(map) = &output {
                for (key, value) in map {
                    self.values.insert(key.clone(), value.clone());
                }
            }
        }

        self.steps.push(StepRecord {
            step_id: sig.id(),
            position,
            task: sig.task_name().to_string(),
            kwargs,
            output,
        });
        &self.steps[self.steps.len() - 1]
    }
}

/// Step bookkeeping shared by the blocking and async runners.
struct Run<'c, 't> {
    steps: std::iter::Enumerate<std::slice::Iter<'c, Step>>,
    telemetry: Option<&'t dyn Telemetry>,
    result: ChainResult,
}

impl<'c, 't> Run<'c, 't> {
    fn new(chain: &'c Chain, telemetry: Option<&'t dyn Telemetry>) -> Self {
        Self {
            steps: chain.steps().iter().enumerate(),
            telemetry,
            result: ChainResult::default(),
        }
    }

    /// Folds seeds into the pool until the next task step, returning it with its resolved kwargs.
    fn next_task(&mut self) -> Option<(usize, &'c Signature, Kwargs)> {
        for (position, step) in self.steps.by_ref() {
            match step {
                Step::Seed(seed) => self.result.values.extend(seed.kwargs().clone()),
                Step::Task(sig) => {
                    log::debug!("applying step {} ('{}')", position, sig.task_name());
                    return Some((position, sig, resolve_kwargs(sig, &self.result.values)));
                }
            }
        }
        None
    }

    fn complete(&mut self, position: usize, sig: &Signature, kwargs: Kwargs, output: ArgValue) {
        let record = self.result.absorb(position, sig, kwargs, output);
        if let Some(t) = self.telemetry {
            t.record(trace_entry(record));
        }
    }

    fn finish(self) -> ChainResult {
        if let Some(t) = self.telemetry {
            t.flush();
        }
        self.result
    }
}

impl Chain {
    /// Verifies the chain and runs every task in order on the calling thread.
    pub fn apply(&self) -> Result<ChainResult> {
        self.apply_with_telemetry(None)
    }

    /// Like [`Chain::apply`], recording a [`TraceEntry`] per task step.
    pub fn apply_with_telemetry(&self, telemetry: Option<&dyn Telemetry>) -> Result<ChainResult> {
        self.verify()?;

        let mut run = Run::new(self, telemetry);
        while let Some((position, sig, kwargs)) = run.next_task() {
            let output = sig.task().call(kwargs.clone())?;
            run.complete(position, sig, kwargs, output);
        }
        Ok(run.finish())
    }

    /// Verifies the chain and runs each task on Tokio's blocking pool, one at a time.
    pub async fn apply_async(&self) -> Result<ChainResult> {
        self.apply_async_with_telemetry(None).await
    }

    /// Like [`Chain::apply_async`], recording a [`TraceEntry`] per task step.
    pub async fn apply_async_with_telemetry(&self, telemetry: Option<&dyn Telemetry>) -> Result<ChainResult> {
        self.verify()?;

        let mut run = Run::new(self, telemetry);
        while let Some((position, sig, kwargs)) = run.next_task() {
            let task = Arc::clone(sig.task());
            let call_kwargs = kwargs.clone();
            let output = tokio::task::spawn_blocking(move || task.call(call_kwargs))
                .await
                .map_err(|join_error| Error::Join {
                    task: sig.task_name().to_string(),
                    reason: join_error.to_string(),
                })??;
            run.complete(position, sig, kwargs, output);
        }
        Ok(run.finish())
    }
}

fn resolve_kwargs(sig: &Signature, values: &Kwargs) -> Kwargs {
    let mut kwargs = Kwargs::new();

    for (name, binding) in sig.kwargs() {
        match binding {
            Binding::Literal(value) => {
                kwargs.insert(name.clone(), value.clone());
            }
            Binding::Reference(target) => match values.get(target) {
                Some(value) => {
                    kwargs.insert(name.clone(), value.clone());
                }
                None => log::warn!(
                    "'{}' binds '{}' to '{}' which is not available; leaving it unbound",
                    sig.task_name(),
                    name,
                    target
                ),
            },
        }
    }

    for input in sig.contract().inputs() {
        if kwargs.contains_key(input) {
            continue;
        }
        if let Some(value) = values.get(input) {
            kwargs.insert(input.to_string(), value.clone());
        }
    }

    kwargs
}

fn trace_entry(record: &StepRecord) -> TraceEntry {
    let timestamp = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();

    TraceEntry {
        timestamp,
        step_id: record.step_id,
        position: record.position,
        task: record.task.clone(),
        inputs: ArgValue::Object(record.kwargs.clone().into_iter().collect()),
        outputs: record.output.clone(),
        metadata: HashMap::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::{ReturnsError, TaskError};
    use crate::core::signature::InjectArgs;
    use crate::core::task::{Task, TaskDef};
    use crate::core::telemetry::MemoryTelemetry;
    use serde_json::json;

    fn task(def: TaskDef) -> Arc<Task> {
        Arc::new(Task::from(def))
    }

    fn pipeline() -> Chain {
        let beginning = task(
            TaskDef::new("beginning", |call| Ok(json!(format!("from {}", call.arg("start")))))
                .arg("start")
                .returns(["final"])
                .unwrap(),
        );
        let middle = task(
            TaskDef::new("middle_task", |call| Ok(json!([call.arg("very_important"), 42])))
                .arg("very_important")
                .returns(["mildly_amusing", "answer"])
                .unwrap(),
        );
        let ending = task(
            TaskDef::new("ending", |call| {
                Ok(json!(format!(
                    "{} / {} / {}",
                    call.arg("final").as_str().unwrap_or_default(),
                    call.arg("missing").as_str().unwrap_or_default(),
                    call.arg("answer")
                )))
            })
            .arg("final")
            .arg("missing")
            .arg("answer")
            .returns(["finished"])
            .unwrap(),
        );

        beginning.s().with("start", "something")
            | middle.s().with_ref("very_important", "final")
            | ending.s().with("missing", "not missing")
    }

    #[test]
    fn test_apply_threads_outputs_through_the_chain() {
        let result = pipeline().apply().unwrap();

        assert_eq!(result.get("final"), Some(&json!("from \"something\"")));
        assert_eq!(result.get("mildly_amusing"), Some(&json!("from \"something\"")));
        assert_eq!(result.get("answer"), Some(&json!(42)));
        assert_eq!(
            result.get("finished"),
            Some(&json!("from \"something\" / not missing / 42"))
        );
        assert_eq!(result.steps.len(), 3);
        assert_eq!(result.steps[1].kwargs.get("very_important"), Some(&json!("from \"something\"")));
    }

    #[test]
    fn test_apply_refuses_unverified_chain() {
        let needs = task(TaskDef::new("needs", |_| Ok(ArgValue::Null)).arg("stuff"));
        let err = Chain::from(needs.s()).apply().unwrap_err();

        assert!(matches!(err, Error::ChainArgs(ref e) if e.task == "needs"));
    }

    #[test]
    fn test_apply_uses_seeds_and_defaults() {
        let t = task(
            TaskDef::new("greet", |call| {
                Ok(json!(format!(
                    "{}{}",
                    call.arg("greeting").as_str().unwrap_or_default(),
                    call.arg("needed").as_str().unwrap_or_default()
                )))
            })
            .arg("needed")
            .arg_default("greeting", "hi ")
            .returns(["message"])
            .unwrap(),
        );

        let result = (InjectArgs::new().with("needed", "thing") | t.s()).apply().unwrap();
        assert_eq!(result.get("message"), Some(&json!("hi thing")));
        assert_eq!(result.last_output(), Some(&json!({"message": "hi thing", "needed": "thing"})));
    }

    #[test]
    fn test_untupled_results_are_not_published() {
        let raw = task(TaskDef::new("raw", |_| Ok(json!({"stuff": 1}))));
        let result = Chain::from(raw.s()).apply().unwrap();

        assert_eq!(result.get("stuff"), None);
        assert_eq!(result.last_output(), Some(&json!({"stuff": 1})));
    }

    #[test]
    fn test_apply_surfaces_returns_errors() {
        let bad = task(TaskDef::new("bad", |_| Ok(json!([1]))).returns(["a", "b"]).unwrap());
        let err = Chain::from(bad.s()).apply().unwrap_err();

        assert!(matches!(
            err,
            Error::Task(TaskError::Returns(ReturnsError::ArityMismatch { actual: 1, .. }))
        ));
    }

    #[test]
    fn test_telemetry_records_each_task_step() {
        let telemetry = MemoryTelemetry::new();
        pipeline().apply_with_telemetry(Some(&telemetry)).unwrap();

        let traces = telemetry.get_traces();
        assert_eq!(traces.len(), 3);
        assert_eq!(traces[0].task, "beginning");
        assert_eq!(traces[0].inputs, json!({"start": "something"}));
        assert_eq!(traces[2].position, 2);
    }

    #[tokio::test]
    async fn test_async_telemetry_records_each_task_step() {
        let telemetry = MemoryTelemetry::new();
        let chain = InjectArgs::new().with("unused", 1) | pipeline();
        let result = chain.apply_async_with_telemetry(Some(&telemetry)).await.unwrap();

        let traces = telemetry.get_traces();
        assert_eq!(traces.len(), 3);
        assert_eq!(traces[0].position, 1);
        assert_eq!(traces[0].task, "beginning");
        assert_eq!(traces[2].task, "ending");
        assert_eq!(traces[2].outputs, result.steps[2].output);
    }

    #[tokio::test]
    async fn test_apply_async_matches_apply() {
        let chain = pipeline();
        let sync_result = chain.apply().unwrap();
        let async_result = chain.apply_async().await.unwrap();

        assert_eq!(sync_result.values, async_result.values);
        assert_eq!(sync_result.steps.len(), async_result.steps.len());
    }
}
