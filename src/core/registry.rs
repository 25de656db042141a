use crate::core::task::{Task, TaskDef};
use std::collections::HashMap;
use std::sync::Arc;

/// Registers task definitions and hands out shared, callable tasks.
#[derive(Debug, Default)]
pub struct TaskRegistry {
    tasks: HashMap<String, Arc<Task>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `def`, attaching its contract to the resulting task.
    pub fn task(&mut self, def: TaskDef) -> Arc<Task> {
        let task = Arc::new(Task::from(def));
        if self
            .tasks
            .insert(task.name().to_string(), Arc::clone(&task))
            .is_some()
        {
            log::warn!(
                "Task {} was already registered, replacing it.",
                task.name()
            );
        }
        task
    }

    pub fn get(&self, name: &str) -> Option<&Arc<Task>> {
        self.tasks.get(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tasks.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}
