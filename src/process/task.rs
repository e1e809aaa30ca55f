/*!
 * Named Tasks
 *
 * A callable-plus-arguments pair expressed as data. The parent encodes an
 * `Invocation`, writes it into the child's stream after the fork, and the
 * child decodes it and resolves the task by name in its own copy of the
 * registry. Arguments therefore cross the process boundary explicitly
 * instead of riding along in copied memory.
 */

use crate::core::serialization::Value;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Signature of a registered task
pub type TaskFn = fn(Value) -> Result<Value, String>;

/// Serializable request to run a registered task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invocation {
    pub task: String,
    pub args: Value,
}

impl Invocation {
    pub fn new(task: impl Into<String>, args: impl Into<Value>) -> Self {
        Self {
            task: task.into(),
            args: args.into(),
        }
    }
}

/// Name → function table
///
/// Register tasks before spawning; a child only sees the registry as it was
/// at fork time.
#[derive(Clone, Default)]
pub struct TaskRegistry {
    tasks: Arc<RwLock<HashMap<String, TaskFn>>>,
}

impl std::fmt::Debug for TaskRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskRegistry")
            .field("tasks", &self.names())
            .finish()
    }
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a task, returning the one it replaced
    pub fn register(&self, name: impl Into<String>, task: TaskFn) -> Option<TaskFn> {
        self.tasks.write().insert(name.into(), task)
    }

    pub fn get(&self, name: &str) -> Option<TaskFn> {
        self.tasks.read().get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tasks.read().contains_key(name)
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tasks.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Look a task up by name, with the failure message a child reports
    pub fn resolve(&self, name: &str) -> Result<TaskFn, String> {
        self.get(name)
            .ok_or_else(|| format!("unknown task '{}'", name))
    }

    /// Resolve and run an invocation in the current process
    pub fn run(&self, invocation: Invocation) -> Result<Value, String> {
        let task = self.resolve(&invocation.task)?;
        task(invocation.args)
    }

    #[cfg(test)]
    pub(crate) fn lock_exclusive(
        &self,
    ) -> parking_lot::RwLockWriteGuard<'_, HashMap<String, TaskFn>> {
        self.tasks.write()
    }
}
