/*!
 * Process Module
 * Thread-like units of work backed by forked child processes
 */

mod child;
pub mod outcome;
pub mod task;
pub mod thread;

// Re-export for convenience
pub use outcome::Outcome;
pub use task::{Invocation, TaskFn, TaskRegistry};
pub use thread::{Thread, ThreadBuilder};

use crate::core::errors::Result;
use serde::{de::DeserializeOwned, Serialize};

/// Fork a child running `f` with the default configuration and codec
pub fn spawn<F, T>(f: F) -> Result<Thread<T>>
where
    F: FnOnce() -> T,
    T: Serialize + DeserializeOwned,
{
    ThreadBuilder::new().spawn(f)
}

/// Fork a child running `f(args)`
pub fn spawn_with<F, A, T>(f: F, args: A) -> Result<Thread<T>>
where
    F: FnOnce(A) -> T,
    T: Serialize + DeserializeOwned,
{
    ThreadBuilder::new().spawn_with(f, args)
}
