use super::ThreadId;
use crate::errors::SpawnError;
use crate::runtime::Runtime;
use crate::sched::RunQueue;

extern crate alloc;
use alloc::string::String;

/// Configures a thread before it is registered.
pub struct ThreadBuilder {
    name: Option<String>,
}

impl ThreadBuilder {
    pub fn new() -> Self {
        Self { name: None }
    }

    pub fn name<T: Into<String>>(mut self, name: T) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Register the thread with `runtime` and put it on the run queue.
    pub fn spawn<Q: RunQueue>(self, runtime: &Runtime<Q>) -> Result<ThreadId, SpawnError> {
        runtime.spawn_named(self.name)
    }
}

impl Default for ThreadBuilder {
    fn default() -> Self {
        Self::new()
    }
}
