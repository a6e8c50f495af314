//! Fluent configuration for spawning threads.

use crate::errors::SpawnResult;
use crate::kernel::kernel;
use crate::mem::StackSizeClass;
use crate::thread::{Tid, PRI_DEFAULT};

use alloc::string::String;

/// Builder for spawning a thread with non-default settings.
///
/// ```ignore
/// let tid = ThreadBuilder::new()
///     .name("logger")
///     .priority(40)
///     .stack_size_class(StackSizeClass::Medium)
///     .spawn(|| loop { /* work */ })?;
/// ```
pub struct ThreadBuilder {
    name: String,
    priority: u8,
    stack_size_class: StackSizeClass,
}

impl Default for ThreadBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ThreadBuilder {
    pub fn new() -> Self {
        Self {
            name: String::from("anonymous"),
            priority: PRI_DEFAULT,
            stack_size_class: StackSizeClass::Page,
        }
    }

    pub fn name(mut self, name: &str) -> Self {
        self.name = String::from(name);
        self
    }

    pub fn priority(mut self, priority: u8) -> Self {
        self.priority = priority;
        self
    }

    pub fn stack_size_class(mut self, class: StackSizeClass) -> Self {
        self.stack_size_class = class;
        self
    }

    pub fn spawn<F>(self, f: F) -> SpawnResult<Tid>
    where
        F: FnOnce() + Send + 'static,
    {
        kernel().spawn_with(&self.name, self.priority, self.stack_size_class, f)
    }
}
