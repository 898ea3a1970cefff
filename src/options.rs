//! Per-coroutine configuration.

/// Default per-routine stack size: 1 MiB, matching `STACK_LIMIT` in the
/// original implementation.
pub const DEFAULT_STACK_SIZE: usize = 1 << 20;

/// Configuration accepted by [`crate::Coroutine::spawn_opts`] and
/// [`crate::coroutine::create_opts`].
///
/// `stack_size` of `None` means "use the Ordinator's configured default"
/// (see [`crate::coroutine::set_default_stack_size`]), itself defaulting to
/// [`DEFAULT_STACK_SIZE`].
#[derive(Debug, Clone, Default)]
pub struct Options {
    pub stack_size: Option<usize>,
    pub name: Option<String>,
}

impl Options {
    pub fn new() -> Options {
        Options::default()
    }

    pub fn stack_size(mut self, size: usize) -> Options {
        self.stack_size = Some(size);
        self
    }

    pub fn name<S: Into<String>>(mut self, name: S) -> Options {
        self.name = Some(name.into());
        self
    }
}
