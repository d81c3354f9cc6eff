//! Runtime configuration.

use crate::errors::ConfigError;

/// Largest registry capacity the identity encoding can address.
///
/// Slot indices are stored in 32 bits; the top half is kept free so index
/// arithmetic never has to worry about wrapping.
pub const MAX_THREADS_LIMIT: usize = (u32::MAX as usize) >> 1;

/// Default registry capacity.
pub const DEFAULT_MAX_THREADS: usize = 256;

/// Tunables for a [`Runtime`](crate::Runtime).
///
/// Only obtainable through [`RuntimeConfig::builder`] or `Default`, so a
/// config in hand always has a capacity in `1..=MAX_THREADS_LIMIT`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
    max_threads: u32,
    name: &'static str,
}

impl RuntimeConfig {
    /// Start building a configuration from the defaults.
    pub fn builder() -> RuntimeConfigBuilder {
        RuntimeConfigBuilder::new()
    }

    /// Number of thread control blocks the registry arena holds.
    pub fn max_threads(&self) -> usize {
        self.max_threads as usize
    }

    /// Label attached to log records from this runtime.
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub(crate) fn capacity(&self) -> u32 {
        self.max_threads
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_threads: DEFAULT_MAX_THREADS as u32,
            name: "mn",
        }
    }
}

/// Consuming builder for [`RuntimeConfig`].
#[derive(Debug, Clone)]
pub struct RuntimeConfigBuilder {
    max_threads: usize,
    name: &'static str,
}

impl RuntimeConfigBuilder {
    /// Create a builder holding the default configuration.
    pub fn new() -> Self {
        Self {
            max_threads: DEFAULT_MAX_THREADS,
            name: "mn",
        }
    }

    /// Set the registry capacity, checked by [`build`](Self::build).
    pub fn max_threads(mut self, max_threads: usize) -> Self {
        self.max_threads = max_threads;
        self
    }

    /// Set the label used in log records.
    pub fn name(mut self, name: &'static str) -> Self {
        self.name = name;
        self
    }

    /// Validate and produce the configuration.
    ///
    /// # Errors
    ///
    /// [`ConfigError::InvalidCapacity`] if `max_threads` is zero or larger
    /// than [`MAX_THREADS_LIMIT`].
    pub fn build(self) -> Result<RuntimeConfig, ConfigError> {
        let max = self.max_threads;
        let max_threads = u32::try_from(max)
            .ok()
            .filter(|&n| n != 0 && max <= MAX_THREADS_LIMIT)
            .ok_or(ConfigError::InvalidCapacity(max))?;
        Ok(RuntimeConfig {
            max_threads,
            name: self.name,
        })
    }
}

impl Default for RuntimeConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
