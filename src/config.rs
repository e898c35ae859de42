use crate::error::{Error, Result};
use std::time::Duration;

const MAX_THREADS: usize = 1024;

#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub num_threads: Option<usize>,
    pub stack_size: Option<usize>,
    pub thread_name_prefix: String,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            num_threads: None,
            stack_size: Some(2 * 1024 * 1024),
            thread_name_prefix: "tasklab-worker".to_string(),
        }
    }
}

impl PoolConfig {
    pub fn builder() -> PoolConfigBuilder {
        PoolConfigBuilder::new()
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(n) = self.num_threads {
            if n == 0 {
                return Err(Error::config("num_threads must be > 0"));
            }
            if n > MAX_THREADS {
                return Err(Error::config("num_threads too large (max 1024)"));
            }
        }

        if self.thread_name_prefix.is_empty() {
            return Err(Error::config("thread_name_prefix must not be empty"));
        }

        Ok(())
    }

    /// Worker count, defaulting to the available hardware parallelism.
    pub fn worker_threads(&self) -> usize {
        self.num_threads.unwrap_or_else(num_cpus::get)
    }
}

#[derive(Debug, Default)]
pub struct PoolConfigBuilder {
    config: PoolConfig,
}

impl PoolConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: PoolConfig::default(),
        }
    }

    pub fn num_threads(mut self, n: usize) -> Self {
        self.config.num_threads = Some(n);
        self
    }

    pub fn stack_size(mut self, size: usize) -> Self {
        self.config.stack_size = Some(size);
        self
    }

    pub fn thread_name_prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.config.thread_name_prefix = prefix.into();
        self
    }

    pub fn build(self) -> Result<PoolConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Constants used by the demo routines, counted in `time_unit`s.
#[derive(Debug, Clone)]
pub struct DemoConfig {
    pub time_unit: Duration,
    pub detached_sleep: u32,
    pub shutdown_timeout: u32,
    pub deferred_sleep: u32,
    pub deferred_value: i32,
    pub batch_sleeps: [u32; 4],
    pub schedule_delay: u32,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            time_unit: Duration::from_secs(1),
            detached_sleep: 3,
            shutdown_timeout: 4,
            deferred_sleep: 1,
            deferred_value: 123,
            batch_sleeps: [4, 3, 5, 2],
            schedule_delay: 3,
        }
    }
}

impl DemoConfig {
    /// Same constants on a different clock, e.g. milliseconds for tests.
    pub fn with_time_unit(time_unit: Duration) -> Self {
        Self {
            time_unit,
            ..Self::default()
        }
    }

    /// `n` time units, saturating at `Duration::MAX`.
    pub fn units(&self, n: u32) -> Duration {
        self.time_unit.checked_mul(n).unwrap_or(Duration::MAX)
    }
}
