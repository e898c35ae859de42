pub use crate::config::{DemoConfig, PoolConfig, PoolConfigBuilder};
pub use crate::error::{Error, Result, TaskError};
pub use crate::executor::{spawn_detached, Detached, PoolState, TaskHandle, ThreadPool};
pub use crate::interrupt::{Interrupted, Interruptor};
pub use crate::scheduler::{ScheduledHandle, ScheduledPool};
