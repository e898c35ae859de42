use crate::interrupt::Interrupted;

pub type Result<T> = std::result::Result<T, Error>;

/// Boxed error carried by a failed task.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("executor error: {0}")]
    Executor(String),

    #[error("task rejected: pool is shut down")]
    Rejected,

    #[error("interrupted while waiting")]
    Interrupted,

    #[error("task failed: {0}")]
    TaskFailed(#[source] TaskError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Error::Config(msg.into())
    }

    pub fn executor<S: Into<String>>(msg: S) -> Self {
        Error::Executor(msg.into())
    }
}

impl From<Interrupted> for Error {
    fn from(_: Interrupted) -> Self {
        Error::Interrupted
    }
}

/// Outcome of a task that did not produce a value.
#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    /// The task itself was interrupted while running.
    #[error("interrupted")]
    Interrupted,

    /// The thread waiting for the result was interrupted. The task may
    /// still be running.
    #[error("interrupted while waiting for result")]
    WaitInterrupted,

    /// The task was removed before it started.
    #[error("cancelled before running")]
    Cancelled,

    #[error("timed out waiting for result")]
    TimedOut,

    #[error("task panicked: {0}")]
    Panicked(String),

    #[error("task failed: {0}")]
    Failed(#[source] BoxError),
}

impl TaskError {
    /// Converts an error returned by a fallible action. `Interrupted` keeps
    /// its meaning, anything else is a failure of the action.
    pub(crate) fn from_action<E>(err: E) -> Self
    where
        E: Into<BoxError>,
    {
        let err = err.into();
        if err.is::<Interrupted>() {
            TaskError::Interrupted
        } else {
            TaskError::Failed(err)
        }
    }

    pub fn is_interrupted(&self) -> bool {
        matches!(self, TaskError::Interrupted)
    }

    pub fn is_wait_interrupted(&self) -> bool {
        matches!(self, TaskError::WaitInterrupted)
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, TaskError::Cancelled)
    }
}

impl From<Interrupted> for TaskError {
    fn from(_: Interrupted) -> Self {
        TaskError::Interrupted
    }
}
