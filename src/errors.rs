use std::{fmt, io};
use thiserror::Error;


/// Errors produced while building a pool or a queue
#[derive(Debug, Error)]
pub enum PoolError {
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// A worker thread could not be started. Workers spawned before the
    /// failure have already been stopped and joined.
    #[error("failed to spawn worker thread ({spawned} already started)")]
    ResourceExhaustion {
        spawned: usize,
        #[source]
        source: io::Error,
    },

    /// Monitoring needs an ambient tokio runtime to run on.
    #[error("no tokio runtime available")]
    RuntimeUnavailable(#[from] tokio::runtime::TryCurrentError),
}

/// A submission the pool refused. The task is handed back untouched.
#[derive(PartialEq, Eq, Clone, Copy)]
pub enum SubmitError<T> {
    /// Queue is at capacity; apply backpressure and try later.
    Full(T),
    /// Pool has been shut down and accepts nothing anymore.
    ShutDown(T),
}

impl<T> SubmitError<T> {
    pub fn into_inner(self) -> T {
        match self {
            SubmitError::Full(task) | SubmitError::ShutDown(task) => task,
        }
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        matches!(self, SubmitError::Full(_))
    }

    #[inline]
    pub fn is_shutdown(&self) -> bool {
        matches!(self, SubmitError::ShutDown(_))
    }
}

// Manual impls so that task types don't need to implement Debug/Display.
impl<T> fmt::Debug for SubmitError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubmitError::Full(_) => f.write_str("Full(..)"),
            SubmitError::ShutDown(_) => f.write_str("ShutDown(..)"),
        }
    }
}

impl<T> fmt::Display for SubmitError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubmitError::Full(_) => f.write_str("work queue is full"),
            SubmitError::ShutDown(_) => f.write_str("worker pool is shut down"),
        }
    }
}

impl<T> std::error::Error for SubmitError<T> {}
