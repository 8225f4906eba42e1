//! Fixed-size thread pool with a bounded FIFO work queue
//!
//! # Features
//! - Non-blocking submission with backpressure: a full queue rejects work
//! - Every accepted task runs exactly once, on exactly one worker
//! - Task failures (errors and panics) are logged and never kill a worker
//! - Atomic construction: no threads leak when a worker fails to start
//! - Graceful and immediate shutdown
//! - Metrics snapshots and periodic monitoring

pub mod errors;
pub mod model;
pub mod pool;
pub mod queue;
pub mod task;

pub use errors::{PoolError, SubmitError};
pub use model::PoolMetrics;
pub use pool::{Config, WorkerPool};
pub use queue::BoundedWorkQueue;
pub use task::{BoxedTask, FallibleTask, Task, TaskError, TaskResult};
