use super::{
    errors::{PoolError, SubmitError},
    model::PoolMetrics,
    queue::BoundedWorkQueue,
    task::{BoxedTask, Task},
};
use std::{
    any::Any,
    io,
    panic::{self, AssertUnwindSafe},
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc, Mutex, PoisonError,
    },
    thread::{self, JoinHandle, ThreadId},
};
use tokio::{
    runtime::Handle,
    sync::Notify,
    time::Duration,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};


/// Worker pool configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub num_threads: usize,
    pub queue_capacity: usize,
    /// Worker threads are named `{thread_name}-{index}`.
    pub thread_name: String,
    pub stack_size: Option<usize>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            num_threads: 8,
            queue_capacity: 10_000,
            thread_name: "pool-worker".into(),
            stack_size: None,
        }
    }
}

impl Config {
    pub fn new(num_threads: usize, queue_capacity: usize) -> Self {
        Self {
            num_threads,
            queue_capacity,
            ..Default::default()
        }
    }

    pub fn cpu_bound() -> Self {
        let num_cpus = num_cpus::get();
        Self {
            num_threads: num_cpus,
            queue_capacity: num_cpus * 10,
            ..Default::default()
        }
    }

    pub fn io_bound() -> Self {
        let num_cpus = num_cpus::get();
        Self {
            num_threads: num_cpus * 2, // workers mostly park on I/O
            queue_capacity: num_cpus * 20,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<(), PoolError> {
        if self.num_threads == 0 {
            return Err(PoolError::InvalidConfiguration(
                "worker count must be greater than zero".into(),
            ));
        }
        if self.queue_capacity == 0 {
            return Err(PoolError::InvalidConfiguration(
                "queue capacity must be greater than zero".into(),
            ));
        }
        if self.thread_name.contains('\0') {
            return Err(PoolError::InvalidConfiguration(
                "thread name must not contain NUL bytes".into(),
            ));
        }
        Ok(())
    }
}


#[inline(always)]
fn unlikely(b: bool) -> bool {
    #[cold]
    fn cold() {}
    if b { cold() }
    b
}

/// State shared between the pool handle and its workers.
struct Shared {
    queue: BoundedWorkQueue<BoxedTask>,
    worker_count: usize,
    // Accepted tasks that have neither finished nor been discarded.
    pending: AtomicUsize,
    active: AtomicUsize,
    idle: AtomicUsize,
    total_submitted: AtomicUsize,
    rejected: AtomicUsize,
    completed: AtomicUsize,
    failed: AtomicUsize,
    discarded: AtomicUsize,
    discard_pending: AtomicBool,
    all_tasks_completed: Notify,
}

impl Shared {
    fn new(queue: BoundedWorkQueue<BoxedTask>, worker_count: usize) -> Self {
        Self {
            queue,
            worker_count,
            pending: AtomicUsize::new(0),
            active: AtomicUsize::new(0),
            idle: AtomicUsize::new(0),
            total_submitted: AtomicUsize::new(0),
            rejected: AtomicUsize::new(0),
            completed: AtomicUsize::new(0),
            failed: AtomicUsize::new(0),
            discarded: AtomicUsize::new(0),
            discard_pending: AtomicBool::new(false),
            all_tasks_completed: Notify::new(),
        }
    }

    #[inline]
    fn finish_one(&self) {
        let prev = self.pending.fetch_sub(1, Ordering::AcqRel);
        if unlikely(prev == 1) {
            self.all_tasks_completed.notify_waiters();
        }
    }

    fn metrics(&self) -> PoolMetrics {
        PoolMetrics {
            worker_count: self.worker_count,
            active_tasks: self.active.load(Ordering::Relaxed),
            idle_workers: self.idle.load(Ordering::Relaxed),
            queued_tasks: self.queue.len(),
            queue_capacity: self.queue.capacity(),
            total_submitted: self.total_submitted.load(Ordering::Relaxed),
            rejected_tasks: self.rejected.load(Ordering::Relaxed),
            completed_tasks: self.completed.load(Ordering::Relaxed),
            failed_tasks: self.failed.load(Ordering::Relaxed),
            discarded_tasks: self.discarded.load(Ordering::Relaxed),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        msg
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.as_str()
    } else {
        "non-string panic payload"
    }
}

fn worker_loop(index: usize, shared: Arc<Shared>) {
    debug!(worker = index, "worker started");

    loop {
        shared.idle.fetch_add(1, Ordering::Relaxed);
        let next = shared.queue.dequeue();
        shared.idle.fetch_sub(1, Ordering::Relaxed);

        let Some(task) = next else {
            break;
        };

        if shared.discard_pending.load(Ordering::Acquire) {
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| drop(task))) {
                error!(worker = index, panic = panic_message(&*payload), "discarded task panicked on drop");
            }
            shared.discarded.fetch_add(1, Ordering::Relaxed);
            shared.finish_one();
            continue;
        }

        shared.active.fetch_add(1, Ordering::Relaxed);
        match panic::catch_unwind(AssertUnwindSafe(|| task.execute())) {
            Ok(Ok(())) => {
                shared.completed.fetch_add(1, Ordering::Relaxed);
            }
            Ok(Err(err)) => {
                shared.failed.fetch_add(1, Ordering::Relaxed);
                error!(worker = index, error = %err, "task failed");
            }
            Err(payload) => {
                shared.failed.fetch_add(1, Ordering::Relaxed);
                error!(worker = index, panic = panic_message(&*payload), "task panicked");
            }
        }
        shared.active.fetch_sub(1, Ordering::Relaxed);
        shared.finish_one();
    }

    debug!(worker = index, "worker stopped");
}

type WorkerBody = Box<dyn FnOnce() + Send + 'static>;

// Starts one worker per configured thread through `spawn`. When a spawn
// fails, the queue is closed and every worker started so far is joined
// before the error is returned.
fn spawn_workers<S>(
    config: &Config,
    shared: &Arc<Shared>,
    mut spawn: S,
) -> Result<Vec<JoinHandle<()>>, PoolError>
where
    S: FnMut(thread::Builder, usize, WorkerBody) -> io::Result<JoinHandle<()>>,
{
    let mut workers = Vec::with_capacity(config.num_threads);

    for index in 0..config.num_threads {
        let mut builder = thread::Builder::new()
            .name(format!("{}-{}", config.thread_name, index));
        if let Some(size) = config.stack_size {
            builder = builder.stack_size(size);
        }

        let worker_shared = shared.clone();
        match spawn(builder, index, Box::new(move || worker_loop(index, worker_shared))) {
            Ok(handle) => workers.push(handle),
            Err(source) => {
                warn!(spawned = index, error = %source, "failed to spawn worker, tearing down pool");
                // Queue is still empty, so closing it releases every
                // started worker right away.
                shared.queue.close();
                for handle in workers {
                    if handle.join().is_err() {
                        warn!("worker thread terminated abnormally");
                    }
                }
                return Err(PoolError::ResourceExhaustion { spawned: index, source });
            }
        }
    }

    Ok(workers)
}


/// Fixed-size pool of worker threads fed by one bounded queue.
///
/// Workers are spawned on construction and live until the pool is shut
/// down. Submissions never block: when the queue is full the task is
/// rejected and the caller decides what to do with it.
///
/// Dropping the pool closes the queue without joining. Workers finish what
/// was already accepted and then exit on their own.
pub struct WorkerPool {
    shared: Arc<Shared>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    worker_ids: Vec<ThreadId>,
    cancellation_token: CancellationToken,
}

impl WorkerPool {
    pub fn new(num_threads: usize, queue_capacity: usize) -> Result<Self, PoolError> {
        Self::with_config(Config::new(num_threads, queue_capacity))
    }

    /// Builds the pool. Either every worker is running when this returns
    /// `Ok`, or none is.
    pub fn with_config(config: Config) -> Result<Self, PoolError> {
        config.validate()?;

        let queue = BoundedWorkQueue::new(config.queue_capacity)?;
        let shared = Arc::new(Shared::new(queue, config.num_threads));
        let workers = spawn_workers(&config, &shared, |builder, _, body| builder.spawn(body))?;
        let worker_ids = workers.iter().map(|handle| handle.thread().id()).collect();

        debug!(
            workers = config.num_threads,
            capacity = config.queue_capacity,
            "worker pool started"
        );

        Ok(Self {
            shared,
            workers: Mutex::new(workers),
            worker_ids,
            cancellation_token: CancellationToken::new(),
        })
    }

    /// Offers a task to the pool. `false` means it was rejected, either
    /// because the queue is full or because the pool is shut down.
    #[inline]
    pub fn submit<T: Task>(&self, task: T) -> bool {
        self.try_submit(Box::new(task)).is_ok()
    }

    /// Like [`submit`](Self::submit), but returns the rejected task along
    /// with the reason.
    pub fn try_submit(&self, task: BoxedTask) -> Result<(), SubmitError<BoxedTask>> {
        // Count first so a worker finishing the task can never underflow.
        self.shared.pending.fetch_add(1, Ordering::AcqRel);

        match self.shared.queue.try_enqueue(task) {
            Ok(()) => {
                self.shared.total_submitted.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            Err(task) => {
                self.shared.rejected.fetch_add(1, Ordering::Relaxed);
                self.shared.finish_one();
                if self.shared.queue.is_closed() {
                    Err(SubmitError::ShutDown(task))
                } else {
                    Err(SubmitError::Full(task))
                }
            }
        }
    }

    #[inline]
    pub fn worker_count(&self) -> usize {
        self.shared.worker_count
    }

    #[inline]
    pub fn queue_capacity(&self) -> usize {
        self.shared.queue.capacity()
    }

    pub fn is_shutdown(&self) -> bool {
        self.shared.queue.is_closed()
    }

    #[inline]
    pub fn metrics(&self) -> PoolMetrics {
        self.shared.metrics()
    }

    /// Resolves once every accepted task has run or been discarded.
    pub async fn join_all(&self) {
        loop {
            let notified = self.shared.all_tasks_completed.notified();
            tokio::pin!(notified);
            // Register before checking so a wake-up between the check and
            // the await is not missed.
            notified.as_mut().enable();

            if self.shared.pending.load(Ordering::Acquire) == 0 {
                return;
            }
            notified.await;
        }
    }

    pub async fn join_all_timeout(&self, timeout: Duration) -> bool {
        tokio::time::timeout(timeout, self.join_all()).await.is_ok()
    }

    /// Blocking flavour of [`join_all`](Self::join_all).
    ///
    /// Calling this from inside a task running on this pool waits on that
    /// task itself and never returns.
    pub fn wait_idle(&self) {
        futures::executor::block_on(self.join_all());
    }

    /// Stops accepting tasks, lets the workers drain the queue and joins
    /// them. Concurrent callers all return only once the workers are gone.
    ///
    /// Called from one of the pool's own workers, this only signals the
    /// shutdown: a worker cannot wait for itself.
    pub fn shutdown(&self) {
        self.shared.queue.close();
        self.join_workers();
        self.cancellation_token.cancel();
    }

    /// Stops accepting tasks and joins the workers. Tasks still queued are
    /// dropped without running; tasks already executing run to completion.
    pub fn shutdown_now(&self) {
        self.shared.discard_pending.store(true, Ordering::Release);
        self.shared.queue.close();
        self.join_workers();
        self.cancellation_token.cancel();

        let discarded = self.shared.discarded.load(Ordering::Relaxed);
        if discarded > 0 {
            warn!(discarded, "pending tasks discarded on shutdown");
        }
    }

    fn join_workers(&self) {
        if self.worker_ids.contains(&thread::current().id()) {
            return;
        }

        // The lock stays held while joining so later callers block until
        // the first one has seen every worker exit.
        let mut workers = self.workers.lock().unwrap_or_else(PoisonError::into_inner);
        for handle in workers.drain(..) {
            if handle.join().is_err() {
                warn!("worker thread terminated abnormally");
            }
        }
    }

    /// Reports metrics to `callback` every `interval` on the current tokio
    /// runtime. Monitoring ends when the returned token is cancelled or the
    /// pool shuts down.
    ///
    /// Fails with [`PoolError::RuntimeUnavailable`] outside a tokio runtime.
    pub fn start_monitoring<F>(
        &self,
        interval: Duration,
        callback: F,
    ) -> Result<CancellationToken, PoolError>
    where
        F: Fn(PoolMetrics) + Send + 'static,
    {
        let runtime = Handle::try_current()?;
        let shared = Arc::clone(&self.shared);
        let token = self.cancellation_token.child_token();
        let token_clone = token.clone();

        runtime.spawn(async move {
            loop {
                tokio::select! {
                    _ = tokio::time::sleep(interval) => {
                        callback(shared.metrics());
                    }
                    _ = token_clone.cancelled() => {
                        break;
                    }
                }
            }
        });

        Ok(token)
    }

    pub fn stop_monitoring(token: CancellationToken) {
        token.cancel();
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shared.queue.close();
        self.cancellation_token.cancel();
    }
}
