use bounded_pool::{Config, PoolError, WorkerPool};
use crossbeam::utils::Backoff;
use std::{
    hint::black_box,
    sync::Arc,
    time::{Duration, Instant},
};
use tracing::info;
use tracing_subscriber::EnvFilter;

const PRODUCERS: usize = 4;
const TASKS_PER_PRODUCER: usize = 250_000;

// Pushes `count` tiny tasks, spinning on rejection. Returns how many
// submissions were bounced by a full queue.
fn produce(pool: &WorkerPool, count: usize) -> usize {
    let mut rejected = 0;
    for i in 0..count {
        let backoff = Backoff::new();
        while !pool.submit(move || {
            black_box(i.wrapping_mul(31));
        }) {
            if pool.is_shutdown() {
                return rejected;
            }
            rejected += 1;
            backoff.snooze();
        }
    }
    rejected
}

#[tokio::main]
async fn main() -> Result<(), PoolError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let pool = Arc::new(WorkerPool::with_config(Config::cpu_bound())?);
    let monitor = pool.start_monitoring(Duration::from_millis(250), |m| {
        info!(
            active = m.active_tasks,
            queued = m.queued_tasks,
            utilization = %format!("{:.1}%", m.utilization() * 100.0),
            "pool"
        );
    })?;

    let now = Instant::now();
    let producers: Vec<_> = (0..PRODUCERS)
        .map(|_| {
            let pool = pool.clone();
            tokio::task::spawn_blocking(move || produce(&pool, TASKS_PER_PRODUCER))
        })
        .collect();

    let mut rejected = 0;
    for producer in producers {
        rejected += producer.await.unwrap_or(0);
    }
    pool.join_all().await;
    WorkerPool::stop_monitoring(monitor);

    let metrics = pool.metrics();
    info!(
        elapsed = ?now.elapsed(),
        completed = metrics.completed_tasks,
        failed = metrics.failed_tasks,
        rejected,
        "producer/consumer run finished"
    );

    pool.shutdown();
    Ok(())
}
