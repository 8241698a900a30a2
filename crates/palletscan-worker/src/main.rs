//! Worker binary. Takes no arguments; behavior is fully environment-driven
//! (`RABBITMQ_URL`, `REDIS_URL`, `POSTGRES_URL`, `PALLETSCAN_*`).

use palletscan_queue::{BusConfig, JobQueue, RabbitJobQueue, RedisStateChannel};
use palletscan_store::{PgResultStore, PgStoreConfig};
use palletscan_worker::{JobRunner, ModelSlot, WorkerConfig};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let bus_config = BusConfig::from_env();
    let worker_config = WorkerConfig::from_env();
    let time_limit = Duration::from_secs(bus_config.task_time_limit_secs);

    info!(
        model = %worker_config.model_path.display(),
        concurrency = worker_config.concurrency,
        "starting palletscan worker"
    );

    let store = Arc::new(PgResultStore::with_config(PgStoreConfig::from_env()).await?);
    let states = Arc::new(
        RedisStateChannel::connect(&bus_config.redis_url, bus_config.result_ttl_secs).await?,
    );
    let queue: Arc<dyn JobQueue> = Arc::new(RabbitJobQueue::connect(bus_config.clone()).await?);
    let model_slot = Arc::new(ModelSlot::with_manifest_loader());

    let runner = Arc::new(JobRunner::new(
        store,
        states,
        model_slot,
        worker_config.clone(),
        time_limit,
    ));

    let mut slots = Vec::with_capacity(worker_config.concurrency);
    for slot in 0..worker_config.concurrency {
        let runner = Arc::clone(&runner);
        let queue = Arc::clone(&queue);
        slots.push(tokio::spawn(async move {
            if let Err(err) = runner.run(queue, slot).await {
                error!(slot, error = %err, "worker slot terminated");
            }
        }));
    }

    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received, stopping worker slots");
    for slot in &slots {
        slot.abort();
    }

    Ok(())
}
