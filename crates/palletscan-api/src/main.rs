//! API binary. Serves the HTTP surface on port 8000; backends are
//! configured through `RABBITMQ_URL`, `REDIS_URL` and `POSTGRES_URL`.

use palletscan_api::{ApiConfig, ControllerConfig, HttpApiServer, ImageController};
use palletscan_queue::{BusConfig, RabbitJobQueue, RedisStateChannel};
use palletscan_store::{PgResultStore, PgStoreConfig};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let bus_config = BusConfig::from_env();
    let controller_config = ControllerConfig::default();

    // The health check reports on these directories; create them up front.
    for dir in [
        &controller_config.uploads_dir,
        &controller_config.qr_crops_dir,
        &controller_config.outputs_dir,
    ] {
        tokio::fs::create_dir_all(dir).await?;
    }

    let store = Arc::new(PgResultStore::with_config(PgStoreConfig::from_env()).await?);
    let states = Arc::new(
        RedisStateChannel::connect(&bus_config.redis_url, bus_config.result_ttl_secs).await?,
    );
    let queue = Arc::new(RabbitJobQueue::connect(bus_config).await?);

    let controller = Arc::new(ImageController::new(store, queue, states, controller_config));
    let server = HttpApiServer::new(ApiConfig::default(), controller);

    info!("starting palletscan API");
    server.run().await?;
    Ok(())
}
