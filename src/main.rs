//! src/main.rs
use anyhow::Context;
use mr_coordinator::configuration::get_configuration;
use mr_coordinator::startup::{connect_client, CoordinatorServer};
use mr_coordinator::telemetry::init_tracing;
use std::time::Duration;
use tarpc::context;
use tokio::sync::broadcast;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _tracer_provider = init_tracing("mr-coordinator")?;
    let configuration = get_configuration().context("Failed to read configuration.")?;

    let input_files: Vec<String> = std::env::args().skip(1).collect();
    if input_files.is_empty() {
        anyhow::bail!("Usage: mr-coordinator <input files...>");
    }

    let (shutdown_tx, _) = broadcast::channel::<()>(1);
    let server = CoordinatorServer::build(configuration, input_files).await?;
    let (addr, handle) = server.start(&shutdown_tx).await?;

    let client = connect_client(addr).await?;
    while !client.is_done(context::current()).await? {
        tokio::time::sleep(Duration::from_secs(1)).await;
    }
    tracing::info!("Job complete");

    shutdown_tx.send(()).ok();
    handle.await??;
    Ok(())
}
