//! src/job.rs
use crate::configuration::Settings;
use crate::rpc::CoordinatorServiceClient;
use crate::startup::{connect_client, CoordinatorServer};
use crate::worker::{TaskExecutor, Worker};
use anyhow::Context;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tarpc::context;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

/// One coordinator plus a pool of in-process workers, wired over loopback
/// RPC and torn down together.
pub struct MapReduceJob {
    handles: Vec<JoinHandle<anyhow::Result<()>>>,
    shutdown_tx: broadcast::Sender<()>,
    coordinator_addr: SocketAddr,
    client: CoordinatorServiceClient,
}

impl MapReduceJob {
    #[tracing::instrument(name = "Start MapReduceJob", skip_all)]
    pub async fn start(
        configuration: Settings,
        input_files: Vec<String>,
        executor: Arc<dyn TaskExecutor>,
    ) -> Result<Self, anyhow::Error> {
        let (shutdown_tx, _) = broadcast::channel::<()>(1);

        let server = CoordinatorServer::build(configuration.clone(), input_files).await?;
        let (coordinator_addr, server_handle) = server
            .start(&shutdown_tx)
            .await
            .context("Failed to start the coordinator")?;
        let mut handles = vec![server_handle];

        for i in 0..configuration.cluster.workers {
            let client = connect_client(coordinator_addr)
                .await
                .context(format!("Failed to connect worker {i}"))?;
            let worker = Worker::new(
                client,
                executor.clone(),
                configuration.cluster.poll_interval(),
            );
            let mut shutdown_rx = shutdown_tx.subscribe();
            handles.push(tokio::spawn(async move {
                // Checked first so a worker mid-call when the coordinator
                // stops exits cleanly instead of surfacing a dead channel.
                tokio::select! {
                    biased;
                    _ = shutdown_rx.recv() => {
                        tracing::info!("Worker shutting down");
                        Ok(())
                    }
                    result = worker.run_until_stopped() => result.map_err(Into::into),
                }
            }));
        }

        let client = connect_client(coordinator_addr)
            .await
            .context("Failed to connect the job's coordinator client")?;

        Ok(Self {
            handles,
            shutdown_tx,
            coordinator_addr,
            client,
        })
    }

    pub fn coordinator_addr(&self) -> SocketAddr {
        self.coordinator_addr
    }

    pub fn client(&self) -> &CoordinatorServiceClient {
        &self.client
    }

    pub async fn is_done(&self) -> Result<bool, anyhow::Error> {
        self.client
            .is_done(context::current())
            .await
            .context("Failed to get completion status from the coordinator")
    }

    /// The owning process's view of the job: poll until the coordinator
    /// reports Done.
    pub async fn wait_until_done(&self, poll_interval: Duration) -> Result<(), anyhow::Error> {
        while !self.is_done().await? {
            tokio::time::sleep(poll_interval).await;
        }
        Ok(())
    }

    #[tracing::instrument(name = "Shutdown MapReduceJob", skip_all)]
    pub async fn shutdown(self) -> anyhow::Result<()> {
        self.shutdown_tx.send(()).ok();

        // Wait for the coordinator and all workers
        for handle in self.handles {
            handle.await??;
        }

        tracing::info!("All services shut down gracefully");
        Ok(())
    }
}
