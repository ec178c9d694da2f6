//! src/startup.rs
use crate::configuration::Settings;
use crate::coordinator::Coordinator;
use crate::rpc::{CoordinatorRpc, CoordinatorService, CoordinatorServiceClient};
use anyhow::Context;
use futures::{future, prelude::*};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tarpc::client;
use tarpc::server::{self, Channel};
use tarpc::tokio_serde::formats::Json;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

const MAX_CONCURRENT_CHANNELS: usize = 16;

/// Owns the coordinator state and its RPC listener. Built once per job;
/// `start` serves until the shutdown signal fires.
pub struct CoordinatorServer {
    coordinator: Arc<Coordinator>,
    host: IpAddr,
    port: u16,
}

impl CoordinatorServer {
    pub async fn build(configuration: Settings, input_files: Vec<String>) -> anyhow::Result<Self> {
        let coordinator = Arc::new(Coordinator::new(
            input_files,
            configuration.job.reduce_count,
            configuration.job.task_timeout(),
        ));
        Ok(Self {
            coordinator,
            host: configuration.rpc.get_host(),
            port: configuration.rpc.port,
        })
    }

    pub fn coordinator(&self) -> Arc<Coordinator> {
        self.coordinator.clone()
    }

    #[tracing::instrument(name = "Start coordinator server", skip_all)]
    pub async fn start(
        &self,
        shutdown_tx: &broadcast::Sender<()>,
    ) -> anyhow::Result<(SocketAddr, JoinHandle<anyhow::Result<()>>)> {
        let mut listener =
            tarpc::serde_transport::tcp::listen((self.host, self.port), Json::default)
                .await
                .context("Failed to bind coordinator RPC listener")?;
        listener.config_mut().max_frame_length(usize::MAX);
        let local_addr = listener.local_addr();
        tracing::info!(%local_addr, "coordinator listening");

        let coordinator = self.coordinator.clone();
        let mut shutdown_rx = shutdown_tx.subscribe();
        let handle = tokio::spawn(async move {
            let serve = listener
                .filter_map(|r| future::ready(r.ok()))
                .map(server::BaseChannel::with_defaults)
                .map(|channel| {
                    let rpc = CoordinatorRpc::new(coordinator.clone());
                    channel.execute(rpc.serve()).for_each(spawn)
                })
                .buffer_unordered(MAX_CONCURRENT_CHANNELS)
                .for_each(|_| async {});
            tokio::select! {
                _ = serve => {}
                _ = shutdown_rx.recv() => {
                    tracing::info!("Coordinator shutting down");
                }
            }
            Ok(())
        });

        Ok((local_addr, handle))
    }
}

async fn spawn(fut: impl Future<Output = ()> + Send + 'static) {
    tokio::spawn(fut);
}

pub async fn connect_client(addr: SocketAddr) -> anyhow::Result<CoordinatorServiceClient> {
    let mut transport = tarpc::serde_transport::tcp::connect(addr, Json::default);
    transport.config_mut().max_frame_length(usize::MAX);
    let client = CoordinatorServiceClient::new(
        client::Config::default(),
        transport
            .await
            .context("Failed to connect to the coordinator")?,
    )
    .spawn();
    Ok(client)
}
