//! tests/api/helpers.rs
use async_trait::async_trait;
use mr_coordinator::configuration::{get_configuration, Settings};
use mr_coordinator::rpc::{MapTaskPayload, ReduceTaskPayload};
use mr_coordinator::startup::CoordinatorServer;
use mr_coordinator::telemetry::init_tracing;
use mr_coordinator::worker::TaskExecutor;
use std::net::SocketAddr;
use std::sync::{LazyLock, Mutex};
use tokio::sync::broadcast;

static TRACING: LazyLock<()> = LazyLock::new(|| {
    init_tracing("tests::api").expect("Failed to setup tracing");
});

pub fn test_configuration() -> Settings {
    LazyLock::force(&TRACING);
    let mut configuration = get_configuration().expect("Failed to get configuration");
    // OS-assigned port so tests never collide.
    configuration.rpc.port = 0;
    configuration
}

pub struct TestCoordinator {
    pub addr: SocketAddr,
    // Held so the server's shutdown receiver stays open for the whole test.
    pub shutdown_tx: broadcast::Sender<()>,
}

pub async fn spawn_coordinator(configuration: Settings, input_files: &[&str]) -> TestCoordinator {
    let server = CoordinatorServer::build(
        configuration,
        input_files.iter().map(|f| f.to_string()).collect(),
    )
    .await
    .expect("Failed to build coordinator server");
    let (shutdown_tx, _) = broadcast::channel::<()>(1);
    let (addr, _handle) = server
        .start(&shutdown_tx)
        .await
        .expect("Failed to start coordinator server");
    TestCoordinator { addr, shutdown_tx }
}

/// Records every task it is handed and succeeds immediately; the file
/// contents side of the job stays out of these tests.
#[derive(Default)]
pub struct RecordingExecutor {
    pub maps: Mutex<Vec<MapTaskPayload>>,
    pub reduces: Mutex<Vec<ReduceTaskPayload>>,
}

#[async_trait]
impl TaskExecutor for RecordingExecutor {
    async fn execute_map(&self, task: &MapTaskPayload, _reduce_count: u64) -> anyhow::Result<()> {
        self.maps.lock().unwrap().push(task.clone());
        Ok(())
    }

    async fn execute_reduce(&self, task: &ReduceTaskPayload) -> anyhow::Result<()> {
        self.reduces.lock().unwrap().push(task.clone());
        Ok(())
    }
}
