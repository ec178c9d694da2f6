//! src/worker.rs
use crate::error::error_chain_fmt;
use crate::rpc::{Assignment, CoordinatorServiceClient, MapTaskPayload, ReduceTaskPayload};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tarpc::context;
use uuid::Uuid;

#[derive(Clone, PartialEq, Debug)]
pub struct WorkerId(Uuid);

impl WorkerId {
    pub fn new() -> Self {
        WorkerId(Uuid::new_v4())
    }

    pub fn id(&self) -> Uuid {
        self.0
    }
}

impl Default for WorkerId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for WorkerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Executes the user map and reduce functions. The coordinator never looks
/// inside: implementations own the input reading and the intermediate and
/// output file encoding, and must tolerate being handed work that another
/// attempt already finished.
#[async_trait]
pub trait TaskExecutor: Send + Sync {
    async fn execute_map(&self, task: &MapTaskPayload, reduce_count: u64) -> anyhow::Result<()>;

    async fn execute_reduce(&self, task: &ReduceTaskPayload) -> anyhow::Result<()>;
}

pub enum WorkerError {
    Rpc(tarpc::client::RpcError),
    Task(anyhow::Error),
}

impl std::fmt::Display for WorkerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkerError::Rpc(_) => write!(f, "Lost contact with the coordinator"),
            WorkerError::Task(_) => write!(f, "Task execution failed"),
        }
    }
}

impl std::fmt::Debug for WorkerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(f, self)
    }
}

impl std::error::Error for WorkerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            WorkerError::Rpc(e) => Some(e),
            WorkerError::Task(e) => Some(e.as_ref()),
        }
    }
}

impl From<tarpc::client::RpcError> for WorkerError {
    fn from(e: tarpc::client::RpcError) -> Self {
        Self::Rpc(e)
    }
}

pub struct Worker {
    id: WorkerId,
    client: CoordinatorServiceClient,
    executor: Arc<dyn TaskExecutor>,
    poll_interval: Duration,
}

impl Worker {
    pub fn new(
        client: CoordinatorServiceClient,
        executor: Arc<dyn TaskExecutor>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            id: WorkerId::new(),
            client,
            executor,
            poll_interval,
        }
    }

    pub fn id(&self) -> &WorkerId {
        &self.id
    }

    /// Pull loop: request a task, execute it, report back. Runs until the
    /// RPC channel or the executor fails; a worker killed mid-task is
    /// simply never heard from again and its claim expires coordinator-side.
    #[tracing::instrument(name = "Worker loop", skip_all, fields(worker_id = %self.id))]
    pub async fn run_until_stopped(&self) -> Result<(), WorkerError> {
        loop {
            match self.client.request_task(context::current()).await? {
                Assignment::Wait => tokio::time::sleep(self.poll_interval).await,
                Assignment::Map { reduce_count, task } => {
                    tracing::debug!(id = task.id, filename = %task.filename, "running map task");
                    self.executor
                        .execute_map(&task, reduce_count)
                        .await
                        .map_err(WorkerError::Task)?;
                    self.client
                        .report_completion(context::current(), task.id, true)
                        .await?;
                }
                Assignment::Reduce { task, .. } => {
                    tracing::debug!(id = task.id, "running reduce task");
                    self.executor
                        .execute_reduce(&task)
                        .await
                        .map_err(WorkerError::Task)?;
                    self.client
                        .report_completion(context::current(), task.id, false)
                        .await?;
                }
            }
        }
    }
}
