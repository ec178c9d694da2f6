//! src/rpc.rs
use crate::coordinator::Coordinator;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tarpc::context;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapTaskPayload {
    pub id: u64,
    pub filename: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReduceTaskPayload {
    pub id: u64,
    pub intermediate_files: Vec<String>,
}

/// Reply to a task request. `Wait` is not an error: the worker is expected
/// to poll again after a short delay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Assignment {
    Wait,
    Map {
        reduce_count: u64,
        task: MapTaskPayload,
    },
    Reduce {
        reduce_count: u64,
        task: ReduceTaskPayload,
    },
}

/// Name of the intermediate file produced by map task `map_id` for reduce
/// partition `partition`. Workers on both sides of the shuffle rely on
/// this exact shape.
pub fn intermediate_file(map_id: u64, partition: u64) -> String {
    format!("mr-{map_id}-{partition}")
}

#[tarpc::service]
pub trait CoordinatorService {
    async fn request_task() -> Assignment;

    async fn report_completion(id: u64, is_map: bool);

    async fn is_done() -> bool;
}

#[derive(Clone)]
pub struct CoordinatorRpc {
    coordinator: Arc<Coordinator>,
}

impl CoordinatorRpc {
    pub fn new(coordinator: Arc<Coordinator>) -> Self {
        Self { coordinator }
    }
}

impl CoordinatorService for CoordinatorRpc {
    async fn request_task(self, _: context::Context) -> Assignment {
        self.coordinator.request_task()
    }

    async fn report_completion(self, _: context::Context, id: u64, is_map: bool) {
        self.coordinator.report_completion(id, is_map)
    }

    async fn is_done(self, _: context::Context) -> bool {
        self.coordinator.is_done()
    }
}
