//! src/coordinator.rs
use crate::rpc::{intermediate_file, Assignment, MapTaskPayload, ReduceTaskPayload};
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobPhase {
    Mapping,
    Reducing,
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Pending,
    Executing,
    Finished,
}

#[derive(Debug)]
struct MapTask {
    // None until first assignment; reissued fresh on every assignment so a
    // completion report can be matched to the attempt that produced it.
    id: Option<u64>,
    state: TaskState,
    started_at: Option<Instant>,
    filename: String,
}

#[derive(Debug)]
struct ReduceTask {
    // Fixed at creation: the reduce partition index.
    id: u64,
    state: TaskState,
    started_at: Option<Instant>,
}

/// Tracks every map and reduce task of a single job and drives the
/// Mapping -> Reducing -> Done state machine. One instance per job; all
/// tasks are created up front and never destroyed.
pub struct Coordinator {
    reduce_count: u64,
    task_timeout: Duration,
    phase: Mutex<JobPhase>,
    map_tasks: Vec<Mutex<MapTask>>,
    reduce_tasks: Vec<Mutex<ReduceTask>>,
    finished_maps: Mutex<BTreeSet<u64>>,
    next_map_id: AtomicU64,
}

impl Coordinator {
    pub fn new(input_files: Vec<String>, reduce_count: u64, task_timeout: Duration) -> Self {
        let map_tasks = input_files
            .into_iter()
            .map(|filename| {
                Mutex::new(MapTask {
                    id: None,
                    state: TaskState::Pending,
                    started_at: None,
                    filename,
                })
            })
            .collect();
        let reduce_tasks = (0..reduce_count)
            .map(|id| {
                Mutex::new(ReduceTask {
                    id,
                    state: TaskState::Pending,
                    started_at: None,
                })
            })
            .collect();
        Self {
            reduce_count,
            task_timeout,
            phase: Mutex::new(JobPhase::Mapping),
            map_tasks,
            reduce_tasks,
            finished_maps: Mutex::new(BTreeSet::new()),
            next_map_id: AtomicU64::new(0),
        }
    }

    pub fn phase(&self) -> JobPhase {
        *self.phase.lock().unwrap()
    }

    pub fn is_done(&self) -> bool {
        self.phase() == JobPhase::Done
    }

    pub fn reduce_count(&self) -> u64 {
        self.reduce_count
    }

    pub fn map_task_count(&self) -> usize {
        self.map_tasks.len()
    }

    pub fn reduce_task_count(&self) -> usize {
        self.reduce_tasks.len()
    }

    /// Hands out at most one runnable task. Scans the active phase's
    /// registry in creation order, reclaiming expired claims on the way;
    /// the check-and-claim of each task happens under that task's own
    /// lock, so two concurrent callers can never claim the same task.
    pub fn request_task(&self) -> Assignment {
        match self.phase() {
            JobPhase::Mapping => self.next_map_assignment(),
            JobPhase::Reducing => self.next_reduce_assignment(),
            JobPhase::Done => Assignment::Wait,
        }
    }

    fn next_map_assignment(&self) -> Assignment {
        for slot in &self.map_tasks {
            let now = Instant::now();
            let mut task = slot.lock().unwrap();
            if task.state == TaskState::Executing && self.claim_expired(task.started_at, now) {
                task.state = TaskState::Pending;
            }
            if task.state == TaskState::Pending {
                let id = self.next_map_id.fetch_add(1, Ordering::Relaxed) + 1;
                task.id = Some(id);
                task.state = TaskState::Executing;
                task.started_at = Some(now);
                tracing::info!(id, filename = %task.filename, "assigned map task");
                return Assignment::Map {
                    reduce_count: self.reduce_count,
                    task: MapTaskPayload {
                        id,
                        filename: task.filename.clone(),
                    },
                };
            }
        }
        Assignment::Wait
    }

    fn next_reduce_assignment(&self) -> Assignment {
        for slot in &self.reduce_tasks {
            let now = Instant::now();
            let mut task = slot.lock().unwrap();
            if task.state == TaskState::Executing && self.claim_expired(task.started_at, now) {
                task.state = TaskState::Pending;
            }
            if task.state == TaskState::Pending {
                task.state = TaskState::Executing;
                task.started_at = Some(now);
                // Recomputed at every assignment: it must cover every map
                // task finished so far, including ones that finished after
                // this reduce task was created.
                let intermediate_files = {
                    let finished = self.finished_maps.lock().unwrap();
                    finished
                        .iter()
                        .map(|map_id| intermediate_file(*map_id, task.id))
                        .collect()
                };
                tracing::info!(id = task.id, "assigned reduce task");
                return Assignment::Reduce {
                    reduce_count: self.reduce_count,
                    task: ReduceTaskPayload {
                        id: task.id,
                        intermediate_files,
                    },
                };
            }
        }
        Assignment::Wait
    }

    fn claim_expired(&self, started_at: Option<Instant>, now: Instant) -> bool {
        started_at.is_some_and(|started| now.duration_since(started) > self.task_timeout)
    }

    /// Marks the task currently carrying `id` as Finished and advances the
    /// phase once the active registry is fully finished. A report whose id
    /// no longer matches any tracked task (a reclaimed attempt that was
    /// already reassigned under a new id) is dropped without error.
    pub fn report_completion(&self, id: u64, is_map: bool) {
        if is_map {
            if !self.finish_map_task(id) {
                tracing::debug!(id, "dropping stale map completion report");
                return;
            }
            if self.all_maps_finished() {
                self.advance_phase(JobPhase::Mapping, JobPhase::Reducing);
            }
        } else {
            if !self.finish_reduce_task(id) {
                tracing::debug!(id, "dropping stale reduce completion report");
                return;
            }
            if self.all_reduces_finished() {
                self.advance_phase(JobPhase::Reducing, JobPhase::Done);
            }
        }
    }

    fn finish_map_task(&self, id: u64) -> bool {
        for slot in &self.map_tasks {
            let mut task = slot.lock().unwrap();
            if task.id == Some(id) {
                // Record the id before the task becomes observably
                // Finished, so a phase transition never sees a finished
                // map missing from the set.
                self.finished_maps.lock().unwrap().insert(id);
                task.state = TaskState::Finished;
                tracing::info!(id, filename = %task.filename, "finished map task");
                return true;
            }
        }
        false
    }

    fn finish_reduce_task(&self, id: u64) -> bool {
        for slot in &self.reduce_tasks {
            let mut task = slot.lock().unwrap();
            if task.id == id {
                task.state = TaskState::Finished;
                tracing::info!(id, "finished reduce task");
                return true;
            }
        }
        false
    }

    fn all_maps_finished(&self) -> bool {
        self.map_tasks
            .iter()
            .all(|slot| slot.lock().unwrap().state == TaskState::Finished)
    }

    fn all_reduces_finished(&self) -> bool {
        self.reduce_tasks
            .iter()
            .all(|slot| slot.lock().unwrap().state == TaskState::Finished)
    }

    fn advance_phase(&self, from: JobPhase, to: JobPhase) {
        let mut phase = self.phase.lock().unwrap();
        if *phase == from {
            *phase = to;
            tracing::info!(?from, ?to, "phase advanced");
        }
    }
}
