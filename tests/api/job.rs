//! tests/api/job.rs
use crate::helpers::{test_configuration, RecordingExecutor};
use mr_coordinator::job::MapReduceJob;
use mr_coordinator::rpc::intermediate_file;
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn a_two_file_job_runs_to_completion_with_two_workers() {
    let configuration = test_configuration();
    let executor = Arc::new(RecordingExecutor::default());
    let job = MapReduceJob::start(
        configuration,
        vec!["pg-1.txt".to_string(), "pg-2.txt".to_string()],
        executor.clone(),
    )
    .await
    .expect("Failed to start job");

    tokio::time::timeout(
        Duration::from_secs(10),
        job.wait_until_done(Duration::from_millis(50)),
    )
    .await
    .expect("Job did not finish in time")
    .expect("Failed to poll the job");

    let maps = executor.maps.lock().unwrap().clone();
    let mut map_files: Vec<String> = maps.iter().map(|t| t.filename.clone()).collect();
    map_files.sort();
    map_files.dedup();
    assert_eq!(map_files, vec!["pg-1.txt", "pg-2.txt"]);

    let reduces = executor.reduces.lock().unwrap().clone();
    let mut partitions: Vec<u64> = reduces.iter().map(|t| t.id).collect();
    partitions.sort();
    partitions.dedup();
    assert_eq!(partitions, vec![0, 1]);

    // Every reduce saw the intermediate output of every map.
    let map_ids: Vec<u64> = maps.iter().map(|t| t.id).collect();
    for reduce in &reduces {
        for map_id in &map_ids {
            assert!(reduce
                .intermediate_files
                .contains(&intermediate_file(*map_id, reduce.id)));
        }
    }

    job.shutdown().await.expect("Failed to shutdown job");
}

#[tokio::test]
async fn wait_until_done_resolves_once_the_job_finishes() {
    let configuration = test_configuration();
    let executor = Arc::new(RecordingExecutor::default());
    let job = MapReduceJob::start(
        configuration,
        vec!["pg-1.txt".to_string()],
        executor.clone(),
    )
    .await
    .expect("Failed to start job");

    tokio::time::timeout(
        Duration::from_secs(10),
        job.wait_until_done(Duration::from_millis(20)),
    )
    .await
    .expect("Job did not finish in time")
    .expect("Failed to poll the job");

    assert!(job.is_done().await.expect("Failed to poll the job"));
    assert_eq!(executor.maps.lock().unwrap().len(), 1);
    job.shutdown().await.expect("Failed to shutdown job");
}
