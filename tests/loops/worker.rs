use crate::support::helpers::{init_tracing, run_scheduler};
use crate::support::mock_chain::MockChain;
use epochbeat::{ActorConfig, Dispatcher, SchedulerConfig, Topic, WorkerConfig};
use std::sync::Arc;
use std::time::Duration;

const BLOCK_TIME: Duration = Duration::from_secs(5);

fn topic() -> Topic {
    Topic {
        id: 7,
        epoch_length: 100,
        epoch_last_ended: 50,
        worker_submission_window: 10,
    }
}

fn config() -> SchedulerConfig {
    SchedulerConfig::builder()
        .average_block_time(BLOCK_TIME)
        .within_window_backoff(Duration::from_secs(2))
        .build()
        .expect("config should build")
}

fn worker_actor() -> ActorConfig {
    ActorConfig::Worker(WorkerConfig::new(7))
}

#[tokio::test(start_paused = true)]
async fn worker_commits_at_most_once_per_epoch() {
    init_tracing();
    let chain = Arc::new(MockChain::new(topic(), BLOCK_TIME, 6).with_nonce_opening_at(50, 10));
    let dispatcher = Dispatcher::new(Arc::clone(&chain), config(), vec![worker_actor()]);
    let telemetry = dispatcher.telemetry();

    run_scheduler(dispatcher).await;

    // The nonce opens at height 50; the epoch boundaries land at 50, 150, ...
    let commits = chain.worker_commit_heights();
    assert_eq!(commits.len(), 2, "expected one commit per elapsed epoch, got {commits:?}");
    assert!(
        (50..=60).contains(&commits[0]),
        "first commit should land in the first submission window, got {}",
        commits[0]
    );
    assert!(
        (150..=160).contains(&commits[1]),
        "loop should sleep through the dead time and commit next epoch, got {}",
        commits[1]
    );

    // Nonce polling only ever happens inside an anticipated window.
    assert!(
        chain
            .nonce_query_heights()
            .iter()
            .all(|height| (50..=60).contains(height) || (150..=160).contains(height)),
        "nonce queried outside the anticipated windows: {:?}",
        chain.nonce_query_heights()
    );

    assert_eq!(chain.worker_register_calls(), 1);
    assert_eq!(telemetry.worker_commits(), 2);
    assert_eq!(telemetry.commit_failures(), 0);
}

#[tokio::test(start_paused = true)]
async fn sentinel_nonce_never_reaches_a_commit_attempt() {
    init_tracing();
    // No nonce ever opens on this topic.
    let chain = Arc::new(MockChain::new(topic(), BLOCK_TIME, 40));
    let dispatcher = Dispatcher::new(Arc::clone(&chain), config(), vec![worker_actor()]);
    let telemetry = dispatcher.telemetry();

    run_scheduler(dispatcher).await;

    assert!(
        chain.worker_commit_heights().is_empty(),
        "no commit may be attempted without an open nonce"
    );
    assert!(
        telemetry.nonce_misses() > 0,
        "the loop should have polled for the nonce inside its window"
    );
    assert_eq!(telemetry.worker_commits(), 0);
}

#[tokio::test(start_paused = true)]
async fn failed_registration_is_fatal_before_any_scheduling() {
    init_tracing();
    let chain = Arc::new(
        MockChain::new(topic(), BLOCK_TIME, 10)
            .with_nonce_opening_at(50, 10)
            .refuse_worker_registration(),
    );
    let dispatcher = Dispatcher::new(Arc::clone(&chain), config(), vec![worker_actor()]);

    run_scheduler(dispatcher).await;

    assert_eq!(chain.worker_register_calls(), 1);
    assert_eq!(
        chain.height_queries(),
        0,
        "an unregistered worker must not start polling the chain"
    );
    assert!(chain.worker_commit_heights().is_empty());
}

#[tokio::test(start_paused = true)]
async fn commit_failures_retry_with_backoff_in_the_same_window() {
    init_tracing();
    let chain = Arc::new(
        MockChain::new(topic(), BLOCK_TIME, 6)
            .with_nonce_opening_at(50, 10)
            .with_worker_commit_script(&[false, false, false, true]),
    );
    let dispatcher = Dispatcher::new(Arc::clone(&chain), config(), vec![worker_actor()]);
    let telemetry = dispatcher.telemetry();

    run_scheduler(dispatcher).await;

    let commits = chain.worker_commit_heights();
    assert_eq!(
        commits.len(),
        4,
        "three rejected attempts plus the accepted one, got {commits:?}"
    );
    assert!(
        commits.iter().all(|height| (50..=60).contains(height)),
        "every retry must stay inside the original window: {commits:?}"
    );

    assert_eq!(telemetry.commit_failures(), 3);
    assert_eq!(telemetry.worker_commits(), 1);
    assert_eq!(chain.worker_register_calls(), 1, "retries must not re-register");
    assert_eq!(
        telemetry.windows_recomputed(),
        3,
        "in-window retries must not recompute the window"
    );
}
