use crate::support::helpers::{init_tracing, run_scheduler};
use crate::support::mock_chain::MockChain;
use epochbeat::{ActorConfig, Dispatcher, ReputerConfig, SchedulerConfig, Topic};
use std::sync::Arc;
use std::time::Duration;

const BLOCK_TIME: Duration = Duration::from_secs(5);

fn topic() -> Topic {
    Topic {
        id: 9,
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

#[tokio::test(start_paused = true)]
async fn reputer_submission_is_anchored_to_the_worker_nonce() {
    init_tracing();
    let chain = Arc::new(MockChain::new(topic(), BLOCK_TIME, 8).with_nonce_opening_at(50, 10));
    let dispatcher = Dispatcher::new(
        Arc::clone(&chain),
        config(),
        vec![ActorConfig::Reputer(ReputerConfig::new(9))],
    );
    let telemetry = dispatcher.telemetry();

    run_scheduler(dispatcher).await;

    // The nonce opens at 50; the reputer window opens once the 10-block
    // worker submission span has closed.
    let records = chain.reputer_commit_records();
    assert_eq!(records.len(), 1, "expected a single submission, got {records:?}");
    let (attempt_height, nonce_height) = records[0];
    assert_eq!(nonce_height, 50, "submission must be anchored to the nonce height");
    assert!(
        (60..150).contains(&attempt_height),
        "submission must wait out the worker span, got height {attempt_height}"
    );

    // The nonce itself is only ever fetched inside the open-nonce window.
    assert!(
        chain
            .nonce_query_heights()
            .iter()
            .all(|height| (50..=60).contains(height) || (150..=160).contains(height)),
        "nonce queried outside the anticipated windows: {:?}",
        chain.nonce_query_heights()
    );

    assert_eq!(chain.reputer_register_calls(), 1);
    assert_eq!(telemetry.reputer_commits(), 1);
}

#[tokio::test(start_paused = true)]
async fn failed_staking_is_fatal_before_any_scheduling() {
    init_tracing();
    let chain = Arc::new(
        MockChain::new(topic(), BLOCK_TIME, 10)
            .with_nonce_opening_at(50, 10)
            .refuse_reputer_registration(),
    );
    let dispatcher = Dispatcher::new(
        Arc::clone(&chain),
        config(),
        vec![ActorConfig::Reputer(ReputerConfig::new(9))],
    );

    run_scheduler(dispatcher).await;

    assert_eq!(chain.reputer_register_calls(), 1);
    assert_eq!(
        chain.height_queries(),
        0,
        "an unstaked reputer must not start polling the chain"
    );
    assert!(chain.reputer_commit_records().is_empty());
}
