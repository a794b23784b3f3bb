//! Worker loop: one task per topic that registers the worker, predicts the
//! open-nonce window, polls for the nonce while inside it, and attempts one
//! commit per epoch.

use crate::chain::{ChainClient, Topic};
use crate::runtime::config::{SchedulerConfig, WorkerConfig};
use crate::runtime::telemetry::Telemetry;
use crate::scheduler::window::{self, AnticipatedWindow};
use std::sync::Arc;

/// Dirty flag gating window recomputation. A window lives for exactly one
/// scheduling cycle: committing or sleeping past it invalidates it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct WorkerGates {
    window_stale: bool,
}

impl WorkerGates {
    fn armed() -> Self {
        Self { window_stale: true }
    }
}

/// Scheduling loop for a single `(worker, topic)` pair.
pub struct WorkerProcess<C> {
    chain: Arc<C>,
    worker: WorkerConfig,
    config: SchedulerConfig,
    telemetry: Arc<Telemetry>,
}

impl<C: ChainClient> WorkerProcess<C> {
    pub fn new(
        chain: Arc<C>,
        worker: WorkerConfig,
        config: SchedulerConfig,
        telemetry: Arc<Telemetry>,
    ) -> Self {
        Self {
            chain,
            worker,
            config,
            telemetry,
        }
    }

    /// Runs until the process exits or a fatal error (height fetch failure,
    /// failed registration) terminates this loop. Errors never propagate to
    /// sibling loops.
    pub async fn run(self) {
        let topic_id = self.worker.topic_id;
        tracing::info!(topic_id, "running worker process for topic");

        let mut topic = match self.chain.get_topic_by_id(topic_id).await {
            Ok(topic) => topic,
            Err(err) => {
                tracing::error!(topic_id, error = %err, "failed to get topic");
                return;
            }
        };

        match self.chain.register_worker_idempotently(&self.worker).await {
            Ok(true) => {}
            Ok(false) => {
                tracing::error!(topic_id, "failed to register worker for topic");
                return;
            }
            Err(err) => {
                tracing::error!(topic_id, error = %err, "failed to register worker for topic");
                return;
            }
        }

        let cadence = self.config.cadence();
        let backoff = self.config.within_window_backoff();
        let mut gates = WorkerGates::armed();
        let mut window = AnticipatedWindow::default();

        loop {
            let current_block = match self.chain.get_current_chain_block_height().await {
                Ok(height) => height,
                Err(err) => {
                    tracing::error!(
                        topic_id,
                        error = %err,
                        "error getting chain block height for worker job on topic"
                    );
                    return;
                }
            };

            if gates.window_stale {
                window = AnticipatedWindow::for_worker(&topic, current_block);
                self.telemetry.record_window_recomputed();
                tracing::debug!(
                    topic_id,
                    open = window.soonest_open,
                    close = window.soonest_close,
                    "worker anticipated window for topic open nonce"
                );
                gates.window_stale = false;
            }

            if window.contains(current_block) {
                let nonce = match self
                    .chain
                    .get_latest_open_worker_nonce_by_topic_id(topic_id)
                    .await
                {
                    Ok(nonce) if nonce.is_open() => Some(nonce),
                    Ok(_) => {
                        self.telemetry.record_nonce_miss();
                        tracing::debug!(topic_id, "no open worker nonce on topic yet");
                        None
                    }
                    Err(err) => {
                        self.telemetry.record_nonce_miss();
                        tracing::warn!(
                            topic_id,
                            error = %err,
                            "error getting latest open worker nonce on topic"
                        );
                        None
                    }
                };

                if let Some(nonce) = nonce {
                    tracing::info!(
                        topic_id,
                        nonce_height = nonce.block_height,
                        "got latest open worker nonce"
                    );

                    match self
                        .chain
                        .build_commit_worker_payload(&self.worker, nonce)
                        .await
                    {
                        Ok(true) => {
                            self.telemetry.record_worker_commit();
                            self.refresh_topic(&mut topic).await;
                            gates.window_stale = true;
                            window
                                .wait_until_window_start(
                                    cadence,
                                    current_block,
                                    topic.epoch_length,
                                )
                                .await;
                            continue;
                        }
                        Ok(false) => {
                            self.telemetry.record_commit_failure();
                            tracing::warn!(topic_id, "worker payload commit was not accepted");
                        }
                        Err(err) => {
                            self.telemetry.record_commit_failure();
                            tracing::warn!(
                                topic_id,
                                error = %err,
                                "error building and committing worker payload for topic"
                            );
                        }
                    }
                }

                // Still inside the window: retry shortly without advancing
                // the epoch state.
                window::wait_short_backoff(backoff).await;
            } else {
                tracing::debug!(
                    topic_id,
                    current_block,
                    open = window.soonest_open,
                    close = window.soonest_close,
                    "block is not within worker window"
                );
                window
                    .wait_until_window_start(cadence, current_block, topic.epoch_length)
                    .await;
                gates.window_stale = true;
            }
        }
    }

    /// Topic metadata can change on-chain (epoch length in particular); one
    /// refresh per committed epoch keeps the window model from drifting. A
    /// refresh failure keeps the previous snapshot.
    async fn refresh_topic(&self, topic: &mut Topic) {
        match self.chain.get_topic_by_id(self.worker.topic_id).await {
            Ok(fresh) => *topic = fresh,
            Err(err) => {
                tracing::warn!(
                    topic_id = self.worker.topic_id,
                    error = %err,
                    "failed to refresh topic metadata; keeping previous snapshot"
                );
            }
        }
    }
}
