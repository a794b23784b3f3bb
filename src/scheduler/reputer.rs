//! Reputer loop: strictly more staged than the worker loop. It must first
//! locate the window in which a worker nonce opens, fetch that nonce, and
//! only then compute its own submission window anchored to the nonce height.

use crate::chain::{BlockHeight, ChainClient, Topic};
use crate::runtime::config::{ReputerConfig, SchedulerConfig};
use crate::runtime::telemetry::Telemetry;
use crate::scheduler::window::{self, AnticipatedWindow};
use std::sync::Arc;

/// Three dirty flags modeling the nonce-discovery -> submission pipeline.
/// Each gate guards one computation; a successful commit (or a missed
/// submission window, which spends the nonce) rearms all of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ReputerGates {
    pub(crate) open_nonce_window_stale: bool,
    pub(crate) need_open_nonce: bool,
    pub(crate) reputer_window_stale: bool,
}

impl ReputerGates {
    pub(crate) fn armed() -> Self {
        Self {
            open_nonce_window_stale: true,
            need_open_nonce: true,
            reputer_window_stale: true,
        }
    }

    pub(crate) fn reset_for_next_epoch(&mut self) {
        *self = Self::armed();
    }

    pub(crate) fn nonce_obtained(&mut self) {
        self.need_open_nonce = false;
        self.reputer_window_stale = true;
    }
}

/// Scheduling loop for a single `(reputer, topic)` pair.
pub struct ReputerProcess<C> {
    chain: Arc<C>,
    reputer: ReputerConfig,
    config: SchedulerConfig,
    telemetry: Arc<Telemetry>,
}

impl<C: ChainClient> ReputerProcess<C> {
    pub fn new(
        chain: Arc<C>,
        reputer: ReputerConfig,
        config: SchedulerConfig,
        telemetry: Arc<Telemetry>,
    ) -> Self {
        Self {
            chain,
            reputer,
            config,
            telemetry,
        }
    }

    /// Runs until the process exits or a fatal error (height fetch failure,
    /// failed registration or staking) terminates this loop.
    pub async fn run(self) {
        let topic_id = self.reputer.topic_id;
        tracing::info!(topic_id, "running reputer process for topic");

        let mut topic = match self.chain.get_topic_by_id(topic_id).await {
            Ok(topic) => topic,
            Err(err) => {
                tracing::error!(topic_id, error = %err, "failed to get topic");
                return;
            }
        };

        match self
            .chain
            .register_and_stake_reputer_idempotently(&self.reputer)
            .await
        {
            Ok(true) => {}
            Ok(false) => {
                tracing::error!(
                    topic_id,
                    "failed to register or sufficiently stake reputer for topic"
                );
                return;
            }
            Err(err) => {
                tracing::error!(
                    topic_id,
                    error = %err,
                    "failed to register or sufficiently stake reputer for topic"
                );
                return;
            }
        }

        let cadence = self.config.cadence();
        let backoff = self.config.within_window_backoff();
        let mut gates = ReputerGates::armed();
        let mut open_nonce_window = AnticipatedWindow::default();
        let mut submission_window = AnticipatedWindow::default();
        let mut nonce_height: BlockHeight = 0;

        loop {
            let current_block = match self.chain.get_current_chain_block_height().await {
                Ok(height) => height,
                Err(err) => {
                    tracing::error!(
                        topic_id,
                        error = %err,
                        "error getting chain block height for reputer job on topic"
                    );
                    return;
                }
            };

            if gates.open_nonce_window_stale {
                open_nonce_window = AnticipatedWindow::for_worker(&topic, current_block);
                self.telemetry.record_window_recomputed();
                tracing::debug!(
                    topic_id,
                    open = open_nonce_window.soonest_open,
                    close = open_nonce_window.soonest_close,
                    "reputer anticipated window for open nonce"
                );
                gates.open_nonce_window_stale = false;
            }

            if gates.need_open_nonce {
                if !open_nonce_window.contains(current_block) {
                    open_nonce_window
                        .wait_until_window_start(cadence, current_block, topic.epoch_length)
                        .await;
                    gates.open_nonce_window_stale = true;
                    continue;
                }

                match self
                    .chain
                    .get_latest_open_worker_nonce_by_topic_id(topic_id)
                    .await
                {
                    Ok(nonce) if nonce.is_open() => {
                        nonce_height = nonce.block_height;
                        gates.nonce_obtained();
                        tracing::info!(
                            topic_id,
                            nonce_height,
                            "got open worker nonce for reputer submission"
                        );
                    }
                    Ok(_) => {
                        self.telemetry.record_nonce_miss();
                        tracing::debug!(topic_id, "no open worker nonce on topic yet");
                        window::wait_short_backoff(backoff).await;
                        continue;
                    }
                    Err(err) => {
                        self.telemetry.record_nonce_miss();
                        tracing::warn!(
                            topic_id,
                            error = %err,
                            "error getting latest open nonce for reputer on topic"
                        );
                        window::wait_short_backoff(backoff).await;
                        continue;
                    }
                }
            }

            if gates.reputer_window_stale {
                submission_window = AnticipatedWindow::for_reputer(&topic, nonce_height);
                self.telemetry.record_window_recomputed();
                tracing::debug!(
                    topic_id,
                    open = submission_window.soonest_open,
                    close = submission_window.soonest_close,
                    "reputer anticipated window for submission"
                );
                gates.reputer_window_stale = false;
            }

            if submission_window.contains_reputer(current_block) {
                match self
                    .chain
                    .build_commit_reputer_payload(&self.reputer, nonce_height)
                    .await
                {
                    Ok(true) => {
                        self.telemetry.record_reputer_commit();
                        self.refresh_topic(&mut topic).await;
                        gates.reset_for_next_epoch();
                        open_nonce_window
                            .wait_until_window_start(cadence, current_block, topic.epoch_length)
                            .await;
                    }
                    Ok(false) => {
                        self.telemetry.record_commit_failure();
                        tracing::warn!(topic_id, "reputer payload commit was not accepted");
                        window::wait_short_backoff(backoff).await;
                    }
                    Err(err) => {
                        self.telemetry.record_commit_failure();
                        tracing::warn!(
                            topic_id,
                            error = %err,
                            "error building and committing reputer payload for topic"
                        );
                        window::wait_short_backoff(backoff).await;
                    }
                }
            } else {
                // Sleeping past the close spends the nonce; the whole
                // pipeline has to resynchronize from the next epoch.
                let missed = (current_block as f64) > submission_window.soonest_close;
                window::wait_until_reputer_window_start(
                    &topic,
                    cadence,
                    nonce_height,
                    current_block,
                )
                .await;
                if missed {
                    gates.reset_for_next_epoch();
                }
            }
        }
    }

    async fn refresh_topic(&self, topic: &mut Topic) {
        match self.chain.get_topic_by_id(self.reputer.topic_id).await {
            Ok(fresh) => *topic = fresh,
            Err(err) => {
                tracing::warn!(
                    topic_id = self.reputer.topic_id,
                    error = %err,
                    "failed to refresh topic metadata; keeping previous snapshot"
                );
            }
        }
    }
}
