//! Chain collaborator seam: topic metadata, nonce queries, idempotent
//! registration, and payload submission as consumed by the scheduling loops.
//! The crate ships no transport; hosts implement [`ChainClient`] against
//! their node of choice.

use crate::runtime::config::{ReputerConfig, WorkerConfig};
use anyhow::Result;
use core::future::Future;
use core::pin::Pin;
use serde::{Deserialize, Serialize};

/// Chain-side identifier of a topic. Stable for the lifetime of a loop.
pub type TopicId = u64;

/// Block heights are signed to match the chain's own representation; a
/// healthy node never reports a negative height.
pub type BlockHeight = i64;

/// Snapshot of topic metadata, fetched once when a loop starts and refreshed
/// after each successful commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topic {
    pub id: TopicId,
    /// Number of blocks per recurring epoch.
    pub epoch_length: i64,
    /// Height at which the last epoch ended; anchors window predictions.
    pub epoch_last_ended: BlockHeight,
    /// Blocks after an epoch boundary during which worker submissions are
    /// accepted.
    pub worker_submission_window: i64,
}

/// Chain-issued marker gating submission eligibility for the current cycle.
///
/// A `block_height` of zero is the sentinel for "no nonce currently open";
/// the chain never issues a real nonce at height zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Nonce {
    pub block_height: BlockHeight,
}

impl Nonce {
    /// Sentinel value returned when no nonce is currently open.
    pub const ABSENT: Nonce = Nonce { block_height: 0 };

    pub fn is_open(&self) -> bool {
        self.block_height != 0
    }
}

pub type ChainFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// Narrow interface to the chain collaborator shared by every scheduling
/// loop. Implementations must be safe for concurrent use from multiple
/// tasks; registration calls must be idempotent even across process
/// instances.
pub trait ChainClient: Send + Sync + 'static {
    fn get_topic_by_id(&self, topic_id: TopicId) -> ChainFuture<'_, Topic>;

    fn get_current_chain_block_height(&self) -> ChainFuture<'_, BlockHeight>;

    /// Latest open worker nonce for the topic, or [`Nonce::ABSENT`] when no
    /// submission period is currently open. Used identically by both roles.
    fn get_latest_open_worker_nonce_by_topic_id(&self, topic_id: TopicId)
        -> ChainFuture<'_, Nonce>;

    /// Returns `true` once the worker is registered on the topic, whether or
    /// not this call performed the registration.
    fn register_worker_idempotently<'a>(
        &'a self,
        worker: &'a WorkerConfig,
    ) -> ChainFuture<'a, bool>;

    /// Returns `true` once the reputer is registered and sufficiently staked.
    fn register_and_stake_reputer_idempotently<'a>(
        &'a self,
        reputer: &'a ReputerConfig,
    ) -> ChainFuture<'a, bool>;

    /// Builds, signs, and submits the worker payload for `nonce`. `Ok(true)`
    /// means the submission was accepted.
    fn build_commit_worker_payload<'a>(
        &'a self,
        worker: &'a WorkerConfig,
        nonce: Nonce,
    ) -> ChainFuture<'a, bool>;

    /// Builds, signs, and submits the reputer payload anchored to the height
    /// at which the worker nonce opened.
    fn build_commit_reputer_payload<'a>(
        &'a self,
        reputer: &'a ReputerConfig,
        nonce_height: BlockHeight,
    ) -> ChainFuture<'a, bool>;
}
