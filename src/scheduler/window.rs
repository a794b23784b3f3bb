//! Anticipated-window model: predicts the block-height interval during which
//! a nonce check or submission is expected to be admissible, and provides the
//! timed suspensions the loops use to cross the dead time between epochs.
//!
//! Bounds are fractional block heights. They are derived from an average
//! block production rate, so a window may open half a block "early" to absorb
//! block-time jitter; membership tests and wall-clock conversion both operate
//! on the fractional values directly.

use crate::chain::{BlockHeight, Topic};
use std::time::Duration;
use tokio::time::sleep;

/// Sub-block lead applied to a window's open bound so a loop starts checking
/// slightly before the predicted boundary block is produced.
const NONCE_CHECK_LEAD_BLOCKS: f64 = 0.5;

/// Conversion between block distance and wall-clock time using the chain's
/// average block duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cadence {
    average_block_time: Duration,
}

impl Cadence {
    pub fn new(average_block_time: Duration) -> Self {
        Self { average_block_time }
    }

    /// Wall-clock equivalent of a (possibly fractional) block distance.
    /// Non-positive distances map to zero.
    pub fn blocks_to_wall_clock(&self, blocks: f64) -> Duration {
        if blocks <= 0.0 {
            return Duration::ZERO;
        }
        self.average_block_time.mul_f64(blocks)
    }
}

/// Predicted admissible block-height interval for one scheduling cycle.
///
/// A window is recomputed, never extended in place: the owning loop holds a
/// dirty flag and rebuilds the window once the flag is set.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct AnticipatedWindow {
    /// Soonest height at which an open nonce may appear (worker) or a
    /// submission may be accepted (reputer).
    pub soonest_open: f64,
    /// Soonest height at which the submission period ends.
    pub soonest_close: f64,
}

impl AnticipatedWindow {
    /// Window in which the topic's next open worker nonce is expected.
    ///
    /// Picks the earliest epoch boundary `epoch_last_ended + k * epoch_length`
    /// (`k >= 0`) whose submission span has not fully elapsed at
    /// `current_block`, so a window that is still open is never skipped.
    pub fn for_worker(topic: &Topic, current_block: BlockHeight) -> Self {
        let epoch = effective_epoch_length(topic) as f64;
        let span = submission_span(topic);
        let anchor = topic.epoch_last_ended as f64;
        let current = current_block as f64;

        let cycles = ((current - span - anchor) / epoch).ceil().max(0.0);
        let open = anchor + cycles * epoch;

        Self {
            soonest_open: open - NONCE_CHECK_LEAD_BLOCKS,
            soonest_close: open + span,
        }
    }

    /// Submission window for the reputer role, anchored to the height at
    /// which the worker nonce opened rather than to the current height. It
    /// opens once the worker submission span closes and lasts until the
    /// epoch rolls over.
    pub fn for_reputer(topic: &Topic, open_nonce_height: BlockHeight) -> Self {
        let epoch = effective_epoch_length(topic) as f64;
        let span = submission_span(topic);
        let nonce = open_nonce_height as f64;

        Self {
            soonest_open: nonce + span - NONCE_CHECK_LEAD_BLOCKS,
            soonest_close: nonce + epoch,
        }
    }

    /// Inclusive membership on both bounds.
    pub fn contains(&self, block: BlockHeight) -> bool {
        let block = block as f64;
        self.soonest_open <= block && block <= self.soonest_close
    }

    /// Reputer membership is exclusive on the close bound: the epoch rolls
    /// over there and the anchoring nonce is spent.
    pub fn contains_reputer(&self, block: BlockHeight) -> bool {
        let block = block as f64;
        self.soonest_open <= block && block < self.soonest_close
    }

    /// Suspends until the estimated start of this window, or of its next
    /// recurrence when the start has already passed. Never returns early.
    pub async fn wait_until_window_start(
        &self,
        cadence: Cadence,
        current_block: BlockHeight,
        epoch_length: i64,
    ) {
        let current = current_block as f64;
        let mut target = self.soonest_open;
        if current >= target {
            target += epoch_length.max(1) as f64;
        }
        sleep(cadence.blocks_to_wall_clock(target - current)).await;
    }
}

/// Suspends until the estimated start of the reputer submission window
/// anchored to `open_nonce_height`, or of its next recurrence when the start
/// has already passed.
pub async fn wait_until_reputer_window_start(
    topic: &Topic,
    cadence: Cadence,
    open_nonce_height: BlockHeight,
    current_block: BlockHeight,
) {
    let window = AnticipatedWindow::for_reputer(topic, open_nonce_height);
    let current = current_block as f64;
    let mut target = window.soonest_open;
    if current >= target {
        target += effective_epoch_length(topic) as f64;
    }
    sleep(cadence.blocks_to_wall_clock(target - current)).await;
}

/// Short suspension used when a loop is inside a window but the current
/// attempt cannot proceed yet (nonce not open, commit rejected). Keeps the
/// loop from busy-polling without sleeping past the remaining window.
pub async fn wait_short_backoff(delay: Duration) {
    sleep(delay).await;
}

fn effective_epoch_length(topic: &Topic) -> i64 {
    topic.epoch_length.max(1)
}

/// Worker submission span, clamped to `[1, epoch_length]` so a misconfigured
/// topic still yields a well-ordered window.
fn submission_span(topic: &Topic) -> f64 {
    topic
        .worker_submission_window
        .clamp(1, effective_epoch_length(topic)) as f64
}
