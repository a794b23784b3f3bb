use crate::chain::TopicId;
use crate::scheduler::window::Cadence;
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_AVERAGE_BLOCK_TIME_SECS: u64 = 5;
const DEFAULT_WITHIN_WINDOW_BACKOFF_SECS: u64 = 2;

/// Runtime configuration shared by every scheduling loop.
///
/// Construct via [`SchedulerConfig::builder`] so invariants are validated
/// before any loop observes the values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerConfig {
    average_block_time: Duration,
    within_window_backoff: Duration,
}

impl SchedulerConfig {
    pub fn builder() -> SchedulerConfigBuilder {
        SchedulerConfigBuilder::default()
    }

    /// Average block production time used to convert block distances into
    /// wall-clock sleeps.
    pub fn average_block_time(&self) -> Duration {
        self.average_block_time
    }

    /// Short sleep used when a loop is inside a window but the current
    /// attempt cannot proceed yet.
    pub fn within_window_backoff(&self) -> Duration {
        self.within_window_backoff
    }

    pub fn cadence(&self) -> Cadence {
        Cadence::new(self.average_block_time)
    }

    pub fn validate(&self) -> Result<()> {
        if self.average_block_time.is_zero() {
            bail!("average_block_time must be greater than 0");
        }
        if self.within_window_backoff.is_zero() {
            bail!("within_window_backoff must be greater than 0");
        }
        Ok(())
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            average_block_time: Duration::from_secs(DEFAULT_AVERAGE_BLOCK_TIME_SECS),
            within_window_backoff: Duration::from_secs(DEFAULT_WITHIN_WINDOW_BACKOFF_SECS),
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct SchedulerConfigBuilder {
    average_block_time: Option<Duration>,
    within_window_backoff: Option<Duration>,
}

impl SchedulerConfigBuilder {
    pub fn average_block_time(mut self, duration: Duration) -> Self {
        self.average_block_time = Some(duration);
        self
    }

    pub fn within_window_backoff(mut self, duration: Duration) -> Self {
        self.within_window_backoff = Some(duration);
        self
    }

    pub fn build(self) -> Result<SchedulerConfig> {
        let defaults = SchedulerConfig::default();
        let config = SchedulerConfig {
            average_block_time: self.average_block_time.unwrap_or(defaults.average_block_time),
            within_window_backoff: self
                .within_window_backoff
                .unwrap_or(defaults.within_window_backoff),
        };
        config.validate()?;
        Ok(config)
    }
}

/// Per-topic worker configuration supplied at startup. Immutable; owned by
/// the dispatcher and moved into the loop it launches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerConfig {
    pub topic_id: TopicId,
    /// Opaque payload-construction parameters consumed by the chain client.
    #[serde(default)]
    pub parameters: serde_json::Value,
}

impl WorkerConfig {
    pub fn new(topic_id: TopicId) -> Self {
        Self {
            topic_id,
            parameters: serde_json::Value::Null,
        }
    }

    pub fn with_parameters(mut self, parameters: serde_json::Value) -> Self {
        self.parameters = parameters;
        self
    }
}

/// Per-topic reputer configuration supplied at startup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReputerConfig {
    pub topic_id: TopicId,
    /// Minimum stake the chain client must ensure before the loop schedules.
    #[serde(default)]
    pub min_stake: u64,
    #[serde(default)]
    pub parameters: serde_json::Value,
}

impl ReputerConfig {
    pub fn new(topic_id: TopicId) -> Self {
        Self {
            topic_id,
            min_stake: 0,
            parameters: serde_json::Value::Null,
        }
    }

    pub fn with_min_stake(mut self, min_stake: u64) -> Self {
        self.min_stake = min_stake;
        self
    }

    pub fn with_parameters(mut self, parameters: serde_json::Value) -> Self {
        self.parameters = parameters;
        self
    }
}

/// One configured actor. The dispatcher partitions these by role before
/// launching loops.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum ActorConfig {
    Worker(WorkerConfig),
    Reputer(ReputerConfig),
}

impl ActorConfig {
    pub fn topic_id(&self) -> TopicId {
        match self {
            ActorConfig::Worker(worker) => worker.topic_id,
            ActorConfig::Reputer(reputer) => reputer.topic_id,
        }
    }
}

/// Parses actor configurations from a JSON document, the shape hosts keep in
/// their config files.
pub fn actors_from_json(raw: &str) -> Result<Vec<ActorConfig>> {
    serde_json::from_str(raw).context("failed to parse actor configuration")
}
