//! Launches one concurrent scheduling loop per unique `(role, topic)` pair
//! and waits for all of them to finish.

use crate::chain::{ChainClient, TopicId};
use crate::runtime::config::{ActorConfig, ReputerConfig, SchedulerConfig, WorkerConfig};
use crate::runtime::telemetry::Telemetry;
use crate::scheduler::reputer::ReputerProcess;
use crate::scheduler::worker::WorkerProcess;
use futures::future::join_all;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Owns the configured actors and the shared chain collaborator, and drives
/// the whole scheduler through [`Dispatcher::spawn`].
pub struct Dispatcher<C> {
    chain: Arc<C>,
    config: SchedulerConfig,
    actors: Vec<ActorConfig>,
    telemetry: Arc<Telemetry>,
}

impl<C: ChainClient> Dispatcher<C> {
    pub fn new(chain: Arc<C>, config: SchedulerConfig, actors: Vec<ActorConfig>) -> Self {
        Self {
            chain,
            config,
            actors,
            telemetry: Arc::new(Telemetry::default()),
        }
    }

    /// Counters recorded by the loops this dispatcher launches.
    pub fn telemetry(&self) -> Arc<Telemetry> {
        Arc::clone(&self.telemetry)
    }

    /// Launches one loop per surviving `(role, topic)` entry and blocks until
    /// every loop has returned. An individual loop's fatal error only
    /// terminates that loop, never the others.
    pub async fn spawn(self) {
        let (workers, reputers) = partition_actors(self.actors);
        let workers = dedup_by_topic(workers, "worker", |worker| worker.topic_id);
        let reputers = dedup_by_topic(reputers, "reputer", |reputer| reputer.topic_id);

        let mut handles: Vec<JoinHandle<()>> = Vec::with_capacity(workers.len() + reputers.len());

        for worker in workers {
            let process = WorkerProcess::new(
                Arc::clone(&self.chain),
                worker,
                self.config.clone(),
                Arc::clone(&self.telemetry),
            );
            handles.push(tokio::spawn(process.run()));
        }

        for reputer in reputers {
            let process = ReputerProcess::new(
                Arc::clone(&self.chain),
                reputer,
                self.config.clone(),
                Arc::clone(&self.telemetry),
            );
            handles.push(tokio::spawn(process.run()));
        }

        let results = join_all(handles).await;
        for result in results {
            if let Err(err) = result {
                tracing::error!(error = %err, "scheduling loop task panicked");
            }
        }
        tracing::info!("all scheduling loops have finished");
    }
}

fn partition_actors(actors: Vec<ActorConfig>) -> (Vec<WorkerConfig>, Vec<ReputerConfig>) {
    let mut workers = Vec::new();
    let mut reputers = Vec::new();
    for actor in actors {
        match actor {
            ActorConfig::Worker(worker) => workers.push(worker),
            ActorConfig::Reputer(reputer) => reputers.push(reputer),
        }
    }
    (workers, reputers)
}

/// First configuration for a topic wins; later duplicates are skipped with a
/// low-severity diagnostic.
fn dedup_by_topic<T>(
    entries: Vec<T>,
    role: &'static str,
    topic_of: impl Fn(&T) -> TopicId,
) -> Vec<T> {
    let mut seen: HashSet<TopicId> = HashSet::new();
    entries
        .into_iter()
        .filter(|entry| {
            let topic_id = topic_of(entry);
            if seen.insert(topic_id) {
                true
            } else {
                tracing::debug!(topic_id, role, "actor already configured for topic; skipping");
                false
            }
        })
        .collect()
}
