pub mod chain;
pub mod runtime;
pub mod scheduler;

pub use chain::{BlockHeight, ChainClient, ChainFuture, Nonce, Topic, TopicId};
pub use runtime::config::{
    actors_from_json, ActorConfig, ReputerConfig, SchedulerConfig, SchedulerConfigBuilder,
    WorkerConfig,
};
pub use runtime::dispatcher::Dispatcher;
pub use runtime::telemetry::{init_tracing, Telemetry, TelemetrySnapshot};
pub use scheduler::reputer::ReputerProcess;
pub use scheduler::window::{AnticipatedWindow, Cadence};
pub use scheduler::worker::WorkerProcess;
