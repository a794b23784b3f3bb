use epochbeat::{ChainClient, Dispatcher};
use std::time::Duration;

pub fn init_tracing() {
    epochbeat::init_tracing();
}

/// Drives the dispatcher to completion with a generous simulated-time guard,
/// so a loop that never hits its scripted fatal error fails the test instead
/// of hanging it.
pub async fn run_scheduler<C: ChainClient>(dispatcher: Dispatcher<C>) {
    tokio::time::timeout(Duration::from_secs(24 * 3600), dispatcher.spawn())
        .await
        .expect("scheduler did not finish within a simulated day");
}
