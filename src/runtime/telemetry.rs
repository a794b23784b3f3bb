use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;
use tracing_subscriber::EnvFilter;

static TRACING_INIT: OnceLock<()> = OnceLock::new();

/// Installs a basic tracing subscriber (if one is not already active).
///
/// The subscriber honours `RUST_LOG` if it is present, otherwise it falls back to `info`.
/// Calling this function multiple times is harmless.
pub fn init_tracing() {
    if TRACING_INIT.get().is_some() {
        return;
    }

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .try_init();

    let _ = TRACING_INIT.set(());
}

/// Lightweight rolling counters shared by every scheduling loop.
#[derive(Default, Debug)]
pub struct Telemetry {
    worker_commits: AtomicU64,
    reputer_commits: AtomicU64,
    commit_failures: AtomicU64,
    nonce_misses: AtomicU64,
    windows_recomputed: AtomicU64,
}

impl Telemetry {
    pub fn record_worker_commit(&self) {
        self.worker_commits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_reputer_commit(&self) {
        self.reputer_commits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_commit_failure(&self) {
        self.commit_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// A nonce fetch that returned the absent sentinel or an error.
    pub fn record_nonce_miss(&self) {
        self.nonce_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_window_recomputed(&self) {
        self.windows_recomputed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn worker_commits(&self) -> u64 {
        self.worker_commits.load(Ordering::Relaxed)
    }

    pub fn reputer_commits(&self) -> u64 {
        self.reputer_commits.load(Ordering::Relaxed)
    }

    pub fn commit_failures(&self) -> u64 {
        self.commit_failures.load(Ordering::Relaxed)
    }

    pub fn nonce_misses(&self) -> u64 {
        self.nonce_misses.load(Ordering::Relaxed)
    }

    pub fn windows_recomputed(&self) -> u64 {
        self.windows_recomputed.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> TelemetrySnapshot {
        TelemetrySnapshot {
            worker_commits: self.worker_commits(),
            reputer_commits: self.reputer_commits(),
            commit_failures: self.commit_failures(),
            nonce_misses: self.nonce_misses(),
            windows_recomputed: self.windows_recomputed(),
        }
    }
}

#[derive(Debug, Copy, Clone)]
pub struct TelemetrySnapshot {
    pub worker_commits: u64,
    pub reputer_commits: u64,
    pub commit_failures: u64,
    pub nonce_misses: u64,
    pub windows_recomputed: u64,
}
