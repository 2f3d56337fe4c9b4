//! Shared guards and fixtures for integration tests.

use std::env;
use std::ffi::OsString;
use std::sync::{Mutex, MutexGuard, OnceLock};

use camino::Utf8PathBuf;
use orchestra::config::OrchestratorConfig;
use orchestra::routing::domain::{CapabilitySet, WorkerId, WorkerProfile};

static ENV_MUTEX: OnceLock<Mutex<()>> = OnceLock::new();

/// Guard that applies a scoped environment variable update.
pub struct EnvVarGuard {
    previous: Vec<(OsString, Option<OsString>)>,
    _lock: MutexGuard<'static, ()>,
}

impl EnvVarGuard {
    /// Sets or clears `ORCHESTRA_*` variables for the guard lifetime.
    pub fn set_many(changes: &[(&str, Option<&str>)]) -> Self {
        let lock = env_lock();
        let mut previous = Vec::with_capacity(changes.len());

        for (key, value) in changes {
            previous.push((OsString::from(key), env::var_os(key)));
            unsafe {
                // SAFETY: the global mutex serializes environment mutations in tests.
                match value {
                    Some(new_value) => env::set_var(key, new_value),
                    None => env::remove_var(key),
                }
            }
        }

        Self {
            previous,
            _lock: lock,
        }
    }
}

impl Drop for EnvVarGuard {
    fn drop(&mut self) {
        for (key, value) in self.previous.drain(..) {
            unsafe {
                // SAFETY: the global mutex serializes environment mutations in tests.
                match value {
                    Some(previous) => env::set_var(&key, &previous),
                    None => env::remove_var(&key),
                }
            }
        }
    }
}

fn env_lock() -> MutexGuard<'static, ()> {
    ENV_MUTEX
        .get_or_init(|| Mutex::new(()))
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
}

/// Temporary state directory removed when dropped.
pub struct TempState {
    _dir: tempfile::TempDir,
    path: Utf8PathBuf,
}

impl TempState {
    /// Creates an empty state directory.
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = Utf8PathBuf::from_path_buf(dir.path().join("state")).expect("utf-8 temp path");
        Self { _dir: dir, path }
    }

    /// Returns the state directory path.
    pub fn path(&self) -> &Utf8PathBuf {
        &self.path
    }
}

/// Builds a worker profile with one slot.
pub fn worker_profile(id: &str, capabilities: &[&str]) -> WorkerProfile {
    WorkerProfile::new(
        WorkerId::new(id).expect("valid worker id"),
        CapabilitySet::parse(capabilities).expect("valid capabilities"),
        1,
    )
    .expect("valid profile")
}

/// Configuration with `workers` registered and the `test` check required.
pub fn config_with_workers(workers: &[&str], capabilities: &[&str]) -> OrchestratorConfig {
    OrchestratorConfig {
        default_required_checks: vec!["test".to_owned()],
        workers: workers
            .iter()
            .map(|id| worker_profile(id, capabilities))
            .collect(),
        ..OrchestratorConfig::default()
    }
}
