//! Orchestrator configuration.
//!
//! Settings come from built-in defaults, an optional JSON file and
//! `ORCHESTRA_*` environment variables, applied in that order.

use crate::lock::domain::{LeaseTtl, LockDomainError};
use crate::routing::domain::{WorkerId, WorkerProfile};
use camino::{Utf8Path, Utf8PathBuf};
use cap_std::ambient_authority;
use cap_std::fs_utf8::Dir;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::hash::BuildHasher;
use std::io;
use thiserror::Error;

/// Environment variable overriding [`OrchestratorConfig::max_attempts`].
pub const MAX_ATTEMPTS_ENV: &str = "ORCHESTRA_MAX_ATTEMPTS";
/// Environment variable overriding [`OrchestratorConfig::lock_ttl_secs`].
pub const LOCK_TTL_ENV: &str = "ORCHESTRA_LOCK_TTL_SECS";
/// Environment variable overriding [`OrchestratorConfig::state_dir`].
pub const STATE_DIR_ENV: &str = "ORCHESTRA_STATE_DIR";
/// Environment variable overriding [`OrchestratorConfig::default_builder`].
pub const DEFAULT_BUILDER_ENV: &str = "ORCHESTRA_DEFAULT_BUILDER";
/// Environment variable overriding [`OrchestratorConfig::default_reviewer`].
pub const DEFAULT_REVIEWER_ENV: &str = "ORCHESTRA_DEFAULT_REVIEWER";

const DEFAULT_MAX_ATTEMPTS: u32 = 3;
const DEFAULT_LOCK_TTL_SECS: u64 = 1800;
const DEFAULT_STATE_DIR: &str = ".orchestra";

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read configuration {path}: {source}")]
    Read {
        /// File that failed.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },

    /// The configuration file is not valid JSON for this schema.
    #[error("failed to parse configuration {path}: {source}")]
    Parse {
        /// File that failed.
        path: Utf8PathBuf,
        /// Decoder error.
        source: serde_json::Error,
    },

    /// An environment override is not a valid value.
    #[error("environment variable {name} has invalid value '{value}'")]
    InvalidEnv {
        /// Variable name.
        name: &'static str,
        /// Rejected value.
        value: String,
    },

    /// The attempt ceiling is zero.
    #[error("max_attempts must be at least 1")]
    ZeroMaxAttempts,

    /// The lease duration is unusable.
    #[error(transparent)]
    LockTtl(#[from] LockDomainError),

    /// Two configured workers share an identifier.
    #[error("worker '{0}' is configured more than once")]
    DuplicateWorker(String),

    /// The default builder and reviewer are the same worker.
    #[error("worker '{0}' cannot be both the default builder and the default reviewer")]
    SameDefaultWorker(String),
}

/// Source of environment overrides.
pub trait EnvSource {
    /// Returns the value of `name`, if set and valid Unicode.
    fn var(&self, name: &str) -> Option<String>;
}

/// Reads overrides from the process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn var(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }
}

impl<S: BuildHasher> EnvSource for HashMap<String, String, S> {
    fn var(&self, name: &str) -> Option<String> {
        self.get(name).cloned()
    }
}

/// Runtime settings for an orchestrator instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OrchestratorConfig {
    /// Attempt ceiling applied to tasks that do not set their own.
    pub max_attempts: u32,
    /// Lease duration in seconds.
    pub lock_ttl_secs: u64,
    /// Root directory of the filesystem stores.
    pub state_dir: Utf8PathBuf,
    /// Checks every builder must report unless a task overrides them.
    pub default_required_checks: Vec<String>,
    /// Workers registered at start-up.
    pub workers: Vec<WorkerProfile>,
    /// Builder preferred for tasks that pin none.
    pub default_builder: Option<WorkerId>,
    /// Reviewer preferred for tasks that pin none.
    pub default_reviewer: Option<WorkerId>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            lock_ttl_secs: DEFAULT_LOCK_TTL_SECS,
            state_dir: Utf8PathBuf::from(DEFAULT_STATE_DIR),
            default_required_checks: Vec::new(),
            workers: Vec::new(),
            default_builder: None,
            default_reviewer: None,
        }
    }
}

impl OrchestratorConfig {
    /// Loads `path`, applies process environment overrides and validates
    /// the result.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the file cannot be read or parsed, an
    /// override is malformed, or a value is out of range.
    pub fn load(path: &Utf8Path) -> Result<Self, ConfigError> {
        Self::from_file(path)?.with_env(&ProcessEnv)
    }

    /// Starts from the defaults and applies process environment overrides.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when an override is malformed or out of range.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().with_env(&ProcessEnv)
    }

    /// Reads a JSON configuration file; absent keys keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Read`] or [`ConfigError::Parse`].
    pub fn from_file(path: &Utf8Path) -> Result<Self, ConfigError> {
        let read_err = |source| ConfigError::Read {
            path: path.to_owned(),
            source,
        };
        let parent = match path.parent() {
            Some(dir) if !dir.as_str().is_empty() => dir,
            _ => Utf8Path::new("."),
        };
        let file_name = path.file_name().ok_or_else(|| {
            read_err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "path has no file name",
            ))
        })?;
        let dir = Dir::open_ambient_dir(parent, ambient_authority()).map_err(read_err)?;
        let contents = dir.read_to_string(file_name).map_err(read_err)?;
        serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_owned(),
            source,
        })
    }

    /// Applies overrides from `env` and validates the result.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when an override is malformed or a value is
    /// out of range.
    pub fn with_env(mut self, env: &impl EnvSource) -> Result<Self, ConfigError> {
        if let Some(value) = env.var(MAX_ATTEMPTS_ENV) {
            self.max_attempts = parse_env(MAX_ATTEMPTS_ENV, &value)?;
        }
        if let Some(value) = env.var(LOCK_TTL_ENV) {
            self.lock_ttl_secs = parse_env(LOCK_TTL_ENV, &value)?;
        }
        if let Some(value) = env.var(STATE_DIR_ENV) {
            let trimmed = value.trim();
            if trimmed.is_empty() {
                return Err(ConfigError::InvalidEnv {
                    name: STATE_DIR_ENV,
                    value,
                });
            }
            self.state_dir = Utf8PathBuf::from(trimmed);
        }
        if let Some(value) = env.var(DEFAULT_BUILDER_ENV) {
            self.default_builder = Some(parse_worker(DEFAULT_BUILDER_ENV, value)?);
        }
        if let Some(value) = env.var(DEFAULT_REVIEWER_ENV) {
            self.default_reviewer = Some(parse_worker(DEFAULT_REVIEWER_ENV, value)?);
        }
        self.validate()?;
        Ok(self)
    }

    /// Checks value ranges, worker uniqueness and that the default builder
    /// and reviewer differ.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_attempts == 0 {
            return Err(ConfigError::ZeroMaxAttempts);
        }
        self.lease_ttl()?;
        let mut seen = BTreeSet::new();
        for worker in &self.workers {
            if !seen.insert(worker.id()) {
                return Err(ConfigError::DuplicateWorker(worker.id().to_string()));
            }
        }
        if let (Some(builder), Some(reviewer)) = (&self.default_builder, &self.default_reviewer)
            && builder == reviewer
        {
            return Err(ConfigError::SameDefaultWorker(builder.to_string()));
        }
        Ok(())
    }

    /// Returns the configured lease duration.
    ///
    /// # Errors
    ///
    /// Returns [`LockDomainError`] when the duration is zero or too large.
    pub fn lease_ttl(&self) -> Result<LeaseTtl, LockDomainError> {
        LeaseTtl::from_secs(self.lock_ttl_secs)
    }
}

fn parse_env<T: std::str::FromStr>(name: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidEnv {
        name,
        value: value.to_owned(),
    })
}

fn parse_worker(name: &'static str, value: String) -> Result<WorkerId, ConfigError> {
    WorkerId::new(value.as_str()).map_err(|_| ConfigError::InvalidEnv { name, value })
}
