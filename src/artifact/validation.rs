//! Structural validation of submitted artifacts.
//!
//! Validation never inspects the correctness of the change itself. It checks
//! that the record answers the suspended phase, names only declared
//! resources and reports every required check. All failures are collected
//! so a worker can fix a submission in one round trip.

use super::{Artifact, CheckStatus, ReviewDecision};
use crate::lock::domain::ResourcePath;
use crate::routing::domain::{WorkerId, WorkerRole};
use crate::task::domain::TaskId;

/// Error type for artifact validation failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactValidationError {
    /// The artifact answers a different task.
    TaskMismatch {
        /// Task awaiting the artifact.
        expected: TaskId,
        /// Task named by the artifact.
        actual: TaskId,
    },
    /// The artifact claims the wrong role for the suspended phase.
    RoleMismatch {
        /// Role awaited.
        expected: WorkerRole,
        /// Role claimed.
        actual: WorkerRole,
    },
    /// The artifact comes from a worker not assigned to this phase.
    WorkerMismatch {
        /// Worker awaited.
        expected: WorkerId,
        /// Worker claimed.
        actual: WorkerId,
    },
    /// The summary is blank.
    EmptySummary,
    /// A changed resource path is malformed.
    InvalidResource(String),
    /// A changed resource lies outside the task's declared resources.
    UndeclaredResource(String),
    /// A required check was not reported.
    MissingCheck(String),
    /// A builder artifact carries a review decision.
    UnexpectedDecision,
    /// A reviewer artifact has no decision.
    MissingDecision,
    /// A reviewer artifact has a blank rationale.
    EmptyRationale,
    /// A non-approval decision arrived without failing evidence.
    MissingEvidence(ReviewDecision),
    /// Multiple validation errors occurred.
    Multiple(Vec<ArtifactValidationError>),
}

impl ArtifactValidationError {
    /// Collapses collected errors; `None` when there were none.
    #[must_use]
    pub fn from_errors(mut errors: Vec<Self>) -> Option<Self> {
        match errors.len() {
            0 => None,
            1 => errors.pop(),
            _ => Some(Self::Multiple(errors)),
        }
    }

    /// Returns the offending artifact field, or the first one for
    /// [`ArtifactValidationError::Multiple`].
    #[must_use]
    pub fn field(&self) -> String {
        match self {
            Self::TaskMismatch { .. } => "task_id".to_owned(),
            Self::RoleMismatch { .. } => "role".to_owned(),
            Self::WorkerMismatch { .. } => "worker_id".to_owned(),
            Self::EmptySummary => "summary".to_owned(),
            Self::InvalidResource(_) | Self::UndeclaredResource(_) => {
                "changed_resources".to_owned()
            }
            Self::MissingCheck(name) => format!("check_results.{name}"),
            Self::UnexpectedDecision | Self::MissingDecision => "decision".to_owned(),
            Self::EmptyRationale => "rationale".to_owned(),
            Self::MissingEvidence(_) => "evidence".to_owned(),
            Self::Multiple(errors) => errors
                .first()
                .map_or_else(|| "artifact".to_owned(), Self::field),
        }
    }
}

impl std::fmt::Display for ArtifactValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TaskMismatch { expected, actual } => {
                write!(f, "artifact is for task {actual}, expected {expected}")
            }
            Self::RoleMismatch { expected, actual } => {
                write!(f, "task is awaiting a {expected} artifact, got {actual}")
            }
            Self::WorkerMismatch { expected, actual } => {
                write!(f, "worker {actual} is not assigned; awaiting {expected}")
            }
            Self::EmptySummary => write!(f, "summary must not be empty"),
            Self::InvalidResource(path) => write!(f, "invalid changed resource '{path}'"),
            Self::UndeclaredResource(path) => {
                write!(f, "changed resource '{path}' was not declared by the task")
            }
            Self::MissingCheck(name) => write!(f, "required check '{name}' was not reported"),
            Self::UnexpectedDecision => write!(f, "builder artifacts must not carry a decision"),
            Self::MissingDecision => {
                write!(f, "reviewer artifacts must carry APPROVED, RETRY or ESCALATED")
            }
            Self::EmptyRationale => write!(f, "rationale must not be empty"),
            Self::MissingEvidence(decision) => {
                write!(f, "a {decision} decision must include failing evidence")
            }
            Self::Multiple(errors) => {
                write!(f, "multiple validation errors: ")?;
                for (index, error) in errors.iter().enumerate() {
                    if index > 0 {
                        write!(f, "; ")?;
                    }
                    write!(f, "{error}")?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ArtifactValidationError {}

/// What the suspended phase is waiting for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactExpectation {
    /// Task awaiting the artifact.
    pub task_id: TaskId,
    /// Role of the awaited worker.
    pub role: WorkerRole,
    /// Worker assigned to the phase.
    pub worker_id: WorkerId,
    /// Resources the task declared; empty means unrestricted.
    pub declared_resources: Vec<ResourcePath>,
    /// Checks every builder artifact must report.
    pub required_checks: Vec<String>,
}

/// Accepted builder artifact details the reviewer needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildReport {
    /// Normalized changed resources.
    pub changed_resources: Vec<ResourcePath>,
    /// Failing or skipped gates surfaced to the reviewer.
    pub gate_warnings: Vec<String>,
}

/// Validates a builder artifact against the awaited expectation.
///
/// Failing checks do not reject the artifact; they become gate warnings for
/// the reviewer to weigh.
///
/// # Errors
///
/// Returns [`ArtifactValidationError`] describing every structural problem.
pub fn validate_builder_artifact(
    artifact: &Artifact,
    expectation: &ArtifactExpectation,
) -> Result<BuildReport, ArtifactValidationError> {
    let mut errors = identity_errors(artifact, expectation);

    if artifact.summary().trim().is_empty() {
        errors.push(ArtifactValidationError::EmptySummary);
    }
    if artifact.decision().is_some() {
        errors.push(ArtifactValidationError::UnexpectedDecision);
    }

    let mut changed_resources = Vec::with_capacity(artifact.changed_resources().len());
    for raw in artifact.changed_resources() {
        match ResourcePath::new(raw.as_str()) {
            Ok(path) => {
                let declared = expectation.declared_resources.is_empty()
                    || expectation.declared_resources.contains(&path);
                if declared {
                    changed_resources.push(path);
                } else {
                    errors.push(ArtifactValidationError::UndeclaredResource(raw.clone()));
                }
            }
            Err(_) => errors.push(ArtifactValidationError::InvalidResource(raw.clone())),
        }
    }

    for name in &expectation.required_checks {
        if !artifact.check_results().contains_key(name) {
            errors.push(ArtifactValidationError::MissingCheck(name.clone()));
        }
    }

    if let Some(error) = ArtifactValidationError::from_errors(errors) {
        return Err(error);
    }

    let gate_warnings = artifact
        .check_results()
        .iter()
        .filter(|(_, result)| result.status != CheckStatus::Pass)
        .map(|(name, result)| {
            if result.detail.trim().is_empty() {
                format!("{name}: {}", result.status)
            } else {
                format!("{name}: {} ({})", result.status, result.detail.trim())
            }
        })
        .collect();

    Ok(BuildReport {
        changed_resources,
        gate_warnings,
    })
}

/// Validates a reviewer artifact and returns its decision.
///
/// # Errors
///
/// Returns [`ArtifactValidationError`] describing every structural problem,
/// including a non-approval without evidence.
pub fn validate_reviewer_artifact(
    artifact: &Artifact,
    expectation: &ArtifactExpectation,
) -> Result<ReviewDecision, ArtifactValidationError> {
    let mut errors = identity_errors(artifact, expectation);

    let rationale_present = artifact
        .rationale()
        .is_some_and(|rationale| !rationale.trim().is_empty());
    if !rationale_present {
        errors.push(ArtifactValidationError::EmptyRationale);
    }

    let has_evidence = artifact
        .evidence()
        .iter()
        .any(|item| !item.trim().is_empty());
    match artifact.decision() {
        None => errors.push(ArtifactValidationError::MissingDecision),
        Some(decision) if decision != ReviewDecision::Approved && !has_evidence => {
            errors.push(ArtifactValidationError::MissingEvidence(decision));
        }
        Some(_) => {}
    }

    if let Some(error) = ArtifactValidationError::from_errors(errors) {
        return Err(error);
    }
    artifact
        .decision()
        .ok_or(ArtifactValidationError::MissingDecision)
}

fn identity_errors(
    artifact: &Artifact,
    expectation: &ArtifactExpectation,
) -> Vec<ArtifactValidationError> {
    let mut errors = Vec::new();
    if artifact.task_id() != expectation.task_id {
        errors.push(ArtifactValidationError::TaskMismatch {
            expected: expectation.task_id,
            actual: artifact.task_id(),
        });
    }
    if artifact.role() != expectation.role {
        errors.push(ArtifactValidationError::RoleMismatch {
            expected: expectation.role,
            actual: artifact.role(),
        });
    }
    if artifact.worker_id() != &expectation.worker_id {
        errors.push(ArtifactValidationError::WorkerMismatch {
            expected: expectation.worker_id.clone(),
            actual: artifact.worker_id().clone(),
        });
    }
    errors
}
