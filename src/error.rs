//! Domain errors and their classification.

use crate::types::ValidationError;
use serde::{Deserialize, Serialize};

/// Errors raised by graph operations.
///
/// Operations return `eyre::Result`; these are wrapped with `eyre::eyre!` and
/// recovered with [`ErrorKind::of`].
#[derive(Debug)]
pub enum CraftError {
    /// A required field was missing or not positive.
    InvalidInput(String),
    /// Item field validation failed.
    Validation(ValidationError),
    /// Item not found by id.
    ItemNotFound(String),
    /// Item not found by name within a project.
    NamedItemNotFound { project_id: String, name: String },
    /// Self-referential edge.
    SelfDependency(String),
    /// Edge to that dependency already exists.
    DuplicateDependency { parent: String, dependency: String },
    /// Adding this edge would create a cycle.
    CycleDetected { parent: String, dependency: String },
    /// A dependency has not been crafted far enough yet.
    DependencyIncomplete {
        id: String,
        name: String,
        completed: i64,
        required: i64,
    },
}

impl std::fmt::Display for CraftError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CraftError::InvalidInput(msg) => write!(f, "invalid input: {}", msg),
            CraftError::Validation(e) => write!(f, "validation error: {}", e),
            CraftError::ItemNotFound(id) => write!(f, "item not found: {}", id),
            CraftError::NamedItemNotFound { project_id, name } => {
                write!(f, "item \"{}\" not found in project {}", name, project_id)
            }
            CraftError::SelfDependency(name) => write!(f, "item \"{}\" cannot depend on itself", name),
            CraftError::DuplicateDependency { parent, dependency } => {
                write!(f, "\"{}\" already depends on \"{}\"", parent, dependency)
            }
            CraftError::CycleDetected { parent, dependency } => write!(
                f,
                "circular dependency: \"{}\" already requires \"{}\"",
                dependency, parent
            ),
            CraftError::DependencyIncomplete {
                name,
                completed,
                required,
                ..
            } => write!(
                f,
                "cannot craft: dependency \"{}\" incomplete ({}/{})",
                name, completed, required
            ),
        }
    }
}

impl std::error::Error for CraftError {}

impl From<ValidationError> for CraftError {
    fn from(e: ValidationError) -> Self {
        CraftError::Validation(e)
    }
}

/// Coarse error classification surfaced to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidInput,
    NotFound,
    InvalidOperation,
    DependencyIncomplete,
    Storage,
}

impl ErrorKind {
    /// Classify an error report. Anything that isn't a [`CraftError`] came
    /// from the storage layer.
    pub fn of(report: &eyre::Report) -> Self {
        if let Some(e) = report.downcast_ref::<CraftError>() {
            return e.kind();
        }
        if let Some(e) = report.downcast_ref::<RemoteError>() {
            return e.kind;
        }
        ErrorKind::Storage
    }

    /// HTTP-style status code for this kind.
    pub fn status_code(&self) -> u16 {
        match self {
            ErrorKind::InvalidInput | ErrorKind::InvalidOperation | ErrorKind::DependencyIncomplete => 400,
            ErrorKind::NotFound => 404,
            ErrorKind::Storage => 500,
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorKind::InvalidInput => "invalid_input",
            ErrorKind::NotFound => "not_found",
            ErrorKind::InvalidOperation => "invalid_operation",
            ErrorKind::DependencyIncomplete => "dependency_incomplete",
            ErrorKind::Storage => "storage",
        };
        f.write_str(s)
    }
}

/// Error relayed from the daemon, classification intact.
#[derive(Debug, Clone)]
pub struct RemoteError {
    pub kind: ErrorKind,
    pub message: String,
}

impl std::fmt::Display for RemoteError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for RemoteError {}

impl CraftError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CraftError::InvalidInput(_) | CraftError::Validation(_) => ErrorKind::InvalidInput,
            CraftError::ItemNotFound(_) | CraftError::NamedItemNotFound { .. } => ErrorKind::NotFound,
            CraftError::SelfDependency(_)
            | CraftError::DuplicateDependency { .. }
            | CraftError::CycleDetected { .. } => ErrorKind::InvalidOperation,
            CraftError::DependencyIncomplete { .. } => ErrorKind::DependencyIncomplete,
        }
    }
}
