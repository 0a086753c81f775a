use std::path::PathBuf;

use thiserror::Error;

/// Which side of a diff an input-contract violation was found on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffSide {
    Previous,
    Current,
}

impl std::fmt::Display for DiffSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DiffSide::Previous => write!(f, "previous"),
            DiffSide::Current => write!(f, "current"),
        }
    }
}

/// Malformed input to the diff engine. These are programmer errors on the
/// caller's side; the diff never partially emits when one is raised.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DiffError {
    #[error("entity with an empty name in the {0} state")]
    EmptyEntityName(DiffSide),

    #[error("duplicate entity '{name}' in the {side} state")]
    DuplicateEntity { name: String, side: DiffSide },

    #[error("duplicate property '{property}' on entity '{entity}'")]
    DuplicateProperty { entity: String, property: String },

    #[error("duplicate relationship '{relationship}' on entity '{entity}'")]
    DuplicateRelationship { entity: String, relationship: String },
}

/// Errors surfaced by the migration store. I/O and state errors propagate
/// to the caller unchanged; none are retried.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("workspace {workspace} is not initialized (run 'crudgen init' first)")]
    NotInitialized { workspace: PathBuf },

    #[error(
        "invalid migration name '{name}': use letters, digits, '_' or '-', starting with a letter"
    )]
    InvalidName { name: String },

    #[error("a migration with id '{id}' already exists")]
    DuplicateMigrationId { id: String },

    #[error("malformed {what} file {path}")]
    Serialization {
        what: &'static str,
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("{context} {path}")]
    Io {
        context: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl StoreError {
    pub(crate) fn io(context: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StoreError::Io {
            context,
            path: path.into(),
            source,
        }
    }
}
