//! Error types for the connector client

use thiserror::Error;

use crate::permissions::Capability;
use crate::types::{EntityId, ProjectId};

/// Result type for client operations
pub type Result<T> = std::result::Result<T, ClientError>;

/// Client error
#[derive(Debug, Error)]
pub enum ClientError {
    /// The local permission check failed, nothing was sent
    #[error("Permission denied on project {project} ({capability}): {message}")]
    PermissionDenied {
        project: ProjectId,
        capability: Capability,
        message: String,
    },

    /// The server refused the operation for the current user
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// The attested state no longer matches the server
    #[error("Stale state: {0}")]
    StalePrecondition(String),

    /// Entity not found on the server
    #[error("Not found: {0}")]
    NotFound(String),

    /// A value required for undo was never stored or resolved
    #[error("Missing undo state: {0}")]
    MissingUndoState(String),

    /// Two stored partners share the same node and relation
    #[error("Ambiguous link match for node {node_id} with relation {relation_id}")]
    AmbiguousLinkMatch { node_id: EntityId, relation_id: EntityId },

    /// A snapshot was built from unresolved references
    #[error("Invalid snapshot: {0}")]
    InvalidSnapshot(String),

    /// The observed state does not know the requested entity
    #[error("Unknown entity {0} in observed state")]
    UnknownEntity(EntityId),

    /// Command lifecycle violation (e.g. undo before execute)
    #[error("Invalid command transition: {0}")]
    InvalidTransition(String),

    /// Value outside its allowed range
    #[error("Invalid value: {0}")]
    InvalidValue(String),

    /// Server returned an error without a recognized type
    #[error("Server error {status}: {message}")]
    Server { status: u16, message: String },

    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid response from server
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Coarse classification used to pick a user-facing reaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// "You may not do this"
    Permission,
    /// "This no longer exists as you last saw it"
    Conflict,
    /// History or programming error inside the client
    Internal,
    /// Network, protocol or server failure
    Transport,
}

impl ClientError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ClientError::PermissionDenied { .. } | ClientError::Forbidden(_) => {
                ErrorKind::Permission
            }
            ClientError::StalePrecondition(_) | ClientError::NotFound(_) => ErrorKind::Conflict,
            ClientError::MissingUndoState(_)
            | ClientError::AmbiguousLinkMatch { .. }
            | ClientError::InvalidSnapshot(_)
            | ClientError::UnknownEntity(_)
            | ClientError::InvalidTransition(_)
            | ClientError::InvalidValue(_)
            | ClientError::Config(_) => ErrorKind::Internal,
            ClientError::Server { .. }
            | ClientError::Http(_)
            | ClientError::Json(_)
            | ClientError::InvalidResponse(_) => ErrorKind::Transport,
        }
    }

    /// Whether the UI should reload its view before the user retries
    pub fn should_refresh(&self) -> bool {
        self.kind() == ErrorKind::Conflict
    }

    /// Short message suitable for a status bar
    pub fn user_message(&self) -> String {
        match self.kind() {
            ErrorKind::Permission => format!("You may not do this: {}", self),
            ErrorKind::Conflict => format!(
                "This no longer exists as you last saw it, please refresh: {}",
                self
            ),
            ErrorKind::Internal | ErrorKind::Transport => self.to_string(),
        }
    }
}
