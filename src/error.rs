/// Centralized error types for the check resource using thiserror
///
/// Fatal conditions (anything that makes forward progress impossible) surface as
/// `ResourceError`; recoverable conditions are absorbed into data by the callers.
use thiserror::Error;

/// Main error type for a check invocation
#[derive(Error, Debug)]
pub enum ResourceError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Git error: {0}")]
    Git(#[from] GitError),

    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("Legacy check error: {0}")]
    Legacy(#[from] LegacyError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

/// Errors related to the `source` configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to parse check request: {0}")]
    ParseFailed(String),

    #[error("Missing required configuration: {0}")]
    MissingRequired(String),

    #[error("Invalid configuration value for '{key}': {reason}")]
    InvalidValue { key: String, reason: String },
}

/// Errors related to the local mirror and the git remote
#[derive(Error, Debug)]
pub enum GitError {
    #[error("Failed to initialize mirror at '{path}': {reason}")]
    InitFailed { path: String, reason: String },

    #[error("Failed to configure remote '{remote}': {reason}")]
    RemoteFailed { remote: String, reason: String },

    #[error("Failed to fetch from '{uri}': {reason}")]
    FetchFailed { uri: String, reason: String },

    #[error("Reference '{0}' did not resolve to a commit")]
    UnknownReference(String),

    #[error("Failed to compute changes of commit {commit}: {reason}")]
    DiffFailed { commit: String, reason: String },

    #[error("Failed to walk history at {commit}: {reason}")]
    WalkFailed { commit: String, reason: String },

    #[error("Failed to move HEAD to {commit}: {reason}")]
    HeadUpdateFailed { commit: String, reason: String },
}

/// Errors related to the notification queue
#[derive(Error, Debug)]
pub enum QueueError {
    #[error("Failed to look up queue '{queue}': {reason}")]
    LookupFailed { queue: String, reason: String },

    #[error("Failed to load replayed messages from '{path}': {reason}")]
    ReplayLoadFailed { path: String, reason: String },

    #[error("Failed to receive from queue '{queue}': {reason}")]
    ReceiveFailed { queue: String, reason: String },

    #[error("Failed to delete message from queue '{queue}': {reason}")]
    DeleteFailed { queue: String, reason: String },
}

/// Errors related to the external legacy checker
#[derive(Error, Debug)]
pub enum LegacyError {
    #[error("Legacy check command is empty")]
    EmptyCommand,

    #[error("Failed to spawn '{program}': {reason}")]
    SpawnFailed { program: String, reason: String },

    #[error("'{program}' exited with {status}")]
    CommandFailed { program: String, status: String },

    #[error("Failed to parse output of '{program}': {reason}")]
    InvalidOutput { program: String, reason: String },
}

// Conversion from anyhow::Error to ResourceError
impl From<anyhow::Error> for ResourceError {
    fn from(err: anyhow::Error) -> Self {
        ResourceError::Other(format!("{:#}", err))
    }
}

/// Result alias used across the crate
pub type Result<T> = std::result::Result<T, ResourceError>;

impl ResourceError {
    /// Whether this error names a reference the mirror could not resolve
    pub fn is_unknown_reference(&self) -> bool {
        matches!(self, ResourceError::Git(GitError::UnknownReference(_)))
    }

    /// Check if this error stems from the user's configuration rather than the environment
    pub fn is_user_error(&self) -> bool {
        matches!(self, ResourceError::Config(_))
    }
}
