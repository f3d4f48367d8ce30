//! Error types for repo-resource
//!
//! Every failure the resource can hit maps onto one of a small set of kinds so
//! the command-line adapter can report them distinctly. Uses thiserror for
//! ergonomic error handling.

use thiserror::Error;

/// Result type alias for repo-resource operations
pub type Result<T> = std::result::Result<T, RepoResourceError>;

/// Error type for repo-resource operations
#[derive(Error, Debug)]
pub enum RepoResourceError {
    /// Manifest text is not well-formed XML
    #[error("Parse error: {0}")]
    Parse(String),

    /// A required request field is absent
    #[error("Missing required field: {0}")]
    MissingField(String),

    /// Invalid source descriptor or manifest content (e.g. project without revision)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Authentication material is absent, malformed or rejected
    #[error("Authentication error: {0}")]
    Credential(String),

    /// The checkout collaborator failed (network, permissions, local state)
    #[error("Checkout error: {0}")]
    Checkout(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl RepoResourceError {
    /// Short, stable name of the error kind, used as a log field
    pub fn kind(&self) -> &'static str {
        match self {
            RepoResourceError::Parse(_) => "parse",
            RepoResourceError::MissingField(_) => "missing_field",
            RepoResourceError::Config(_) => "config",
            RepoResourceError::Credential(_) => "credential",
            RepoResourceError::Checkout(_) => "checkout",
            RepoResourceError::Io(_) => "io",
            RepoResourceError::Json(_) => "json",
            RepoResourceError::Yaml(_) => "yaml",
        }
    }

    /// Prefix the message with `context`, keeping the error kind
    pub fn context(self, context: &str) -> Self {
        match self {
            RepoResourceError::Parse(m) => RepoResourceError::Parse(format!("{}: {}", context, m)),
            RepoResourceError::MissingField(m) => RepoResourceError::MissingField(m),
            RepoResourceError::Config(m) => {
                RepoResourceError::Config(format!("{}: {}", context, m))
            }
            RepoResourceError::Credential(m) => {
                RepoResourceError::Credential(format!("{}: {}", context, m))
            }
            RepoResourceError::Checkout(m) => {
                RepoResourceError::Checkout(format!("{}: {}", context, m))
            }
            RepoResourceError::Io(e) => RepoResourceError::Io(std::io::Error::new(
                e.kind(),
                format!("{}: {}", context, e),
            )),
            other => other,
        }
    }
}

impl From<git2::Error> for RepoResourceError {
    fn from(e: git2::Error) -> Self {
        if e.code() == git2::ErrorCode::Auth || e.class() == git2::ErrorClass::Ssh {
            RepoResourceError::Credential(e.message().to_string())
        } else {
            RepoResourceError::Checkout(e.message().to_string())
        }
    }
}
