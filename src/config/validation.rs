//! Source descriptor validation
//!
//! Validates a request's source before any I/O happens:
//! - The manifest URL is present and well-formed
//! - The manifest name stays inside the manifest repository
//! - Parallelism and rewrite rules are sane

use crate::manifest::snapshot::is_contained;
use crate::source::Source;
use crate::RepoResourceError;
use std::path::Path;

/// Validation error details
#[derive(Debug, Clone)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validation result
pub type ValidationResult = std::result::Result<(), Vec<ValidationError>>;

/// Validate a source descriptor
pub fn validate_source(source: &Source) -> ValidationResult {
    let mut errors = Vec::new();

    if source.url.trim().is_empty() {
        errors.push(ValidationError::new("url", "Manifest URL is mandatory"));
    } else if source.url.chars().any(char::is_whitespace) {
        errors.push(ValidationError::new(
            "url",
            format!("Manifest URL contains whitespace: {:?}", source.url),
        ));
    }

    if source.revision.trim().is_empty() {
        errors.push(ValidationError::new("revision", "Revision cannot be empty"));
    }

    if !is_contained(Path::new(&source.manifest_name)) {
        errors.push(ValidationError::new(
            "name",
            format!(
                "Manifest name must be a relative path inside the manifest repository: {}",
                source.manifest_name
            ),
        ));
    }

    if source.jobs == Some(0) {
        errors.push(ValidationError::new("jobs", "jobs must be at least 1"));
    }

    if source.rewrite.keys().any(|prefix| prefix.is_empty()) {
        errors.push(ValidationError::new(
            "rewrite",
            "Rewrite prefixes cannot be empty",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Validate a source descriptor and convert failures into a single error
pub fn validate_source_result(source: &Source) -> crate::Result<()> {
    validate_source(source).map_err(|errors| {
        let messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
        RepoResourceError::Config(format!("Invalid source: {}", messages.join("; ")))
    })
}
