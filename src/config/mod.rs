//! Configuration system
//!
//! Process-wide settings (cache directory, default parallelism, log level)
//! loaded from an optional YAML file, and validation of the per-request
//! source descriptor.

mod resource_config;
pub mod validation;

pub use resource_config::ResourceConfig;
pub use validation::{validate_source, validate_source_result, ValidationError};
