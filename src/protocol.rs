//! JSON request and response shapes exchanged with the CI system
//!
//! Required fields are plain fields, optional ones are `Option`/defaulted, so
//! a missing required field is detected while decoding.

use crate::source::Source;
use crate::{RepoResourceError, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::io::Read;

/// One version as seen by the CI system: the manifest text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Version {
    pub version: String,
}

impl Version {
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
        }
    }
}

/// Request for the check operation
#[derive(Debug, Clone, Deserialize)]
pub struct CheckRequest {
    pub source: Source,

    /// Last version known to the CI system
    #[serde(default)]
    pub version: Option<Version>,

    /// Previously emitted versions, oldest first
    #[serde(default)]
    pub versions: Vec<Version>,
}

impl CheckRequest {
    pub fn new(source: Source) -> Self {
        Self {
            source,
            version: None,
            versions: Vec::new(),
        }
    }

    /// All versions the caller already knows, oldest first
    pub fn known_versions(&self) -> impl Iterator<Item = &Version> {
        self.versions.iter().chain(self.version.iter())
    }
}

/// Request for the in (get) operation
#[derive(Debug, Clone, Deserialize)]
pub struct InRequest {
    pub source: Source,

    /// The exact version to fetch
    pub version: Version,
}

/// A single key/value pair shown on the build page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataEntry {
    pub name: String,
    pub value: String,
}

/// Response of the in (get) operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InResponse {
    pub version: Version,
    pub metadata: Vec<MetadataEntry>,
}

/// A request type and the keys it cannot do without
pub trait Request: DeserializeOwned {
    /// Key paths that must be present, parents before their children
    const REQUIRED: &'static [&'static [&'static str]];
}

impl Request for CheckRequest {
    const REQUIRED: &'static [&'static [&'static str]] = &[&["source"], &["source", "url"]];
}

impl Request for InRequest {
    const REQUIRED: &'static [&'static [&'static str]] = &[
        &["source"],
        &["source", "url"],
        &["version"],
        &["version", "version"],
    ];
}

/// Decode a request from a JSON stream
///
/// The stream is read into a [`serde_json::Value`] first. A missing required
/// key becomes [`RepoResourceError::MissingField`] naming that key; any other
/// problem is a [`RepoResourceError::Json`].
pub fn decode<T: Request>(reader: impl Read) -> Result<T> {
    let value: Value = serde_json::from_reader(reader)?;
    if let Some(field) = missing_field(&value, T::REQUIRED) {
        return Err(RepoResourceError::MissingField(field.to_string()));
    }
    Ok(serde_json::from_value(value)?)
}

/// Decode a request from a JSON string
pub fn decode_str<T: Request>(json: &str) -> Result<T> {
    decode(json.as_bytes())
}

/// First required key absent from `value`
///
/// A parent that is present but not an object is left to the typed decode.
fn missing_field(value: &Value, required: &[&[&'static str]]) -> Option<&'static str> {
    required.iter().find_map(|path| {
        let (last, parents) = path.split_last()?;
        let parent = parents
            .iter()
            .try_fold(value, |node, key| node.as_object()?.get(*key))?;
        match parent.as_object() {
            Some(object) if !object.contains_key(*last) => Some(*last),
            _ => None,
        }
    })
}
