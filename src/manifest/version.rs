//! Canonical, comparable manifest versions

use super::parser::Manifest;
use super::xml::Element;
use crate::Result;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::path::Path;

/// The content of one manifest file, compared by its canonical form
///
/// Two versions are equal when their canonical forms match, so whitespace,
/// attribute order and the XML declaration never produce a new version.
#[derive(Debug, Clone)]
pub struct ManifestVersion {
    raw: String,
    root: Element,
    canonical: String,
}

impl ManifestVersion {
    /// Parse raw manifest text
    pub fn parse(raw: impl Into<String>) -> Result<Self> {
        let raw = raw.into();
        let root = Element::parse(&raw)?;
        Ok(Self::build(raw, root))
    }

    /// Read and parse a manifest file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::parse(content)
    }

    /// Wrap an element tree, using its canonical text as the raw text
    pub fn from_element(root: Element) -> Self {
        let raw = root.to_canonical_string();
        Self::build(raw, root)
    }

    fn build(raw: String, root: Element) -> Self {
        let canonical = root.to_canonical_string();
        Self {
            raw,
            root,
            canonical,
        }
    }

    /// The canonical form used for comparison and stable serialization
    pub fn standard(&self) -> &str {
        &self.canonical
    }

    /// The text exactly as it was received
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// The parsed element tree
    pub fn root(&self) -> &Element {
        &self.root
    }

    /// Typed view of the manifest
    pub fn manifest(&self) -> Result<Manifest> {
        Manifest::from_element(&self.root)
    }
}

impl PartialEq for ManifestVersion {
    fn eq(&self, other: &Self) -> bool {
        self.canonical == other.canonical
    }
}

impl Eq for ManifestVersion {}

impl Hash for ManifestVersion {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.canonical.hash(state);
    }
}

impl fmt::Display for ManifestVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical)
    }
}
