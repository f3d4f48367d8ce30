//! Source descriptor: where manifests live and how to reach them

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

fn default_revision() -> String {
    "HEAD".to_string()
}

fn default_manifest_name() -> String {
    "default.xml".to_string()
}

/// The `source` object of every request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    /// Manifest repository URL
    pub url: String,

    /// Branch or ref of the manifest repository
    #[serde(default = "default_revision")]
    pub revision: String,

    /// Manifest file name inside the manifest repository
    #[serde(
        rename = "name",
        alias = "manifest_name",
        default = "default_manifest_name"
    )]
    pub manifest_name: String,

    /// SSH private key material, passed through to the checkout
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_key: Option<String>,

    /// URL prefix rewrites (prefix -> replacement)
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub rewrite: BTreeMap<String, String>,

    /// Number of projects checked out concurrently
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jobs: Option<usize>,
}

impl Source {
    /// Create a source with default revision and manifest name
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            revision: default_revision(),
            manifest_name: default_manifest_name(),
            private_key: None,
            rewrite: BTreeMap::new(),
            jobs: None,
        }
    }

    /// Set the manifest revision
    pub fn with_revision(mut self, revision: impl Into<String>) -> Self {
        self.revision = revision.into();
        self
    }

    /// Set the manifest file name
    pub fn with_manifest_name(mut self, name: impl Into<String>) -> Self {
        self.manifest_name = name.into();
        self
    }

    /// Add a URL rewrite rule
    pub fn with_rewrite(mut self, prefix: impl Into<String>, replacement: impl Into<String>) -> Self {
        self.rewrite.insert(prefix.into(), replacement.into());
        self
    }

    /// Manifest URL after rewrites
    pub fn manifest_url(&self) -> String {
        self.rewrite_url(&self.url)
    }

    /// Apply the rewrite rules to a URL
    ///
    /// The longest matching prefix wins, like git's `url.<base>.insteadOf`.
    pub fn rewrite_url(&self, url: &str) -> String {
        self.rewrite
            .iter()
            .filter(|(prefix, _)| url.starts_with(prefix.as_str()))
            .max_by_key(|(prefix, _)| prefix.len())
            .map(|(prefix, replacement)| format!("{}{}", replacement, &url[prefix.len()..]))
            .unwrap_or_else(|| url.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let source: Source =
            serde_json::from_str(r#"{"url": "https://android.googlesource.com/platform"}"#)
                .unwrap();

        assert_eq!(source.revision, "HEAD");
        assert_eq!(source.manifest_name, "default.xml");
        assert!(source.private_key.is_none());
        assert!(source.rewrite.is_empty());
        assert_eq!(source, Source::new("https://android.googlesource.com/platform"));
    }

    #[test]
    fn test_manifest_name_keys() {
        let source: Source = serde_json::from_str(
            r#"{"url": "u", "revision": "main", "name": "aosp_device_fixed.xml", "jobs": 24}"#,
        )
        .unwrap();
        assert_eq!(source.manifest_name, "aosp_device_fixed.xml");
        assert_eq!(source.jobs, Some(24));

        let source: Source =
            serde_json::from_str(r#"{"url": "u", "manifest_name": "other.xml"}"#).unwrap();
        assert_eq!(source.manifest_name, "other.xml");
    }

    #[test]
    fn test_missing_url() {
        assert!(serde_json::from_str::<Source>("{}").is_err());
    }

    #[test]
    fn test_rewrite_url() {
        let source = Source::new("https://unreachable-github.com/baylibre/demo-manifests.git")
            .with_rewrite("https://unreachable-github.com", "https://github.com");

        assert_eq!(
            source.manifest_url(),
            "https://github.com/baylibre/demo-manifests.git"
        );
        assert_eq!(
            source.rewrite_url("https://android.googlesource.com/x"),
            "https://android.googlesource.com/x"
        );
    }

    #[test]
    fn test_rewrite_longest_prefix_wins() {
        let source = Source::new("u")
            .with_rewrite("https://example.com/", "https://mirror.local/")
            .with_rewrite("https://example.com/private/", "ssh://git@example.com/private/");

        assert_eq!(
            source.rewrite_url("https://example.com/private/repo"),
            "ssh://git@example.com/private/repo"
        );
        assert_eq!(
            source.rewrite_url("https://example.com/public/repo"),
            "https://mirror.local/public/repo"
        );
    }

    #[test]
    fn test_serialization_skips_empty_fields() {
        let json = serde_json::to_string(&Source::new("u")).unwrap();
        assert_eq!(json, r#"{"url":"u","revision":"HEAD","name":"default.xml"}"#);
    }
}
