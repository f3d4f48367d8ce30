//! Version discovery for the check operation
//!
//! A version is the canonical text of the flattened manifest with every
//! project pinned to the commit its revision currently points at. A new
//! commit on any tracked branch therefore yields a new version, even when
//! the manifest file itself did not change.

use crate::checkout::{plan_checkouts, Checkout, InitRequest};
use crate::config::{validate_source_result, ResourceConfig};
use crate::git::GitCredentials;
use crate::manifest::{snapshot, Manifest, ManifestVersion};
use crate::protocol::{CheckRequest, Version};
use crate::source::Source;
use crate::Result;
use std::path::PathBuf;

/// Produces the versions emitted by check
pub struct Resolver<'a, C: Checkout + ?Sized> {
    checkout: &'a C,
    config: &'a ResourceConfig,
}

impl<'a, C: Checkout + ?Sized> Resolver<'a, C> {
    pub fn new(checkout: &'a C, config: &'a ResourceConfig) -> Self {
        Self { checkout, config }
    }

    /// Known versions followed by the current one, oldest first, without duplicates
    pub fn check(&self, request: &CheckRequest) -> Result<Vec<Version>> {
        let source = &request.source;
        validate_source_result(source)?;

        // Malformed prior versions fail before anything is fetched
        let known = request
            .known_versions()
            .map(|v| ManifestVersion::parse(v.version.as_str()))
            .collect::<Result<Vec<_>>>()?;

        let credentials = GitCredentials::from_source(source)?;
        let current = self.current_version(source, &credentials)?;

        let versions = merge_versions(known, current);
        tracing::info!(versions = versions.len(), "Check complete");
        Ok(versions)
    }

    /// Fetch the manifest and pin every project to its current commit
    pub fn current_version(
        &self,
        source: &Source,
        credentials: &GitCredentials,
    ) -> Result<ManifestVersion> {
        let workdir = self.workdir(source);
        std::fs::create_dir_all(&workdir)?;

        let url = source.manifest_url();
        let handle = self
            .checkout
            .init(&InitRequest::for_source(source, &url, &workdir), credentials)?;
        tracing::debug!(
            manifest = %handle.manifest_path.display(),
            commit = %handle.manifest_commit,
            "Manifest repository ready"
        );

        let version = ManifestVersion::from_file(&handle.manifest_path)?;
        let flat = snapshot::flatten(version.root(), &handle.manifest_dir)?;
        let manifest = Manifest::from_element(&flat)?;

        let commits = plan_checkouts(&manifest, source)?
            .iter()
            .map(|project| {
                self.checkout
                    .resolve_revision(&project.url, &project.revision, credentials)
                    .map_err(|e| e.context(&project.name))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(ManifestVersion::from_element(snapshot::pin(&flat, &commits)?))
    }

    /// Per-source directory below the cache directory
    fn workdir(&self, source: &Source) -> PathBuf {
        self.config.cache_dir.join(cache_key(&source.manifest_url()))
    }
}

/// Directory name for a manifest URL
fn cache_key(url: &str) -> String {
    url.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '.' || c == '-' { c } else { '_' })
        .collect()
}

/// Append `current` to the known versions unless it is already among them
///
/// Known versions keep their original text and order; equal versions are
/// emitted once.
pub fn merge_versions(known: Vec<ManifestVersion>, current: ManifestVersion) -> Vec<Version> {
    let mut merged: Vec<ManifestVersion> = Vec::with_capacity(known.len() + 1);
    for version in known.into_iter().chain(std::iter::once(current)) {
        if !merged.contains(&version) {
            merged.push(version);
        }
    }

    merged.iter().map(|v| Version::new(v.raw())).collect()
}
