//! Materialising one version in a destination directory (the in operation)

use crate::checkout::{plan_checkouts, Checkout, InitRequest};
use crate::config::{validate_source_result, ResourceConfig};
use crate::git::GitCredentials;
use crate::manifest::{snapshot, Manifest, ManifestVersion};
use crate::metadata::extract_metadata;
use crate::protocol::{InRequest, InResponse};
use crate::source::Source;
use crate::Result;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

/// File holding the raw text of the last synced manifest
pub const MANIFEST_FILE: &str = ".repo_manifest.xml";

/// Checks out every project of a version into a destination directory
pub struct Syncer<'a, C: Checkout + ?Sized> {
    checkout: &'a C,
    config: &'a ResourceConfig,
}

impl<'a, C: Checkout + ?Sized> Syncer<'a, C> {
    pub fn new(checkout: &'a C, config: &'a ResourceConfig) -> Self {
        Self { checkout, config }
    }

    /// Sync `request.version` into `dest`
    ///
    /// Nothing is written to `dest` when the version does not parse, and the
    /// manifest file is only replaced once every project is checked out.
    pub fn sync(&self, request: &InRequest, dest: &Path) -> Result<InResponse> {
        let source = &request.source;
        validate_source_result(source)?;
        let version = ManifestVersion::parse(request.version.version.as_str())?;
        let credentials = GitCredentials::from_source(source)?;

        std::fs::create_dir_all(dest)?;
        tracing::info!(dest = %dest.display(), "Syncing manifest");

        let url = source.manifest_url();
        let handle = self
            .checkout
            .init(&InitRequest::for_source(source, &url, dest), &credentials)?;

        let flat = snapshot::flatten(version.root(), &handle.manifest_dir)?;
        let manifest = Manifest::from_element(&flat)?;
        let metadata = extract_metadata(&manifest)?;
        let projects = plan_checkouts(&manifest, source)?;

        let jobs = self.jobs(source, &manifest);
        self.checkout
            .sync_all(&handle, &projects, jobs, &credentials)?;

        persist_manifest(dest, version.raw())?;
        tracing::info!(projects = projects.len(), "Sync complete");

        Ok(InResponse {
            version: request.version.clone(),
            metadata,
        })
    }

    /// Parallelism: the source wins over the manifest's `sync-j`, which
    /// wins over the configured default
    fn jobs(&self, source: &Source, manifest: &Manifest) -> usize {
        source
            .jobs
            .or_else(|| manifest.default.as_ref().and_then(|d| d.sync_j))
            .filter(|jobs| *jobs > 0)
            .unwrap_or(self.config.jobs)
    }
}

/// Replace `<dest>/.repo_manifest.xml` with `raw`
fn persist_manifest(dest: &Path, raw: &str) -> Result<()> {
    let mut file = NamedTempFile::new_in(dest)?;
    file.write_all(raw.as_bytes())?;
    file.as_file().sync_all()?;
    file.persist(dest.join(MANIFEST_FILE))
        .map_err(|e| e.error)?;
    Ok(())
}

/// The version last synced into `dest`, if any
pub fn saved_version(dest: &Path) -> Result<Option<ManifestVersion>> {
    let path = dest.join(MANIFEST_FILE);
    if !path.exists() {
        return Ok(None);
    }
    ManifestVersion::from_file(path).map(Some)
}
