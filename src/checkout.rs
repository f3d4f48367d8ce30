//! The checkout collaborator seam
//!
//! The resolver and syncer never talk to git directly. They describe what
//! has to exist on disk and a [`Checkout`] implementation makes it so.

use crate::git::GitCredentials;
use crate::manifest::snapshot::is_contained;
use crate::manifest::Manifest;
use crate::source::Source;
use crate::{RepoResourceError, Result};
use std::path::{Path, PathBuf};

/// Where the manifest repository lives below a working directory
pub const MANIFEST_DIR: &str = ".repo/manifests";

/// Parameters for registering a manifest repository in a working directory
#[derive(Debug, Clone)]
pub struct InitRequest<'a> {
    /// Manifest repository URL, rewrites already applied
    pub url: &'a str,
    pub revision: &'a str,
    pub manifest_name: &'a str,
    pub workdir: &'a Path,
}

impl<'a> InitRequest<'a> {
    /// Build an init request for `source` rooted at `workdir`
    pub fn for_source(source: &'a Source, url: &'a str, workdir: &'a Path) -> Self {
        Self {
            url,
            revision: &source.revision,
            manifest_name: &source.manifest_name,
            workdir,
        }
    }
}

/// An initialised working directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoHandle {
    pub workdir: PathBuf,

    /// Manifest repository checkout
    pub manifest_dir: PathBuf,

    /// The selected manifest file inside `manifest_dir`
    pub manifest_path: PathBuf,

    /// Commit the manifest repository is checked out at
    pub manifest_commit: String,
}

impl RepoHandle {
    pub fn new(workdir: &Path, manifest_name: &str, manifest_commit: impl Into<String>) -> Self {
        let manifest_dir = workdir.join(MANIFEST_DIR);
        Self {
            workdir: workdir.to_path_buf(),
            manifest_path: manifest_dir.join(manifest_name),
            manifest_dir,
            manifest_commit: manifest_commit.into(),
        }
    }
}

/// One project to materialise below the working directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectCheckout {
    pub name: String,

    /// Path relative to the working directory
    pub path: String,

    /// Clone URL, rewrites already applied
    pub url: String,

    /// Branch, tag, ref or commit id
    pub revision: String,

    pub clone_depth: Option<u32>,
}

/// Something that can fetch a manifest repository and its projects
pub trait Checkout: Send + Sync {
    /// Fetch the manifest repository into `<workdir>/.repo/manifests`
    ///
    /// Re-running against an initialised working directory must succeed.
    fn init(&self, request: &InitRequest<'_>, credentials: &GitCredentials) -> Result<RepoHandle>;

    /// Resolve a revision of a remote repository to a commit id
    fn resolve_revision(
        &self,
        url: &str,
        revision: &str,
        credentials: &GitCredentials,
    ) -> Result<String>;

    /// Check every project out at its revision, at most `jobs` at a time
    fn sync_all(
        &self,
        handle: &RepoHandle,
        projects: &[ProjectCheckout],
        jobs: usize,
        credentials: &GitCredentials,
    ) -> Result<()>;
}

/// Work out clone URL, revision and path of every project in `manifest`
pub fn plan_checkouts(manifest: &Manifest, source: &Source) -> Result<Vec<ProjectCheckout>> {
    let manifest_url = source.manifest_url();

    manifest
        .projects
        .iter()
        .map(|project| {
            let path = project.checkout_path();
            if !is_contained(Path::new(path)) {
                return Err(RepoResourceError::Config(format!(
                    "Project {} has path {} outside the destination directory",
                    project.name, path
                )));
            }

            Ok(ProjectCheckout {
                name: project.name.clone(),
                path: path.to_string(),
                url: source.rewrite_url(&manifest.project_url(project, &manifest_url)?),
                revision: manifest.project_revision(project)?,
                clone_depth: project.clone_depth,
            })
        })
        .collect()
}
