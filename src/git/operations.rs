//! Git repository operations for manifest and project checkouts

use super::credentials::GitCredentials;
use crate::checkout::{Checkout, InitRequest, ProjectCheckout, RepoHandle};
use crate::manifest::snapshot::is_contained;
use crate::{RepoResourceError, Result};
use git2::build::CheckoutBuilder;
use git2::{AutotagOption, Direction, FetchOptions, Oid, Remote, Repository};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

/// Refspecs used when a targeted fetch did not bring the wanted commit
const FULL_FETCH_REFSPECS: [&str; 2] = [
    "+refs/heads/*:refs/remotes/origin/*",
    "+refs/tags/*:refs/tags/*",
];

/// A reference advertised by a remote
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteRef {
    pub name: String,
    pub oid: Oid,
}

/// Checkout collaborator backed by libgit2
///
/// Every repository is checked out with a detached HEAD, the way `repo sync`
/// leaves projects after syncing a pinned manifest.
#[derive(Debug, Clone, Copy, Default)]
pub struct GitCheckout;

impl GitCheckout {
    pub fn new() -> Self {
        Self
    }

    /// Turn a revision into the ref to fetch and the commit it points at
    ///
    /// Commit ids are taken as-is without contacting the remote.
    fn resolve_ref(
        &self,
        url: &str,
        revision: &str,
        credentials: &GitCredentials,
    ) -> Result<(Option<String>, Oid)> {
        if let Some(oid) = commit_id(revision) {
            return Ok((None, oid));
        }

        let refs = ls_remote(url, credentials)?;
        find_remote_ref(&refs, revision)
            .map(|r| (Some(r.name.trim_end_matches("^{}").to_string()), r.oid))
            .ok_or_else(|| {
                RepoResourceError::Checkout(format!(
                    "Revision {} not found in {}",
                    revision, url
                ))
            })
    }

    fn sync_project(
        &self,
        handle: &RepoHandle,
        project: &ProjectCheckout,
        credentials: &GitCredentials,
    ) -> Result<()> {
        if !is_contained(Path::new(&project.path)) {
            return Err(RepoResourceError::Config(format!(
                "path {} is outside the destination directory",
                project.path
            )));
        }

        let path = handle.workdir.join(&project.path);
        tracing::debug!(
            project = %project.name,
            path = %path.display(),
            revision = %project.revision,
            "Syncing project"
        );

        let repo = open_or_init(&path)?;
        let (refname, oid) = self.resolve_ref(&project.url, &project.revision, credentials)?;
        fetch_commit(
            &repo,
            &project.url,
            refname.as_deref(),
            oid,
            project.clone_depth,
            credentials,
        )?;
        checkout_detached(&repo, oid)?;

        tracing::info!(project = %project.name, commit = %oid, "Project synced");
        Ok(())
    }
}

impl Checkout for GitCheckout {
    fn init(&self, request: &InitRequest<'_>, credentials: &GitCredentials) -> Result<RepoHandle> {
        let handle = RepoHandle::new(request.workdir, request.manifest_name, "");

        tracing::info!(
            url = %request.url,
            revision = %request.revision,
            path = %handle.manifest_dir.display(),
            "Initializing manifest repository"
        );

        let repo = open_or_init(&handle.manifest_dir)?;
        let (refname, oid) = self.resolve_ref(request.url, request.revision, credentials)?;
        fetch_commit(&repo, request.url, refname.as_deref(), oid, None, credentials)?;
        checkout_detached(&repo, oid)?;

        if !handle.manifest_path.is_file() {
            return Err(RepoResourceError::Checkout(format!(
                "Manifest {} not found in {} at {}",
                request.manifest_name, request.url, request.revision
            )));
        }

        Ok(RepoHandle {
            manifest_commit: oid.to_string(),
            ..handle
        })
    }

    fn resolve_revision(
        &self,
        url: &str,
        revision: &str,
        credentials: &GitCredentials,
    ) -> Result<String> {
        let (_, oid) = self.resolve_ref(url, revision, credentials)?;
        Ok(oid.to_string())
    }

    fn sync_all(
        &self,
        handle: &RepoHandle,
        projects: &[ProjectCheckout],
        jobs: usize,
        credentials: &GitCredentials,
    ) -> Result<()> {
        let workers = jobs.clamp(1, projects.len().max(1));
        tracing::info!(projects = projects.len(), jobs = workers, "Syncing projects");

        let next = AtomicUsize::new(0);
        let failed = AtomicBool::new(false);
        let errors: Mutex<Vec<(usize, RepoResourceError)>> = Mutex::new(Vec::new());

        std::thread::scope(|scope| {
            for _ in 0..workers {
                scope.spawn(|| {
                    // Stop picking up new projects once one has failed
                    while !failed.load(Ordering::SeqCst) {
                        let index = next.fetch_add(1, Ordering::SeqCst);
                        let Some(project) = projects.get(index) else {
                            break;
                        };

                        if let Err(e) = self.sync_project(handle, project, credentials) {
                            tracing::error!(project = %project.name, error = %e, "Project sync failed");
                            failed.store(true, Ordering::SeqCst);
                            errors
                                .lock()
                                .unwrap_or_else(|poisoned| poisoned.into_inner())
                                .push((index, e));
                        }
                    }
                });
            }
        });

        let errors = errors
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        match errors.into_iter().min_by_key(|(index, _)| *index) {
            Some((index, e)) => Err(e.context(&projects[index].name)),
            None => Ok(()),
        }
    }
}

/// List the references a remote advertises
pub fn ls_remote(url: &str, credentials: &GitCredentials) -> Result<Vec<RemoteRef>> {
    tracing::debug!(url, "Listing remote references");

    let mut remote = Remote::create_detached(url)?;
    let connection = remote.connect_auth(
        Direction::Fetch,
        Some(credentials.create_callbacks()),
        None,
    )?;

    let refs = connection
        .list()?
        .iter()
        .map(|head| RemoteRef {
            name: head.name().to_string(),
            oid: head.oid(),
        })
        .collect();
    Ok(refs)
}

/// Find the commit a revision points at among advertised references
///
/// Branch names win over tag names. For annotated tags the peeled `^{}`
/// entry is preferred so the result is always a commit.
pub fn find_remote_ref<'a>(refs: &'a [RemoteRef], revision: &str) -> Option<&'a RemoteRef> {
    let candidates = if revision == "HEAD" || revision.starts_with("refs/") {
        vec![revision.to_string()]
    } else {
        vec![
            format!("refs/heads/{}", revision),
            format!("refs/tags/{}", revision),
        ]
    };

    candidates.iter().find_map(|candidate| {
        let peeled = format!("{}^{{}}", candidate);
        refs.iter()
            .find(|r| r.name == peeled)
            .or_else(|| refs.iter().find(|r| &r.name == candidate))
    })
}

/// Parse a full 40 character hexadecimal commit id
pub fn commit_id(revision: &str) -> Option<Oid> {
    if revision.len() == 40 && revision.chars().all(|c| c.is_ascii_hexdigit()) {
        Oid::from_str(revision).ok()
    } else {
        None
    }
}

fn open_or_init(path: &Path) -> Result<Repository> {
    if path.join(".git").exists() {
        return Ok(Repository::open(path)?);
    }

    tracing::debug!(path = %path.display(), "Initializing repository");
    std::fs::create_dir_all(path)?;
    Ok(Repository::init(path)?)
}

/// Make sure `oid` is present in `repo`, fetching it from `url` if needed
fn fetch_commit(
    repo: &Repository,
    url: &str,
    refname: Option<&str>,
    oid: Oid,
    depth: Option<u32>,
    credentials: &GitCredentials,
) -> Result<()> {
    if repo.find_commit(oid).is_ok() {
        tracing::debug!(commit = %oid, "Commit already present, skipping fetch");
        return Ok(());
    }

    let mut remote = repo.remote_anonymous(url)?;
    let wanted = refname.map(str::to_string).unwrap_or_else(|| oid.to_string());

    let mut fetch_options = FetchOptions::new();
    fetch_options.remote_callbacks(credentials.create_callbacks());
    fetch_options.download_tags(AutotagOption::None);
    if let Some(depth) = depth {
        fetch_options.depth(i32::try_from(depth).unwrap_or(i32::MAX));
    }

    tracing::debug!(url, refspec = %wanted, "Fetching");
    if let Err(e) = remote.fetch(&[wanted.as_str()], Some(&mut fetch_options), None) {
        let e = RepoResourceError::from(e);
        if matches!(e, RepoResourceError::Credential(_)) {
            return Err(e);
        }
        tracing::debug!(error = %e, "Targeted fetch failed");
    }

    if repo.find_commit(oid).is_ok() {
        return Ok(());
    }

    tracing::debug!(url, commit = %oid, "Commit not reachable from {}, fetching all refs", wanted);
    let mut fetch_options = FetchOptions::new();
    fetch_options.remote_callbacks(credentials.create_callbacks());
    remote.fetch(&FULL_FETCH_REFSPECS, Some(&mut fetch_options), None)?;

    repo.find_commit(oid).map(|_| ()).map_err(|_| {
        RepoResourceError::Checkout(format!("Commit {} not found in {}", oid, url))
    })
}

/// Check `oid` out with a detached HEAD, unless HEAD already points at it
fn checkout_detached(repo: &Repository, oid: Oid) -> Result<()> {
    let current = repo.head().ok().and_then(|head| head.target());
    if current == Some(oid) {
        tracing::debug!(commit = %oid, "Already checked out");
        return Ok(());
    }

    let commit = repo.find_commit(oid)?;
    let mut checkout_builder = CheckoutBuilder::new();
    checkout_builder.force();

    repo.checkout_tree(commit.as_object(), Some(&mut checkout_builder))?;
    repo.set_head_detached(oid)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use git2::{IndexAddOption, Signature};
    use std::path::PathBuf;
    use tempfile::TempDir;

    /// Create a repository with one commit on `main` holding `files`
    fn upstream(dir: &Path, files: &[(&str, &str)]) -> Oid {
        let repo = Repository::init(dir).unwrap();
        commit_files(&repo, files, "Initial commit")
    }

    fn commit_files(repo: &Repository, files: &[(&str, &str)], message: &str) -> Oid {
        let workdir = repo.workdir().unwrap();
        for (name, content) in files {
            let path = workdir.join(name);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, content).unwrap();
        }

        let mut index = repo.index().unwrap();
        index.add_all(["*"], IndexAddOption::DEFAULT, None).unwrap();
        index.write().unwrap();
        let tree = repo.find_tree(index.write_tree().unwrap()).unwrap();
        let signature = Signature::now("Repo Resource", "ci@example.com").unwrap();

        let parent = repo
            .find_reference("refs/heads/main")
            .ok()
            .and_then(|r| r.peel_to_commit().ok());
        let parents: Vec<&git2::Commit> = parent.iter().collect();

        let oid = repo
            .commit(
                Some("refs/heads/main"),
                &signature,
                &signature,
                message,
                &tree,
                &parents,
            )
            .unwrap();
        repo.set_head("refs/heads/main").unwrap();
        oid
    }

    fn file_url(path: &Path) -> String {
        format!("file://{}", path.display())
    }

    fn remote_ref(name: &str, oid: &str) -> RemoteRef {
        RemoteRef {
            name: name.to_string(),
            oid: Oid::from_str(oid).unwrap(),
        }
    }

    #[test]
    fn test_commit_id() {
        assert!(commit_id("033d50e2298811d81de7db8cdea63e349a96c9ba").is_some());
        assert!(commit_id("033d50e").is_none());
        assert!(commit_id("refs/heads/main").is_none());
        assert!(commit_id("zzzd50e2298811d81de7db8cdea63e349a96c9ba").is_none());
    }

    #[test]
    fn test_find_remote_ref_prefers_branches_and_peeled_tags() {
        let refs = vec![
            remote_ref("HEAD", "1111111111111111111111111111111111111111"),
            remote_ref("refs/heads/main", "1111111111111111111111111111111111111111"),
            remote_ref("refs/heads/release", "2222222222222222222222222222222222222222"),
            remote_ref("refs/tags/release", "3333333333333333333333333333333333333333"),
            remote_ref("refs/tags/v1.0", "4444444444444444444444444444444444444444"),
            remote_ref("refs/tags/v1.0^{}", "5555555555555555555555555555555555555555"),
        ];

        assert_eq!(find_remote_ref(&refs, "HEAD").unwrap().name, "HEAD");
        assert_eq!(
            find_remote_ref(&refs, "release").unwrap().name,
            "refs/heads/release"
        );
        assert_eq!(
            find_remote_ref(&refs, "v1.0").unwrap().oid.to_string(),
            "5555555555555555555555555555555555555555"
        );
        assert_eq!(
            find_remote_ref(&refs, "refs/tags/release").unwrap().oid.to_string(),
            "3333333333333333333333333333333333333333"
        );
        assert!(find_remote_ref(&refs, "missing").is_none());
        assert!(find_remote_ref(&refs, "refs/heads/missing").is_none());
    }

    #[test]
    fn test_resolve_revision_over_file_transport() {
        let dir = TempDir::new().unwrap();
        let head = upstream(dir.path(), &[("README.md", "fetch_artifact\n")]);
        let url = file_url(dir.path());
        let git = GitCheckout::new();
        let credentials = GitCredentials::anonymous();

        assert_eq!(
            git.resolve_revision(&url, "main", &credentials).unwrap(),
            head.to_string()
        );
        assert_eq!(
            git.resolve_revision(&url, "refs/heads/main", &credentials)
                .unwrap(),
            head.to_string()
        );

        let err = git
            .resolve_revision(&url, "no-such-branch", &credentials)
            .unwrap_err();
        assert!(matches!(err, RepoResourceError::Checkout(_)));
    }

    #[test]
    fn test_resolve_annotated_tag_to_commit() {
        let dir = TempDir::new().unwrap();
        let head = upstream(dir.path(), &[("README.md", "tagged\n")]);
        let repo = Repository::open(dir.path()).unwrap();
        let signature = Signature::now("Repo Resource", "ci@example.com").unwrap();
        let target = repo.find_object(head, None).unwrap();
        repo.tag("android-12.0.0_r32", &target, &signature, "release", false)
            .unwrap();

        let resolved = GitCheckout::new()
            .resolve_revision(
                &file_url(dir.path()),
                "android-12.0.0_r32",
                &GitCredentials::anonymous(),
            )
            .unwrap();
        assert_eq!(resolved, head.to_string());
    }

    #[test]
    fn test_commit_id_is_not_looked_up() {
        let commit = "033d50e2298811d81de7db8cdea63e349a96c9ba";
        let resolved = GitCheckout::new()
            .resolve_revision("file:///nonexistent", commit, &GitCredentials::anonymous())
            .unwrap();
        assert_eq!(resolved, commit);
    }

    #[test]
    fn test_init_is_idempotent() {
        let upstream_dir = TempDir::new().unwrap();
        let head = upstream(upstream_dir.path(), &[("default.xml", "<manifest/>")]);
        let workdir = TempDir::new().unwrap();
        let url = file_url(upstream_dir.path());

        let request = InitRequest {
            url: &url,
            revision: "main",
            manifest_name: "default.xml",
            workdir: workdir.path(),
        };
        let git = GitCheckout::new();

        let handle = git.init(&request, &GitCredentials::anonymous()).unwrap();
        assert_eq!(handle.manifest_commit, head.to_string());
        assert!(handle.manifest_path.is_file());

        let again = git.init(&request, &GitCredentials::anonymous()).unwrap();
        assert_eq!(again, handle);
    }

    #[test]
    fn test_init_follows_new_commits() {
        let upstream_dir = TempDir::new().unwrap();
        upstream(upstream_dir.path(), &[("default.xml", "<manifest/>")]);
        let workdir = TempDir::new().unwrap();
        let url = file_url(upstream_dir.path());
        let request = InitRequest {
            url: &url,
            revision: "main",
            manifest_name: "default.xml",
            workdir: workdir.path(),
        };
        let git = GitCheckout::new();
        git.init(&request, &GitCredentials::anonymous()).unwrap();

        let repo = Repository::open(upstream_dir.path()).unwrap();
        let second = commit_files(
            &repo,
            &[("default.xml", "<manifest><default revision=\"main\"/></manifest>")],
            "Add default",
        );

        let handle = git.init(&request, &GitCredentials::anonymous()).unwrap();
        assert_eq!(handle.manifest_commit, second.to_string());
        let content = std::fs::read_to_string(&handle.manifest_path).unwrap();
        assert!(content.contains("default revision"));
    }

    #[test]
    fn test_init_missing_manifest() {
        let upstream_dir = TempDir::new().unwrap();
        upstream(upstream_dir.path(), &[("default.xml", "<manifest/>")]);
        let workdir = TempDir::new().unwrap();
        let url = file_url(upstream_dir.path());

        let request = InitRequest {
            url: &url,
            revision: "main",
            manifest_name: "aosp_device_fixed.xml",
            workdir: workdir.path(),
        };
        let err = GitCheckout::new()
            .init(&request, &GitCredentials::anonymous())
            .unwrap_err();
        assert!(matches!(err, RepoResourceError::Checkout(_)));
        assert!(err.to_string().contains("aosp_device_fixed.xml"));
    }

    #[test]
    fn test_sync_all_checks_out_projects() {
        let first = TempDir::new().unwrap();
        let second = TempDir::new().unwrap();
        let first_head = upstream(first.path(), &[("README.md", "fetch_artifact\n")]);
        let second_head = upstream(second.path(), &[("Android.bp", "// common\n")]);

        let workdir = TempDir::new().unwrap();
        let handle = RepoHandle::new(workdir.path(), "default.xml", "");
        let projects = vec![
            ProjectCheckout {
                name: "tools/fetch_artifact".to_string(),
                path: "fetch_artifact".to_string(),
                url: file_url(first.path()),
                revision: "main".to_string(),
                clone_depth: None,
            },
            ProjectCheckout {
                name: "device/generic/common".to_string(),
                path: "device/generic/common".to_string(),
                url: file_url(second.path()),
                revision: second_head.to_string(),
                clone_depth: None,
            },
        ];

        let git = GitCheckout::new();
        git.sync_all(&handle, &projects, 2, &GitCredentials::anonymous())
            .unwrap();
        // Second run only verifies what is already there
        git.sync_all(&handle, &projects, 1, &GitCredentials::anonymous())
            .unwrap();

        let readme: PathBuf = workdir.path().join("fetch_artifact/README.md");
        assert!(readme.is_file());
        assert!(workdir.path().join("device/generic/common/Android.bp").is_file());

        let repo = Repository::open(workdir.path().join("fetch_artifact")).unwrap();
        assert_eq!(repo.head().unwrap().target(), Some(first_head));
        assert!(repo.head_detached().unwrap());
    }

    #[test]
    fn test_sync_all_reports_failing_project() {
        let good = TempDir::new().unwrap();
        upstream(good.path(), &[("README.md", "ok\n")]);
        let workdir = TempDir::new().unwrap();
        let handle = RepoHandle::new(workdir.path(), "default.xml", "");

        let projects = vec![
            ProjectCheckout {
                name: "device/amlogic/yukawa".to_string(),
                path: "device/amlogic/yukawa".to_string(),
                url: file_url(good.path()),
                revision: "does-not-exist".to_string(),
                clone_depth: None,
            },
            ProjectCheckout {
                name: "tools/fetch_artifact".to_string(),
                path: "fetch_artifact".to_string(),
                url: file_url(good.path()),
                revision: "main".to_string(),
                clone_depth: None,
            },
        ];

        let err = GitCheckout::new()
            .sync_all(&handle, &projects, 1, &GitCredentials::anonymous())
            .unwrap_err();
        assert!(matches!(err, RepoResourceError::Checkout(_)));
        assert!(err.to_string().contains("device/amlogic/yukawa"));
    }

    #[test]
    fn test_sync_all_rejects_escaping_path() {
        let workdir = TempDir::new().unwrap();
        let handle = RepoHandle::new(workdir.path(), "default.xml", "");
        let projects = vec![ProjectCheckout {
            name: "evil".to_string(),
            path: "../evil".to_string(),
            url: "file:///nonexistent".to_string(),
            revision: "main".to_string(),
            clone_depth: None,
        }];

        let err = GitCheckout::new()
            .sync_all(&handle, &projects, 4, &GitCredentials::anonymous())
            .unwrap_err();
        assert!(matches!(err, RepoResourceError::Config(_)));
    }

    #[test]
    fn test_sync_all_without_projects() {
        let workdir = TempDir::new().unwrap();
        let handle = RepoHandle::new(workdir.path(), "default.xml", "");
        GitCheckout::new()
            .sync_all(&handle, &[], 4, &GitCredentials::anonymous())
            .unwrap();
    }
}
