//! Typed view over a git-repo compatible manifest

use super::snapshot::apply_removals;
use super::xml::Element;
use crate::{RepoResourceError, Result};

/// A parsed manifest file
#[derive(Debug, Clone, Default)]
pub struct Manifest {
    /// Remote repositories
    pub remotes: Vec<Remote>,

    /// Default settings for projects
    pub default: Option<ManifestDefault>,

    /// Projects in declaration order
    pub projects: Vec<Project>,
}

/// Remote repository definition
#[derive(Debug, Clone)]
pub struct Remote {
    /// Remote name (e.g., "aosp")
    pub name: String,

    /// Fetch URL base, absolute or relative to the manifest URL (e.g., "..")
    pub fetch: String,

    /// Review URL for code review (optional)
    pub review: Option<String>,

    /// Revision used by projects of this remote that don't set their own
    pub revision: Option<String>,
}

/// Default settings for projects
#[derive(Debug, Clone, Default)]
pub struct ManifestDefault {
    /// Default revision/branch (e.g., "main")
    pub revision: Option<String>,

    /// Default remote name
    pub remote: Option<String>,

    /// Default sync parallelism
    pub sync_j: Option<usize>,
}

/// A project in the manifest
#[derive(Debug, Clone)]
pub struct Project {
    /// Repository name (relative to remote fetch URL)
    pub name: String,

    /// Local path for the project, defaults to the name
    pub path: Option<String>,

    /// Override revision for this project
    pub revision: Option<String>,

    /// Override remote for this project
    pub remote: Option<String>,

    /// Comma separated group list
    pub groups: Option<String>,

    /// Shallow clone depth
    pub clone_depth: Option<u32>,
}

impl Project {
    /// Checkout path relative to the destination directory
    pub fn checkout_path(&self) -> &str {
        self.path.as_deref().unwrap_or(&self.name)
    }

    /// Get the full repository URL given the resolved fetch base of its remote
    pub fn full_url(&self, fetch_base: &str) -> String {
        if self.name.starts_with("http://")
            || self.name.starts_with("https://")
            || self.name.starts_with("git@")
        {
            self.name.clone()
        } else {
            let base = fetch_base.trim_end_matches('/');
            // An scp-style base climbed up to `host:` takes the name directly
            let separator = if base.ends_with(':') { "" } else { "/" };
            format!("{}{}{}", base, separator, &self.name)
        }
    }
}

impl Manifest {
    /// Parse a manifest from XML content
    pub fn parse(xml: &str) -> Result<Self> {
        Self::from_element(&Element::parse(xml)?)
    }

    /// Build the typed view from a parsed element tree
    ///
    /// Unknown elements are ignored. `<include>` must already be flattened;
    /// `<remove-project>` drops matching projects declared before it.
    pub fn from_element(root: &Element) -> Result<Self> {
        if root.name != "manifest" {
            return Err(RepoResourceError::Config(format!(
                "Expected <manifest> root element, found <{}>",
                root.name
            )));
        }

        let mut manifest = Manifest::default();

        for child in &apply_removals(&root.children)? {
            match child.name.as_str() {
                "remote" => manifest.remotes.push(parse_remote(child)?),
                "default" => manifest.default = Some(parse_default(child)),
                "project" => manifest.projects.push(parse_project(child)?),
                "include" => {
                    return Err(RepoResourceError::Config(format!(
                        "Unresolved <include name=\"{}\"> in manifest",
                        child.attr("name").unwrap_or_default()
                    )));
                }
                _ => {}
            }
        }

        Ok(manifest)
    }

    /// Get the default remote
    pub fn default_remote(&self) -> Option<&Remote> {
        let remote_name = self.default.as_ref()?.remote.as_deref()?;
        self.get_remote(remote_name)
    }

    /// Get a remote by name
    pub fn get_remote(&self, name: &str) -> Option<&Remote> {
        self.remotes.iter().find(|r| r.name == name)
    }

    /// Get the effective remote for a project
    pub fn project_remote(&self, project: &Project) -> Option<&Remote> {
        if let Some(ref remote_name) = project.remote {
            self.get_remote(remote_name)
        } else {
            self.default_remote()
        }
    }

    /// Get the effective revision for a project
    ///
    /// The project's own revision wins, then its remote's revision, then the
    /// manifest default. A project with none of them is a configuration error.
    pub fn project_revision(&self, project: &Project) -> Result<String> {
        project
            .revision
            .clone()
            .or_else(|| {
                self.project_remote(project)
                    .and_then(|r| r.revision.clone())
            })
            .or_else(|| self.default.as_ref().and_then(|d| d.revision.clone()))
            .ok_or_else(|| {
                RepoResourceError::Config(format!(
                    "Project {} (path {}) has no revision and the manifest declares no default revision",
                    project.name,
                    project.checkout_path()
                ))
            })
    }

    /// Get the full clone URL of a project
    ///
    /// Relative remote fetch URLs are resolved against `manifest_url`.
    pub fn project_url(&self, project: &Project, manifest_url: &str) -> Result<String> {
        let remote = self.project_remote(project).ok_or_else(|| {
            RepoResourceError::Config(format!(
                "Project {} has no remote and the manifest declares no default remote",
                project.name
            ))
        })?;

        Ok(project.full_url(&resolve_fetch_url(manifest_url, &remote.fetch)))
    }
}

/// Resolve a remote's fetch attribute against the manifest repository URL
///
/// Follows URL-join rules: the manifest URL's last path segment is dropped and
/// every leading `..` climbs one more segment.
pub fn resolve_fetch_url(manifest_url: &str, fetch: &str) -> String {
    let fetch = fetch.trim_end_matches('/');
    if !fetch.starts_with('.') {
        return fetch.to_string();
    }

    let manifest_url = manifest_url.trim_end_matches('/');
    // Everything up to the host must never be climbed over
    let host_end = manifest_url
        .find("://")
        .map(|scheme| {
            manifest_url[scheme + 3..]
                .find('/')
                .map(|p| scheme + 3 + p)
                .unwrap_or(manifest_url.len())
        })
        .or_else(|| manifest_url.find(':').map(|colon| colon + 1))
        .unwrap_or(0);

    let (authority, path) = manifest_url.split_at(host_end);
    let mut segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    // Drop the manifest repository itself
    segments.pop();

    for part in fetch.split('/') {
        match part {
            ".." => {
                segments.pop();
            }
            "." | "" => {}
            other => segments.push(other),
        }
    }

    let separator = if authority.ends_with(':') { "" } else { "/" };
    if segments.is_empty() {
        format!("{}{}", authority, separator)
    } else {
        format!("{}{}{}", authority, separator, segments.join("/"))
    }
}

fn require_attr(e: &Element, name: &str) -> Result<String> {
    e.attr(name).map(str::to_string).ok_or_else(|| {
        RepoResourceError::Config(format!(
            "<{}> is missing required attribute: {}",
            e.name, name
        ))
    })
}

fn parse_remote(e: &Element) -> Result<Remote> {
    Ok(Remote {
        name: require_attr(e, "name")?,
        fetch: require_attr(e, "fetch")?,
        review: e.attr("review").map(str::to_string),
        revision: e.attr("revision").map(str::to_string),
    })
}

fn parse_default(e: &Element) -> ManifestDefault {
    ManifestDefault {
        revision: e.attr("revision").map(str::to_string),
        remote: e.attr("remote").map(str::to_string),
        sync_j: e.attr("sync-j").and_then(|s| s.parse().ok()),
    }
}

fn parse_project(e: &Element) -> Result<Project> {
    Ok(Project {
        name: require_attr(e, "name")?,
        path: e.attr("path").map(str::to_string),
        revision: e.attr("revision").map(str::to_string),
        remote: e.attr("remote").map(str::to_string),
        groups: e.attr("groups").map(str::to_string),
        clone_depth: e.attr("clone-depth").and_then(|s| s.parse().ok()),
    })
}
