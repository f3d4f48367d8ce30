//! Flattening and pinning of manifests
//!
//! A snapshot is what `repo manifest --revision-as-HEAD` would print: includes
//! inlined, removed projects gone and every project pinned to a commit.

use super::xml::Element;
use crate::{RepoResourceError, Result};
use std::path::{Component, Path};

/// Maximum nesting of `<include>` elements
pub const MAX_INCLUDE_DEPTH: usize = 16;

/// Inline `<include>` elements and apply `<remove-project>` elements
///
/// Included files are resolved relative to `manifest_dir`. Their children
/// replace the `<include>` element in place.
pub fn flatten(root: &Element, manifest_dir: &Path) -> Result<Element> {
    let mut children = Vec::with_capacity(root.children.len());
    expand(&root.children, manifest_dir, 0, &mut children)?;

    Ok(Element {
        name: root.name.clone(),
        attributes: root.attributes.clone(),
        children,
        text: root.text.clone(),
        tail: String::new(),
    })
}

fn expand(
    children: &[Element],
    manifest_dir: &Path,
    depth: usize,
    out: &mut Vec<Element>,
) -> Result<()> {
    for child in children {
        match child.name.as_str() {
            "include" => {
                if depth >= MAX_INCLUDE_DEPTH {
                    return Err(RepoResourceError::Config(format!(
                        "Manifest includes are nested deeper than {} levels",
                        MAX_INCLUDE_DEPTH
                    )));
                }
                let included = load_include(child, manifest_dir)?;
                expand(&included.children, manifest_dir, depth + 1, out)?;
            }
            "remove-project" => remove_projects(child, out)?,
            _ => out.push(child.clone()),
        }
    }
    Ok(())
}

fn load_include(include: &Element, manifest_dir: &Path) -> Result<Element> {
    let name = include.attr("name").ok_or_else(|| {
        RepoResourceError::Config("<include> is missing required attribute: name".to_string())
    })?;
    let relative = Path::new(name);
    if !is_contained(relative) {
        return Err(RepoResourceError::Config(format!(
            "Included manifest {} is outside the manifest repository",
            name
        )));
    }

    let path = manifest_dir.join(relative);
    tracing::debug!(path = %path.display(), "Loading included manifest");

    let content = std::fs::read_to_string(&path).map_err(|e| {
        RepoResourceError::Checkout(format!(
            "Cannot read included manifest {}: {}",
            path.display(),
            e
        ))
    })?;
    let included = Element::parse(&content)?;
    if included.name != "manifest" {
        return Err(RepoResourceError::Config(format!(
            "Included manifest {} has root <{}> instead of <manifest>",
            name, included.name
        )));
    }
    Ok(included)
}

/// Copy `children`, applying every `<remove-project>` to the projects before it
pub(crate) fn apply_removals(children: &[Element]) -> Result<Vec<Element>> {
    let mut out = Vec::with_capacity(children.len());
    for child in children {
        if child.name == "remove-project" {
            remove_projects(child, &mut out)?;
        } else {
            out.push(child.clone());
        }
    }
    Ok(out)
}

fn remove_projects(remove: &Element, out: &mut Vec<Element>) -> Result<()> {
    let name = remove.attr("name").ok_or_else(|| {
        RepoResourceError::Config(
            "<remove-project> is missing required attribute: name".to_string(),
        )
    })?;
    let path = remove.attr("path");

    let before = out.len();
    out.retain(|e| {
        if e.name != "project" || e.attr("name") != Some(name) {
            return true;
        }
        let checkout_path = e.attr("path").unwrap_or(name);
        path.is_some_and(|path| path != checkout_path)
    });

    if out.len() == before && remove.attr("optional") != Some("true") {
        return Err(RepoResourceError::Config(format!(
            "<remove-project> names unknown project: {}",
            name
        )));
    }
    Ok(())
}

/// Replace every project's revision with the given commit ids, in order
///
/// `upstream` and `dest-branch` describe the unpinned revision and are dropped.
pub fn pin(root: &Element, commits: &[String]) -> Result<Element> {
    let mut pinned = root.clone();
    let mut commits = commits.iter();

    for project in pinned.children.iter_mut().filter(|c| c.name == "project") {
        let commit = commits.next().ok_or_else(|| {
            RepoResourceError::Config(format!(
                "No resolved commit for project {}",
                project.attr("name").unwrap_or_default()
            ))
        })?;
        project
            .attributes
            .insert("revision".to_string(), commit.clone());
        project.attributes.remove("upstream");
        project.attributes.remove("dest-branch");
    }

    if commits.next().is_some() {
        return Err(RepoResourceError::Config(
            "More resolved commits than projects in manifest".to_string(),
        ));
    }

    Ok(pinned)
}

/// True when `path` is relative, names something below its base and never
/// climbs above it
pub fn is_contained(path: &Path) -> bool {
    path.components().any(|c| matches!(c, Component::Normal(_)))
        && path
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}
