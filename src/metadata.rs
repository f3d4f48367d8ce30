//! Build-page metadata derived from a manifest

use crate::manifest::Manifest;
use crate::protocol::MetadataEntry;
use crate::Result;

/// One entry per project, in declaration order: project name -> effective revision
///
/// Projects sharing a name are reported separately. A project without any
/// revision fails the whole extraction.
pub fn extract_metadata(manifest: &Manifest) -> Result<Vec<MetadataEntry>> {
    manifest
        .projects
        .iter()
        .map(|project| {
            Ok(MetadataEntry {
                name: project.name.clone(),
                value: manifest.project_revision(project)?,
            })
        })
        .collect()
}
