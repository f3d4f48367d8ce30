//! Manifest parsing for multi-repository checkouts
//!
//! Parses XML manifests compatible with Google's git-repo tool into a
//! canonical, comparable [`ManifestVersion`] and a typed [`Manifest`] view.
//!
//! # Example Manifest
//!
//! ```xml
//! <manifest>
//!   <remote name="aosp" fetch="https://android.googlesource.com/" />
//!   <default revision="refs/tags/android-12.0.0_r32" remote="aosp" />
//!
//!   <project path="device/generic/common" name="device/generic/common"
//!            revision="033d50e2298811d81de7db8cdea63e349a96c9ba" />
//! </manifest>
//! ```

mod parser;
pub mod snapshot;
mod version;
pub mod xml;

pub use parser::{resolve_fetch_url, Manifest, ManifestDefault, Project, Remote};
pub use version::ManifestVersion;
pub use xml::Element;
