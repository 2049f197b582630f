//! Package archives and the reserved names inside them.

pub mod archive;
pub mod content;

use std::path::PathBuf;

use crate::error::{DeployError, Result};

pub use archive::{ArchiveOpener, PackageArchive, ZipOpener, ZipPackage};
pub use content::content_groups;

/// Root folder of a package's project content.
pub const CONTENT_DIRECTORY: &str = "content";

/// The package reference manifest; never truncated into by a transform.
pub const PACKAGE_REFERENCE_FILE: &str = "packages.config";

/// Sentinel that keeps an otherwise empty folder inside a package.
pub const EMPTY_FOLDER_MARKER: &str = "_._";

const PACKAGE_METADATA_PREFIXES: &[&str] = &["_rels/", "package/"];
const CONTENT_TYPES_FILE: &str = "[content_types].xml";
const MANIFEST_EXTENSION: &str = ".nuspec";

/// Last segment of a `/` or `\` separated path.
pub fn file_name(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

pub fn is_empty_folder_marker(path: &str) -> bool {
    file_name(path).eq_ignore_ascii_case(EMPTY_FOLDER_MARKER)
}

pub fn is_package_reference_file(path: &str) -> bool {
    file_name(path).eq_ignore_ascii_case(PACKAGE_REFERENCE_FILE)
}

/// Whether an archive entry is package payload rather than packaging metadata.
pub fn is_package_file(path: &str) -> bool {
    let lower = path.replace('\\', "/").to_ascii_lowercase();
    if lower.ends_with('/') {
        return false;
    }
    if PACKAGE_METADATA_PREFIXES
        .iter()
        .any(|prefix| lower.starts_with(prefix))
    {
        return false;
    }
    if lower == CONTENT_TYPES_FILE {
        return false;
    }
    !(lower.ends_with(MANIFEST_EXTENSION) && !lower.contains('/'))
}

/// Another installed package's item that maps onto a path being reverted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OtherPackageReference {
    pub archive: PathBuf,
    pub item: String,
}

impl OtherPackageReference {
    pub fn new(archive: impl Into<PathBuf>, item: impl Into<String>) -> Self {
        Self {
            archive: archive.into(),
            item: item.into(),
        }
    }

    /// Open the owning archive, read the item, and release the archive.
    pub fn read(&self, archives: &dyn ArchiveOpener) -> Result<Vec<u8>> {
        let mut archive = archives.open(&self.archive)?;
        let name = archive
            .find_entry(&self.item)
            .ok_or_else(|| DeployError::EntryNotFound(self.item.clone()))?;
        archive.read_entry(&name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_reserved_names() {
        assert!(is_empty_folder_marker("content/lib/_._"));
        assert!(is_empty_folder_marker("content\\lib\\_._"));
        assert!(!is_empty_folder_marker("content/lib/_._.txt"));
        assert!(is_package_reference_file("sub/Packages.Config"));
        assert!(!is_package_reference_file("packages.config.transform"));
    }

    #[test]
    fn package_metadata_is_not_payload() {
        assert!(!is_package_file("_rels/.rels"));
        assert!(!is_package_file("package/services/metadata/core-properties/x.psmdcp"));
        assert!(!is_package_file("[Content_Types].xml"));
        assert!(!is_package_file("Contoso.Web.nuspec"));
        assert!(!is_package_file("content/lib/"));
        assert!(is_package_file("content/docs/sample.nuspec"));
        assert!(is_package_file("content/readme.txt"));
    }

    #[test]
    fn file_name_handles_both_separators() {
        assert_eq!(file_name("a/b\\c.txt"), "c.txt");
        assert_eq!(file_name("plain"), "plain");
    }
}
