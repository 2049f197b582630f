//! Read access to package archives.
//!
//! Entry lookup is case-insensitive and accepts either separator; the
//! archive's own spelling is returned by [`PackageArchive::find_entry`]
//! and used for reads.

use std::collections::HashMap;
use std::fs::File;
use std::io::{Cursor, Read, Seek};
use std::path::Path;

use tracing::debug;

use crate::error::{DeployError, Result};

pub trait PackageArchive {
    /// File entries in archive order (directory entries excluded).
    fn entry_names(&self) -> Vec<String>;

    /// The archive's spelling of `path`, matched case-insensitively.
    fn find_entry(&self, path: &str) -> Option<String>;

    fn read_entry(&mut self, name: &str) -> Result<Vec<u8>>;
}

/// Opens archives by location. Each returned archive is dropped by the
/// caller before the next one is opened.
pub trait ArchiveOpener {
    fn open(&self, location: &Path) -> Result<Box<dyn PackageArchive>>;
}

/// A zip-packaged archive over any seekable reader.
pub struct ZipPackage<R> {
    archive: zip::ZipArchive<R>,
    names: Vec<String>,
    index: HashMap<String, String>,
}

impl ZipPackage<File> {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| DeployError::io(path, e))?;
        debug!("Opened package archive {}", path.display());
        Self::new(file)
    }
}

impl ZipPackage<Cursor<Vec<u8>>> {
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        Self::new(Cursor::new(bytes))
    }
}

impl<R: Read + Seek> ZipPackage<R> {
    pub fn new(reader: R) -> Result<Self> {
        let archive = zip::ZipArchive::new(reader)?;
        let names: Vec<String> = archive
            .file_names()
            .filter(|name| !name.ends_with('/'))
            .map(str::to_string)
            .collect();
        let index = names
            .iter()
            .map(|name| (lookup_key(name), name.clone()))
            .collect();
        Ok(Self {
            archive,
            names,
            index,
        })
    }
}

impl<R: Read + Seek> PackageArchive for ZipPackage<R> {
    fn entry_names(&self) -> Vec<String> {
        self.names.clone()
    }

    fn find_entry(&self, path: &str) -> Option<String> {
        self.index.get(&lookup_key(path)).cloned()
    }

    fn read_entry(&mut self, name: &str) -> Result<Vec<u8>> {
        let actual = self
            .find_entry(name)
            .ok_or_else(|| DeployError::EntryNotFound(name.to_string()))?;
        let mut file = self.archive.by_name(&actual)?;
        let mut buffer = Vec::new();
        file.read_to_end(&mut buffer)
            .map_err(|e| DeployError::io(&actual, e))?;
        Ok(buffer)
    }
}

fn lookup_key(path: &str) -> String {
    path.replace('\\', "/").to_lowercase()
}

/// Opens zip packages from the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZipOpener;

impl ArchiveOpener for ZipOpener {
    fn open(&self, location: &Path) -> Result<Box<dyn PackageArchive>> {
        Ok(Box::new(ZipPackage::open(location)?))
    }
}
