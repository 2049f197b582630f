#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::rc::Rc;

use pkgdeploy_core::error::Result;
use pkgdeploy_core::framework::Framework;
use pkgdeploy_core::package::{ArchiveOpener, PackageArchive, ZipPackage};
use pkgdeploy_core::project::{FileSystemProject, ProjectTree};

// =========================================================================
// Packages
// =========================================================================

/// Builds a package archive in memory.
#[derive(Default)]
pub struct PackageBuilder {
    entries: Vec<(String, Vec<u8>)>,
}

impl PackageBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, name: &str, content: &str) -> Self {
        self.entries.push((name.to_string(), content.as_bytes().to_vec()));
        self
    }

    pub fn binary(mut self, name: &str, content: &[u8]) -> Self {
        self.entries.push((name.to_string(), content.to_vec()));
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut buf = io::Cursor::new(Vec::new());
        {
            let mut zip = zip::ZipWriter::new(&mut buf);
            let options = zip::write::SimpleFileOptions::default()
                .compression_method(zip::CompressionMethod::Stored);
            zip.start_file("Contoso.nuspec", options)
                .expect("Failed to start nuspec");
            zip.write_all(b"<package />").expect("Failed to write nuspec");
            for (name, data) in &self.entries {
                zip.start_file(name.as_str(), options)
                    .expect("Failed to start file");
                zip.write_all(data).expect("Failed to write file");
            }
            zip.finish().expect("Failed to finish zip");
        }
        buf.into_inner()
    }

    /// Write the package into `dir` and return its location.
    pub fn write_to(&self, dir: &Path, file_name: &str) -> PathBuf {
        std::fs::create_dir_all(dir).expect("Failed to create package dir");
        let path = dir.join(file_name);
        std::fs::write(&path, self.build()).expect("Failed to write package");
        path
    }

    pub fn open(&self) -> ZipPackage<io::Cursor<Vec<u8>>> {
        ZipPackage::from_bytes(self.build()).expect("Package should open")
    }
}

/// Serves in-memory packages and tracks how many are open at once.
#[derive(Default)]
pub struct MemoryOpener {
    packages: HashMap<PathBuf, Vec<u8>>,
    open_now: Rc<Cell<usize>>,
    peak_open: Rc<Cell<usize>>,
    opens: Rc<Cell<usize>>,
}

impl MemoryOpener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, location: &str, package: &PackageBuilder) -> Self {
        self.packages.insert(PathBuf::from(location), package.build());
        self
    }

    pub fn peak_open(&self) -> usize {
        self.peak_open.get()
    }

    pub fn opens(&self) -> usize {
        self.opens.get()
    }
}

struct TrackedArchive {
    inner: ZipPackage<io::Cursor<Vec<u8>>>,
    open_now: Rc<Cell<usize>>,
}

impl PackageArchive for TrackedArchive {
    fn entry_names(&self) -> Vec<String> {
        self.inner.entry_names()
    }

    fn find_entry(&self, path: &str) -> Option<String> {
        self.inner.find_entry(path)
    }

    fn read_entry(&mut self, name: &str) -> Result<Vec<u8>> {
        self.inner.read_entry(name)
    }
}

impl Drop for TrackedArchive {
    fn drop(&mut self) {
        self.open_now.set(self.open_now.get() - 1);
    }
}

impl ArchiveOpener for MemoryOpener {
    fn open(&self, location: &Path) -> Result<Box<dyn PackageArchive>> {
        let bytes = self.packages.get(location).cloned().ok_or_else(|| {
            pkgdeploy_core::error::DeployError::io(
                location,
                io::Error::new(io::ErrorKind::NotFound, "no such package"),
            )
        })?;
        let inner = ZipPackage::from_bytes(bytes)?;
        self.opens.set(self.opens.get() + 1);
        self.open_now.set(self.open_now.get() + 1);
        self.peak_open
            .set(self.peak_open.get().max(self.open_now.get()));
        Ok(Box::new(TrackedArchive {
            inner,
            open_now: Rc::clone(&self.open_now),
        }))
    }
}

// =========================================================================
// Projects
// =========================================================================

pub fn any_project(root: &Path) -> FileSystemProject {
    FileSystemProject::new(root, Framework::Any)
}

pub fn project_for(root: &Path, moniker: &str) -> FileSystemProject {
    FileSystemProject::new(root, Framework::parse(moniker).expect("valid moniker"))
}

/// All files under the project root, relative and sorted.
pub fn project_files(project: &dyn ProjectTree) -> Vec<PathBuf> {
    project
        .list_files(Path::new(""), true)
        .expect("Failed to list project files")
}

/// A real project whose directory operations can be scripted to misbehave.
pub struct ScriptedProject {
    pub inner: FileSystemProject,
    /// Every non-recursive delete fails with this many errors first.
    pub failing_deletes: usize,
    /// Deletion reports success but the directory keeps existing.
    pub lingering: bool,
    pub delete_calls: Cell<usize>,
    pub existence_checks: Cell<usize>,
    /// Paths that fail to resolve the next time they are asked for.
    pub failing_resolves: RefCell<Vec<PathBuf>>,
    /// Every set passed to `begin_processing`, in order.
    pub announced: RefCell<Vec<Vec<PathBuf>>>,
}

impl ScriptedProject {
    pub fn new(inner: FileSystemProject) -> Self {
        Self {
            inner,
            failing_deletes: 0,
            lingering: false,
            delete_calls: Cell::new(0),
            existence_checks: Cell::new(0),
            failing_resolves: RefCell::new(Vec::new()),
            announced: RefCell::new(Vec::new()),
        }
    }
}

impl ProjectTree for ScriptedProject {
    fn project_full_path(&self) -> &Path {
        self.inner.project_full_path()
    }

    fn target_framework(&self) -> &Framework {
        self.inner.target_framework()
    }

    fn file_exists(&self, path: &Path) -> bool {
        self.inner.file_exists(path)
    }

    fn read_file(&self, path: &Path) -> io::Result<Vec<u8>> {
        self.inner.read_file(path)
    }

    fn add_file(&mut self, path: &Path, content: &[u8]) -> io::Result<()> {
        self.inner.add_file(path, content)
    }

    fn remove_file(&mut self, path: &Path) -> io::Result<()> {
        self.inner.remove_file(path)
    }

    fn list_files(&self, path: &Path, recursive: bool) -> io::Result<Vec<PathBuf>> {
        self.inner.list_files(path, recursive)
    }

    fn list_directories(&self, path: &Path, recursive: bool) -> io::Result<Vec<PathBuf>> {
        self.inner.list_directories(path, recursive)
    }

    fn directory_exists(&self, path: &Path) -> bool {
        self.existence_checks.set(self.existence_checks.get() + 1);
        self.inner.directory_exists(path)
    }

    fn delete_directory(&mut self, path: &Path, recursive: bool) -> io::Result<()> {
        let calls = self.delete_calls.get() + 1;
        self.delete_calls.set(calls);
        if calls <= self.failing_deletes {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "directory is locked",
            ));
        }
        if self.lingering {
            return Ok(());
        }
        self.inner.delete_directory(path, recursive)
    }

    fn resolve_path(&self, path: &Path) -> io::Result<PathBuf> {
        let mut failing = self.failing_resolves.borrow_mut();
        if let Some(pos) = failing.iter().position(|p| p == path) {
            failing.remove(pos);
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "path is not resolvable right now",
            ));
        }
        self.inner.resolve_path(path)
    }

    fn is_supported_file(&self, path: &Path) -> bool {
        self.inner.is_supported_file(path)
    }

    fn begin_processing(&mut self, paths: &[PathBuf]) {
        self.announced.borrow_mut().push(paths.to_vec());
        self.inner.begin_processing(paths)
    }

    fn end_processing(&mut self) {
        self.inner.end_processing()
    }
}
