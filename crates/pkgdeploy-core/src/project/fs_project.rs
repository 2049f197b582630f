//! A project tree backed by a plain directory.

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use tracing::debug;

use super::ProjectTree;
use crate::framework::Framework;

/// Remaps source files into a dedicated code folder, the way web site
/// projects keep compiled sources under `App_Code`.
#[derive(Debug, Clone)]
struct CodeFolder {
    name: String,
    extensions: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct FileSystemProject {
    root: PathBuf,
    framework: Framework,
    code_folder: Option<CodeFolder>,
    unsupported_extensions: Vec<String>,
    processing: Option<Vec<PathBuf>>,
    completed_batches: usize,
}

impl FileSystemProject {
    pub fn new(root: impl Into<PathBuf>, framework: Framework) -> Self {
        Self {
            root: root.into(),
            framework,
            code_folder: None,
            unsupported_extensions: Vec::new(),
            processing: None,
            completed_batches: 0,
        }
    }

    /// Resolve files with one of `extensions` under `folder` unless they
    /// already live there.
    pub fn with_code_folder(mut self, folder: &str, extensions: &[&str]) -> Self {
        self.code_folder = Some(CodeFolder {
            name: folder.to_string(),
            extensions: extensions.iter().map(|e| normalize_extension(e)).collect(),
        });
        self
    }

    /// Report files with these extensions as unsupported.
    pub fn with_unsupported_extensions(mut self, extensions: &[&str]) -> Self {
        self.unsupported_extensions = extensions.iter().map(|e| normalize_extension(e)).collect();
        self
    }

    pub fn set_target_framework(&mut self, framework: Framework) {
        self.framework = framework;
    }

    /// Paths announced by the open processing batch, if any.
    pub fn processing(&self) -> Option<&[PathBuf]> {
        self.processing.as_deref()
    }

    pub fn completed_batches(&self) -> usize {
        self.completed_batches
    }

    fn full_path(&self, path: &Path) -> PathBuf {
        self.root.join(path)
    }

    fn collect(
        &self,
        dir: &Path,
        recursive: bool,
        want_dirs: bool,
        out: &mut Vec<PathBuf>,
    ) -> io::Result<()> {
        let entries = match fs::read_dir(self.full_path(dir)) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e),
        };

        let mut sorted: Vec<_> = entries.collect::<Result<Vec<_>, _>>()?;
        sorted.sort_by_key(|e| e.file_name());

        for entry in sorted {
            let relative = dir.join(entry.file_name());
            let ty = entry.file_type()?;
            if ty.is_dir() {
                if want_dirs {
                    out.push(relative.clone());
                }
                if recursive {
                    self.collect(&relative, recursive, want_dirs, out)?;
                }
            } else if !want_dirs {
                out.push(relative);
            }
        }
        Ok(())
    }

    fn requires_code_folder(&self, path: &Path) -> Option<&CodeFolder> {
        let folder = self.code_folder.as_ref()?;
        let under_folder = path
            .components()
            .next()
            .is_some_and(|first| {
                first
                    .as_os_str()
                    .to_string_lossy()
                    .eq_ignore_ascii_case(&folder.name)
            });
        let is_source = extension_of(path).is_some_and(|ext| folder.extensions.contains(&ext));
        (!under_folder && is_source).then_some(folder)
    }
}

impl ProjectTree for FileSystemProject {
    fn project_full_path(&self) -> &Path {
        &self.root
    }

    fn target_framework(&self) -> &Framework {
        &self.framework
    }

    fn file_exists(&self, path: &Path) -> bool {
        self.full_path(path).is_file()
    }

    fn add_file(&mut self, path: &Path, content: &[u8]) -> io::Result<()> {
        let full = self.full_path(path);
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&full, content)?;
        debug!("Wrote {}", full.display());
        Ok(())
    }

    fn remove_file(&mut self, path: &Path) -> io::Result<()> {
        match fs::remove_file(self.full_path(path)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }

    fn list_files(&self, path: &Path, recursive: bool) -> io::Result<Vec<PathBuf>> {
        let mut out = Vec::new();
        self.collect(path, recursive, false, &mut out)?;
        Ok(out)
    }

    fn list_directories(&self, path: &Path, recursive: bool) -> io::Result<Vec<PathBuf>> {
        let mut out = Vec::new();
        self.collect(path, recursive, true, &mut out)?;
        Ok(out)
    }

    fn delete_directory(&mut self, path: &Path, recursive: bool) -> io::Result<()> {
        let full = self.full_path(path);
        let result = if recursive {
            fs::remove_dir_all(&full)
        } else {
            fs::remove_dir(&full)
        };
        match result {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }

    fn resolve_path(&self, path: &Path) -> io::Result<PathBuf> {
        let mut normalized = PathBuf::new();
        for component in path.components() {
            match component {
                Component::Normal(c) => normalized.push(c),
                Component::CurDir => {}
                Component::ParentDir | Component::Prefix(_) | Component::RootDir => {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidInput,
                        format!("Path escapes the project: {}", path.display()),
                    ));
                }
            }
        }

        match self.requires_code_folder(&normalized) {
            Some(folder) => Ok(Path::new(&folder.name).join(normalized)),
            None => Ok(normalized),
        }
    }

    fn is_supported_file(&self, path: &Path) -> bool {
        extension_of(path).is_none_or(|ext| !self.unsupported_extensions.contains(&ext))
    }

    fn begin_processing(&mut self, paths: &[PathBuf]) {
        debug!("Begin processing {} path(s)", paths.len());
        self.processing = Some(paths.to_vec());
    }

    fn end_processing(&mut self) {
        self.processing = None;
        self.completed_batches += 1;
    }
}

fn normalize_extension(ext: &str) -> String {
    ext.trim_start_matches('.').to_ascii_lowercase()
}

fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
}
