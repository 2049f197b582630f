//! Collaborators the engine deploys through.
//!
//! [`ProjectTree`] is the host project's file tree; [`ProjectContext`] is
//! the host's messaging and conflict-resolution surface.

pub mod context;
pub mod fs_project;

use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::framework::Framework;

pub use context::BatchContext;
pub use fs_project::FileSystemProject;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageLevel {
    Debug,
    Info,
    Warning,
    Error,
}

/// Answer to "a file with this name already exists".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FileConflictAction {
    Overwrite,
    OverwriteAll,
    Ignore,
    IgnoreAll,
}

pub trait ProjectContext {
    fn log(&self, level: MessageLevel, message: &str);

    fn resolve_file_conflict(&self, message: &str) -> FileConflictAction;

    /// Whether the project is bound to an external version-control provider.
    fn source_control_bound(&self) -> bool {
        false
    }
}

/// The host project's file tree. All paths are project-relative.
pub trait ProjectTree {
    fn project_full_path(&self) -> &Path;

    fn target_framework(&self) -> &Framework;

    fn file_exists(&self, path: &Path) -> bool;

    fn read_file(&self, path: &Path) -> io::Result<Vec<u8>> {
        std::fs::read(self.project_full_path().join(path))
    }

    fn add_file(&mut self, path: &Path, content: &[u8]) -> io::Result<()>;

    fn remove_file(&mut self, path: &Path) -> io::Result<()>;

    fn list_files(&self, path: &Path, recursive: bool) -> io::Result<Vec<PathBuf>>;

    fn list_directories(&self, path: &Path, recursive: bool) -> io::Result<Vec<PathBuf>>;

    fn directory_exists(&self, path: &Path) -> bool {
        self.project_full_path().join(path).is_dir()
    }

    fn delete_directory(&mut self, path: &Path, recursive: bool) -> io::Result<()>;

    /// Map an effective path to where the project keeps it.
    fn resolve_path(&self, path: &Path) -> io::Result<PathBuf>;

    fn is_supported_file(&self, _path: &Path) -> bool {
        true
    }

    fn begin_processing(&mut self, paths: &[PathBuf]);

    fn end_processing(&mut self);

    fn project_name(&self) -> String {
        self.project_full_path()
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Emit a user-facing message on both the tracing and the context channel.
pub(crate) fn notify(context: &dyn ProjectContext, level: MessageLevel, message: &str) {
    match level {
        MessageLevel::Debug => tracing::debug!("{}", message),
        MessageLevel::Info => tracing::info!("{}", message),
        MessageLevel::Warning => tracing::warn!("{}", message),
        MessageLevel::Error => tracing::error!("{}", message),
    }
    context.log(level, message);
}
