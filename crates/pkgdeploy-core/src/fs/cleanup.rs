//! Best-effort removal of installed files and emptied directories.

use std::path::Path;
use std::thread;
use std::time::Duration;

use tracing::debug;

use super::content::content_equals;
use super::retry::{RetryPolicy, attempt, perform_safe};
use crate::deploy::recover;
use crate::error::{DeployError, Result};
use crate::project::{MessageLevel, ProjectContext, ProjectTree, notify};

/// How long to wait for a deleted directory to actually disappear.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettlePolicy {
    pub polls: u32,
    pub interval: Duration,
}

impl Default for SettlePolicy {
    fn default() -> Self {
        Self {
            polls: 5,
            interval: Duration::from_millis(100),
        }
    }
}

impl SettlePolicy {
    pub fn immediate(polls: u32) -> Self {
        Self {
            polls,
            interval: Duration::ZERO,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileRemoval {
    Removed,
    /// Kept because it no longer matches the package original.
    Modified,
    Absent,
    Failed,
}

/// Remove `path` if it still matches `original`.
pub fn delete_file_safe(
    project: &mut dyn ProjectTree,
    path: &Path,
    original: &[u8],
    retry: &RetryPolicy,
    context: &dyn ProjectContext,
    recovered: &mut Vec<DeployError>,
) -> FileRemoval {
    if !project.file_exists(path) {
        return FileRemoval::Absent;
    }

    let current = match project.read_file(path) {
        Ok(bytes) => bytes,
        Err(e) => {
            recover(context, recovered, DeployError::io(path, e));
            return FileRemoval::Failed;
        }
    };

    if !content_equals(&current, original) {
        notify(
            context,
            MessageLevel::Warning,
            &format!(
                "Skipping '{}' because it was modified",
                project.project_full_path().join(path).display()
            ),
        );
        return FileRemoval::Modified;
    }

    let removed = perform_safe(
        retry,
        &format!("Remove {}", path.display()),
        context,
        recovered,
        || project.remove_file(path).map_err(|e| DeployError::io(path, e)),
    );
    if removed {
        notify(
            context,
            MessageLevel::Debug,
            &format!("Removed file '{}'", path.display()),
        );
        FileRemoval::Removed
    } else {
        FileRemoval::Failed
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectoryRemoval {
    Removed,
    Absent,
    NotEmpty,
    /// Left for the version-control provider to track.
    Skipped,
    Failed,
}

/// Delete an empty directory and wait for it to disappear.
///
/// A directory that still holds files or subdirectories is left alone.
/// The settle wait gives up silently after the configured polls.
pub fn delete_directory(
    project: &mut dyn ProjectTree,
    path: &Path,
    settle: &SettlePolicy,
    context: &dyn ProjectContext,
) -> Result<DirectoryRemoval> {
    if !project.directory_exists(path) {
        return Ok(DirectoryRemoval::Absent);
    }

    let has_files = !project
        .list_files(path, false)
        .map_err(|e| DeployError::io(path, e))?
        .is_empty();
    let has_dirs = !project
        .list_directories(path, false)
        .map_err(|e| DeployError::io(path, e))?
        .is_empty();
    if has_files || has_dirs {
        notify(
            context,
            MessageLevel::Warning,
            &format!("Directory '{}' is not empty, skipping", path.display()),
        );
        return Ok(DirectoryRemoval::NotEmpty);
    }

    project
        .delete_directory(path, false)
        .map_err(|e| DeployError::io(path, e))?;

    let mut polls = 0;
    while polls < settle.polls && project.directory_exists(path) {
        polls += 1;
        if !settle.interval.is_zero() {
            thread::sleep(settle.interval);
        }
    }
    if polls > 0 {
        debug!("Waited {} poll(s) for {} to disappear", polls, path.display());
    }

    notify(
        context,
        MessageLevel::Debug,
        &format!("Removed folder '{}'", path.display()),
    );
    Ok(DirectoryRemoval::Removed)
}

/// [`delete_directory`] under the retry bound, with failures recorded as
/// recoverable. Nothing is deleted while the project is under source control.
pub fn delete_directory_safe(
    project: &mut dyn ProjectTree,
    path: &Path,
    retry: &RetryPolicy,
    settle: &SettlePolicy,
    context: &dyn ProjectContext,
    recovered: &mut Vec<DeployError>,
) -> DirectoryRemoval {
    if context.source_control_bound() {
        debug!(
            "Project is under source control, leaving directory {}",
            path.display()
        );
        return DirectoryRemoval::Skipped;
    }

    let what = format!("Delete directory {}", path.display());
    match attempt(retry, &what, || {
        delete_directory(&mut *project, path, settle, context)
    }) {
        Ok(outcome) => outcome,
        Err(e) => {
            recover(context, recovered, e);
            DirectoryRemoval::Failed
        }
    }
}
