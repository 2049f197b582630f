//! Materialize a content group into the project tree.

use std::cell::Cell;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::recover;
use crate::error::{DeployError, Result};
use crate::framework::{FrameworkSpecificGroup, effective_path};
use crate::package::{PackageArchive, is_empty_folder_marker};
use crate::project::{
    FileConflictAction, MessageLevel, ProjectContext, ProjectTree, notify,
};
use crate::transform::{TransformDirection, TransformRegistry};

#[derive(Debug, Default)]
pub struct InstallReport {
    /// Plain files written.
    pub written: Vec<PathBuf>,
    /// Targets an install transform was applied to.
    pub transformed: Vec<PathBuf>,
    /// Unsupported files and uninstall-only companions.
    pub skipped: Vec<PathBuf>,
    /// Existing files left alone by a conflict decision.
    pub ignored: Vec<PathBuf>,
    pub recovered: Vec<DeployError>,
}

/// Brackets project mutation with begin/end processing. The end
/// notification fires on drop, whether or not the install succeeded.
struct ProcessingScope<'p> {
    project: &'p mut dyn ProjectTree,
}

impl<'p> ProcessingScope<'p> {
    fn begin(project: &'p mut dyn ProjectTree, paths: &[PathBuf]) -> Self {
        project.begin_processing(paths);
        Self { project }
    }
}

impl Drop for ProcessingScope<'_> {
    fn drop(&mut self) {
        self.project.end_processing();
    }
}

/// Remembers an "all" answer to conflict questions for the rest of a call.
struct ConflictMemory<'c> {
    inner: &'c dyn ProjectContext,
    remembered: Cell<Option<FileConflictAction>>,
}

impl<'c> ConflictMemory<'c> {
    fn new(inner: &'c dyn ProjectContext) -> Self {
        Self {
            inner,
            remembered: Cell::new(None),
        }
    }
}

impl ProjectContext for ConflictMemory<'_> {
    fn log(&self, level: MessageLevel, message: &str) {
        self.inner.log(level, message);
    }

    fn resolve_file_conflict(&self, message: &str) -> FileConflictAction {
        if let Some(action) = self.remembered.get() {
            return action;
        }
        let action = self.inner.resolve_file_conflict(message);
        if matches!(
            action,
            FileConflictAction::OverwriteAll | FileConflictAction::IgnoreAll
        ) {
            debug!("Remembering conflict answer {:?}", action);
            self.remembered.set(Some(action));
        }
        action
    }

    fn source_control_bound(&self) -> bool {
        self.inner.source_control_bound()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PackageInstaller<'a> {
    transforms: &'a TransformRegistry,
}

impl<'a> PackageInstaller<'a> {
    pub fn new(transforms: &'a TransformRegistry) -> Self {
        Self { transforms }
    }

    /// Write `group`'s items from `archive` into `project`.
    ///
    /// Failures while writing are fatal and abort the remaining items;
    /// target paths that cannot be resolved for the processing
    /// announcement are recorded in the report.
    pub fn install(
        &self,
        project: &mut dyn ProjectTree,
        context: &dyn ProjectContext,
        archive: &mut dyn PackageArchive,
        group: &FrameworkSpecificGroup,
    ) -> Result<InstallReport> {
        let mut report = InstallReport::default();
        let context = ConflictMemory::new(context);
        let framework = group.target_framework();

        let mut entries: Vec<(String, String)> = group
            .items()
            .iter()
            .filter_map(|item| match archive.find_entry(item) {
                Some(entry) => Some((item.clone(), entry)),
                None => {
                    debug!("{} is not in the package, skipping", item);
                    None
                }
            })
            .collect();
        entries.sort_by_key(|(item, _)| item.to_lowercase());

        let mut announced = BTreeSet::new();
        for (item, _) in &entries {
            if is_empty_folder_marker(item) {
                continue;
            }
            let effective = effective_path(framework, item);
            let truncated = self
                .transforms
                .resolve_path(&effective, TransformDirection::Install);
            match project.resolve_path(Path::new(&truncated)) {
                Ok(path) => {
                    announced.insert(path);
                }
                Err(e) => recover(&context, &mut report.recovered, DeployError::io(&truncated, e)),
            }
        }
        let announced: Vec<PathBuf> = announced.into_iter().collect();
        info!(
            "Installing {} item(s) for {} into {}",
            entries.len(),
            framework,
            project.project_full_path().display()
        );

        let scope = ProcessingScope::begin(project, &announced);
        for (item, entry) in &entries {
            if is_empty_folder_marker(item) {
                continue;
            }
            self.install_item(
                &mut *scope.project,
                &context,
                archive,
                item,
                entry,
                group,
                &mut report,
            )?;
        }
        drop(scope);

        Ok(report)
    }

    #[allow(clippy::too_many_arguments)]
    fn install_item(
        &self,
        project: &mut dyn ProjectTree,
        context: &dyn ProjectContext,
        archive: &mut dyn PackageArchive,
        item: &str,
        entry: &str,
        group: &FrameworkSpecificGroup,
        report: &mut InstallReport,
    ) -> Result<()> {
        let effective = effective_path(group.target_framework(), item);
        let hit = self.transforms.find(&effective, TransformDirection::Install);
        let truncated = hit
            .as_ref()
            .map(|hit| hit.truncated.as_str())
            .unwrap_or(effective.as_str());
        let target = project
            .resolve_path(Path::new(truncated))
            .map_err(|e| DeployError::io(truncated, e))?;

        if !project.is_supported_file(&target) {
            debug!("{} is not supported by the project, skipping", target.display());
            report.skipped.push(target);
            return Ok(());
        }

        if let Some(hit) = hit {
            let source = archive.read_entry(entry)?;
            hit.transformer
                .transform(&source, &target, project, context)
                .map_err(|e| DeployError::transform(&target, e))?;
            notify(
                context,
                MessageLevel::Debug,
                &format!("Transformed '{}' with {}", target.display(), hit.pair.install()),
            );
            report.transformed.push(target);
            return Ok(());
        }

        if self
            .transforms
            .find(&effective, TransformDirection::Uninstall)
            .is_some()
        {
            debug!("{} is only used on uninstall, skipping", effective);
            report.skipped.push(target);
            return Ok(());
        }

        let source = archive.read_entry(entry)?;
        if try_add_file(project, context, &target, &source)? {
            report.written.push(target);
        } else {
            report.ignored.push(target);
        }
        Ok(())
    }
}

/// Write `content` to `path`, asking the context first when the file
/// already exists. Returns whether the file was written.
fn try_add_file(
    project: &mut dyn ProjectTree,
    context: &dyn ProjectContext,
    path: &Path,
    content: &[u8],
) -> Result<bool> {
    if project.file_exists(path) {
        let message = format!(
            "File '{}' already exists in project '{}'. Do you want to overwrite it?",
            path.display(),
            project.project_name()
        );
        match context.resolve_file_conflict(&message) {
            FileConflictAction::Overwrite | FileConflictAction::OverwriteAll => {
                notify(
                    context,
                    MessageLevel::Info,
                    &format!("Overwriting existing file '{}'", path.display()),
                );
            }
            FileConflictAction::Ignore | FileConflictAction::IgnoreAll => {
                notify(
                    context,
                    MessageLevel::Warning,
                    &format!("'{}' already exists. Skipping...", path.display()),
                );
                return Ok(false);
            }
        }
    }

    project
        .add_file(path, content)
        .map_err(|e| DeployError::io(path, e))?;
    notify(
        context,
        MessageLevel::Debug,
        &format!("Added file '{}'", path.display()),
    );
    Ok(true)
}
